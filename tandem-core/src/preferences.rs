use serde::{Deserialize, Serialize};

/// Ride-comfort preferences, matched between rider and driver by the scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiderPreferences {
    pub music: bool,
    pub chatty: bool,
    pub smoking: bool,
    pub pets: bool,
}

impl Default for RiderPreferences {
    fn default() -> Self {
        Self {
            music: true,
            chatty: true,
            smoking: false,
            pets: false,
        }
    }
}

impl RiderPreferences {
    /// Fraction of attributes the two profiles agree on, in [0, 1].
    pub fn overlap(&self, other: &RiderPreferences) -> f64 {
        let agreements = [
            self.music == other.music,
            self.chatty == other.chatty,
            self.smoking == other.smoking,
            self.pets == other.pets,
        ]
        .iter()
        .filter(|&&same| same)
        .count();

        agreements as f64 / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_fraction() {
        let a = RiderPreferences {
            music: true,
            chatty: true,
            smoking: false,
            pets: false,
        };
        let b = RiderPreferences {
            music: true,
            chatty: false,
            smoking: false,
            pets: true,
        };
        assert_eq!(a.overlap(&a), 1.0);
        assert_eq!(a.overlap(&b), 0.5);
    }
}
