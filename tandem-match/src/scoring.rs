use chrono::{DateTime, Utc};

use crate::models::PreferenceMode;

/// Component weights for the compatibility score. Each component lands in
/// [0, 1]; the weighted sum is normalized by `total()` before being scaled
/// to a percentage.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub schedule: f64,
    pub detour: f64,
    pub cost: f64,
    pub preferences: f64,
    pub seat_slack: f64,
}

impl Weights {
    pub fn for_mode(mode: PreferenceMode) -> Weights {
        match mode {
            PreferenceMode::Default => Weights {
                schedule: 2.0,
                detour: 2.0,
                cost: 1.5,
                preferences: 0.5,
                seat_slack: 0.5,
            },
            PreferenceMode::CostPriority => Weights {
                schedule: 2.0,
                detour: 2.0,
                cost: 1.75,
                preferences: 0.1,
                seat_slack: 0.1,
            },
            PreferenceMode::ComfortPriority => Weights {
                schedule: 2.0,
                detour: 2.0,
                cost: 1.0,
                preferences: 1.0,
                seat_slack: 1.0,
            },
        }
    }

    pub fn total(&self) -> f64 {
        self.schedule + self.detour + self.cost + self.preferences + self.seat_slack
    }
}

/// How well the driver's projected arrival lines up with when the rider
/// wants to be there. Arriving up to 20 minutes after the desired time is a
/// perfect fit; later than that decays quickly, earlier decays slowly.
pub fn schedule_score(driver_arrival: DateTime<Utc>, desired_arrival: DateTime<Utc>) -> f64 {
    let diff_min = (driver_arrival - desired_arrival).num_minutes() as f64;

    if (0.0..=20.0).contains(&diff_min) {
        1.0
    } else if diff_min > 20.0 {
        (1.0 - (diff_min - 20.0) / 30.0).max(0.0)
    } else {
        (1.0 - diff_min.abs() / 60.0).max(0.0)
    }
}

/// Inverse-detour score: full marks inside the driver's tolerance, then an
/// exponential falloff. The decay constant puts the score near 36% about
/// 3.3 minutes past tolerance.
pub fn detour_score(detour_sec: u32, tolerance_min: u16) -> f64 {
    let tolerance_sec = u32::from(tolerance_min) * 60;
    if detour_sec <= tolerance_sec {
        return 1.0;
    }
    let excess = f64::from(detour_sec - tolerance_sec);
    (-0.005 * excess).exp().max(0.01)
}

/// Cost score normalized against the cheapest candidate in the batch.
pub fn cost_score(cost_cents: i64, batch_min_cents: i64) -> f64 {
    let diff_dollars = (cost_cents - batch_min_cents) as f64 / 100.0;
    if diff_dollars <= 0.0 {
        return 1.0;
    }
    (-0.1 * diff_dollars).exp()
}

/// How empty the car stays after this rider boards. Hard zero when the
/// party does not fit at all.
pub fn seat_slack_score(booked_seats: u8, max_seats: u8, seats_needed: u8) -> f64 {
    let occupancy_after = u16::from(booked_seats) + u16::from(seats_needed);
    if occupancy_after > u16::from(max_seats) {
        return 0.0;
    }
    let score = 1.0 - f64::from(occupancy_after) / f64::from(max_seats + 1);
    score.clamp(0.0, 1.0)
}
