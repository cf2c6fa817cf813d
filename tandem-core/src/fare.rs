use serde::{Deserialize, Serialize};

/// Occupancy discount tiers: riders sharing a car ride cheaper. Indexed by
/// the number of passengers already booked, capped at the last tier.
pub const OCCUPANCY_DISCOUNTS: [f64; 4] = [0.0, 0.15, 0.25, 0.35];

/// Platform fare schedule. All amounts are integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareSchedule {
    pub base_fare_cents: i64,
    pub per_km_cents: i64,
    pub per_minute_cents: i64,
    /// Compensates the driver for each minute of detour the pickup adds.
    pub detour_fee_per_minute_cents: i64,
    /// Platform cut taken out of driver earnings at settlement.
    pub platform_fee_percent: f64,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            base_fare_cents: 250,
            per_km_cents: 20,
            per_minute_cents: 10,
            detour_fee_per_minute_cents: 25,
            platform_fee_percent: 15.0,
        }
    }
}

impl FareSchedule {
    /// Estimated rider cost in cents for a ride of the given shape.
    ///
    /// `existing_passengers` is the count already booked when the estimate is
    /// taken; it selects the occupancy discount tier. The result is locked
    /// into the request and never recomputed at completion.
    pub fn estimate_cost_cents(
        &self,
        distance_km: f64,
        duration_sec: u32,
        detour_sec: u32,
        existing_passengers: u8,
    ) -> i64 {
        let duration_min = f64::from(duration_sec) / 60.0;
        let detour_min = f64::from(detour_sec) / 60.0;

        let raw = self.base_fare_cents as f64
            + distance_km * self.per_km_cents as f64
            + duration_min * self.per_minute_cents as f64
            + detour_min * self.detour_fee_per_minute_cents as f64;

        let tier = usize::from(existing_passengers).min(OCCUPANCY_DISCOUNTS.len() - 1);
        let discounted = raw * (1.0 - OCCUPANCY_DISCOUNTS[tier]);

        discounted.round().max(0.0) as i64
    }

    /// Platform fee in cents on a settled fare total.
    pub fn platform_fee_cents(&self, fare_total_cents: i64) -> i64 {
        (fare_total_cents as f64 * self.platform_fee_percent / 100.0).round() as i64
    }
}
