use chrono::{DateTime, Utc};

/// Per-minute parking tariff with a minimum charge for the first minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    pub minimum_charge: i64,
    pub per_minute_rate: i64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            minimum_charge: 10,
            per_minute_rate: 10,
        }
    }
}

impl BillingPolicy {
    pub fn new(minimum_charge: i64, per_minute_rate: i64) -> Self {
        Self {
            minimum_charge,
            per_minute_rate,
        }
    }

    /// Fee for a stay that started at `entry_time` and ends at `now`.
    ///
    /// Up to one minute costs the minimum charge; every started minute after
    /// that adds the rate, truncated to whole minutes.
    pub fn fee(&self, entry_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let elapsed_minutes = (now - entry_time).num_milliseconds() as f64 / 60_000.0;
        if elapsed_minutes <= 1.0 {
            return self.minimum_charge;
        }
        let billable = (elapsed_minutes - 1.0).floor() as i64;
        self.minimum_charge + billable * self.per_minute_rate
    }
}
