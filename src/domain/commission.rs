//! Per-share commission schedule.

/// `legs × (shares × per_share + base_fee)`.
///
/// `legs` is the number of charged executions per round trip: 1 charges the
/// schedule once per trade, 2 charges entry and exit separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionSchedule {
    pub per_share: f64,
    pub base_fee: f64,
    pub legs: u32,
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        // IBKR fixed tiered rates, charged on both legs
        CommissionSchedule {
            per_share: 0.0035,
            base_fee: 0.35,
            legs: 2,
        }
    }
}

impl CommissionSchedule {
    pub fn free() -> Self {
        CommissionSchedule {
            per_share: 0.0,
            base_fee: 0.0,
            legs: 1,
        }
    }

    pub fn per_leg(&self, shares: u64) -> f64 {
        shares as f64 * self.per_share + self.base_fee
    }

    pub fn round_trip(&self, shares: u64) -> f64 {
        f64::from(self.legs) * self.per_leg(shares)
    }
}
