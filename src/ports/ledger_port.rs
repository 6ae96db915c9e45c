//! Trade ledger output port trait.

use crate::domain::error::OrbError;
use crate::domain::metrics::PeriodReturn;
use crate::domain::trade::Trade;

/// Sink for the results of a run.
pub trait LedgerPort {
    fn write_trades(&self, trades: &[Trade]) -> Result<(), OrbError>;

    fn write_periods(&self, periods: &[PeriodReturn]) -> Result<(), OrbError>;
}
