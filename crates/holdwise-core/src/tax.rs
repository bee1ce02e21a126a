use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

/// Tax rates applied across the analysis. All rates are decimals, not percentages.
///
/// Federal and state components are kept separate because they combine
/// differently by context: rental income is taxed at the combined ordinary
/// rate, sale gains at the combined capital gains rate, and depreciation
/// recapture at the federal recapture rate plus the state capital gains rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub federal_ordinary: Rate,
    pub state_ordinary: Rate,
    pub federal_capital_gains: Rate,
    pub state_capital_gains: Rate,
    pub federal_recapture: Rate,
    /// Gain excluded from federal tax on an immediate owner-occupied sale.
    /// Applies only when selling now; a future sale after years of rental
    /// service no longer qualifies.
    pub primary_residence_exclusion: Option<Money>,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        TaxPolicy {
            federal_ordinary: dec!(0.32),
            state_ordinary: dec!(0.0425),
            federal_capital_gains: dec!(0.20),
            state_capital_gains: dec!(0.0425),
            federal_recapture: dec!(0.25),
            primary_residence_exclusion: Some(dec!(250000)),
        }
    }
}

impl TaxPolicy {
    /// Combined rate on ordinary rental income
    pub fn combined_ordinary(&self) -> Rate {
        self.federal_ordinary + self.state_ordinary
    }

    /// Combined rate on capital gains
    pub fn combined_capital_gains(&self) -> Rate {
        self.federal_capital_gains + self.state_capital_gains
    }

    /// Combined rate on depreciation recapture. States tax recaptured
    /// depreciation as a capital gain, so the state capital gains rate
    /// stacks on the federal recapture rate.
    pub fn combined_recapture(&self) -> Rate {
        self.federal_recapture + self.state_capital_gains
    }
}
