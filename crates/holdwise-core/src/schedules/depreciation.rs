use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::HoldwiseError;
use crate::types::{Money, Rate};
use crate::HoldwiseResult;

/// Land is not depreciable; this fraction of the basis is carved out.
pub const DEFAULT_LAND_FRACTION: Decimal = dec!(0.20);

/// Residential rental recovery period in years.
pub const DEFAULT_RECOVERY_YEARS: Decimal = dec!(27.5);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One year of straight-line depreciation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationYearEntry {
    /// Year index, 1-based
    pub year: u32,
    /// Depreciation taken this year, capped at the remaining basis
    pub annual_depreciation: Money,
    /// Cumulative depreciation through this year
    pub accumulated: Money,
    /// Depreciable basis still unclaimed
    pub remaining_basis: Money,
    /// Cost basis less accumulated depreciation
    pub adjusted_basis: Money,
}

/// Straight-line schedule over the analysis horizon. Built once per
/// analysis and shared by the ledger and the terminal valuator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationSchedule {
    pub cost_basis: Money,
    pub land_value: Money,
    pub depreciable_basis: Money,
    /// Level annual amount before the final-year cap
    pub annual_amount: Money,
    pub recovery_years: Decimal,
    pub entries: Vec<DepreciationYearEntry>,
    /// Accumulated depreciation at the end of the horizon
    pub total_accumulated: Money,
}

impl DepreciationSchedule {
    /// Depreciation claimed in a given schedule year (1-based). Zero beyond
    /// the horizon or the recovery period.
    pub fn annual_for_year(&self, year: u32) -> Money {
        if year == 0 {
            return Decimal::ZERO;
        }
        self.entries
            .get(year as usize - 1)
            .map(|e| e.annual_depreciation)
            .unwrap_or(Decimal::ZERO)
    }

    /// Monthly accrual for an absolute ledger month (1-based): the month's
    /// schedule-year amount spread evenly, so all twelve months of a year
    /// carry the same figure.
    pub fn monthly_accrual(&self, month: u32) -> Money {
        if month == 0 {
            return Decimal::ZERO;
        }
        let year = (month - 1) / 12 + 1;
        self.annual_for_year(year) / dec!(12)
    }
}

// ---------------------------------------------------------------------------
// Schedule construction
// ---------------------------------------------------------------------------

/// Build the year-by-year straight-line schedule. Each year is capped at the
/// remaining depreciable basis, so horizons beyond the recovery period
/// accumulate exactly the depreciable basis and no more.
pub fn build_depreciation_schedule(
    cost_basis: Money,
    land_fraction: Rate,
    recovery_years: Decimal,
    horizon_years: u32,
) -> HoldwiseResult<DepreciationSchedule> {
    if cost_basis <= Decimal::ZERO {
        return Err(HoldwiseError::InvalidInput {
            field: "cost_basis".into(),
            reason: "Cost basis must be positive".into(),
        });
    }
    if land_fraction < Decimal::ZERO || land_fraction >= Decimal::ONE {
        return Err(HoldwiseError::InvalidInput {
            field: "land_fraction".into(),
            reason: "Land fraction must be in [0, 1)".into(),
        });
    }
    if recovery_years <= Decimal::ZERO {
        return Err(HoldwiseError::InvalidInput {
            field: "recovery_years".into(),
            reason: "Recovery period must be positive".into(),
        });
    }
    if horizon_years < 1 {
        return Err(HoldwiseError::InvalidInput {
            field: "horizon_years".into(),
            reason: "Horizon must be at least 1 year".into(),
        });
    }

    let land_value = cost_basis * land_fraction;
    let depreciable_basis = cost_basis - land_value;
    let annual_amount = depreciable_basis / recovery_years;

    let mut entries = Vec::with_capacity(horizon_years as usize);
    let mut accumulated = Decimal::ZERO;
    let mut remaining = depreciable_basis;

    for year in 1..=horizon_years {
        let this_year = annual_amount.min(remaining);
        accumulated += this_year;
        remaining -= this_year;
        entries.push(DepreciationYearEntry {
            year,
            annual_depreciation: this_year,
            accumulated,
            remaining_basis: remaining,
            adjusted_basis: cost_basis - accumulated,
        });
    }

    Ok(DepreciationSchedule {
        cost_basis,
        land_value,
        depreciable_basis,
        annual_amount,
        recovery_years,
        entries,
        total_accumulated: accumulated,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
