use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use crate::error::HoldwiseError;
use crate::types::{Money, Rate};
use crate::HoldwiseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How rent evolves across the projection. Resolved once at setup; the
/// ledger never re-interprets scenario names mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RentSchedule {
    /// Rent never changes
    Flat,
    /// Whole-year compounding at an annual rate: rent holds flat within each
    /// year and steps at anniversaries
    AnnualGrowth { rate: Rate },
    /// Explicit month-ranged phases (unit turnover, a family member moving
    /// in, staged lease-up). Months outside every phase fall back to the
    /// base rent with the market growth rate.
    Phased { phases: Vec<RentPhase> },
}

/// One phase of a phased rent schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentPhase {
    /// First ledger month the phase covers, 1-based
    pub start_month: u32,
    /// Last covered month, inclusive. None runs to the horizon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_month: Option<u32>,
    /// Monthly rent per unit while the phase is active
    pub unit_rents: Vec<Money>,
    /// Annual growth compounding from the phase's own anniversary
    pub growth_rate: Rate,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl RentSchedule {
    /// Rent for an absolute ledger month (1-based). `base_rent` and
    /// `default_growth` describe the property's current rent roll and the
    /// market growth rate, used by `AnnualGrowth` fallbacks and months no
    /// phase covers.
    pub fn monthly_rent(&self, month: u32, base_rent: Money, default_growth: Rate) -> Money {
        let years_elapsed = month.saturating_sub(1) / 12;
        match self {
            RentSchedule::Flat => base_rent,
            RentSchedule::AnnualGrowth { rate } => base_rent * annual_factor(*rate, years_elapsed),
            RentSchedule::Phased { phases } => {
                for phase in phases {
                    let covered = month >= phase.start_month
                        && phase.end_month.map_or(true, |end| month <= end);
                    if covered {
                        let phase_rent: Money = phase.unit_rents.iter().copied().sum();
                        let phase_start_year = phase.start_month.saturating_sub(1) / 12;
                        let phase_years = years_elapsed.saturating_sub(phase_start_year);
                        return phase_rent * annual_factor(phase.growth_rate, phase_years);
                    }
                }
                base_rent * annual_factor(default_growth, years_elapsed)
            }
        }
    }

    /// Reject malformed phase definitions before any projection runs.
    pub fn validate(&self) -> HoldwiseResult<()> {
        if let RentSchedule::Phased { phases } = self {
            if phases.is_empty() {
                return Err(HoldwiseError::InvalidInput {
                    field: "phases".into(),
                    reason: "Phased rent schedule must define at least one phase".into(),
                });
            }
            for (i, phase) in phases.iter().enumerate() {
                if phase.start_month < 1 {
                    return Err(HoldwiseError::InvalidInput {
                        field: format!("phases[{i}].start_month"),
                        reason: "Phase start month must be at least 1".into(),
                    });
                }
                if let Some(end) = phase.end_month {
                    if end < phase.start_month {
                        return Err(HoldwiseError::InvalidInput {
                            field: format!("phases[{i}].end_month"),
                            reason: "Phase end month cannot precede its start month".into(),
                        });
                    }
                }
                if phase.unit_rents.iter().any(|r| *r < Decimal::ZERO) {
                    return Err(HoldwiseError::InvalidInput {
                        field: format!("phases[{i}].unit_rents"),
                        reason: "Phase rents cannot be negative".into(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Whole-year compound growth factor: (1 + rate)^years. Fractional years
/// never enter; growth steps only at anniversaries.
pub(crate) fn annual_factor(rate: Rate, whole_years: u32) -> Decimal {
    (Decimal::ONE + rate).powi(whole_years as i64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
