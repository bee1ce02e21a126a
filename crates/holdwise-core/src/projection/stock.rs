use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::model::AnalysisParameters;
use crate::projection::monthly::{validate_config, ProjectionConfig};
use crate::schedules::amortization::add_months;
use crate::terminal::{immediate_sale_breakdown, ImmediateSaleBreakdown};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockProjectionInput {
    pub params: AnalysisParameters,
    #[serde(default)]
    pub config: ProjectionConfig,
}

/// One month of the index-fund alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    /// 1-based month index
    pub month: u32,
    pub date: NaiveDate,
    /// Return credited this month
    pub monthly_return: Money,
    /// Balance after crediting the return
    pub balance: Money,
    /// Balance minus the initial investment
    pub cumulative_gains: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockProjection {
    /// After-tax proceeds of selling the property today
    pub initial_investment: Money,
    /// How that investment was arrived at
    pub sale_breakdown: ImmediateSaleBreakdown,
    pub entries: Vec<StockLedgerEntry>,
    pub final_value: Money,
    pub total_gains: Money,
    pub average_monthly_return: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project the sell-now alternative: liquidate today, invest the after-tax
/// proceeds in an index fund, and compound monthly over the horizon.
pub fn project_stock_path(
    input: &StockProjectionInput,
) -> HoldwiseResult<ComputationOutput<StockProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let projection = build_stock_projection(&input.params, &input.config)?;

    if projection.initial_investment <= Decimal::ZERO {
        warnings.push(
            "Immediate sale nets nothing to invest — the stock path starts from zero or below"
                .into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly Compounding Ledger (Index-Fund Path)",
        input,
        warnings,
        elapsed,
        projection,
    ))
}

// ---------------------------------------------------------------------------
// Ledger simulation
// ---------------------------------------------------------------------------

/// The compounding walk shared by the projection and comparison layers.
/// Callers are expected to have validated `params`.
pub(crate) fn build_stock_projection(
    params: &AnalysisParameters,
    config: &ProjectionConfig,
) -> HoldwiseResult<StockProjection> {
    validate_config(config)?;

    let sale_breakdown = immediate_sale_breakdown(params);
    let initial_investment = sale_breakdown.net_proceeds;
    let months = params.analysis_years * 12;
    let monthly_rate: Rate = params.market.stock_return_rate / dec!(12);

    let mut entries: Vec<StockLedgerEntry> = Vec::with_capacity(months as usize);
    let mut balance = initial_investment;

    for month in 1..=months {
        let date = add_months(config.anchor_date, month - 1)?;
        let monthly_return = balance * monthly_rate;
        balance += monthly_return;

        entries.push(StockLedgerEntry {
            month,
            date,
            monthly_return,
            balance,
            cumulative_gains: balance - initial_investment,
        });
    }

    let total_gains = balance - initial_investment;
    let month_count = Decimal::from(months.max(1));

    Ok(StockProjection {
        initial_investment,
        sale_breakdown,
        entries,
        final_value: balance,
        total_gains,
        average_monthly_return: total_gains / month_count,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_parameters;
    use pretty_assertions::assert_eq;

    fn sample_input() -> StockProjectionInput {
        StockProjectionInput {
            params: sample_parameters(),
            config: ProjectionConfig::default(),
        }
    }

    #[test]
    fn test_initial_investment_matches_immediate_sale() {
        let input = sample_input();
        let output = project_stock_path(&input).unwrap();
        let projection = &output.result;

        // Net proceeds from the fixture: 950000 - 57000 - 554825 - 7225
        assert_eq!(projection.initial_investment, dec!(330950));
        assert_eq!(
            projection.initial_investment,
            projection.sale_breakdown.net_proceeds
        );
    }

    #[test]
    fn test_first_month_compounding() {
        let input = sample_input();
        let output = project_stock_path(&input).unwrap();
        let first = &output.result.entries[0];

        // 330950 * 0.075 / 12
        let expected_return = dec!(330950) * dec!(0.075) / dec!(12);
        assert_eq!(first.monthly_return, expected_return);
        assert_eq!(first.balance, dec!(330950) + expected_return);
        assert_eq!(first.cumulative_gains, expected_return);
    }

    #[test]
    fn test_balance_compounds_not_simple_interest() {
        let input = sample_input();
        let output = project_stock_path(&input).unwrap();
        let entries = &output.result.entries;

        // Month 2 earns on month 1's balance, so its return is strictly larger
        assert!(entries[1].monthly_return > entries[0].monthly_return);
        assert_eq!(
            entries[1].balance,
            entries[0].balance + entries[1].monthly_return
        );
    }

    #[test]
    fn test_entry_count_and_dates() {
        let input = sample_input();
        let output = project_stock_path(&input).unwrap();
        let entries = &output.result.entries;

        assert_eq!(entries.len(), 120);
        assert_eq!(
            entries[0].date,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
        );
        assert_eq!(
            entries[119].date,
            NaiveDate::from_ymd_opt(2035, 8, 1).unwrap()
        );
    }

    #[test]
    fn test_final_value_and_totals() {
        let input = sample_input();
        let output = project_stock_path(&input).unwrap();
        let projection = &output.result;
        let last = projection.entries.last().unwrap();

        assert_eq!(projection.final_value, last.balance);
        assert_eq!(projection.total_gains, last.cumulative_gains);
        assert_eq!(
            projection.average_monthly_return,
            projection.total_gains / dec!(120)
        );
        // 0.625% monthly over 120 months roughly doubles the stake
        assert!(projection.final_value > dec!(600000));
        assert!(projection.final_value < dec!(750000));
    }

    #[test]
    fn test_negative_proceeds_compound_downward() {
        let mut input = sample_input();
        // Deep underwater: payoff and costs exceed the sale price
        input.params.property.current_value = dec!(560000);
        input.params.property.mortgage_balance = dec!(554825);

        let output = project_stock_path(&input).unwrap();
        let projection = &output.result;

        assert!(projection.initial_investment < Decimal::ZERO);
        assert!(projection.final_value < projection.initial_investment);
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("stock path starts from zero or below")));
    }

    #[test]
    fn test_zero_return_rate_holds_flat() {
        let mut input = sample_input();
        input.params.market.stock_return_rate = Decimal::ZERO;

        let output = project_stock_path(&input).unwrap();
        let projection = &output.result;

        assert_eq!(projection.final_value, projection.initial_investment);
        assert_eq!(projection.total_gains, Decimal::ZERO);
        assert!(projection.entries.iter().all(|e| e.monthly_return == Decimal::ZERO));
    }
}
