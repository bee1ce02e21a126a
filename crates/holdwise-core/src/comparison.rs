use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::model::AnalysisParameters;
use crate::projection::monthly::{build_rental_projection, ProjectionConfig, RentalProjection};
use crate::projection::rent::RentSchedule;
use crate::projection::stock::{build_stock_projection, StockProjection};
use crate::terminal::{rental_terminal_value, stock_terminal_value, TerminalValueResult};
use crate::time_value::{irr, npv};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

const IRR_GUESS: Decimal = dec!(0.10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    KeepRental,
    SellNow,
}

/// Resolution when both paths land on exactly the same total return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreakPolicy {
    /// Prefer liquidity when the numbers are a wash
    #[default]
    SellNow,
    KeepRental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub params: AnalysisParameters,
    /// Overrides the default annual-growth rent path when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_schedule: Option<RentSchedule>,
    #[serde(default)]
    pub config: ProjectionConfig,
    /// Defer rental sale taxes through a like-kind exchange
    #[serde(default)]
    pub like_kind_exchange: bool,
    #[serde(default)]
    pub tie_break: TieBreakPolicy,
}

/// The keep-the-rental path, carried to liquidation at the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalOutcome {
    pub projection: RentalProjection,
    pub terminal: TerminalValueResult,
    /// Final cash balance plus net sale proceeds
    pub total_return: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    pub npv: Money,
}

/// The sell-now path: liquidate, invest, liquidate again at the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOutcome {
    pub projection: StockProjection,
    pub terminal: TerminalValueResult,
    /// Net stock sale proceeds at the horizon
    pub total_return: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    pub npv: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub rental: RentalOutcome,
    pub stock: StockOutcome,
    pub recommendation: Recommendation,
    /// Winner's total return minus the loser's
    pub advantage_amount: Money,
    /// Advantage over the losing total return. None when the loser's total
    /// is not positive and the ratio would mislead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advantage_percent: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run both paths to the horizon and recommend the larger total return.
///
/// The rental path is the monthly cash ledger plus a taxed (or deferred)
/// terminal sale; the stock path is an immediate sale compounded monthly and
/// taxed at liquidation. IRR and NPV are computed per path from annualized
/// cash-flow series at the market discount rate.
pub fn compare_scenarios(
    input: &ComparisonInput,
) -> HoldwiseResult<ComputationOutput<ComparisonResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let result = build_comparison(input, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Sell-vs-Keep Scenario Comparison (Monthly DCF)",
        input,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Comparison assembly
// ---------------------------------------------------------------------------

pub(crate) fn build_comparison(
    input: &ComparisonInput,
    warnings: &mut Vec<String>,
) -> HoldwiseResult<ComparisonResult> {
    let params = &input.params;
    let discount_rate = params.market.discount_rate;

    // Keep path
    let projection =
        build_rental_projection(params, input.rent_schedule.as_ref(), &input.config)?;
    let rental_terminal = rental_terminal_value(
        projection.final_property_value,
        params.property.current_value,
        projection.final_mortgage_balance,
        projection.depreciation.total_accumulated,
        params.sale.selling_cost_rate,
        &params.tax,
        input.like_kind_exchange,
    );
    let rental_total = projection.final_cash_balance + rental_terminal.net_sale_proceeds;

    if projection.summary.average_monthly_cash_flow < Decimal::ZERO {
        warnings.push(
            "Average monthly cash flow is negative — the rental consumes cash over the horizon"
                .into(),
        );
    }

    // Sell path
    let stock = build_stock_projection(params, &input.config)?;
    let stock_terminal =
        stock_terminal_value(stock.final_value, stock.initial_investment, &params.tax);
    let stock_total = stock_terminal.net_sale_proceeds;

    if stock.initial_investment <= Decimal::ZERO {
        warnings.push(
            "Immediate sale nets nothing to invest — the stock path starts from zero or below"
                .into(),
        );
    }

    // Per-path return metrics on annualized series
    let rental_flows = annual_rental_flows(
        &projection,
        input.config.reserve_target,
        rental_terminal.net_sale_proceeds,
    );
    let stock_flows = annual_stock_flows(
        stock.initial_investment,
        stock_terminal.net_sale_proceeds,
        params.analysis_years,
    );

    let rental_irr = irr_or_warn(&rental_flows, "Rental", warnings);
    let stock_irr = irr_or_warn(&stock_flows, "Stock", warnings);
    let rental_npv = npv(discount_rate, &rental_flows)?;
    let stock_npv = npv(discount_rate, &stock_flows)?;

    let recommendation = recommend(rental_total, stock_total, input.tie_break);
    let (advantage_amount, losing_total) = match recommendation {
        Recommendation::KeepRental => (rental_total - stock_total, stock_total),
        Recommendation::SellNow => (stock_total - rental_total, rental_total),
    };
    let advantage_percent = if losing_total > Decimal::ZERO {
        Some(advantage_amount / losing_total)
    } else {
        warnings.push(
            "Advantage percent unavailable: the losing total return is not positive".into(),
        );
        None
    };

    Ok(ComparisonResult {
        rental: RentalOutcome {
            projection,
            terminal: rental_terminal,
            total_return: rental_total,
            irr: rental_irr,
            npv: rental_npv,
        },
        stock: StockOutcome {
            projection: stock,
            terminal: stock_terminal,
            total_return: stock_total,
            irr: stock_irr,
            npv: stock_npv,
        },
        recommendation,
        advantage_amount,
        advantage_percent,
    })
}

pub(crate) fn recommend(
    rental_total: Money,
    stock_total: Money,
    tie_break: TieBreakPolicy,
) -> Recommendation {
    if rental_total > stock_total {
        Recommendation::KeepRental
    } else if stock_total > rental_total {
        Recommendation::SellNow
    } else {
        match tie_break {
            TieBreakPolicy::SellNow => Recommendation::SellNow,
            TieBreakPolicy::KeepRental => Recommendation::KeepRental,
        }
    }
}

/// Year-over-year cash deltas from the ledger, with the sale proceeds folded
/// into the final year. The rental path has no year-0 outlay; its stake is
/// the equity left in the property, which the stock series charges instead.
fn annual_rental_flows(
    projection: &RentalProjection,
    opening_cash: Money,
    net_sale_proceeds: Money,
) -> Vec<Money> {
    let years = projection.entries.len() / 12;
    let mut flows: Vec<Money> = Vec::with_capacity(years + 1);
    flows.push(Decimal::ZERO);

    let mut previous = opening_cash;
    for year in 1..=years {
        let end_balance = projection.entries[year * 12 - 1].cash_balance;
        flows.push(end_balance - previous);
        previous = end_balance;
    }

    if let Some(last) = flows.last_mut() {
        *last += net_sale_proceeds;
    }
    flows
}

/// Invest everything at year 0, liquidate at the horizon.
fn annual_stock_flows(initial_investment: Money, net_proceeds: Money, years: u32) -> Vec<Money> {
    let mut flows: Vec<Money> = Vec::with_capacity(years as usize + 1);
    flows.push(-initial_investment);
    for _ in 1..years {
        flows.push(Decimal::ZERO);
    }
    flows.push(net_proceeds);
    flows
}

/// IRR never fails the comparison: a solver that cannot converge produces
/// None and a warning instead.
pub(crate) fn irr_or_warn(flows: &[Money], label: &str, warnings: &mut Vec<String>) -> Option<Rate> {
    match irr(flows, IRR_GUESS) {
        Ok(rate) => Some(rate),
        Err(err) => {
            warnings.push(format!("{label} IRR unavailable: {err}"));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
