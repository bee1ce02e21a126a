//! Year-resolution variant of the sell-vs-keep comparison. Trades the
//! monthly ledger's escrow timing, cash interest, and quarterly tax calendar
//! for twelve-fold fewer steps, which is enough accuracy for interactive
//! what-if sliders. Terminal sales run through the same valuators as the
//! monthly engine.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::comparison::{irr_or_warn, recommend, Recommendation, TieBreakPolicy};
use crate::model::AnalysisParameters;
use crate::projection::monthly::{ProjectionConfig, EXPENSE_INFLATION_RATE};
use crate::projection::rent::annual_factor;
use crate::schedules::amortization::{build_amortization_schedule, AmortizationSchedule};
use crate::schedules::depreciation::{
    build_depreciation_schedule, DEFAULT_LAND_FRACTION, DEFAULT_RECOVERY_YEARS,
};
use crate::terminal::{
    immediate_sale_breakdown, rental_terminal_value, stock_terminal_value, ImmediateSaleBreakdown,
    TerminalValueResult,
};
use crate::time_value::npv;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

/// Net-of-selling-costs fraction used by the break-even approximations.
const NET_PROCEEDS_RATIO: Decimal = dec!(0.85);

/// Assumed expense share of rent in the break-even rent approximation.
const EXPENSE_RATIO: Decimal = dec!(0.6);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualComparisonInput {
    pub params: AnalysisParameters,
    #[serde(default)]
    pub tie_break: TieBreakPolicy,
}

/// One year of the keep-the-rental path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualRentalYear {
    /// 1-based year index
    pub year: u32,
    pub gross_rent: Money,
    /// Operating bundle excluding debt service, inflated from the year-0 base
    pub operating_expenses: Money,
    pub noi: Money,
    pub mortgage_interest: Money,
    pub mortgage_principal: Money,
    pub depreciation: Money,
    /// NOI minus interest minus depreciation; losses carry no tax
    pub taxable_income: Money,
    pub income_tax: Money,
    /// NOI minus debt service minus income tax
    pub after_tax_cash_flow: Money,
    /// End-of-year value at annual compounding
    pub property_value: Money,
    pub mortgage_balance: Money,
    pub accumulated_depreciation: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualRentalDcf {
    pub years: Vec<AnnualRentalYear>,
    pub terminal: TerminalValueResult,
    pub total_after_tax_cash_flows: Money,
    /// Total after-tax cash flows plus net sale proceeds
    pub total_return: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    pub npv: Money,
}

/// One year of stock compounding; no interim cash flows, gains reinvested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualStockYear {
    pub year: u32,
    pub beginning_value: Money,
    pub growth: Money,
    pub ending_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualStockDcf {
    pub sale_breakdown: ImmediateSaleBreakdown,
    pub years: Vec<AnnualStockYear>,
    pub terminal: TerminalValueResult,
    pub total_return: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    pub npv: Money,
}

/// Coarse what-if thresholds derived from the comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenEstimates {
    /// Monthly rent at which keeping matches selling, floored at zero
    pub monthly_rent: Money,
    /// Annual appreciation at which keeping matches selling, clamped to
    /// plus or minus 50%
    pub appreciation_rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualComparisonResult {
    pub rental: AnnualRentalDcf,
    pub stock: AnnualStockDcf,
    pub recommendation: Recommendation,
    pub advantage_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advantage_percent: Option<Rate>,
    /// Rental total return minus stock total return
    pub total_return_difference: Money,
    /// Rental IRR minus stock IRR when both converged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr_difference: Option<Rate>,
    pub npv_difference: Money,
    pub annualized_rental_cash_flow: Money,
    pub break_even: BreakEvenEstimates,
}

/// Year-by-year cash generation set against equity buildup. The cash side
/// holds rent and expenses at today's levels; the equity side compounds value
/// and walks the real amortization schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowYear {
    pub year: u32,
    pub gross_rent: Money,
    /// Full annual bundle including debt service
    pub total_expenses: Money,
    pub net_cash: Money,
    /// Annual depreciation times the combined ordinary rate
    pub depreciation_tax_benefit: Money,
    pub after_tax_cash: Money,
    pub cumulative_net_cash: Money,
    pub cumulative_after_tax_cash: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityYear {
    pub year: u32,
    pub appreciation_gain: Money,
    pub principal_paydown: Money,
    pub total_equity_gain: Money,
    pub property_value: Money,
    pub mortgage_balance: Money,
    pub net_equity: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashVsEquityProjection {
    pub cash_years: Vec<CashFlowYear>,
    pub equity_years: Vec<EquityYear>,
    pub total_net_cash: Money,
    pub total_after_tax_cash: Money,
    pub total_depreciation_tax_benefits: Money,
    pub total_equity_buildup: Money,
    pub final_property_value: Money,
    pub final_mortgage_balance: Money,
    pub final_net_equity: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Annual-resolution sell-vs-keep comparison with break-even estimates.
pub fn compare_annual(
    input: &AnnualComparisonInput,
) -> HoldwiseResult<ComputationOutput<AnnualComparisonResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let result = build_annual_comparison(&input.params, input.tie_break, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Sell-vs-Keep Scenario Comparison (Annual DCF)",
        input,
        warnings,
        elapsed,
        result,
    ))
}

/// Cash-vs-equity decomposition for charting how the two kinds of return
/// accrue over the horizon.
pub fn project_cash_vs_equity(
    params: &AnalysisParameters,
) -> HoldwiseResult<ComputationOutput<CashVsEquityProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    params.validate(&mut warnings)?;

    let projection = build_cash_vs_equity(params)?;

    if projection.total_net_cash < Decimal::ZERO {
        warnings.push(
            "Cumulative pre-tax cash is negative — equity buildup carries this hold".into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cash-vs-Equity Buildup Projection",
        params,
        warnings,
        elapsed,
        projection,
    ))
}

// ---------------------------------------------------------------------------
// Annual DCF assembly
// ---------------------------------------------------------------------------

fn build_annual_comparison(
    params: &AnalysisParameters,
    tie_break: TieBreakPolicy,
    warnings: &mut Vec<String>,
) -> HoldwiseResult<AnnualComparisonResult> {
    let rental = build_annual_rental_dcf(params, warnings)?;
    let stock = build_annual_stock_dcf(params, warnings)?;

    if stock.sale_breakdown.net_proceeds <= Decimal::ZERO {
        warnings.push(
            "Immediate sale nets nothing to invest — the stock path starts from zero or below"
                .into(),
        );
    }

    let recommendation = recommend(rental.total_return, stock.total_return, tie_break);
    let (advantage_amount, losing_total) = match recommendation {
        Recommendation::KeepRental => {
            (rental.total_return - stock.total_return, stock.total_return)
        }
        Recommendation::SellNow => (stock.total_return - rental.total_return, rental.total_return),
    };
    let advantage_percent = if losing_total > Decimal::ZERO {
        Some(advantage_amount / losing_total)
    } else {
        warnings.push(
            "Advantage percent unavailable: the losing total return is not positive".into(),
        );
        None
    };

    let irr_difference = match (rental.irr, stock.irr) {
        (Some(r), Some(s)) => Some(r - s),
        _ => None,
    };
    let pre_tax_cash_flows: Money = rental
        .years
        .iter()
        .map(|y| y.noi - y.mortgage_interest - y.mortgage_principal)
        .sum();
    let years_dec = Decimal::from(params.analysis_years.max(1));
    let break_even = BreakEvenEstimates {
        monthly_rent: break_even_rent(params, stock.total_return),
        appreciation_rate: break_even_appreciation(params, stock.total_return, pre_tax_cash_flows),
    };

    Ok(AnnualComparisonResult {
        total_return_difference: rental.total_return - stock.total_return,
        irr_difference,
        npv_difference: rental.npv - stock.npv,
        annualized_rental_cash_flow: rental.total_after_tax_cash_flows / years_dec,
        recommendation,
        advantage_amount,
        advantage_percent,
        break_even,
        rental,
        stock,
    })
}

fn build_annual_rental_dcf(
    params: &AnalysisParameters,
    warnings: &mut Vec<String>,
) -> HoldwiseResult<AnnualRentalDcf> {
    let property = &params.property;
    let expenses = &params.expenses;
    let years = params.analysis_years;

    let amortization = build_amortization_schedule(
        property.mortgage_balance,
        property.mortgage_rate,
        expenses.monthly_principal_and_interest(),
        ProjectionConfig::default().anchor_date,
    )?;
    let depreciation = build_depreciation_schedule(
        property.cost_basis,
        DEFAULT_LAND_FRACTION,
        DEFAULT_RECOVERY_YEARS,
        years,
    )?;

    let base_annual_rent = property.total_monthly_rent() * dec!(12);
    // Year-0 operating bundle, frozen at today's rent
    let base_annual_operating = (expenses.fixed_monthly_costs()
        + property.total_monthly_rent() * expenses.rent_proportional_rate())
        * dec!(12);
    let combined_ordinary = params.tax.combined_ordinary();

    let mut rows: Vec<AnnualRentalYear> = Vec::with_capacity(years as usize);
    let mut accumulated_depreciation = Decimal::ZERO;
    let mut total_after_tax_cash_flows = Decimal::ZERO;
    let mut final_property_value = property.current_value;
    let mut final_mortgage_balance = property.mortgage_balance;
    let mut last_cash_flow = Decimal::ZERO;

    for year in 1..=years {
        let gross_rent = base_annual_rent * annual_factor(params.market.rent_growth_rate, year - 1);
        let operating_expenses =
            base_annual_operating * annual_factor(EXPENSE_INFLATION_RATE, year - 1);
        let noi = gross_rent - operating_expenses;

        let (mortgage_interest, mortgage_principal) = year_debt_service(&amortization, year);
        let mortgage_balance = amortization.balance_after(year * 12);

        let depreciation_amount = depreciation.annual_for_year(year);
        accumulated_depreciation += depreciation_amount;

        let taxable_income = noi - mortgage_interest - depreciation_amount;
        let income_tax = (taxable_income * combined_ordinary).max(Decimal::ZERO);
        let after_tax_cash_flow = noi - (mortgage_interest + mortgage_principal) - income_tax;

        let property_value =
            property.current_value * annual_factor(params.market.appreciation_rate, year);

        total_after_tax_cash_flows += after_tax_cash_flow;
        final_property_value = property_value;
        final_mortgage_balance = mortgage_balance;
        last_cash_flow = after_tax_cash_flow;

        rows.push(AnnualRentalYear {
            year,
            gross_rent,
            operating_expenses,
            noi,
            mortgage_interest,
            mortgage_principal,
            depreciation: depreciation_amount,
            taxable_income,
            income_tax,
            after_tax_cash_flow,
            property_value,
            mortgage_balance,
            accumulated_depreciation,
        });
    }

    let terminal = rental_terminal_value(
        final_property_value,
        property.current_value,
        final_mortgage_balance,
        accumulated_depreciation,
        params.sale.selling_cost_rate,
        &params.tax,
        false,
    );

    // [0, year-1 flow, ..., final-year flow + sale proceeds]
    let mut flows: Vec<Money> = Vec::with_capacity(years as usize + 1);
    flows.push(Decimal::ZERO);
    for row in &rows[..rows.len() - 1] {
        flows.push(row.after_tax_cash_flow);
    }
    flows.push(last_cash_flow + terminal.net_sale_proceeds);

    let irr = irr_or_warn(&flows, "Rental", warnings);
    let npv_value = npv(params.market.discount_rate, &flows)?;

    Ok(AnnualRentalDcf {
        years: rows,
        total_return: total_after_tax_cash_flows + terminal.net_sale_proceeds,
        terminal,
        total_after_tax_cash_flows,
        irr,
        npv: npv_value,
    })
}

fn build_annual_stock_dcf(
    params: &AnalysisParameters,
    warnings: &mut Vec<String>,
) -> HoldwiseResult<AnnualStockDcf> {
    let years = params.analysis_years;
    let sale_breakdown = immediate_sale_breakdown(params);
    let growth_rate = params.market.stock_return_rate;

    let mut rows: Vec<AnnualStockYear> = Vec::with_capacity(years as usize);
    let mut balance = sale_breakdown.net_proceeds;

    for year in 1..=years {
        let beginning_value = balance;
        let growth = balance * growth_rate;
        balance += growth;
        rows.push(AnnualStockYear {
            year,
            beginning_value,
            growth,
            ending_value: balance,
        });
    }

    let terminal = stock_terminal_value(balance, sale_breakdown.net_proceeds, &params.tax);

    let mut flows: Vec<Money> = Vec::with_capacity(years as usize + 1);
    flows.push(-sale_breakdown.net_proceeds);
    for _ in 1..years {
        flows.push(Decimal::ZERO);
    }
    flows.push(terminal.net_sale_proceeds);

    let irr = irr_or_warn(&flows, "Stock", warnings);
    let npv_value = npv(params.market.discount_rate, &flows)?;

    Ok(AnnualStockDcf {
        sale_breakdown,
        years: rows,
        total_return: terminal.net_sale_proceeds,
        terminal,
        irr,
        npv: npv_value,
    })
}

/// Interest and principal paid during a calendar year of the schedule.
/// Years past the payoff read zero.
fn year_debt_service(schedule: &AmortizationSchedule, year: u32) -> (Money, Money) {
    let len = schedule.entries.len();
    let start = ((year - 1) * 12) as usize;
    let end = (year * 12) as usize;
    if start >= len {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let slice = &schedule.entries[start..end.min(len)];
    let interest = slice.iter().map(|e| e.interest).sum();
    let principal = slice.iter().map(|e| e.principal).sum();
    (interest, principal)
}

// ---------------------------------------------------------------------------
// Break-even estimators
// ---------------------------------------------------------------------------

/// Monthly rent at which the rental path roughly matches the stock total.
/// Works backwards from the target through flat proceeds and expense ratios;
/// a slider-grade estimate, not a solver.
fn break_even_rent(params: &AnalysisParameters, stock_total_return: Money) -> Money {
    let years = Decimal::from(params.analysis_years.max(1));
    let future_property_value = params.property.current_value
        * annual_factor(params.market.appreciation_rate, params.analysis_years);
    let future_net_proceeds = future_property_value * NET_PROCEEDS_RATIO;

    let needed_cash_flows = stock_total_return - future_net_proceeds;
    let needed_monthly =
        needed_cash_flows / years / dec!(12) / (Decimal::ONE - EXPENSE_RATIO);
    needed_monthly.max(Decimal::ZERO)
}

/// Annual appreciation at which the rental path roughly matches the stock
/// total, holding pre-tax cash flows fixed. Clamped to a plausible band.
fn break_even_appreciation(
    params: &AnalysisParameters,
    stock_total_return: Money,
    pre_tax_cash_flows: Money,
) -> Rate {
    let years = params.analysis_years.max(1);
    let needed_proceeds = stock_total_return - pre_tax_cash_flows;
    let needed_property_value = needed_proceeds / NET_PROCEEDS_RATIO;

    let rate = if needed_property_value > Decimal::ZERO && params.property.current_value > Decimal::ZERO
    {
        let ratio = needed_property_value / params.property.current_value;
        let exponent = Decimal::ONE / Decimal::from(years);
        ratio.powd(exponent) - Decimal::ONE
    } else {
        Decimal::ZERO
    };

    rate.clamp(dec!(-0.5), dec!(0.5))
}

// ---------------------------------------------------------------------------
// Cash vs equity
// ---------------------------------------------------------------------------

fn build_cash_vs_equity(params: &AnalysisParameters) -> HoldwiseResult<CashVsEquityProjection> {
    let property = &params.property;
    let expenses = &params.expenses;
    let years = params.analysis_years;

    let amortization = build_amortization_schedule(
        property.mortgage_balance,
        property.mortgage_rate,
        expenses.monthly_principal_and_interest(),
        ProjectionConfig::default().anchor_date,
    )?;
    let depreciation = build_depreciation_schedule(
        property.cost_basis,
        DEFAULT_LAND_FRACTION,
        DEFAULT_RECOVERY_YEARS,
        years,
    )?;

    let monthly_rent = property.total_monthly_rent();
    // Full bundle at today's levels, debt service included
    let monthly_bundle = expenses.fixed_monthly_costs()
        + expenses.monthly_mortgage_payment
        + monthly_rent * expenses.rent_proportional_rate();
    let annual_net_cash = (monthly_rent - monthly_bundle) * dec!(12);
    let combined_ordinary = params.tax.combined_ordinary();

    let mut cash_years: Vec<CashFlowYear> = Vec::with_capacity(years as usize);
    let mut equity_years: Vec<EquityYear> = Vec::with_capacity(years as usize);
    let mut cumulative_net_cash = Decimal::ZERO;
    let mut cumulative_after_tax_cash = Decimal::ZERO;
    let mut total_benefits = Decimal::ZERO;
    let mut total_equity_buildup = Decimal::ZERO;
    let mut previous_value = property.current_value;

    for year in 1..=years {
        let depreciation_tax_benefit = depreciation.annual_for_year(year) * combined_ordinary;
        let after_tax_cash = annual_net_cash + depreciation_tax_benefit;
        cumulative_net_cash += annual_net_cash;
        cumulative_after_tax_cash += after_tax_cash;
        total_benefits += depreciation_tax_benefit;

        cash_years.push(CashFlowYear {
            year,
            gross_rent: monthly_rent * dec!(12),
            total_expenses: monthly_bundle * dec!(12),
            net_cash: annual_net_cash,
            depreciation_tax_benefit,
            after_tax_cash,
            cumulative_net_cash,
            cumulative_after_tax_cash,
        });

        let property_value =
            property.current_value * annual_factor(params.market.appreciation_rate, year);
        let appreciation_gain = property_value - previous_value;
        previous_value = property_value;

        let (_, principal_paydown) = year_debt_service(&amortization, year);
        let mortgage_balance = amortization.balance_after(year * 12);
        let total_equity_gain = appreciation_gain + principal_paydown;
        total_equity_buildup += total_equity_gain;

        equity_years.push(EquityYear {
            year,
            appreciation_gain,
            principal_paydown,
            total_equity_gain,
            property_value,
            mortgage_balance,
            net_equity: property_value - mortgage_balance,
        });
    }

    Ok(CashVsEquityProjection {
        final_property_value: previous_value,
        final_mortgage_balance: amortization.balance_after(years * 12),
        final_net_equity: previous_value - amortization.balance_after(years * 12),
        cash_years,
        equity_years,
        total_net_cash: cumulative_net_cash,
        total_after_tax_cash: cumulative_after_tax_cash,
        total_depreciation_tax_benefits: total_benefits,
        total_equity_buildup,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
