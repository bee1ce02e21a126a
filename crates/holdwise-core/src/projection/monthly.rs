use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::HoldwiseError;
use crate::model::AnalysisParameters;
use crate::projection::rent::{annual_factor, RentSchedule};
use crate::schedules::amortization::{
    add_months, build_amortization_schedule, AmortizationSchedule,
};
use crate::schedules::depreciation::{
    build_depreciation_schedule, DepreciationSchedule, DEFAULT_LAND_FRACTION,
    DEFAULT_RECOVERY_YEARS,
};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

/// Fixed operating costs (tax, insurance, other) inflate at this annual
/// rate with whole-year compounding.
pub const EXPENSE_INFLATION_RATE: Decimal = dec!(0.025);

/// Calendar months carrying estimated-tax payments (Jan/Mar/Jun/Sep 15).
const QUARTERLY_TAX_MONTHS: [u32; 4] = [1, 3, 6, 9];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Knobs of the ledger simulation itself, as opposed to the property and
/// market inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Calendar month the projection starts in (first of month)
    pub anchor_date: NaiveDate,
    /// Operating cash reserve the ledger opens with
    pub reserve_target: Money,
    /// Annual interest rate earned on the cash balance
    pub cash_interest_rate: Rate,
    /// Escrow balance carried in from the current mortgage statement
    pub opening_escrow_balance: Money,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            anchor_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap_or_default(),
            reserve_target: dec!(20000),
            cash_interest_rate: dec!(0.045),
            opening_escrow_balance: Decimal::ZERO,
        }
    }
}

/// Input to the monthly rental projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyProjectionInput {
    pub params: AnalysisParameters,
    /// Overrides the default whole-year rent growth when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_schedule: Option<RentSchedule>,
    #[serde(default)]
    pub config: ProjectionConfig,
}

/// One month of the rental general ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyLedgerEntry {
    /// Month index, 1-based from the anchor
    pub month: u32,
    pub date: NaiveDate,

    // Income
    pub gross_rent: Money,
    pub cash_interest_earned: Money,

    // Expenses
    pub operating_expenses: Money,
    pub mortgage_principal: Money,
    pub mortgage_interest: Money,
    pub escrow_contribution: Money,
    pub quarterly_tax_payment: Money,

    // Escrow activity
    pub escrow_balance: Money,
    pub property_tax_disbursed: Money,
    pub insurance_disbursed: Money,

    // Cash flow
    pub noi: Money,
    pub operating_cash_flow: Money,
    /// Operating cash flow net of this month's estimated-tax payment
    pub net_cash_flow: Money,

    // Balances
    pub cash_balance: Money,
    pub excess_cash: Money,

    // Property and equity
    pub property_value: Money,
    pub monthly_appreciation: Money,
    pub mortgage_balance: Money,
    pub equity: Money,

    // Tax reference
    pub monthly_depreciation: Money,
    pub taxable_income: Money,
}

/// Totals across the projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub total_rental_income: Money,
    /// Operating expenses plus debt service (P&I and escrow) plus
    /// quarterly taxes
    pub total_expenses: Money,
    pub total_operating_cash_flow: Money,
    pub total_cash_interest: Money,
    pub total_quarterly_taxes: Money,
    pub average_monthly_cash_flow: Money,
}

/// Full output of the rental-path ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalProjection {
    pub entries: Vec<MonthlyLedgerEntry>,
    pub summary: ProjectionSummary,
    pub final_cash_balance: Money,
    pub final_property_value: Money,
    pub final_mortgage_balance: Money,
    pub final_equity: Money,
    /// Shared by the charting layers and the terminal valuator
    pub amortization: AmortizationSchedule,
    pub depreciation: DepreciationSchedule,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project the rental path month by month: rent growth, expense inflation,
/// amortization, escrow timing, cash interest, and quarterly estimated
/// taxes, compounding into a running cash balance.
pub fn project_rental_ledger(
    input: &MonthlyProjectionInput,
) -> HoldwiseResult<ComputationOutput<RentalProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let projection =
        build_rental_projection(&input.params, input.rent_schedule.as_ref(), &input.config)?;

    if projection.summary.average_monthly_cash_flow < Decimal::ZERO {
        warnings.push(
            "Average monthly cash flow is negative — the rental consumes cash over the horizon"
                .into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly Cash-Ledger DCF (Rental Path)",
        input,
        warnings,
        elapsed,
        projection,
    ))
}

// ---------------------------------------------------------------------------
// Ledger simulation
// ---------------------------------------------------------------------------

/// The ledger walk shared by the projection, comparison, and risk layers.
/// Callers are expected to have validated `params`.
pub(crate) fn build_rental_projection(
    params: &AnalysisParameters,
    rent_schedule: Option<&RentSchedule>,
    config: &ProjectionConfig,
) -> HoldwiseResult<RentalProjection> {
    validate_config(config)?;
    if let Some(schedule) = rent_schedule {
        schedule.validate()?;
    }

    let property = &params.property;
    let expenses = &params.expenses;
    let months = params.analysis_years * 12;

    let amortization = build_amortization_schedule(
        property.mortgage_balance,
        property.mortgage_rate,
        expenses.monthly_principal_and_interest(),
        config.anchor_date,
    )?;
    let depreciation = build_depreciation_schedule(
        property.cost_basis,
        DEFAULT_LAND_FRACTION,
        DEFAULT_RECOVERY_YEARS,
        params.analysis_years,
    )?;

    let base_rent = property.total_monthly_rent();
    let default_schedule = RentSchedule::AnnualGrowth {
        rate: params.market.rent_growth_rate,
    };
    let schedule = rent_schedule.unwrap_or(&default_schedule);

    let monthly_cash_rate = config.cash_interest_rate / dec!(12);
    let monthly_appreciation_rate = params.market.appreciation_rate / dec!(12);
    let combined_ordinary = params.tax.combined_ordinary();
    let fixed_costs = expenses.fixed_monthly_costs();
    let proportional_rate = expenses.rent_proportional_rate();
    let escrow_contribution = expenses.monthly_escrow;

    let mut entries: Vec<MonthlyLedgerEntry> = Vec::with_capacity(months as usize);
    let mut cash_balance = config.reserve_target;
    let mut escrow_balance = config.opening_escrow_balance;
    let mut property_value = property.current_value;
    let mut final_mortgage_balance = Decimal::ZERO;
    let mut final_equity = Decimal::ZERO;

    // Quarterly estimated-tax accumulators
    let mut q_rent = Decimal::ZERO;
    let mut q_expenses = Decimal::ZERO;
    let mut q_interest = Decimal::ZERO;
    let mut q_depreciation = Decimal::ZERO;

    for month in 1..=months {
        let date = add_months(config.anchor_date, month - 1)?;
        let years_elapsed = (month - 1) / 12;

        // Rent: flat within a year, stepping at anniversaries
        let gross_rent =
            schedule.monthly_rent(month, base_rent, params.market.rent_growth_rate);

        // Fixed costs inflate by whole years; proportional costs track rent
        let operating_expenses = fixed_costs
            * annual_factor(EXPENSE_INFLATION_RATE, years_elapsed)
            + gross_rent * proportional_rate;

        // Amortization by absolute month index; all zero beyond the schedule
        let (mortgage_principal, mortgage_interest, mortgage_balance) =
            match amortization.entry(month) {
                Some(e) => (e.principal, e.interest, e.balance),
                None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            };
        let pi_payment = mortgage_principal + mortgage_interest;

        // Escrow accrues monthly and disburses on fixed calendar dates:
        // semiannual property tax in April and October, insurance in January
        escrow_balance += escrow_contribution;
        let mut property_tax_disbursed = Decimal::ZERO;
        let mut insurance_disbursed = Decimal::ZERO;
        match date.month() {
            4 | 10 => {
                property_tax_disbursed = expenses.monthly_property_tax * dec!(6);
                escrow_balance -= property_tax_disbursed;
            }
            1 => {
                insurance_disbursed = expenses.monthly_insurance * dec!(12);
                escrow_balance -= insurance_disbursed;
            }
            _ => {}
        }

        let noi = gross_rent - operating_expenses;
        let operating_cash_flow = noi - (pi_payment + escrow_contribution);
        cash_balance += operating_cash_flow;

        // Interest accrues on the post-flow balance, reserve or not
        let cash_interest_earned = cash_balance * monthly_cash_rate;
        cash_balance += cash_interest_earned;

        // Accumulate the quarter's taxable components
        let monthly_depreciation = depreciation.monthly_accrual(month);
        q_rent += gross_rent;
        q_expenses += operating_expenses;
        q_interest += mortgage_interest;
        q_depreciation += monthly_depreciation;

        let mut quarterly_tax_payment = Decimal::ZERO;
        if QUARTERLY_TAX_MONTHS.contains(&date.month()) {
            let taxable = q_rent - q_expenses - q_interest - q_depreciation;
            if taxable > Decimal::ZERO {
                quarterly_tax_payment = taxable * combined_ordinary;
                cash_balance -= quarterly_tax_payment;
            }
            // Loss quarters carry nothing forward
            q_rent = Decimal::ZERO;
            q_expenses = Decimal::ZERO;
            q_interest = Decimal::ZERO;
            q_depreciation = Decimal::ZERO;
        }

        let monthly_appreciation = property_value * monthly_appreciation_rate;
        property_value += monthly_appreciation;
        let equity = property_value - mortgage_balance;

        let excess_cash = (cash_balance - config.reserve_target).max(Decimal::ZERO);

        final_mortgage_balance = mortgage_balance;
        final_equity = equity;

        entries.push(MonthlyLedgerEntry {
            month,
            date,
            gross_rent,
            cash_interest_earned,
            operating_expenses,
            mortgage_principal,
            mortgage_interest,
            escrow_contribution,
            quarterly_tax_payment,
            escrow_balance,
            property_tax_disbursed,
            insurance_disbursed,
            noi,
            operating_cash_flow,
            net_cash_flow: operating_cash_flow - quarterly_tax_payment,
            cash_balance,
            excess_cash,
            property_value,
            monthly_appreciation,
            mortgage_balance,
            equity,
            monthly_depreciation,
            taxable_income: noi - mortgage_interest - monthly_depreciation,
        });
    }

    let summary = summarize(&entries);

    Ok(RentalProjection {
        entries,
        summary,
        final_cash_balance: cash_balance,
        final_property_value: property_value,
        final_mortgage_balance,
        final_equity,
        amortization,
        depreciation,
    })
}

pub(crate) fn validate_config(config: &ProjectionConfig) -> HoldwiseResult<()> {
    if config.reserve_target < Decimal::ZERO {
        return Err(HoldwiseError::InvalidInput {
            field: "reserve_target".into(),
            reason: "Operating reserve cannot be negative".into(),
        });
    }
    if config.cash_interest_rate <= dec!(-1) {
        return Err(HoldwiseError::InvalidInput {
            field: "cash_interest_rate".into(),
            reason: "Cash interest rate must be greater than -100%".into(),
        });
    }
    if config.opening_escrow_balance < Decimal::ZERO {
        return Err(HoldwiseError::InvalidInput {
            field: "opening_escrow_balance".into(),
            reason: "Opening escrow balance cannot be negative".into(),
        });
    }
    Ok(())
}

fn summarize(entries: &[MonthlyLedgerEntry]) -> ProjectionSummary {
    let total_rental_income: Money = entries.iter().map(|e| e.gross_rent).sum();
    let total_expenses: Money = entries
        .iter()
        .map(|e| {
            e.operating_expenses
                + e.mortgage_principal
                + e.mortgage_interest
                + e.escrow_contribution
                + e.quarterly_tax_payment
        })
        .sum();
    let total_operating_cash_flow: Money =
        entries.iter().map(|e| e.operating_cash_flow).sum();
    let total_cash_interest: Money = entries.iter().map(|e| e.cash_interest_earned).sum();
    let total_quarterly_taxes: Money =
        entries.iter().map(|e| e.quarterly_tax_payment).sum();

    let months = Decimal::from(entries.len() as u64).max(Decimal::ONE);

    ProjectionSummary {
        total_rental_income,
        total_expenses,
        total_operating_cash_flow,
        total_cash_interest,
        total_quarterly_taxes,
        average_monthly_cash_flow: total_operating_cash_flow / months,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
