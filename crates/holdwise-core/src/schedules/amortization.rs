use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::HoldwiseError;
use crate::model::AnalysisParameters;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

/// Balances below this are treated as paid off.
const PAYOFF_EPSILON: Decimal = dec!(0.01);

/// Hard cap on schedule length. A fixed-payment loan that cannot retire its
/// balance inside this window is reported as non-amortizing rather than
/// looping forever.
const MAX_SCHEDULE_MONTHS: u32 = 360;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One month of the loan schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationEntry {
    /// Month index, 1-based from the schedule start
    pub month: u32,
    /// First day of the calendar month this payment covers
    pub date: NaiveDate,
    /// Payment made this month (smaller than the fixed payment only on the
    /// final month)
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
    /// Balance after this payment
    pub balance: Money,
}

/// Complete payoff schedule from the current balance forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub entries: Vec<AmortizationEntry>,
    /// First of the month in which the final payment lands. None when there
    /// is no loan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payoff_date: Option<NaiveDate>,
    pub remaining_payments: u32,
    pub years_remaining: Decimal,
    pub total_interest_remaining: Money,
}

impl AmortizationSchedule {
    /// Entry for an absolute month index (1-based). None once the loan is
    /// retired; callers treat that as all-zero.
    pub fn entry(&self, month: u32) -> Option<&AmortizationEntry> {
        if month == 0 {
            return None;
        }
        self.entries.get(month as usize - 1)
    }

    /// Outstanding balance after `month` payments. Months beyond the
    /// schedule (or before it) read zero.
    pub fn balance_after(&self, month: u32) -> Money {
        match self.entry(month) {
            Some(e) => e.balance,
            None => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPayoffInput {
    pub params: AnalysisParameters,
    /// Date the current balance was observed; anchors the first entry
    pub as_of: NaiveDate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Payoff schedule and summary for the property's mortgage, projected from
/// the current balance at the contractual payment.
pub fn loan_payoff_summary(
    input: &LoanPayoffInput,
) -> HoldwiseResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let schedule = build_amortization_schedule(
        input.params.property.mortgage_balance,
        input.params.property.mortgage_rate,
        input.params.expenses.monthly_principal_and_interest(),
        input.as_of,
    )?;

    if schedule.entries.is_empty() {
        warnings.push("No outstanding loan; payoff schedule is empty".into());
    } else if schedule.remaining_payments > input.params.analysis_years * 12 {
        warnings.push(format!(
            "Loan runs {} payments, past the {}-year analysis horizon",
            schedule.remaining_payments, input.params.analysis_years
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan Amortization & Payoff Schedule",
        input,
        warnings,
        elapsed,
        schedule,
    ))
}

// ---------------------------------------------------------------------------
// Schedule construction
// ---------------------------------------------------------------------------

/// Build the month-by-month payoff schedule from the current outstanding
/// balance, not from origination. `start` anchors the first entry and should
/// be the first of a month.
///
/// A zero (or negative) balance or payment short-circuits to the "no loan"
/// schedule: no entries, no payoff date. A payment that can never retire the
/// balance is a `NonAmortizingLoan` error.
pub fn build_amortization_schedule(
    current_balance: Money,
    annual_rate: Rate,
    monthly_payment: Money,
    start: NaiveDate,
) -> HoldwiseResult<AmortizationSchedule> {
    if current_balance <= Decimal::ZERO || monthly_payment <= Decimal::ZERO {
        return Ok(AmortizationSchedule {
            entries: Vec::new(),
            payoff_date: None,
            remaining_payments: 0,
            years_remaining: Decimal::ZERO,
            total_interest_remaining: Decimal::ZERO,
        });
    }

    if annual_rate < Decimal::ZERO {
        return Err(HoldwiseError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Mortgage rate cannot be negative".into(),
        });
    }

    let monthly_rate = annual_rate / dec!(12);
    let mut balance = current_balance;
    let mut entries: Vec<AmortizationEntry> = Vec::new();
    let mut total_interest = Decimal::ZERO;

    for month in 1..=MAX_SCHEDULE_MONTHS {
        let interest = balance * monthly_rate;

        let (payment, principal) = if balance + interest < monthly_payment {
            // Final payment clears the remaining balance
            (balance + interest, balance)
        } else {
            (monthly_payment, monthly_payment - interest)
        };

        balance -= principal;
        total_interest += interest;

        let date = add_months(start, month - 1)?;
        entries.push(AmortizationEntry {
            month,
            date,
            payment,
            principal,
            interest,
            balance,
        });

        if balance <= PAYOFF_EPSILON {
            break;
        }
    }

    if balance > PAYOFF_EPSILON {
        return Err(HoldwiseError::NonAmortizingLoan {
            balance_remaining: balance,
            months_simulated: MAX_SCHEDULE_MONTHS,
        });
    }

    let payoff_date = entries.last().map(|e| e.date);
    let remaining_payments = entries.len() as u32;
    let years_remaining = Decimal::from(remaining_payments) / dec!(12);

    Ok(AmortizationSchedule {
        entries,
        payoff_date,
        remaining_payments,
        years_remaining,
        total_interest_remaining: total_interest,
    })
}

/// Advance a date by whole calendar months, staying on the same day of month.
pub(crate) fn add_months(date: NaiveDate, months: u32) -> HoldwiseResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| HoldwiseError::DateError(format!("{date} + {months} months overflows")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn test_schedule_retires_balance() {
        let schedule =
            build_amortization_schedule(dec!(554825), dec!(0.03875), dec!(2783.80), start_date())
                .unwrap();

        let last = schedule.entries.last().unwrap();
        assert!(last.balance.abs() <= dec!(0.01), "residual {}", last.balance);
        assert!(schedule.payoff_date.is_some());
        assert_eq!(schedule.remaining_payments, schedule.entries.len() as u32);
    }

    #[test]
    fn test_principal_plus_interest_equals_payment() {
        let schedule =
            build_amortization_schedule(dec!(554825), dec!(0.03875), dec!(2783.80), start_date())
                .unwrap();

        // Every entry except possibly the final one pays the fixed amount
        for entry in &schedule.entries[..schedule.entries.len() - 1] {
            assert_eq!(entry.principal + entry.interest, entry.payment);
            assert_eq!(entry.payment, dec!(2783.80));
        }
        let last = schedule.entries.last().unwrap();
        assert_eq!(last.principal + last.interest, last.payment);
    }

    #[test]
    fn test_principal_sums_to_original_balance() {
        let balance = dec!(554825);
        let schedule =
            build_amortization_schedule(balance, dec!(0.03875), dec!(2783.80), start_date())
                .unwrap();

        let total_principal: Decimal = schedule.entries.iter().map(|e| e.principal).sum();
        assert!((total_principal - balance).abs() < dec!(0.01));
    }

    #[test]
    fn test_dates_advance_monthly() {
        let schedule =
            build_amortization_schedule(dec!(10000), dec!(0.05), dec!(1000), start_date()).unwrap();

        assert_eq!(schedule.entries[0].date, start_date());
        assert_eq!(
            schedule.entries[1].date,
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
        );
        assert_eq!(
            schedule.entries[4].date,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_zero_rate_amortizes_evenly() {
        let schedule =
            build_amortization_schedule(dec!(12000), Decimal::ZERO, dec!(1000), start_date())
                .unwrap();

        assert_eq!(schedule.entries.len(), 12);
        for entry in &schedule.entries {
            assert_eq!(entry.interest, Decimal::ZERO);
            assert_eq!(entry.principal, dec!(1000));
        }
        assert_eq!(schedule.total_interest_remaining, Decimal::ZERO);
        assert_eq!(
            schedule.payoff_date,
            Some(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
        );
    }

    #[test]
    fn test_final_payment_smaller() {
        // 1000 at 0% with 300/month: three full payments then a 100 stub
        let schedule =
            build_amortization_schedule(dec!(1000), Decimal::ZERO, dec!(300), start_date())
                .unwrap();

        assert_eq!(schedule.entries.len(), 4);
        let last = schedule.entries.last().unwrap();
        assert_eq!(last.payment, dec!(100));
        assert_eq!(last.principal, dec!(100));
        assert_eq!(last.balance, Decimal::ZERO);
    }

    #[test]
    fn test_no_loan_yields_empty_schedule() {
        let schedule =
            build_amortization_schedule(Decimal::ZERO, dec!(0.05), dec!(1000), start_date())
                .unwrap();

        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.payoff_date, None);
        assert_eq!(schedule.remaining_payments, 0);
        assert_eq!(schedule.total_interest_remaining, Decimal::ZERO);
    }

    #[test]
    fn test_zero_payment_yields_empty_schedule() {
        let schedule =
            build_amortization_schedule(dec!(100000), dec!(0.05), Decimal::ZERO, start_date())
                .unwrap();
        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.payoff_date, None);
    }

    #[test]
    fn test_non_amortizing_loan_detected() {
        // Interest-only amount is 1000/month; a 500 payment never retires it
        let result =
            build_amortization_schedule(dec!(100000), dec!(0.12), dec!(500), start_date());

        match result {
            Err(HoldwiseError::NonAmortizingLoan {
                balance_remaining,
                months_simulated,
            }) => {
                assert!(balance_remaining > dec!(100000));
                assert_eq!(months_simulated, 360);
            }
            other => panic!("Expected NonAmortizingLoan, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_lookup_by_month() {
        let schedule =
            build_amortization_schedule(dec!(12000), Decimal::ZERO, dec!(1000), start_date())
                .unwrap();

        assert_eq!(schedule.entry(1).unwrap().month, 1);
        assert_eq!(schedule.entry(12).unwrap().month, 12);
        assert!(schedule.entry(0).is_none());
        assert!(schedule.entry(13).is_none());
    }

    #[test]
    fn test_balance_after_retirement_is_zero() {
        let schedule =
            build_amortization_schedule(dec!(12000), Decimal::ZERO, dec!(1000), start_date())
                .unwrap();

        assert_eq!(schedule.balance_after(6), dec!(6000));
        assert_eq!(schedule.balance_after(12), Decimal::ZERO);
        assert_eq!(schedule.balance_after(24), Decimal::ZERO);
    }

    #[test]
    fn test_years_remaining() {
        let schedule =
            build_amortization_schedule(dec!(12000), Decimal::ZERO, dec!(1000), start_date())
                .unwrap();
        assert_eq!(schedule.years_remaining, dec!(1));
    }

    #[test]
    fn test_loan_payoff_summary_envelope() {
        let input = LoanPayoffInput {
            params: crate::model::sample_parameters(),
            as_of: start_date(),
        };
        let output = loan_payoff_summary(&input).unwrap();
        let schedule = &output.result;

        // 3.875% on 554825 at 2783.80/month runs roughly 26-27 more years
        assert!(schedule.remaining_payments > 300);
        assert!(schedule.remaining_payments < 340);
        assert_eq!(output.methodology, "Loan Amortization & Payoff Schedule");
        // Payoff extends past the 10-year horizon
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("analysis horizon")));
    }
}
