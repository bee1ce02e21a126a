//! Downside stress tests on the rental path: extended-vacancy replays of the
//! monthly ledger and property-value shocks against loan-to-value limits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::HoldwiseError;
use crate::model::AnalysisParameters;
use crate::projection::monthly::{build_rental_projection, ProjectionConfig, RentalProjection};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

/// Shortfall levels that flag vacancy risk in the report.
const HIGH_VACANCY_SHORTFALL: Decimal = dec!(50000);
const MODERATE_VACANCY_SHORTFALL: Decimal = dec!(20000);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Stress-test knobs. Defaults mirror a duplex landlord's worry list: a
/// six-month vacancy hitting early or late, and value drops through the
/// refinance threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Ledger months (1-based) where a vacancy window begins
    pub vacancy_start_months: Vec<u32>,
    pub vacancy_duration_months: u32,
    /// Value shocks as signed fractions, e.g. -0.20 for a 20% decline
    pub shock_fractions: Vec<Rate>,
    /// LTV at or below which a refinance is assumed available
    pub refinance_ltv_limit: Rate,
    /// Buffer applied to the worst shortfall per vacancy scenario
    pub shortfall_buffer: Decimal,
    /// Months of carrying costs behind the report's emergency fund
    pub carrying_cost_months: Decimal,
    /// Cash-flexibility tier cutoffs on the worst shortfall
    pub flexibility_good_limit: Money,
    pub flexibility_moderate_limit: Money,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            vacancy_start_months: vec![6, 12, 24, 36],
            vacancy_duration_months: 6,
            shock_fractions: vec![dec!(-0.10), dec!(-0.20), dec!(-0.30)],
            refinance_ltv_limit: dec!(0.80),
            shortfall_buffer: dec!(1.2),
            carrying_cost_months: dec!(8),
            flexibility_good_limit: dec!(10000),
            flexibility_moderate_limit: dec!(30000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskInput {
    pub params: AnalysisParameters,
    #[serde(default)]
    pub config: ProjectionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

/// Outcome of one vacancy window replayed through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyScenarioResult {
    /// First vacant month (1-based)
    pub start_month: u32,
    pub duration_months: u32,
    /// Baseline rent foregone across the window
    pub total_lost_rent: Money,
    pub min_cash_balance: Money,
    pub max_cash_shortfall: Money,
    pub months_cash_negative: u32,
    /// Sum of the negative balances across all underwater months
    pub total_cash_shortfall: Money,
    pub requires_emergency_fund: bool,
    /// Worst shortfall with the configured buffer applied
    pub recommended_emergency_fund: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyRiskAnalysis {
    pub scenarios: Vec<VacancyScenarioResult>,
    pub baseline_final_cash_balance: Money,
    /// P&I plus fixed tax, insurance, and other costs. Escrow is excluded:
    /// the tax and insurance it disburses are already in the fixed costs.
    pub monthly_carrying_cost: Money,
}

/// One property-value shock against the current mortgage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueShockScenario {
    pub shock_fraction: Rate,
    pub shocked_value: Money,
    pub equity_loss: Money,
    pub ltv: Rate,
    pub underwater_amount: Money,
    pub is_underwater: bool,
    pub can_refinance: bool,
    pub post_shock_equity: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueShockAnalysis {
    pub current_property_value: Money,
    pub current_mortgage_balance: Money,
    pub current_ltv: Rate,
    pub scenarios: Vec<ValueShockScenario>,
}

/// Qualitative tier from the worst-case vacancy shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashFlexibility {
    /// Rides out the vacancy grid without going below zero
    Excellent,
    Good,
    Moderate,
    Poor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub vacancy: VacancyRiskAnalysis,
    pub value_shocks: ValueShockAnalysis,
    pub monthly_carrying_cost: Money,
    pub max_vacancy_shortfall: Money,
    /// Carrying-cost months of reserves, the report-level recommendation
    pub recommended_emergency_fund: Money,
    pub high_risk_factors: Vec<String>,
    pub cash_flexibility: CashFlexibility,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Replay the monthly ledger under each configured vacancy window and report
/// how deep the cash balance digs.
pub fn analyze_vacancy_risk(
    input: &RiskInput,
) -> HoldwiseResult<ComputationOutput<VacancyRiskAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let baseline = build_rental_projection(&input.params, None, &input.config)?;
    let analysis = build_vacancy_analysis(input, &baseline)?;

    if analysis
        .scenarios
        .iter()
        .any(|s| s.requires_emergency_fund)
    {
        warnings.push("At least one vacancy window drives the cash balance below zero".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Vacancy Stress Replay",
        input,
        warnings,
        elapsed,
        analysis,
    ))
}

/// Evaluate property-value shocks against loan-to-value thresholds.
pub fn analyze_value_shocks(
    input: &RiskInput,
) -> HoldwiseResult<ComputationOutput<ValueShockAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let analysis = build_value_shock_analysis(&input.params, &input.risk)?;

    if analysis.scenarios.iter().any(|s| s.is_underwater) {
        warnings.push("At least one value shock puts the mortgage underwater".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Property Value Shock Analysis",
        input,
        warnings,
        elapsed,
        analysis,
    ))
}

/// Combined downside report: vacancy replays, value shocks, emergency-fund
/// sizing, and a qualitative flexibility tier.
pub fn risk_report(input: &RiskInput) -> HoldwiseResult<ComputationOutput<RiskReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.params.validate(&mut warnings)?;

    let baseline = build_rental_projection(&input.params, None, &input.config)?;
    let vacancy = build_vacancy_analysis(input, &baseline)?;
    let value_shocks = build_value_shock_analysis(&input.params, &input.risk)?;

    let max_vacancy_shortfall = vacancy
        .scenarios
        .iter()
        .map(|s| s.max_cash_shortfall)
        .max()
        .unwrap_or(Decimal::ZERO);
    let high_risk_factors = identify_high_risk_factors(max_vacancy_shortfall, &value_shocks);
    let cash_flexibility = flexibility_tier(max_vacancy_shortfall, &input.risk);

    if !high_risk_factors.is_empty() {
        warnings.push(format!(
            "{} high-risk factor(s) identified",
            high_risk_factors.len()
        ));
    }

    let report = RiskReport {
        monthly_carrying_cost: vacancy.monthly_carrying_cost,
        recommended_emergency_fund: vacancy.monthly_carrying_cost
            * input.risk.carrying_cost_months,
        vacancy,
        value_shocks,
        max_vacancy_shortfall,
        high_risk_factors,
        cash_flexibility,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Comprehensive Downside Risk Report",
        input,
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Vacancy replay
// ---------------------------------------------------------------------------

fn build_vacancy_analysis(
    input: &RiskInput,
    baseline: &RentalProjection,
) -> HoldwiseResult<VacancyRiskAnalysis> {
    let risk = &input.risk;
    if risk.vacancy_duration_months == 0 {
        return Err(HoldwiseError::InvalidInput {
            field: "vacancy_duration_months".into(),
            reason: "Vacancy duration must be at least one month".into(),
        });
    }

    let expenses = &input.params.expenses;
    let carrying_cost =
        expenses.monthly_principal_and_interest() + expenses.fixed_monthly_costs();
    let proportional_rate = expenses.rent_proportional_rate();

    let scenarios = risk
        .vacancy_start_months
        .iter()
        .map(|&start_month| {
            replay_vacancy_window(
                baseline,
                input.config.reserve_target,
                proportional_rate,
                start_month,
                risk.vacancy_duration_months,
                risk.shortfall_buffer,
            )
        })
        .collect();

    Ok(VacancyRiskAnalysis {
        scenarios,
        baseline_final_cash_balance: baseline.final_cash_balance,
        monthly_carrying_cost: carrying_cost,
    })
}

/// Re-walk the baseline ledger with rent zeroed inside the window. A vacant
/// month keeps fixed costs, debt service, and escrow flowing while the
/// rent-proportional expenses disappear with the rent; interest-earned and
/// quarterly-tax columns are taken from the baseline so the delta is purely
/// the lost rent.
fn replay_vacancy_window(
    baseline: &RentalProjection,
    opening_cash: Money,
    proportional_rate: Rate,
    start_month: u32,
    duration: u32,
    shortfall_buffer: Decimal,
) -> VacancyScenarioResult {
    let vacant_end = start_month.saturating_add(duration);

    let mut cash_balance = opening_cash;
    let mut min_cash_balance = opening_cash;
    let mut max_cash_shortfall = Decimal::ZERO;
    let mut months_cash_negative = 0u32;
    let mut total_cash_shortfall = Decimal::ZERO;
    let mut total_lost_rent = Decimal::ZERO;

    for entry in &baseline.entries {
        let vacant = entry.month >= start_month && entry.month < vacant_end;

        let operating_cash_flow = if vacant {
            total_lost_rent += entry.gross_rent;
            entry.operating_cash_flow - entry.gross_rent
                + entry.gross_rent * proportional_rate
        } else {
            entry.operating_cash_flow
        };

        cash_balance += operating_cash_flow;
        cash_balance += entry.cash_interest_earned;
        cash_balance -= entry.quarterly_tax_payment;

        min_cash_balance = min_cash_balance.min(cash_balance);
        if cash_balance < Decimal::ZERO {
            months_cash_negative += 1;
            let shortfall = -cash_balance;
            max_cash_shortfall = max_cash_shortfall.max(shortfall);
            total_cash_shortfall += shortfall;
        }
    }

    VacancyScenarioResult {
        start_month,
        duration_months: duration,
        total_lost_rent,
        min_cash_balance,
        max_cash_shortfall,
        months_cash_negative,
        total_cash_shortfall,
        requires_emergency_fund: max_cash_shortfall > Decimal::ZERO,
        recommended_emergency_fund: max_cash_shortfall * shortfall_buffer,
    }
}

// ---------------------------------------------------------------------------
// Value shocks
// ---------------------------------------------------------------------------

fn build_value_shock_analysis(
    params: &AnalysisParameters,
    risk: &RiskConfig,
) -> HoldwiseResult<ValueShockAnalysis> {
    let current_value = params.property.current_value;
    let balance = params.property.mortgage_balance;

    if current_value.is_zero() {
        return Err(HoldwiseError::DivisionByZero {
            context: "LTV on a zero property value".into(),
        });
    }
    let current_ltv = balance / current_value;

    let mut scenarios = Vec::with_capacity(risk.shock_fractions.len());
    for &shock in &risk.shock_fractions {
        let shocked_value = current_value * (Decimal::ONE + shock);
        if shocked_value.is_zero() {
            return Err(HoldwiseError::DivisionByZero {
                context: format!("LTV after a {shock} value shock"),
            });
        }

        let ltv = balance / shocked_value;
        let underwater_amount = (balance - shocked_value).max(Decimal::ZERO);

        scenarios.push(ValueShockScenario {
            shock_fraction: shock,
            shocked_value,
            equity_loss: current_value - shocked_value,
            ltv,
            underwater_amount,
            is_underwater: underwater_amount > Decimal::ZERO,
            can_refinance: ltv <= risk.refinance_ltv_limit,
            post_shock_equity: shocked_value - balance,
        });
    }

    Ok(ValueShockAnalysis {
        current_property_value: current_value,
        current_mortgage_balance: balance,
        current_ltv,
        scenarios,
    })
}

// ---------------------------------------------------------------------------
// Report assembly
// ---------------------------------------------------------------------------

fn identify_high_risk_factors(
    max_vacancy_shortfall: Money,
    value_shocks: &ValueShockAnalysis,
) -> Vec<String> {
    let mut risks = Vec::new();

    if max_vacancy_shortfall > HIGH_VACANCY_SHORTFALL {
        risks.push(
            "HIGH VACANCY RISK: extended vacancy could require a cash injection above $50K"
                .to_string(),
        );
    } else if max_vacancy_shortfall > MODERATE_VACANCY_SHORTFALL {
        risks.push(
            "MODERATE VACANCY RISK: extended vacancy could require a cash injection above $20K"
                .to_string(),
        );
    }

    // Underwater at -20% outranks a blocked refinance at -10%; only the
    // worse of the two is reported
    let underwater_at_20 = value_shocks
        .scenarios
        .iter()
        .any(|s| s.shock_fraction == dec!(-0.20) && s.is_underwater);
    let refinance_blocked_at_10 = value_shocks
        .scenarios
        .iter()
        .any(|s| s.shock_fraction == dec!(-0.10) && !s.can_refinance);

    if underwater_at_20 {
        risks.push(
            "UNDERWATER RISK: a 20% value decline puts the mortgage underwater".to_string(),
        );
    } else if refinance_blocked_at_10 {
        risks.push(
            "REFINANCE RISK: a 10% value decline blocks refinancing (LTV above limit)"
                .to_string(),
        );
    }

    risks
}

fn flexibility_tier(max_shortfall: Money, risk: &RiskConfig) -> CashFlexibility {
    if max_shortfall.is_zero() {
        CashFlexibility::Excellent
    } else if max_shortfall < risk.flexibility_good_limit {
        CashFlexibility::Good
    } else if max_shortfall < risk.flexibility_moderate_limit {
        CashFlexibility::Moderate
    } else {
        CashFlexibility::Poor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_parameters;

    fn sample_input() -> RiskInput {
        RiskInput {
            params: sample_parameters(),
            config: ProjectionConfig::default(),
            risk: RiskConfig::default(),
        }
    }

    #[test]
    fn test_carrying_cost_is_pi_plus_fixed() {
        let output = analyze_vacancy_risk(&sample_input()).unwrap();
        // P&I 2783.80 + 650 tax + 150 insurance + 120 other
        assert_eq!(output.result.monthly_carrying_cost, dec!(3703.80));
    }

    #[test]
    fn test_vacancy_grid_shape() {
        let output = analyze_vacancy_risk(&sample_input()).unwrap();
        let scenarios = &output.result.scenarios;

        assert_eq!(scenarios.len(), 4);
        assert_eq!(
            scenarios.iter().map(|s| s.start_month).collect::<Vec<_>>(),
            vec![6, 12, 24, 36]
        );
        assert!(scenarios.iter().all(|s| s.duration_months == 6));
    }

    #[test]
    fn test_lost_rent_tracks_baseline_rent() {
        let output = analyze_vacancy_risk(&sample_input()).unwrap();
        let scenarios = &output.result.scenarios;

        // Months 6..=11 all sit in year one at 4500
        assert_eq!(scenarios[0].total_lost_rent, dec!(27000));
        // Months 12..=17 straddle the first rent step
        let straddled = dec!(4500) + dec!(4500) * dec!(1.035) * dec!(5);
        assert_eq!(scenarios[1].total_lost_rent, straddled);
        // Later windows lose more rent as growth compounds
        assert!(scenarios[2].total_lost_rent > scenarios[1].total_lost_rent);
        assert!(scenarios[3].total_lost_rent > scenarios[2].total_lost_rent);
    }

    #[test]
    fn test_vacancy_drains_cash_below_zero() {
        // The fixture runs cash-flow negative even fully occupied; a
        // six-month vacancy pushes every replay below zero
        let output = analyze_vacancy_risk(&sample_input()).unwrap();
        let scenarios = &output.result.scenarios;

        for scenario in scenarios {
            assert!(scenario.max_cash_shortfall > Decimal::ZERO);
            assert!(scenario.requires_emergency_fund);
            assert!(scenario.months_cash_negative > 0);
            assert_eq!(
                scenario.recommended_emergency_fund,
                scenario.max_cash_shortfall * dec!(1.2)
            );
            assert!(scenario.min_cash_balance < Decimal::ZERO);
        }
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("below zero")));
    }

    #[test]
    fn test_replay_without_vacancy_reproduces_baseline() {
        // A window that never starts inside the horizon leaves every month
        // occupied, so the replayed walk retraces the baseline column exactly
        let mut input = sample_input();
        input.risk.vacancy_start_months = vec![500];

        let output = analyze_vacancy_risk(&input).unwrap();
        let scenario = &output.result.scenarios[0];

        let baseline = build_rental_projection(&input.params, None, &input.config).unwrap();
        let baseline_min = baseline
            .entries
            .iter()
            .map(|e| e.cash_balance)
            .min()
            .unwrap();
        let baseline_negative_months = baseline
            .entries
            .iter()
            .filter(|e| e.cash_balance < Decimal::ZERO)
            .count() as u32;

        assert_eq!(scenario.total_lost_rent, Decimal::ZERO);
        assert_eq!(scenario.min_cash_balance, baseline_min);
        assert_eq!(scenario.months_cash_negative, baseline_negative_months);
        // The unshocked fixture already dips negative late in the hold
        assert!(baseline_min < Decimal::ZERO);
        assert_eq!(scenario.max_cash_shortfall, -baseline_min);
    }

    #[test]
    fn test_value_shock_ltv_and_underwater() {
        let output = analyze_value_shocks(&sample_input()).unwrap();
        let analysis = &output.result;

        // 554825 / 950000
        assert!((analysis.current_ltv - dec!(0.584)).abs() < dec!(0.001));
        assert_eq!(analysis.scenarios.len(), 3);

        // -10%: 855000, LTV 0.649, still refinanceable
        let ten = &analysis.scenarios[0];
        assert_eq!(ten.shocked_value, dec!(855000));
        assert!(!ten.is_underwater);
        assert!(ten.can_refinance);
        assert_eq!(ten.equity_loss, dec!(95000));

        // -30%: 665000, LTV 0.834, refinance blocked but still above water
        let thirty = &analysis.scenarios[2];
        assert_eq!(thirty.shocked_value, dec!(665000));
        assert!(!thirty.is_underwater);
        assert!(!thirty.can_refinance);
        assert_eq!(thirty.post_shock_equity, dec!(110175));
    }

    #[test]
    fn test_underwater_shock_detected() {
        let mut input = sample_input();
        // Thin equity: a 20% drop leaves the loan above the value
        input.params.property.current_value = dec!(650000);

        let output = analyze_value_shocks(&input).unwrap();
        let twenty = &output.result.scenarios[1];

        // 650000 * 0.8 = 520000 < 554825
        assert!(twenty.is_underwater);
        assert_eq!(twenty.underwater_amount, dec!(34825));
        assert!(output.warnings.iter().any(|w| w.contains("underwater")));
    }

    #[test]
    fn test_total_shock_wipeout_is_division_error() {
        let mut input = sample_input();
        input.risk.shock_fractions = vec![dec!(-1.0)];

        let err = analyze_value_shocks(&input).unwrap_err();
        assert!(matches!(err, HoldwiseError::DivisionByZero { .. }));
    }

    #[test]
    fn test_report_aggregates() {
        let output = risk_report(&sample_input()).unwrap();
        let report = &output.result;

        let worst = report
            .vacancy
            .scenarios
            .iter()
            .map(|s| s.max_cash_shortfall)
            .max()
            .unwrap();
        assert_eq!(report.max_vacancy_shortfall, worst);
        assert_eq!(report.monthly_carrying_cost, dec!(3703.80));
        assert_eq!(report.recommended_emergency_fund, dec!(3703.80) * dec!(8));

        // A six-month vacancy on top of the fixture's thin margins lands in
        // the moderate band: above 30k but nowhere near 50k
        assert!(worst > dec!(30000) && worst < dec!(50000));
        assert_eq!(report.cash_flexibility, CashFlexibility::Poor);
        assert_eq!(report.high_risk_factors.len(), 1);
        assert!(report.high_risk_factors[0].contains("MODERATE VACANCY RISK"));
    }

    #[test]
    fn test_flexibility_tiers() {
        let risk = RiskConfig::default();
        assert_eq!(
            flexibility_tier(Decimal::ZERO, &risk),
            CashFlexibility::Excellent
        );
        assert_eq!(flexibility_tier(dec!(5000), &risk), CashFlexibility::Good);
        assert_eq!(
            flexibility_tier(dec!(15000), &risk),
            CashFlexibility::Moderate
        );
        assert_eq!(flexibility_tier(dec!(45000), &risk), CashFlexibility::Poor);
    }

    #[test]
    fn test_high_risk_factor_labels() {
        let input = sample_input();
        let shocks = build_value_shock_analysis(&input.params, &input.risk).unwrap();

        let none = identify_high_risk_factors(dec!(1000), &shocks);
        assert!(none.is_empty());

        let moderate = identify_high_risk_factors(dec!(25000), &shocks);
        assert_eq!(moderate.len(), 1);
        assert!(moderate[0].contains("MODERATE VACANCY RISK"));

        let high = identify_high_risk_factors(dec!(60000), &shocks);
        assert!(high[0].contains("HIGH VACANCY RISK"));
    }
}
