use chrono::NaiveDate;
use holdwise_core::model::{
    AnalysisParameters, ExpenseProfile, MarketAssumptions, PropertyRecord, SaleAssumptions, Unit,
};
use holdwise_core::projection::monthly::{
    project_rental_ledger, MonthlyProjectionInput, ProjectionConfig,
};
use holdwise_core::risk::{
    analyze_vacancy_risk, analyze_value_shocks, risk_report, CashFlexibility, RiskConfig,
    RiskInput,
};
use holdwise_core::tax::TaxPolicy;
use holdwise_core::HoldwiseError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Two-unit rental: $950k duplex with $554.8k left on a 3.875% note.
fn duplex_parameters() -> AnalysisParameters {
    AnalysisParameters {
        property: PropertyRecord {
            address: "414 Crestwood Dr".into(),
            current_value: dec!(950000),
            purchase_price: dec!(780000),
            cost_basis: dec!(780000),
            purchase_date: NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
            mortgage_balance: dec!(554825),
            mortgage_rate: dec!(0.03875),
            units: vec![
                Unit {
                    label: "Unit A".into(),
                    bedrooms: 2,
                    bathrooms: dec!(1),
                    monthly_rent: dec!(2250),
                },
                Unit {
                    label: "Unit B".into(),
                    bedrooms: 2,
                    bathrooms: dec!(1),
                    monthly_rent: dec!(2250),
                },
            ],
        },
        expenses: ExpenseProfile {
            monthly_property_tax: dec!(650),
            monthly_insurance: dec!(150),
            monthly_mortgage_payment: dec!(3583.80),
            monthly_escrow: dec!(800),
            maintenance_rate: dec!(0.05),
            vacancy_rate: dec!(0.03),
            management_rate: dec!(0.08),
            other_monthly_costs: dec!(120),
        },
        sale: SaleAssumptions {
            selling_cost_rate: dec!(0.06),
            capital_gains_tax_rate: dec!(0.2425),
        },
        market: MarketAssumptions {
            appreciation_rate: dec!(0.03),
            rent_growth_rate: dec!(0.035),
            stock_return_rate: dec!(0.075),
            discount_rate: dec!(0.07),
        },
        tax: TaxPolicy::default(),
        analysis_years: 10,
    }
}

fn risk_input() -> RiskInput {
    RiskInput {
        params: duplex_parameters(),
        config: ProjectionConfig::default(),
        risk: RiskConfig::default(),
    }
}

fn baseline_entries() -> Vec<holdwise_core::projection::monthly::MonthlyLedgerEntry> {
    let input = MonthlyProjectionInput {
        params: duplex_parameters(),
        rent_schedule: None,
        config: ProjectionConfig::default(),
    };
    project_rental_ledger(&input).unwrap().result.entries
}

// ===========================================================================
// Vacancy stress tests
// ===========================================================================

#[test]
fn test_carrying_cost_is_pi_plus_fixed() {
    let output = analyze_vacancy_risk(&risk_input()).unwrap();

    // P&I 2783.80 plus fixed 920. Escrow is excluded: the tax and insurance
    // it disburses already sit in the fixed costs.
    assert_eq!(output.result.monthly_carrying_cost, dec!(3703.80));
}

#[test]
fn test_default_window_grid() {
    let output = analyze_vacancy_risk(&risk_input()).unwrap();
    let scenarios = &output.result.scenarios;

    let starts: Vec<u32> = scenarios.iter().map(|s| s.start_month).collect();
    assert_eq!(starts, vec![6, 12, 24, 36]);
    assert!(scenarios.iter().all(|s| s.duration_months == 6));
    assert_eq!(output.methodology, "Vacancy Stress Replay");
}

#[test]
fn test_first_year_window_loses_six_flat_months() {
    let output = analyze_vacancy_risk(&risk_input()).unwrap();
    let first = &output.result.scenarios[0];

    // Months 6-11 all rent at 4500
    assert_eq!(first.total_lost_rent, dec!(27000));
}

#[test]
fn test_window_straddling_the_anniversary() {
    let baseline = baseline_entries();

    let mut input = risk_input();
    input.risk.vacancy_start_months = vec![12];
    let output = analyze_vacancy_risk(&input).unwrap();
    let scenario = &output.result.scenarios[0];

    // Month 12 still rents at 4500; months 13-17 at 4657.50
    let lost_rent = dec!(4500) + dec!(4657.50) * dec!(5);
    assert_eq!(scenario.total_lost_rent, lost_rent);

    // A vacant month avoids the rent-proportional 16%, so the replay trails
    // the baseline by 84% of the lost rent once the window closes
    let net_delta: Decimal = baseline
        .iter()
        .filter(|e| e.month >= 12 && e.month < 18)
        .map(|e| e.gross_rent - e.gross_rent * dec!(0.16))
        .sum();
    assert_eq!(net_delta, dec!(23341.50));

    // The ledger's worst month lands years after the window closes, so the
    // full delta applies at the low point and the subtraction is exact
    let baseline_min = baseline.iter().map(|e| e.cash_balance).min().unwrap();
    assert_eq!(scenario.min_cash_balance, baseline_min - net_delta);
    assert!(scenario.min_cash_balance < Decimal::ZERO);
    assert_eq!(scenario.max_cash_shortfall, -scenario.min_cash_balance);
    assert!(scenario.requires_emergency_fund);
    assert_eq!(
        scenario.recommended_emergency_fund,
        scenario.max_cash_shortfall * dec!(1.2)
    );
}

#[test]
fn test_replay_without_a_window_matches_baseline() {
    let baseline = baseline_entries();

    let mut input = risk_input();
    // Start beyond the 120-month horizon: nothing goes vacant
    input.risk.vacancy_start_months = vec![500];
    let output = analyze_vacancy_risk(&input).unwrap();
    let scenario = &output.result.scenarios[0];

    assert_eq!(scenario.total_lost_rent, Decimal::ZERO);
    let baseline_min = baseline.iter().map(|e| e.cash_balance).min().unwrap();
    assert_eq!(scenario.min_cash_balance, baseline_min);
    assert_eq!(scenario.max_cash_shortfall, -baseline_min);
    assert_eq!(
        scenario.months_cash_negative,
        baseline
            .iter()
            .filter(|e| e.cash_balance < Decimal::ZERO)
            .count() as u32
    );
    // The duplex digs below zero even without a vacancy
    assert!(baseline_min < Decimal::ZERO);
}

#[test]
fn test_every_window_digs_below_zero() {
    let output = analyze_vacancy_risk(&risk_input()).unwrap();

    assert!(output
        .result
        .scenarios
        .iter()
        .all(|s| s.requires_emergency_fund));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("below zero")));
}

#[test]
fn test_zero_duration_rejected() {
    let mut input = risk_input();
    input.risk.vacancy_duration_months = 0;

    match analyze_vacancy_risk(&input) {
        Err(HoldwiseError::InvalidInput { field, .. }) => {
            assert_eq!(field, "vacancy_duration_months");
        }
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

// ===========================================================================
// Value shock tests
// ===========================================================================

#[test]
fn test_shock_grid_for_the_duplex() {
    let output = analyze_value_shocks(&risk_input()).unwrap();
    let analysis = &output.result;

    assert_eq!(analysis.current_property_value, dec!(950000));
    // LTV 554825 / 950000
    assert!(analysis.current_ltv > dec!(0.58));
    assert!(analysis.current_ltv < dec!(0.59));

    let ten = &analysis.scenarios[0];
    assert_eq!(ten.shocked_value, dec!(855000));
    assert_eq!(ten.equity_loss, dec!(95000));
    assert!(!ten.is_underwater);
    assert!(ten.can_refinance);

    let twenty = &analysis.scenarios[1];
    assert_eq!(twenty.shocked_value, dec!(760000));
    assert!(!twenty.is_underwater);

    let thirty = &analysis.scenarios[2];
    assert_eq!(thirty.shocked_value, dec!(665000));
    // LTV 0.834 blocks a refinance but stays above water
    assert!(!thirty.is_underwater);
    assert!(!thirty.can_refinance);
    assert_eq!(thirty.post_shock_equity, dec!(110175));

    assert!(output.warnings.is_empty());
}

#[test]
fn test_thin_equity_goes_underwater() {
    let mut input = risk_input();
    input.params.property.current_value = dec!(650000);

    let output = analyze_value_shocks(&input).unwrap();
    let twenty = &output.result.scenarios[1];

    // 650000 * 0.8 = 520000 against a 554825 balance
    assert_eq!(twenty.shocked_value, dec!(520000));
    assert_eq!(twenty.underwater_amount, dec!(34825));
    assert!(twenty.is_underwater);
    assert!(!twenty.can_refinance);
    assert_eq!(twenty.post_shock_equity, dec!(-34825));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("underwater")));
}

#[test]
fn test_total_decline_rejected() {
    let mut input = risk_input();
    input.risk.shock_fractions = vec![dec!(-1)];

    match analyze_value_shocks(&input) {
        Err(HoldwiseError::DivisionByZero { .. }) => {}
        other => panic!("Expected DivisionByZero, got {other:?}"),
    }
}

// ===========================================================================
// Risk report tests
// ===========================================================================

#[test]
fn test_report_aggregates_for_the_duplex() {
    let output = risk_report(&risk_input()).unwrap();
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
    // Eight months of carrying costs
    assert_eq!(report.recommended_emergency_fund, dec!(29630.40));

    // The duplex's worst shortfall sits in the moderate band
    assert!(report.max_vacancy_shortfall > dec!(30000));
    assert!(report.max_vacancy_shortfall < dec!(50000));
    assert_eq!(report.cash_flexibility, CashFlexibility::Poor);
    assert_eq!(report.high_risk_factors.len(), 1);
    assert!(report.high_risk_factors[0].contains("MODERATE VACANCY RISK"));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("1 high-risk factor(s) identified")));
}

#[test]
fn test_flexibility_tier_follows_the_config() {
    let mut input = risk_input();
    // Widen the moderate band past the duplex's worst shortfall
    input.risk.flexibility_moderate_limit = dec!(100000);

    let output = risk_report(&input).unwrap();
    assert_eq!(output.result.cash_flexibility, CashFlexibility::Moderate);
}
