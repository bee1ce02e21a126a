//! Data-driven expense-fraction estimates for a property the user has not
//! operated yet: lookup tables by property type, age, rental strategy, and
//! location, cross-checked against replacement-cost rules of thumb. All
//! outputs are fractions of rent, ready to drop into an `ExpenseProfile`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::HoldwiseError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

/// Annual maintenance as a fraction of property value, the first
/// replacement-cost cross-check.
const MAINTENANCE_VALUE_CHECK_RATE: Decimal = dec!(0.01);

/// Annual maintenance per square foot, the second cross-check.
const MAINTENANCE_PER_SQFT: Decimal = dec!(0.90);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    SingleFamily,
    Duplex,
    Multifamily,
    CondoTownhome,
}

/// Age bands: new 0-5 years, recent 6-15, mature 16-30, old 31+.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyAge {
    New,
    Recent,
    Mature,
    Old,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalStrategy {
    LongTerm,
    ShortTerm,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    Urban,
    Suburban,
    Rural,
    Vacation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateConfidence {
    High,
    Medium,
    Low,
}

/// What the estimator knows about the property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyProfile {
    pub property_type: PropertyType,
    pub age: PropertyAge,
    pub strategy: RentalStrategy,
    pub location: LocationType,
    pub property_value: Money,
    pub square_footage: u32,
    pub monthly_rent: Money,
}

/// One estimated expense fraction with its confidence grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseEstimate {
    /// Fraction of rent
    pub rate: Rate,
    pub description: String,
    pub confidence: EstimateConfidence,
}

/// Estimates for all four rent-proportional categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseBundle {
    pub maintenance: ExpenseEstimate,
    pub vacancy: ExpenseEstimate,
    pub management: ExpenseEstimate,
    pub other: ExpenseEstimate,
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

impl PropertyType {
    fn maintenance_adjustment(self) -> Decimal {
        match self {
            PropertyType::SingleFamily => dec!(1.0),
            PropertyType::Duplex => dec!(1.1),
            PropertyType::Multifamily => dec!(1.2),
            PropertyType::CondoTownhome => dec!(0.8),
        }
    }

    fn vacancy_adjustment(self) -> Decimal {
        match self {
            PropertyType::SingleFamily => dec!(1.0),
            PropertyType::Duplex => dec!(1.05),
            PropertyType::Multifamily => dec!(0.95),
            PropertyType::CondoTownhome => dec!(0.9),
        }
    }

    fn other_adjustment(self) -> Decimal {
        match self {
            PropertyType::SingleFamily => dec!(1.0),
            PropertyType::Duplex => dec!(1.1),
            PropertyType::Multifamily => dec!(1.2),
            PropertyType::CondoTownhome => dec!(0.7),
        }
    }

    fn label(self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "single-family",
            PropertyType::Duplex => "duplex",
            PropertyType::Multifamily => "multifamily",
            PropertyType::CondoTownhome => "condo/townhome",
        }
    }
}

impl PropertyAge {
    fn maintenance_base_rate(self) -> Rate {
        match self {
            PropertyAge::New => dec!(0.03),
            PropertyAge::Recent => dec!(0.06),
            PropertyAge::Mature => dec!(0.09),
            PropertyAge::Old => dec!(0.12),
        }
    }

    fn maintenance_confidence(self) -> EstimateConfidence {
        match self {
            PropertyAge::New | PropertyAge::Recent => EstimateConfidence::High,
            PropertyAge::Mature => EstimateConfidence::Medium,
            PropertyAge::Old => EstimateConfidence::Low,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PropertyAge::New => "new",
            PropertyAge::Recent => "recent",
            PropertyAge::Mature => "mature",
            PropertyAge::Old => "old",
        }
    }
}

impl RentalStrategy {
    fn maintenance_adjustment(self) -> Decimal {
        match self {
            RentalStrategy::LongTerm => dec!(1.0),
            RentalStrategy::ShortTerm => dec!(1.5),
            RentalStrategy::Hybrid => dec!(1.25),
        }
    }

    fn vacancy_base_rate(self) -> Rate {
        match self {
            RentalStrategy::LongTerm => dec!(0.06),
            RentalStrategy::ShortTerm => dec!(0.40),
            RentalStrategy::Hybrid => dec!(0.15),
        }
    }

    fn management_full_service_rate(self) -> Rate {
        match self {
            RentalStrategy::LongTerm => dec!(0.10),
            RentalStrategy::ShortTerm => dec!(0.25),
            RentalStrategy::Hybrid => dec!(0.18),
        }
    }

    fn other_base_rate(self) -> Rate {
        match self {
            RentalStrategy::LongTerm => dec!(0.04),
            RentalStrategy::ShortTerm => dec!(0.08),
            RentalStrategy::Hybrid => dec!(0.06),
        }
    }

    fn turnover_confidence(self) -> EstimateConfidence {
        match self {
            RentalStrategy::LongTerm => EstimateConfidence::High,
            RentalStrategy::ShortTerm | RentalStrategy::Hybrid => EstimateConfidence::Medium,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RentalStrategy::LongTerm => "long-term",
            RentalStrategy::ShortTerm => "short-term",
            RentalStrategy::Hybrid => "hybrid",
        }
    }
}

impl LocationType {
    fn vacancy_adjustment(self) -> Decimal {
        match self {
            LocationType::Urban => dec!(0.9),
            LocationType::Suburban => dec!(1.0),
            LocationType::Rural => dec!(1.3),
            LocationType::Vacation => dec!(1.2),
        }
    }

    fn management_adjustment(self) -> Decimal {
        match self {
            LocationType::Urban => dec!(0.9),
            LocationType::Suburban => dec!(1.0),
            LocationType::Rural => dec!(1.3),
            LocationType::Vacation => dec!(1.2),
        }
    }

    /// Remote locations pay a premium on utilities, insurance, and admin
    fn other_premium(self) -> Decimal {
        match self {
            LocationType::Rural | LocationType::Vacation => dec!(1.1),
            LocationType::Urban | LocationType::Suburban => dec!(1.0),
        }
    }

    fn label(self) -> &'static str {
        match self {
            LocationType::Urban => "urban",
            LocationType::Suburban => "suburban",
            LocationType::Rural => "rural",
            LocationType::Vacation => "vacation",
        }
    }
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

fn maintenance_table_rate(profile: &PropertyProfile) -> Rate {
    profile.age.maintenance_base_rate()
        * profile.property_type.maintenance_adjustment()
        * profile.strategy.maintenance_adjustment()
}

/// Maintenance fraction of rent: age tables adjusted for type and turnover,
/// floored by two replacement-cost cross-checks (1% of value annually and a
/// per-square-foot figure, both divided by annual rent). The higher estimate
/// wins.
pub fn estimate_maintenance(profile: &PropertyProfile) -> HoldwiseResult<ExpenseEstimate> {
    let annual_rent = profile.monthly_rent * dec!(12);
    if annual_rent <= Decimal::ZERO {
        return Err(HoldwiseError::DivisionByZero {
            context: "maintenance cross-checks on zero annual rent".into(),
        });
    }

    let table_rate = maintenance_table_rate(profile);
    let value_check = MAINTENANCE_VALUE_CHECK_RATE * profile.property_value / annual_rent;
    let sqft_check = MAINTENANCE_PER_SQFT * Decimal::from(profile.square_footage) / annual_rent;

    let rate = table_rate.max(value_check).max(sqft_check);
    let description = if rate > table_rate {
        format!(
            "Replacement-cost cross-check outweighs the {} {} age tables",
            profile.age.label(),
            profile.property_type.label()
        )
    } else {
        format!(
            "{} {} under {} tenancy",
            profile.age.label(),
            profile.property_type.label(),
            profile.strategy.label()
        )
    };

    Ok(ExpenseEstimate {
        rate,
        description,
        confidence: profile.age.maintenance_confidence(),
    })
}

/// Vacancy fraction: strategy base adjusted for location and property type.
pub fn estimate_vacancy(profile: &PropertyProfile) -> ExpenseEstimate {
    let rate = profile.strategy.vacancy_base_rate()
        * profile.location.vacancy_adjustment()
        * profile.property_type.vacancy_adjustment();

    ExpenseEstimate {
        rate,
        description: format!(
            "{} tenancy in a {} market",
            profile.strategy.label(),
            profile.location.label()
        ),
        confidence: profile.strategy.turnover_confidence(),
    }
}

/// Management fraction at full-service rates, adjusted for location.
pub fn estimate_management(profile: &PropertyProfile) -> ExpenseEstimate {
    let rate = profile.strategy.management_full_service_rate()
        * profile.location.management_adjustment();

    ExpenseEstimate {
        rate,
        description: format!(
            "Full-service {} management in a {} market",
            profile.strategy.label(),
            profile.location.label()
        ),
        confidence: profile.strategy.turnover_confidence(),
    }
}

/// Other-cost fraction (utilities, reserves, admin): strategy base adjusted
/// for property type, with a premium for remote locations.
pub fn estimate_other(profile: &PropertyProfile) -> ExpenseEstimate {
    let rate = profile.strategy.other_base_rate()
        * profile.property_type.other_adjustment()
        * profile.location.other_premium();

    ExpenseEstimate {
        rate,
        description: format!(
            "Utilities, reserves, and admin under {} tenancy",
            profile.strategy.label()
        ),
        confidence: EstimateConfidence::Medium,
    }
}

/// All four categories in one enveloped call.
pub fn estimate_expenses(
    profile: &PropertyProfile,
) -> HoldwiseResult<ComputationOutput<ExpenseBundle>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let maintenance = estimate_maintenance(profile)?;
    if maintenance.rate > maintenance_table_rate(profile) {
        warnings.push(
            "Maintenance estimate lifted above the age tables by a replacement-cost cross-check"
                .into(),
        );
    }

    let bundle = ExpenseBundle {
        maintenance,
        vacancy: estimate_vacancy(profile),
        management: estimate_management(profile),
        other: estimate_other(profile),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Expense Estimation Tables",
        profile,
        warnings,
        elapsed,
        bundle,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
