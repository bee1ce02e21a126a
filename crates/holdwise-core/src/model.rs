use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::HoldwiseError;
use crate::tax::TaxPolicy;
use crate::types::{Money, Rate};
use crate::HoldwiseResult;

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A rentable unit within the property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Unit identifier ("Unit A", "Main house", ...)
    pub label: String,
    pub bedrooms: u32,
    pub bathrooms: Decimal,
    /// Current monthly rent. Zero means the unit sits vacant.
    pub monthly_rent: Money,
}

/// The property under analysis, valued and financed as of today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub address: String,
    /// Current market value
    pub current_value: Money,
    /// Original purchase price
    pub purchase_price: Money,
    /// Cost basis for tax purposes (purchase price plus capitalized improvements)
    pub cost_basis: Money,
    pub purchase_date: NaiveDate,
    /// Outstanding mortgage balance as of today
    pub mortgage_balance: Money,
    /// Annual note rate on the mortgage
    pub mortgage_rate: Rate,
    pub units: Vec<Unit>,
}

impl PropertyRecord {
    /// Sum of unit rents per month
    pub fn total_monthly_rent(&self) -> Money {
        self.units.iter().map(|u| u.monthly_rent).sum()
    }

    /// Unrealized gain against the tax basis. May be negative.
    pub fn capital_gain(&self) -> Money {
        self.current_value - self.cost_basis
    }
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

/// Monthly carrying costs. Rate fields are fractions of current rent;
/// fixed fields are nominal monthly amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseProfile {
    pub monthly_property_tax: Money,
    pub monthly_insurance: Money,
    /// Full monthly mortgage payment including the escrow portion
    pub monthly_mortgage_payment: Money,
    /// Escrow portion of the mortgage payment
    pub monthly_escrow: Money,
    pub maintenance_rate: Rate,
    pub vacancy_rate: Rate,
    pub management_rate: Rate,
    /// Other fixed monthly costs (utilities kept in owner's name, HOA, ...)
    pub other_monthly_costs: Money,
}

impl ExpenseProfile {
    /// Principal-and-interest portion of the mortgage payment
    pub fn monthly_principal_and_interest(&self) -> Money {
        self.monthly_mortgage_payment - self.monthly_escrow
    }

    /// Fixed monthly costs that keep flowing even with zero rent
    pub fn fixed_monthly_costs(&self) -> Money {
        self.monthly_property_tax + self.monthly_insurance + self.other_monthly_costs
    }

    /// Combined fraction of rent consumed by rent-proportional costs
    pub fn rent_proportional_rate(&self) -> Rate {
        self.maintenance_rate + self.vacancy_rate + self.management_rate
    }
}

// ---------------------------------------------------------------------------
// Assumptions
// ---------------------------------------------------------------------------

/// Terms of an eventual sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleAssumptions {
    /// Selling costs as a fraction of gross sale price (agent, transfer, staging)
    pub selling_cost_rate: Rate,
    /// Blended capital-gains rate, caller-facing. Scenario application keeps
    /// this in sync with the effective immediate-sale rate; the valuators
    /// consume the TaxPolicy splits, never this field.
    pub capital_gains_tax_rate: Rate,
}

/// Forward-looking market assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAssumptions {
    /// Annual property appreciation rate
    pub appreciation_rate: Rate,
    /// Annual rent growth rate
    pub rent_growth_rate: Rate,
    /// Annual total return on the stock index alternative
    pub stock_return_rate: Rate,
    /// Discount rate for NPV comparisons
    pub discount_rate: Rate,
}

// ---------------------------------------------------------------------------
// Analysis parameters
// ---------------------------------------------------------------------------

/// The complete input to every calculator. Cloned before scenario
/// application so concurrent what-if runs never interfere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisParameters {
    pub property: PropertyRecord,
    pub expenses: ExpenseProfile,
    pub sale: SaleAssumptions,
    pub market: MarketAssumptions,
    #[serde(default)]
    pub tax: TaxPolicy,
    /// Analysis horizon in whole years (1-50)
    pub analysis_years: u32,
}

impl AnalysisParameters {
    /// Validate every field before any projection runs. Out-of-range values
    /// are rejected, never silently clamped; unusual but legal values emit
    /// warnings.
    pub fn validate(&self, warnings: &mut Vec<String>) -> HoldwiseResult<()> {
        if self.analysis_years < 1 || self.analysis_years > 50 {
            return Err(HoldwiseError::InvalidInput {
                field: "analysis_years".into(),
                reason: "Analysis horizon must be between 1 and 50 years".into(),
            });
        }

        let p = &self.property;
        if p.current_value <= Decimal::ZERO {
            return Err(HoldwiseError::InvalidInput {
                field: "current_value".into(),
                reason: "Current market value must be positive".into(),
            });
        }
        if p.purchase_price <= Decimal::ZERO {
            return Err(HoldwiseError::InvalidInput {
                field: "purchase_price".into(),
                reason: "Purchase price must be positive".into(),
            });
        }
        if p.cost_basis <= Decimal::ZERO {
            return Err(HoldwiseError::InvalidInput {
                field: "cost_basis".into(),
                reason: "Cost basis must be positive".into(),
            });
        }
        if p.mortgage_balance < Decimal::ZERO {
            return Err(HoldwiseError::InvalidInput {
                field: "mortgage_balance".into(),
                reason: "Mortgage balance cannot be negative".into(),
            });
        }
        if p.mortgage_rate < Decimal::ZERO {
            return Err(HoldwiseError::InvalidInput {
                field: "mortgage_rate".into(),
                reason: "Mortgage rate cannot be negative".into(),
            });
        }
        if p.units.is_empty() {
            return Err(HoldwiseError::InvalidInput {
                field: "units".into(),
                reason: "Property must have at least one unit".into(),
            });
        }
        for unit in &p.units {
            if unit.monthly_rent < Decimal::ZERO {
                return Err(HoldwiseError::InvalidInput {
                    field: "monthly_rent".into(),
                    reason: format!("Unit '{}' has negative rent", unit.label),
                });
            }
        }

        let e = &self.expenses;
        for (field, value) in [
            ("maintenance_rate", e.maintenance_rate),
            ("vacancy_rate", e.vacancy_rate),
            ("management_rate", e.management_rate),
            ("selling_cost_rate", self.sale.selling_cost_rate),
            ("capital_gains_tax_rate", self.sale.capital_gains_tax_rate),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(HoldwiseError::InvalidInput {
                    field: field.into(),
                    reason: "Rate must be between 0 and 1".into(),
                });
            }
        }
        for (field, value) in [
            ("monthly_property_tax", e.monthly_property_tax),
            ("monthly_insurance", e.monthly_insurance),
            ("monthly_mortgage_payment", e.monthly_mortgage_payment),
            ("monthly_escrow", e.monthly_escrow),
            ("other_monthly_costs", e.other_monthly_costs),
        ] {
            if value < Decimal::ZERO {
                return Err(HoldwiseError::InvalidInput {
                    field: field.into(),
                    reason: "Monthly cost cannot be negative".into(),
                });
            }
        }
        if e.monthly_escrow > e.monthly_mortgage_payment {
            return Err(HoldwiseError::InvalidInput {
                field: "monthly_escrow".into(),
                reason: "Escrow portion cannot exceed the total mortgage payment".into(),
            });
        }

        if self.market.discount_rate <= dec!(-1) {
            return Err(HoldwiseError::InvalidInput {
                field: "discount_rate".into(),
                reason: "Discount rate must be greater than -100%".into(),
            });
        }

        // --- Warnings for unusual but legal inputs ---
        if e.vacancy_rate > dec!(0.15) {
            warnings.push(format!(
                "Vacancy rate {:.1}% exceeds 15% — above typical market norms",
                e.vacancy_rate * dec!(100)
            ));
        }
        if p.mortgage_balance > p.current_value {
            warnings.push(
                "Mortgage balance exceeds current value — property is underwater".into(),
            );
        }
        if p.total_monthly_rent().is_zero() {
            warnings.push("All units are vacant — rental path earns no income".into());
        }
        if self.analysis_years > 30 {
            warnings.push(format!(
                "Horizon of {} years is unusually long — distant-year projections are coarse",
                self.analysis_years
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Two-unit rental: $950k duplex with $554.8k left on a 3.875% note.
/// Shared by unit tests across the crate.
#[cfg(test)]
pub(crate) fn sample_parameters() -> AnalysisParameters {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_monthly_rent() {
        let params = sample_parameters();
        assert_eq!(params.property.total_monthly_rent(), dec!(4500));
    }

    #[test]
    fn test_capital_gain() {
        let params = sample_parameters();
        // 950000 - 780000 = 170000
        assert_eq!(params.property.capital_gain(), dec!(170000));
    }

    #[test]
    fn test_principal_and_interest_excludes_escrow() {
        let params = sample_parameters();
        // 3583.80 - 800 = 2783.80
        assert_eq!(
            params.expenses.monthly_principal_and_interest(),
            dec!(2783.80)
        );
    }

    #[test]
    fn test_validate_accepts_sample() {
        let params = sample_parameters();
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_ok());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_horizon() {
        let mut params = sample_parameters();
        params.analysis_years = 0;
        let mut warnings = Vec::new();
        match params.validate(&mut warnings) {
            Err(HoldwiseError::InvalidInput { field, .. }) => {
                assert_eq!(field, "analysis_years");
            }
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_horizon_over_fifty() {
        let mut params = sample_parameters();
        params.analysis_years = 51;
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_rate() {
        let mut params = sample_parameters();
        params.expenses.maintenance_rate = dec!(1.5);
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_units() {
        let mut params = sample_parameters();
        params.property.units.clear();
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_validate_rejects_negative_rent() {
        let mut params = sample_parameters();
        params.property.units[0].monthly_rent = dec!(-100);
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_validate_rejects_escrow_above_payment() {
        let mut params = sample_parameters();
        params.expenses.monthly_escrow = dec!(4000);
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_validate_warns_on_underwater_property() {
        let mut params = sample_parameters();
        params.property.mortgage_balance = dec!(1000000);
        let mut warnings = Vec::new();
        params.validate(&mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("underwater")));
    }

    #[test]
    fn test_validate_warns_on_all_vacant() {
        let mut params = sample_parameters();
        for unit in &mut params.property.units {
            unit.monthly_rent = Decimal::ZERO;
        }
        let mut warnings = Vec::new();
        params.validate(&mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("vacant")));
    }
}
