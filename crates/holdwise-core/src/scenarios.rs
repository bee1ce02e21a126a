//! Named what-if overrides: a catalog of typed scenario records and the pure
//! merge that produces adjusted `AnalysisParameters` from a base set. The
//! base is never mutated, so several selections can be evaluated side by
//! side from one set of inputs.

use serde::{Deserialize, Serialize};

use crate::error::HoldwiseError;
use crate::model::AnalysisParameters;
use crate::tax::TaxPolicy;
use crate::terminal::effective_immediate_sale_rate;
use crate::types::{Money, Rate};
use crate::HoldwiseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sale-price and appreciation override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyScenario {
    pub name: String,
    pub description: String,
    /// Replaces the property's current market value
    pub sale_price: Money,
    pub appreciation_rate: Rate,
    pub holding_period_years: u32,
    pub selling_cost_rate: Rate,
}

/// Rent-roll override. `unit_rents` must match the property's unit count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalScenario {
    pub name: String,
    pub description: String,
    pub unit_rents: Vec<Money>,
    pub vacancy_rate: Rate,
    pub management_rate: Rate,
    pub rent_growth_rate: Rate,
}

/// Index-fund return override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockScenario {
    pub name: String,
    pub description: String,
    pub annual_return: Rate,
}

/// Tax-law override. Replaces the whole policy and refreshes the blended
/// sale rate on application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxScenario {
    pub name: String,
    pub description: String,
    pub policy: TaxPolicy,
}

/// A named bundle referencing one scenario of each kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedScenario {
    pub name: String,
    pub description: String,
    pub property: String,
    pub rental: String,
    pub stock: String,
    pub tax: String,
}

/// Partial selection merged onto base parameters. Absent kinds leave the
/// base untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rental: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<String>,
}

/// Income classes with distinct effective tax rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeType {
    RentalIncome,
    CapitalGains,
    DepreciationRecapture,
}

/// Scenario counts per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCounts {
    pub property: usize,
    pub rental: usize,
    pub stock: usize,
    pub tax: usize,
    pub combined: usize,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// In-memory scenario store, keyed by name within each kind. Insertion
/// order is preserved; adding a scenario under an existing name replaces it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    property: Vec<PropertyScenario>,
    rental: Vec<RentalScenario>,
    stock: Vec<StockScenario>,
    tax: Vec<TaxScenario>,
    combined: Vec<CombinedScenario>,
}

fn upsert<T, F>(list: &mut Vec<T>, item: T, same_name: F)
where
    F: Fn(&T) -> bool,
{
    match list.iter_mut().find(|existing| same_name(existing)) {
        Some(slot) => *slot = item,
        None => list.push(item),
    }
}

fn not_found(kind: &str, name: &str) -> HoldwiseError {
    HoldwiseError::ScenarioNotFound {
        kind: kind.into(),
        name: name.into(),
    }
}

impl ScenarioCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(&mut self, scenario: PropertyScenario) {
        let name = scenario.name.clone();
        upsert(&mut self.property, scenario, |s| s.name == name);
    }

    pub fn add_rental(&mut self, scenario: RentalScenario) {
        let name = scenario.name.clone();
        upsert(&mut self.rental, scenario, |s| s.name == name);
    }

    pub fn add_stock(&mut self, scenario: StockScenario) {
        let name = scenario.name.clone();
        upsert(&mut self.stock, scenario, |s| s.name == name);
    }

    pub fn add_tax(&mut self, scenario: TaxScenario) {
        let name = scenario.name.clone();
        upsert(&mut self.tax, scenario, |s| s.name == name);
    }

    pub fn add_combined(&mut self, scenario: CombinedScenario) {
        let name = scenario.name.clone();
        upsert(&mut self.combined, scenario, |s| s.name == name);
    }

    pub fn property_scenarios(&self) -> &[PropertyScenario] {
        &self.property
    }

    pub fn rental_scenarios(&self) -> &[RentalScenario] {
        &self.rental
    }

    pub fn stock_scenarios(&self) -> &[StockScenario] {
        &self.stock
    }

    pub fn tax_scenarios(&self) -> &[TaxScenario] {
        &self.tax
    }

    pub fn combined_scenarios(&self) -> &[CombinedScenario] {
        &self.combined
    }

    pub fn property(&self, name: &str) -> HoldwiseResult<&PropertyScenario> {
        self.property
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found("property", name))
    }

    pub fn rental(&self, name: &str) -> HoldwiseResult<&RentalScenario> {
        self.rental
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found("rental", name))
    }

    pub fn stock(&self, name: &str) -> HoldwiseResult<&StockScenario> {
        self.stock
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found("stock", name))
    }

    pub fn tax(&self, name: &str) -> HoldwiseResult<&TaxScenario> {
        self.tax
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found("tax", name))
    }

    pub fn combined(&self, name: &str) -> HoldwiseResult<&CombinedScenario> {
        self.combined
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found("combined", name))
    }

    pub fn summary(&self) -> ScenarioCounts {
        ScenarioCounts {
            property: self.property.len(),
            rental: self.rental.len(),
            stock: self.stock.len(),
            tax: self.tax.len(),
            combined: self.combined.len(),
        }
    }

    /// Merge the selected overrides onto a copy of `base`. The base is left
    /// untouched. Kinds are applied property-first so a tax override's
    /// blended sale rate sees the scenario's sale price.
    pub fn apply(
        &self,
        base: &AnalysisParameters,
        selection: &ScenarioSelection,
    ) -> HoldwiseResult<AnalysisParameters> {
        let mut params = base.clone();

        if let Some(name) = &selection.property {
            apply_property(&mut params, self.property(name)?);
        }
        if let Some(name) = &selection.rental {
            apply_rental(&mut params, self.rental(name)?)?;
        }
        if let Some(name) = &selection.stock {
            params.market.stock_return_rate = self.stock(name)?.annual_return;
        }
        if let Some(name) = &selection.tax {
            apply_tax(&mut params, self.tax(name)?);
        }

        Ok(params)
    }

    /// Resolve a combined scenario to its four members and apply them all.
    pub fn apply_combined(
        &self,
        base: &AnalysisParameters,
        name: &str,
    ) -> HoldwiseResult<AnalysisParameters> {
        let combined = self.combined(name)?;
        let selection = ScenarioSelection {
            property: Some(combined.property.clone()),
            rental: Some(combined.rental.clone()),
            stock: Some(combined.stock.clone()),
            tax: Some(combined.tax.clone()),
        };
        self.apply(base, &selection)
    }

    /// Effective combined rate a tax scenario charges on one income class.
    pub fn effective_tax_rate(&self, name: &str, income: IncomeType) -> HoldwiseResult<Rate> {
        let policy = &self.tax(name)?.policy;
        Ok(match income {
            IncomeType::RentalIncome => policy.combined_ordinary(),
            IncomeType::CapitalGains => policy.combined_capital_gains(),
            IncomeType::DepreciationRecapture => policy.combined_recapture(),
        })
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

fn apply_property(params: &mut AnalysisParameters, scenario: &PropertyScenario) {
    params.property.current_value = scenario.sale_price;
    params.market.appreciation_rate = scenario.appreciation_rate;
    params.sale.selling_cost_rate = scenario.selling_cost_rate;
    params.analysis_years = scenario.holding_period_years;
}

fn apply_rental(params: &mut AnalysisParameters, scenario: &RentalScenario) -> HoldwiseResult<()> {
    let units = &mut params.property.units;
    if scenario.unit_rents.len() != units.len() {
        return Err(HoldwiseError::InvalidInput {
            field: "unit_rents".into(),
            reason: format!(
                "Scenario '{}' supplies {} rents for a {}-unit property",
                scenario.name,
                scenario.unit_rents.len(),
                units.len()
            ),
        });
    }

    for (unit, rent) in units.iter_mut().zip(&scenario.unit_rents) {
        unit.monthly_rent = *rent;
    }
    params.expenses.vacancy_rate = scenario.vacancy_rate;
    params.expenses.management_rate = scenario.management_rate;
    params.market.rent_growth_rate = scenario.rent_growth_rate;
    Ok(())
}

/// Swaps the tax policy and keeps the caller-facing blended sale rate in
/// sync with what an immediate sale would actually pay under it.
fn apply_tax(params: &mut AnalysisParameters, scenario: &TaxScenario) {
    params.tax = scenario.policy.clone();
    params.sale.capital_gains_tax_rate =
        effective_immediate_sale_rate(params.property.capital_gain(), &params.tax);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
