use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::model::AnalysisParameters;
use crate::tax::TaxPolicy;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::HoldwiseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Net-of-tax proceeds from liquidating a path at the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalValueResult {
    /// Property value or stock balance at the horizon
    pub final_asset_value: Money,
    pub selling_costs: Money,
    pub remaining_mortgage_balance: Money,
    pub capital_gains_tax: Money,
    /// Zero when deferred through a like-kind exchange
    pub depreciation_recapture_tax: Money,
    pub net_sale_proceeds: Money,
    pub tax_deferred_exchange: bool,
}

/// Detailed sell-today breakdown. Funds the stock path's initial investment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateSaleBreakdown {
    pub gross_sale_price: Money,
    pub selling_costs: Money,
    pub mortgage_payoff: Money,
    /// Gain against the tax basis; may be negative
    pub capital_gain: Money,
    /// Portion of the gain sheltered by the primary-residence exclusion
    pub exclusion_applied: Money,
    pub federal_taxable_gain: Money,
    pub federal_tax: Money,
    pub state_tax: Money,
    pub total_tax: Money,
    pub net_proceeds: Money,
}

// ---------------------------------------------------------------------------
// Immediate sale
// ---------------------------------------------------------------------------

/// Sell-today valuation with the primary-residence exclusion applied
/// federal-only. The exclusion exists here and nowhere else: a future sale
/// after years of rental service no longer qualifies.
pub fn immediate_sale(
    params: &AnalysisParameters,
) -> HoldwiseResult<ComputationOutput<ImmediateSaleBreakdown>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    params.validate(&mut warnings)?;

    let breakdown = immediate_sale_breakdown(params);
    if breakdown.net_proceeds <= Decimal::ZERO {
        warnings.push(
            "Immediate sale nets nothing after costs, payoff, and taxes".into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Immediate Sale Net Proceeds",
        params,
        warnings,
        elapsed,
        breakdown,
    ))
}

/// The pure sell-today computation shared by the stock path, the annual
/// variant, and the scenario layer.
pub(crate) fn immediate_sale_breakdown(params: &AnalysisParameters) -> ImmediateSaleBreakdown {
    let property = &params.property;
    let tax = &params.tax;

    let gross_sale_price = property.current_value;
    let selling_costs = gross_sale_price * params.sale.selling_cost_rate;
    let mortgage_payoff = property.mortgage_balance;
    let capital_gain = property.capital_gain();

    let exclusion = tax.primary_residence_exclusion.unwrap_or(Decimal::ZERO);
    let exclusion_applied = capital_gain.max(Decimal::ZERO).min(exclusion);
    let federal_taxable_gain = (capital_gain - exclusion).max(Decimal::ZERO);
    let federal_tax = federal_taxable_gain * tax.federal_capital_gains;
    // The state taxes the full gain; no exclusion applies
    let state_tax = capital_gain * tax.state_capital_gains;
    let total_tax = federal_tax + state_tax;

    ImmediateSaleBreakdown {
        gross_sale_price,
        selling_costs,
        mortgage_payoff,
        capital_gain,
        exclusion_applied,
        federal_taxable_gain,
        federal_tax,
        state_tax,
        total_tax,
        net_proceeds: gross_sale_price - selling_costs - mortgage_payoff - total_tax,
    }
}

/// Effective blended rate on an immediate sale: total tax over the gain.
/// Falls back to the plain combined rate when the gain is non-positive.
pub(crate) fn effective_immediate_sale_rate(gain: Money, tax: &TaxPolicy) -> Rate {
    if gain <= Decimal::ZERO {
        return tax.combined_capital_gains();
    }
    match tax.primary_residence_exclusion {
        Some(exclusion) => {
            let federal_taxable = (gain - exclusion).max(Decimal::ZERO);
            let total = federal_taxable * tax.federal_capital_gains + gain * tax.state_capital_gains;
            total / gain
        }
        None => tax.combined_capital_gains(),
    }
}

// ---------------------------------------------------------------------------
// Horizon sale
// ---------------------------------------------------------------------------

/// Net proceeds of selling the rental at the horizon. Capital gains are
/// measured against today's market value (today's unrealized gain belongs to
/// the sell-now alternative, not this one), and recapture is charged on the
/// accumulated depreciation from the capped schedule. A like-kind exchange
/// defers both tax terms to zero.
pub(crate) fn rental_terminal_value(
    final_property_value: Money,
    original_value: Money,
    final_mortgage_balance: Money,
    accumulated_depreciation: Money,
    selling_cost_rate: Rate,
    tax: &TaxPolicy,
    like_kind_exchange: bool,
) -> TerminalValueResult {
    let selling_costs = final_property_value * selling_cost_rate;

    let (capital_gains_tax, depreciation_recapture_tax) = if like_kind_exchange {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let appreciation = final_property_value - original_value;
        (
            appreciation * tax.combined_capital_gains(),
            accumulated_depreciation * tax.combined_recapture(),
        )
    };

    TerminalValueResult {
        final_asset_value: final_property_value,
        selling_costs,
        remaining_mortgage_balance: final_mortgage_balance,
        capital_gains_tax,
        depreciation_recapture_tax,
        net_sale_proceeds: final_property_value
            - selling_costs
            - final_mortgage_balance
            - capital_gains_tax
            - depreciation_recapture_tax,
        tax_deferred_exchange: like_kind_exchange,
    }
}

/// Net proceeds of liquidating the stock position at the horizon. No selling
/// costs, no recapture; gains are taxed at the combined capital-gains rate.
pub(crate) fn stock_terminal_value(
    final_value: Money,
    initial_investment: Money,
    tax: &TaxPolicy,
) -> TerminalValueResult {
    let gains = final_value - initial_investment;
    let capital_gains_tax = gains * tax.combined_capital_gains();

    TerminalValueResult {
        final_asset_value: final_value,
        selling_costs: Decimal::ZERO,
        remaining_mortgage_balance: Decimal::ZERO,
        capital_gains_tax,
        depreciation_recapture_tax: Decimal::ZERO,
        net_sale_proceeds: final_value - capital_gains_tax,
        tax_deferred_exchange: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
