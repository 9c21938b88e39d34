//! Cost calculation engine.
//!
//! Turns a template and a volume into costed line items:
//!
//! ```text
//! quantity = coefficient * volume
//! total    = quantity * current unit price
//! ```
//!
//! Materials come first, then labor, each in component id order. A component whose
//! catalog row has disappeared is skipped and reported as a [`StaleReference`]; it
//! never fails the calculation.

use crate::{
    core::{
        catalog::{self, CatalogEntry},
        require_positive,
        template::{self, TemplateComponent},
    },
    entities::ItemKind,
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// One costed line, ready to be written to the snapshot store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCostLine {
    /// Catalog the item comes from
    pub kind: ItemKind,
    /// Material or labor type id
    pub item_id: i64,
    /// Catalog name at calculation time
    pub item_name: String,
    /// Template coefficient at calculation time
    pub coefficient: f64,
    /// `coefficient * volume`
    pub quantity_needed: f64,
    /// Catalog price at calculation time
    pub unit_price: f64,
    /// `quantity_needed * unit_price`
    pub total_cost: f64,
}

/// A template component that points at a catalog row which no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleReference {
    /// Catalog the component points into
    pub kind: ItemKind,
    /// Component primary key
    pub component_id: i64,
    /// The missing catalog id
    pub item_id: i64,
}

/// Result of pricing one template at one volume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostCalculation {
    /// Line items in output order
    pub lines: Vec<NewCostLine>,
    /// Components that were skipped
    pub stale_references: Vec<StaleReference>,
}

impl CostCalculation {
    /// Sum of all line totals.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.lines.iter().map(|line| line.total_cost).sum()
    }
}

/// Quantity and total cost of one component: `(coefficient * volume, quantity * price)`.
#[must_use]
pub fn cost_line(coefficient: f64, volume: f64, unit_price: f64) -> (f64, f64) {
    let quantity = coefficient * volume;
    (quantity, quantity * unit_price)
}

/// Rejects volumes that are not finite and strictly positive.
pub fn validate_volume(volume: f64) -> Result<f64> {
    require_positive(volume)
}

/// Prices components against already-loaded catalog entries.
///
/// `materials` and `labor` are keyed by catalog id. Output is ordered materials
/// first, then labor, each by component id, whatever order `components` is in.
/// A quantity or total that overflows to infinity or NaN is `InvalidAmount`.
pub fn price_components(
    components: &[TemplateComponent],
    materials: &HashMap<i64, CatalogEntry>,
    labor: &HashMap<i64, CatalogEntry>,
    volume: f64,
) -> Result<CostCalculation> {
    let mut ordered: Vec<&TemplateComponent> = components.iter().collect();
    ordered.sort_by_key(|component| (component.kind, component.id));

    let mut calculation = CostCalculation::default();
    for component in ordered {
        let entries = match component.kind {
            ItemKind::Material => materials,
            ItemKind::Labor => labor,
        };
        let Some(entry) = entries.get(&component.item_id) else {
            calculation.stale_references.push(StaleReference {
                kind: component.kind,
                component_id: component.id,
                item_id: component.item_id,
            });
            continue;
        };

        let (quantity_needed, total_cost) = cost_line(component.coefficient, volume, entry.price);
        if !quantity_needed.is_finite() {
            return Err(Error::InvalidAmount {
                amount: quantity_needed,
            });
        }
        if !total_cost.is_finite() {
            return Err(Error::InvalidAmount { amount: total_cost });
        }
        calculation.lines.push(NewCostLine {
            kind: component.kind,
            item_id: component.item_id,
            item_name: entry.name.clone(),
            coefficient: component.coefficient,
            quantity_needed,
            unit_price: entry.price,
            total_cost,
        });
    }
    Ok(calculation)
}

/// Calculates the line items for `volume` units of a template at current prices.
///
/// Returns `NotFound` if the template does not exist. Missing catalog rows are
/// logged and listed in [`CostCalculation::stale_references`].
#[instrument(skip(db))]
pub async fn calculate_line_items<C>(db: &C, template_id: i64, volume: f64) -> Result<CostCalculation>
where
    C: ConnectionTrait,
{
    let volume = validate_volume(volume)?;
    if template::get_template_by_id(db, template_id).await?.is_none() {
        return Err(Error::NotFound {
            entity: "template",
            id: template_id,
        });
    }

    let components = template::get_components(db, template_id).await?;
    let ids_of = |kind: ItemKind| -> Vec<i64> {
        components
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.item_id)
            .collect()
    };
    let materials =
        catalog::find_catalog_entries(db, ItemKind::Material, &ids_of(ItemKind::Material)).await?;
    let labor = catalog::find_catalog_entries(db, ItemKind::Labor, &ids_of(ItemKind::Labor)).await?;

    let calculation = price_components(&components, &materials, &labor, volume)?;
    for stale in &calculation.stale_references {
        warn!(
            "Template {template_id} {} component {} references missing item {}; skipped",
            stale.kind, stale.component_id, stale.item_id
        );
    }
    debug!(
        "Template {template_id} x {volume}: {} lines, total {}",
        calculation.lines.len(),
        calculation.total_cost()
    );
    Ok(calculation)
}
