//! Cost snapshot store.
//!
//! Each work item's cost line items form one snapshot. A snapshot is only ever
//! replaced as a whole, inside the write transaction of the work-item write that
//! triggered it, so readers see either the old lines or the new ones.

use crate::{
    core::{
        catalog,
        costing::{self, CostCalculation, NewCostLine},
    },
    entities::{ItemCost, ItemKind, item_cost},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, instrument};

/// A stored line item plus the current unit of its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemView {
    /// The frozen line item
    pub line: item_cost::Model,
    /// Unit of the catalog entry today; empty if the entry is gone
    pub unit: String,
}

/// Replaces every line item of a work item with `lines`.
///
/// An empty slice clears the snapshot. Must run inside the caller's write transaction.
pub async fn replace_snapshot<C>(db: &C, work_item_id: i64, lines: &[NewCostLine]) -> Result<()>
where
    C: ConnectionTrait,
{
    let removed = delete_by_work_item(db, work_item_id).await?;
    if lines.is_empty() {
        debug!("Cleared {removed} cost lines of work item {work_item_id}");
        return Ok(());
    }

    let timestamp = crate::core::now();
    let models = lines.iter().map(|line| item_cost::ActiveModel {
        work_item_id: Set(work_item_id),
        item_kind: Set(line.kind),
        item_id: Set(line.item_id),
        item_name: Set(line.item_name.clone()),
        coefficient: Set(line.coefficient),
        quantity_needed: Set(line.quantity_needed),
        unit_price_at_creation: Set(line.unit_price),
        total_cost: Set(line.total_cost),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    });
    ItemCost::insert_many(models).exec(db).await?;

    debug!(
        "Replaced {removed} cost lines of work item {work_item_id} with {}",
        lines.len()
    );
    Ok(())
}

/// Line items of one work item in insertion order, with current catalog units.
pub async fn find_by_work_item<C>(db: &C, work_item_id: i64) -> Result<Vec<LineItemView>>
where
    C: ConnectionTrait,
{
    let lines = ItemCost::find()
        .filter(item_cost::Column::WorkItemId.eq(work_item_id))
        .order_by_asc(item_cost::Column::Id)
        .all(db)
        .await?;

    let ids_of = |kind: ItemKind| -> Vec<i64> {
        lines
            .iter()
            .filter(|line| line.item_kind == kind)
            .map(|line| line.item_id)
            .collect()
    };
    let materials =
        catalog::find_catalog_entries(db, ItemKind::Material, &ids_of(ItemKind::Material)).await?;
    let labor = catalog::find_catalog_entries(db, ItemKind::Labor, &ids_of(ItemKind::Labor)).await?;

    Ok(lines
        .into_iter()
        .map(|line| {
            let entries = match line.item_kind {
                ItemKind::Material => &materials,
                ItemKind::Labor => &labor,
            };
            let unit = entries
                .get(&line.item_id)
                .map(|entry| entry.unit.clone())
                .unwrap_or_default();
            LineItemView { line, unit }
        })
        .collect())
}

/// Deletes every line item of a work item, returning how many were removed.
pub async fn delete_by_work_item<C>(db: &C, work_item_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = ItemCost::delete_many()
        .filter(item_cost::Column::WorkItemId.eq(work_item_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Runs the calculation engine and stores its output as the work item's snapshot.
///
/// Without a template the snapshot is cleared and an empty calculation is returned.
#[instrument(skip(db))]
pub async fn calculate_and_replace<C>(
    db: &C,
    work_item_id: i64,
    template_id: Option<i64>,
    volume: f64,
) -> Result<CostCalculation>
where
    C: ConnectionTrait,
{
    let calculation = match template_id {
        Some(template_id) => costing::calculate_line_items(db, template_id, volume).await?,
        None => CostCalculation::default(),
    };
    replace_snapshot(db, work_item_id, &calculation.lines).await?;
    Ok(calculation)
}
