//! Aggregation engine - material and labor summaries over cost snapshots.
//!
//! Line items are grouped by `(kind, catalog item id)` and their quantities and costs
//! summed. Names and units shown on a summary row come from the catalog as it is
//! now; a row whose catalog entry has been deleted falls back to the name frozen on
//! its line items and an empty unit.

use crate::{
    core::catalog::{self, CatalogEntry},
    entities::{ItemCost, ItemKind, WorkItem, item_cost, project, work_item},
    errors::Result,
};
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, prelude::*};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, instrument};

/// One aggregated row: everything a scope needs of one catalog item.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Material or labor type id
    pub item_id: i64,
    /// Current catalog name (or the frozen line-item name if the entry is gone)
    pub item_name: String,
    /// Σ quantity needed
    pub total_quantity: f64,
    /// Current catalog unit, empty if the entry is gone
    pub unit: String,
    /// Which catalog the item is in
    pub kind: ItemKind,
    /// Σ total cost
    pub total_cost: f64,
}

/// One contributing line of a detailed summary row.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemBreakdown {
    /// Work item the line belongs to
    pub work_item_id: i64,
    /// Its description
    pub work_item_description: String,
    /// Quantity on this line
    pub quantity: f64,
    /// Cost on this line
    pub cost: f64,
    /// Volume of the work item
    pub volume: f64,
    /// Coefficient frozen on the line
    pub coefficient: f64,
}

/// A summary row with its per-work-item breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedSummary {
    /// The aggregated row
    pub summary: Summary,
    /// Contributing lines, by work item id
    pub breakdown: Vec<WorkItemBreakdown>,
}

/// Outcome of [`summarize_project_with_fallback`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectSummary {
    /// The detailed query succeeded
    Detailed(Vec<DetailedSummary>),
    /// The detailed query failed and the plain form was returned instead
    Plain(Vec<Summary>),
}

impl ProjectSummary {
    /// Summary rows regardless of which form was produced.
    #[must_use]
    pub fn rows(&self) -> Vec<&Summary> {
        match self {
            Self::Detailed(rows) => rows.iter().map(|row| &row.summary).collect(),
            Self::Plain(rows) => rows.iter().collect(),
        }
    }

    /// True if the detailed form could not be built.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Plain(_))
    }
}

struct Group {
    item_name: String,
    total_quantity: f64,
    total_cost: f64,
    breakdown: Vec<WorkItemBreakdown>,
}

async fn current_entries<C>(
    db: &C,
    lines: &[item_cost::Model],
) -> Result<HashMap<(ItemKind, i64), CatalogEntry>>
where
    C: ConnectionTrait,
{
    let ids_of = |kind: ItemKind| -> Vec<i64> {
        let mut ids: Vec<i64> = lines
            .iter()
            .filter(|line| line.item_kind == kind)
            .map(|line| line.item_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    let mut entries = HashMap::new();
    for kind in [ItemKind::Material, ItemKind::Labor] {
        let found = catalog::find_catalog_entries(db, kind, &ids_of(kind)).await?;
        entries.extend(found.into_iter().map(|(id, entry)| ((kind, id), entry)));
    }
    Ok(entries)
}

/// Groups lines by catalog item and orders the rows by (kind, name, id).
fn aggregate<'a>(
    lines: impl IntoIterator<Item = (&'a item_cost::Model, Option<&'a work_item::Model>)>,
    entries: &HashMap<(ItemKind, i64), CatalogEntry>,
) -> Vec<DetailedSummary> {
    let mut groups: BTreeMap<(ItemKind, i64), Group> = BTreeMap::new();
    for (line, work_item) in lines {
        let group = groups
            .entry((line.item_kind, line.item_id))
            .or_insert_with(|| Group {
                item_name: line.item_name.clone(),
                total_quantity: 0.0,
                total_cost: 0.0,
                breakdown: Vec::new(),
            });
        group.total_quantity += line.quantity_needed;
        group.total_cost += line.total_cost;
        if let Some(work_item) = work_item {
            group.breakdown.push(WorkItemBreakdown {
                work_item_id: work_item.id,
                work_item_description: work_item.description.clone(),
                quantity: line.quantity_needed,
                cost: line.total_cost,
                volume: work_item.volume,
                coefficient: line.coefficient,
            });
        }
    }

    let mut rows: Vec<DetailedSummary> = groups
        .into_iter()
        .map(|((kind, item_id), mut group)| {
            let (item_name, unit) = entries.get(&(kind, item_id)).map_or_else(
                || (group.item_name.clone(), String::new()),
                |entry| (entry.name.clone(), entry.unit.clone()),
            );
            group.breakdown.sort_by_key(|entry| entry.work_item_id);
            DetailedSummary {
                summary: Summary {
                    item_id,
                    item_name,
                    total_quantity: group.total_quantity,
                    unit,
                    kind,
                    total_cost: group.total_cost,
                },
                breakdown: group.breakdown,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.summary.kind, &a.summary.item_name, a.summary.item_id).cmp(&(
            b.summary.kind,
            &b.summary.item_name,
            b.summary.item_id,
        ))
    });
    rows
}

async fn summarize_lines<C>(db: &C, lines: &[item_cost::Model]) -> Result<Vec<Summary>>
where
    C: ConnectionTrait,
{
    let entries = current_entries(db, lines).await?;
    Ok(aggregate(lines.iter().map(|line| (line, None)), &entries)
        .into_iter()
        .map(|row| row.summary)
        .collect())
}

/// Summarizes every line item in every project owned by `owner_id`.
#[instrument(skip(db))]
pub async fn summarize_all<C>(db: &C, owner_id: i64) -> Result<Vec<Summary>>
where
    C: ConnectionTrait,
{
    let lines = ItemCost::find()
        .join(JoinType::InnerJoin, item_cost::Relation::WorkItem.def())
        .join(JoinType::InnerJoin, work_item::Relation::Project.def())
        .filter(project::Column::OwnerId.eq(owner_id))
        .order_by_asc(item_cost::Column::Id)
        .all(db)
        .await?;

    debug!("Summarizing {} cost lines for owner {owner_id}", lines.len());
    summarize_lines(db, &lines).await
}

/// Summarizes the line items of one project.
#[instrument(skip(db))]
pub async fn summarize_project<C>(db: &C, project_id: i64) -> Result<Vec<Summary>>
where
    C: ConnectionTrait,
{
    let lines = ItemCost::find()
        .join(JoinType::InnerJoin, item_cost::Relation::WorkItem.def())
        .filter(work_item::Column::ProjectId.eq(project_id))
        .order_by_asc(item_cost::Column::Id)
        .all(db)
        .await?;
    summarize_lines(db, &lines).await
}

/// Summarizes one project with a breakdown of the lines behind each row.
#[instrument(skip(db))]
pub async fn summarize_project_detailed<C>(db: &C, project_id: i64) -> Result<Vec<DetailedSummary>>
where
    C: ConnectionTrait,
{
    let pairs = ItemCost::find()
        .find_also_related(WorkItem)
        .filter(work_item::Column::ProjectId.eq(project_id))
        .order_by_asc(item_cost::Column::Id)
        .all(db)
        .await?;

    let lines: Vec<item_cost::Model> = pairs.iter().map(|(line, _)| line.clone()).collect();
    let entries = current_entries(db, &lines).await?;
    Ok(aggregate(
        pairs
            .iter()
            .map(|(line, work_item)| (line, work_item.as_ref())),
        &entries,
    ))
}

/// Tries the detailed summary and falls back to the plain one if it fails.
///
/// The fallback is logged and visible in the returned variant. An error from the
/// plain query is returned as is.
pub async fn summarize_project_with_fallback<C>(db: &C, project_id: i64) -> Result<ProjectSummary>
where
    C: ConnectionTrait,
{
    match summarize_project_detailed(db, project_id).await {
        Ok(rows) => Ok(ProjectSummary::Detailed(rows)),
        Err(e) => {
            error!("Detailed summary of project {project_id} failed, using plain summary: {e}");
            Ok(ProjectSummary::Plain(summarize_project(db, project_id).await?))
        }
    }
}

/// Σ total cost of every line item in one project; 0 for an empty project.
pub async fn project_total_cost<C>(db: &C, project_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let totals: Vec<f64> = ItemCost::find()
        .select_only()
        .column(item_cost::Column::TotalCost)
        .join(JoinType::InnerJoin, item_cost::Relation::WorkItem.def())
        .filter(work_item::Column::ProjectId.eq(project_id))
        .into_tuple::<f64>()
        .all(db)
        .await?;
    Ok(totals.iter().sum())
}

/// Σ total cost across every project owned by `owner_id`.
pub async fn portfolio_total_cost<C>(db: &C, owner_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let totals: Vec<f64> = ItemCost::find()
        .select_only()
        .column(item_cost::Column::TotalCost)
        .join(JoinType::InnerJoin, item_cost::Relation::WorkItem.def())
        .join(JoinType::InnerJoin, work_item::Relation::Project.def())
        .filter(project::Column::OwnerId.eq(owner_id))
        .into_tuple::<f64>()
        .all(db)
        .await?;
    Ok(totals.iter().sum())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{catalog, deletion, project as projects, template},
        errors::Error,
        test_utils::*,
    };
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    #[tokio::test]
    async fn test_same_material_is_grouped() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let tid = Some(priced.template.id);
        create_test_work_item(&store, project.id, category.id, 2.0, tid).await?;
        create_test_work_item(&store, project.id, category.id, 3.0, tid).await?;

        let rows = summarize_project(store.reader(), project.id).await?;
        assert_eq!(rows.len(), 2);

        let cement = &rows[0];
        assert_eq!(cement.kind, ItemKind::Material);
        assert_eq!(cement.item_id, priced.material.id);
        assert_eq!(cement.unit, "kg");
        assert_close(cement.total_quantity, 2.0 * 2.0 + 2.0 * 3.0);
        assert_close(cement.total_cost, 10.0 * 100.0);

        let mason = &rows[1];
        assert_eq!(mason.kind, ItemKind::Labor);
        assert_close(mason.total_quantity, 0.5 * 5.0);
        assert_close(mason.total_cost, 2.5 * 150.0);

        assert_close(project_total_cost(store.reader(), project.id).await?, 1375.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rows_sorted_by_kind_then_name() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let template = create_test_template(&store, "Mixed").await?;
        let zinc = create_test_material(&store, "Zinc", 1.0).await?;
        let brick = create_test_material(&store, "Brick", 1.0).await?;
        let helper = create_test_labor(&store, "Helper", 1.0).await?;
        template::add_labor_component(&store, TEST_OWNER, template.id, helper.id, 1.0).await?;
        template::add_material_component(&store, TEST_OWNER, template.id, zinc.id, 1.0).await?;
        template::add_material_component(&store, TEST_OWNER, template.id, brick.id, 1.0).await?;
        create_test_work_item(&store, project.id, category.id, 1.0, Some(template.id)).await?;

        let rows = summarize_project(store.reader(), project.id).await?;
        let names: Vec<&str> = rows.iter().map(|r| r.item_name.as_str()).collect();
        assert_eq!(names, vec!["Brick", "Zinc", "Helper"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_names_come_from_live_catalog() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let item = create_test_work_item(
            &store,
            project.id,
            category.id,
            1.0,
            Some(priced.template.id),
        )
        .await?;

        catalog::update_material(&store, TEST_OWNER, priced.material.id, "PC cement", "sak", 100.0)
            .await?;

        let rows = summarize_project(store.reader(), project.id).await?;
        assert_eq!(rows[0].item_name, "PC cement");
        assert_eq!(rows[0].unit, "sak");

        let lines = crate::core::snapshot::find_by_work_item(store.reader(), item.id).await?;
        assert_eq!(lines[0].line.item_name, "Cement");
        Ok(())
    }

    #[tokio::test]
    async fn test_detailed_breakdown() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let tid = Some(priced.template.id);
        let first = create_test_work_item(&store, project.id, category.id, 2.0, tid).await?;
        let second = create_test_work_item(&store, project.id, category.id, 4.0, tid).await?;

        let rows = summarize_project_detailed(store.reader(), project.id).await?;
        assert_eq!(rows.len(), 2);

        let cement = &rows[0];
        assert_eq!(cement.breakdown.len(), 2);
        assert_eq!(cement.breakdown[0].work_item_id, first.id);
        assert_eq!(cement.breakdown[0].volume, 2.0);
        assert_eq!(cement.breakdown[0].coefficient, 2.0);
        assert_close(cement.breakdown[0].quantity, 4.0);
        assert_close(cement.breakdown[0].cost, 400.0);
        assert_eq!(cement.breakdown[1].work_item_id, second.id);
        assert_eq!(cement.breakdown[1].work_item_description, "Test work item");
        assert_close(cement.summary.total_quantity, 12.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_summarize_all_is_scoped_to_owner() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let tid = Some(priced.template.id);
        create_test_work_item(&store, project.id, category.id, 1.0, tid).await?;

        let second = create_test_project(&store, "Second").await?;
        create_test_work_item(&store, second.id, category.id, 1.0, tid).await?;

        // Another owner's project using a system-wide material
        let sand = catalog::create_material(&store, None, "Sand", "m3", 10.0).await?;
        let theirs = projects::create_project(&store, OTHER_OWNER, "Theirs", "", "").await?;
        let their_category =
            crate::core::category::create_category(&store, OTHER_OWNER, "Misc", 1).await?;
        let their_template =
            template::create_template(&store, OTHER_OWNER, "Sand fill", "m3").await?;
        template::add_material_component(&store, OTHER_OWNER, their_template.id, sand.id, 1.0)
            .await?;
        crate::core::work_item::create_work_item(
            &store,
            OTHER_OWNER,
            theirs.id,
            &work_item_input(their_category.id, 1.0, Some(their_template.id)),
            crate::config::settings::CostFailurePolicy::Strict,
        )
        .await?;

        let rows = summarize_all(store.reader(), TEST_OWNER).await?;
        assert_eq!(rows.len(), 2);
        assert_close(rows[0].total_quantity, 4.0);
        assert_close(
            portfolio_total_cost(store.reader(), TEST_OWNER).await?,
            2.0 * 275.0,
        );

        let their_rows = summarize_all(store.reader(), OTHER_OWNER).await?;
        assert_eq!(their_rows.len(), 1);
        assert_eq!(their_rows[0].item_name, "Sand");
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_catalog_entry_falls_back_to_frozen_name() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let item = create_test_work_item(
            &store,
            project.id,
            category.id,
            1.0,
            Some(priced.template.id),
        )
        .await?;

        // Orphan the line item without running the catalog cascade
        store
            .reader()
            .execute_unprepared("PRAGMA foreign_keys = OFF")
            .await?;
        crate::entities::Material::delete_by_id(priced.material.id)
            .exec(store.reader())
            .await?;

        let rows = summarize_project(store.reader(), project.id).await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item_name, "Cement");
        assert_eq!(rows[0].unit, "");
        assert_eq!(
            crate::core::snapshot::find_by_work_item(store.reader(), item.id)
                .await?
                .len(),
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_catalog_delete_removes_lines_from_summary() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        create_test_work_item(&store, project.id, category.id, 1.0, Some(priced.template.id))
            .await?;

        deletion::delete_material(&store, TEST_OWNER, priced.material.id).await?;

        let rows = summarize_project(store.reader(), project.id).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, ItemKind::Labor);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_scopes_total_zero() -> Result<()> {
        let (store, project, _) = setup_with_project().await?;
        assert!(summarize_project(store.reader(), project.id).await?.is_empty());
        assert_eq!(project_total_cost(store.reader(), project.id).await?, 0.0);
        assert_eq!(portfolio_total_cost(store.reader(), TEST_OWNER).await?, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_fallback_to_plain_summary() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Custom("detailed query failed".to_string())])
            .append_query_results([Vec::<item_cost::Model>::new()])
            .into_connection();

        let summary = summarize_project_with_fallback(&db, 1).await?;
        assert!(summary.is_degraded());
        assert_eq!(summary, ProjectSummary::Plain(Vec::new()));
        assert!(summary.rows().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_fallback_propagates_plain_failure() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([
                DbErr::Custom("detailed query failed".to_string()),
                DbErr::Custom("plain query failed".to_string()),
            ])
            .into_connection();

        let result = summarize_project_with_fallback(&db, 1).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_detailed_summary_when_healthy() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        create_test_work_item(&store, project.id, category.id, 1.0, Some(priced.template.id))
            .await?;

        let summary = summarize_project_with_fallback(store.reader(), project.id).await?;
        assert!(!summary.is_degraded());
        assert_eq!(summary.rows().len(), 2);
        Ok(())
    }
}
