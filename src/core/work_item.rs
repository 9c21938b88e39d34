//! Work item business logic - the writes that drive the cost engine.
//!
//! Creating or updating a work item writes the row and recalculates its cost
//! snapshot in the same write transaction. What happens when the calculation fails
//! is decided by [`CostFailurePolicy`]:
//!
//! - `Strict`: the error is returned and nothing is committed.
//! - `Lenient`: the calculation runs in a savepoint. On failure the savepoint is
//!   rolled back, the old snapshot is cleared, the error is logged and the work
//!   item is committed anyway. The caller sees [`CostOutcome::Failed`].

use crate::{
    config::{database::Store, settings::CostFailurePolicy},
    core::{
        MAX_UNIT_LEN, category,
        costing::{self, CostCalculation, StaleReference},
        now, project, require_owner, require_text, snapshot, template,
    },
    entities::{
        ItemCost, Template, WorkCategory, WorkItem, item_cost, template as template_entity,
        work_category, work_item,
    },
    errors::{Error, Result},
};
use sea_orm::{DatabaseTransaction, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{error, info, instrument};

const MAX_DESCRIPTION_LEN: usize = 255;

/// Fields a caller supplies when creating or editing a work item.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemInput {
    /// Category to list the item under; must belong to the user
    pub category_id: i64,
    /// What the work is
    pub description: String,
    /// Quantity of work, strictly positive
    pub volume: f64,
    /// Unit of the volume
    pub unit: String,
    /// Template to price the item with; must belong to the user
    pub template_id: Option<i64>,
}

/// What happened to the cost snapshot during a work-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum CostOutcome {
    /// The work item has no template; its snapshot is empty
    NoTemplate,
    /// The snapshot was replaced
    Calculated {
        /// Number of line items written
        line_count: usize,
        /// Σ total cost of those lines
        total_cost: f64,
        /// Components skipped because their catalog row is gone
        stale_references: Vec<StaleReference>,
    },
    /// Lenient policy only: the calculation failed and the snapshot was cleared
    Failed {
        /// The calculation error
        error: String,
    },
}

impl CostOutcome {
    fn from_calculation(template_id: Option<i64>, calculation: CostCalculation) -> Self {
        if template_id.is_none() {
            return Self::NoTemplate;
        }
        Self::Calculated {
            line_count: calculation.lines.len(),
            total_cost: calculation.total_cost(),
            stale_references: calculation.stale_references,
        }
    }
}

/// A committed work item and the outcome of its cost calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemWrite {
    /// The row as written
    pub work_item: work_item::Model,
    /// Snapshot outcome
    pub calculation: CostOutcome,
}

/// A work item as listed on a project page.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemRow {
    /// The work item
    pub work_item: work_item::Model,
    /// Name of its category
    pub category_name: String,
    /// Name of its template, if it has one
    pub template_name: Option<String>,
    /// Σ total cost of its line items
    pub total_cost: f64,
}

struct ValidInput {
    description: String,
    unit: String,
    volume: f64,
}

/// Validates input fields and ownership of every referenced row.
async fn validate_input<C>(
    db: &C,
    user_id: i64,
    input: &WorkItemInput,
) -> Result<ValidInput>
where
    C: ConnectionTrait,
{
    let description = require_text("Description", &input.description, MAX_DESCRIPTION_LEN)?;
    let unit = require_text("Work item unit", &input.unit, MAX_UNIT_LEN)?;
    let volume = costing::validate_volume(input.volume)?;

    category::get_owned_category(db, user_id, input.category_id).await?;
    if let Some(template_id) = input.template_id {
        template::get_owned_template(db, user_id, template_id).await?;
    }

    Ok(ValidInput {
        description,
        unit,
        volume,
    })
}

/// Recalculates the snapshot of `work_item_id` under `policy`.
async fn recalculate(
    txn: &DatabaseTransaction,
    work_item: &work_item::Model,
    policy: CostFailurePolicy,
) -> Result<CostOutcome> {
    let template_id = work_item.template_id;
    match policy {
        CostFailurePolicy::Strict => {
            let calculation =
                snapshot::calculate_and_replace(txn, work_item.id, template_id, work_item.volume)
                    .await?;
            Ok(CostOutcome::from_calculation(template_id, calculation))
        }
        CostFailurePolicy::Lenient => {
            let savepoint = txn.begin().await?;
            match snapshot::calculate_and_replace(
                &savepoint,
                work_item.id,
                template_id,
                work_item.volume,
            )
            .await
            {
                Ok(calculation) => {
                    savepoint.commit().await?;
                    Ok(CostOutcome::from_calculation(template_id, calculation))
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    error!(
                        "Cost calculation for work item {} failed, snapshot cleared: {e}",
                        work_item.id
                    );
                    snapshot::delete_by_work_item(txn, work_item.id).await?;
                    Ok(CostOutcome::Failed {
                        error: e.to_string(),
                    })
                }
            }
        }
    }
}

/// Creates a work item in a project owned by `user_id` and calculates its costs.
#[instrument(skip(store, input), fields(template_id = ?input.template_id))]
pub async fn create_work_item(
    store: &Store,
    user_id: i64,
    project_id: i64,
    input: &WorkItemInput,
    policy: CostFailurePolicy,
) -> Result<WorkItemWrite> {
    let txn = store.begin_write().await?;
    project::get_owned_project(&*txn, user_id, project_id).await?;
    let valid = validate_input(&*txn, user_id, input).await?;

    let timestamp = now();
    let model = work_item::ActiveModel {
        project_id: Set(project_id),
        category_id: Set(input.category_id),
        description: Set(valid.description),
        volume: Set(valid.volume),
        unit: Set(valid.unit),
        template_id: Set(input.template_id),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;

    let calculation = recalculate(&txn, &model, policy).await?;
    txn.commit().await?;

    info!("Created work item {} in project {project_id}", model.id);
    Ok(WorkItemWrite {
        work_item: model,
        calculation,
    })
}

/// Finds a work item whose project is owned by `user_id`.
pub async fn get_owned_work_item<C>(db: &C, user_id: i64, work_item_id: i64) -> Result<work_item::Model>
where
    C: ConnectionTrait,
{
    let model = WorkItem::find_by_id(work_item_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "work item",
            id: work_item_id,
        })?;
    let owner = project::get_project_by_id(db, model.project_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "project",
            id: model.project_id,
        })?;
    require_owner("work item", work_item_id, owner.owner_id, user_id)?;
    Ok(model)
}

/// Edits a work item and recalculates its snapshot at current catalog prices.
///
/// This is the only way an existing snapshot changes.
#[instrument(skip(store, input), fields(template_id = ?input.template_id))]
pub async fn update_work_item(
    store: &Store,
    user_id: i64,
    work_item_id: i64,
    input: &WorkItemInput,
    policy: CostFailurePolicy,
) -> Result<WorkItemWrite> {
    let txn = store.begin_write().await?;
    let existing = get_owned_work_item(&*txn, user_id, work_item_id).await?;
    let valid = validate_input(&*txn, user_id, input).await?;

    let mut active: work_item::ActiveModel = existing.into();
    active.category_id = Set(input.category_id);
    active.description = Set(valid.description);
    active.volume = Set(valid.volume);
    active.unit = Set(valid.unit);
    active.template_id = Set(input.template_id);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;

    let calculation = recalculate(&txn, &model, policy).await?;
    txn.commit().await?;

    info!("Updated work item {work_item_id}");
    Ok(WorkItemWrite {
        work_item: model,
        calculation,
    })
}

/// Deletes a work item and its cost line items. Returns how many lines were removed.
#[instrument(skip(store))]
pub async fn delete_work_item(store: &Store, user_id: i64, work_item_id: i64) -> Result<u64> {
    let txn = store.begin_write().await?;
    get_owned_work_item(&*txn, user_id, work_item_id).await?;

    let removed = snapshot::delete_by_work_item(&*txn, work_item_id).await?;
    WorkItem::delete_by_id(work_item_id).exec(&*txn).await?;
    txn.commit().await?;

    info!("Deleted work item {work_item_id} and {removed} cost lines");
    Ok(removed)
}

/// Lists a project's work items by category display order, then id.
pub async fn list_work_items<C>(db: &C, user_id: i64, project_id: i64) -> Result<Vec<WorkItemRow>>
where
    C: ConnectionTrait,
{
    project::get_owned_project(db, user_id, project_id).await?;

    let items = WorkItem::find()
        .filter(work_item::Column::ProjectId.eq(project_id))
        .order_by_asc(work_item::Column::Id)
        .all(db)
        .await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let categories: HashMap<i64, work_category::Model> = WorkCategory::find()
        .filter(work_category::Column::Id.is_in(items.iter().map(|item| item.category_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|category| (category.id, category))
        .collect();

    let template_ids: Vec<i64> = items.iter().filter_map(|item| item.template_id).collect();
    let templates: HashMap<i64, template_entity::Model> = if template_ids.is_empty() {
        HashMap::new()
    } else {
        Template::find()
            .filter(template_entity::Column::Id.is_in(template_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|template| (template.id, template))
            .collect()
    };

    let line_totals: Vec<(i64, f64)> = ItemCost::find()
        .select_only()
        .column(item_cost::Column::WorkItemId)
        .column(item_cost::Column::TotalCost)
        .filter(item_cost::Column::WorkItemId.is_in(items.iter().map(|item| item.id)))
        .into_tuple::<(i64, f64)>()
        .all(db)
        .await?;
    let mut totals: HashMap<i64, f64> = HashMap::new();
    for (work_item_id, total_cost) in line_totals {
        *totals.entry(work_item_id).or_default() += total_cost;
    }

    let mut rows: Vec<(i32, WorkItemRow)> = items
        .into_iter()
        .map(|work_item| {
            let category = categories.get(&work_item.category_id);
            let row = WorkItemRow {
                category_name: category.map(|c| c.name.clone()).unwrap_or_default(),
                template_name: work_item
                    .template_id
                    .and_then(|id| templates.get(&id))
                    .map(|t| t.name.clone()),
                total_cost: totals.get(&work_item.id).copied().unwrap_or_default(),
                work_item,
            };
            (category.map_or(i32::MAX, |c| c.display_order), row)
        })
        .collect();
    rows.sort_by_key(|(order, row)| (*order, row.work_item.id));
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::snapshot::find_by_work_item, entities::ItemKind, test_utils::*};

    async fn drop_labor_components(store: &Store) -> Result<()> {
        store
            .reader()
            .execute_unprepared("DROP TABLE template_labor_components")
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_template_calculates() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;

        let written = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 4.0, Some(priced.template.id)),
            CostFailurePolicy::Strict,
        )
        .await?;

        match &written.calculation {
            CostOutcome::Calculated {
                line_count,
                total_cost,
                stale_references,
            } => {
                assert_eq!(*line_count, 2);
                assert_close(*total_cost, 4.0 * 275.0);
                assert!(stale_references.is_empty());
            }
            other => unreachable!("unexpected outcome {other:?}"),
        }
        assert_eq!(find_by_work_item(store.reader(), written.work_item.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_without_template() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;

        let written = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, None),
            CostFailurePolicy::Strict,
        )
        .await?;
        assert_eq!(written.calculation, CostOutcome::NoTemplate);
        assert!(find_by_work_item(store.reader(), written.work_item.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_validation_and_ownership() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let foreign_template =
            template::create_template(&store, OTHER_OWNER, "Theirs", "m3").await?;

        let result = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 0.0, None),
            CostFailurePolicy::Strict,
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = create_work_item(
            &store,
            OTHER_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, None),
            CostFailurePolicy::Strict,
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::OwnershipViolation {
                entity: "project",
                ..
            })
        ));

        let result = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, Some(foreign_template.id)),
            CostFailurePolicy::Lenient,
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::OwnershipViolation {
                entity: "template",
                ..
            })
        ));

        let result = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, Some(999)),
            CostFailurePolicy::Lenient,
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        assert_eq!(WorkItem::find().count(store.reader()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_strict_failure_commits_nothing() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        drop_labor_components(&store).await?;

        let result = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, Some(priced.template.id)),
            CostFailurePolicy::Strict,
        )
        .await;
        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(WorkItem::find().count(store.reader()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_lenient_failure_keeps_work_item() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        drop_labor_components(&store).await?;

        let written = create_work_item(
            &store,
            TEST_OWNER,
            project.id,
            &work_item_input(category.id, 1.0, Some(priced.template.id)),
            CostFailurePolicy::Lenient,
        )
        .await?;
        assert!(matches!(written.calculation, CostOutcome::Failed { .. }));
        assert!(
            WorkItem::find_by_id(written.work_item.id)
                .one(store.reader())
                .await?
                .is_some()
        );
        assert_eq!(ItemCost::find().count(store.reader()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_lenient_failure_on_update_clears_old_snapshot() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let item =
            create_test_work_item(&store, project.id, category.id, 1.0, Some(priced.template.id))
                .await?;
        assert_eq!(find_by_work_item(store.reader(), item.id).await?.len(), 2);
        drop_labor_components(&store).await?;

        let written = update_work_item(
            &store,
            TEST_OWNER,
            item.id,
            &work_item_input(category.id, 3.0, Some(priced.template.id)),
            CostFailurePolicy::Lenient,
        )
        .await?;
        assert!(matches!(written.calculation, CostOutcome::Failed { .. }));
        assert_eq!(written.work_item.volume, 3.0);
        assert!(find_by_work_item(store.reader(), item.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_switching_template_replaces_whole_snapshot() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let first = create_priced_template(&store).await?;
        let item =
            create_test_work_item(&store, project.id, category.id, 2.0, Some(first.template.id))
                .await?;
        assert_eq!(find_by_work_item(store.reader(), item.id).await?.len(), 2);

        let second = create_test_template(&store, "Brick wall").await?;
        let sand = create_test_material(&store, "Sand", 10.0).await?;
        let brick = create_test_material(&store, "Brick", 2.0).await?;
        let helper = create_test_labor(&store, "Helper", 90.0).await?;
        template::add_labor_component(&store, TEST_OWNER, second.id, helper.id, 1.0).await?;
        template::add_material_component(&store, TEST_OWNER, second.id, sand.id, 1.5).await?;
        template::add_material_component(&store, TEST_OWNER, second.id, brick.id, 3.0).await?;

        let written = update_work_item(
            &store,
            TEST_OWNER,
            item.id,
            &work_item_input(category.id, 2.0, Some(second.id)),
            CostFailurePolicy::Strict,
        )
        .await?;

        match &written.calculation {
            CostOutcome::Calculated {
                line_count,
                total_cost,
                ..
            } => {
                assert_eq!(*line_count, 3);
                assert_close(*total_cost, 30.0 + 12.0 + 180.0);
            }
            other => unreachable!("unexpected outcome {other:?}"),
        }

        let lines = find_by_work_item(store.reader(), item.id).await?;
        let items: Vec<(ItemKind, i64)> = lines
            .iter()
            .map(|view| (view.line.item_kind, view.line.item_id))
            .collect();
        assert_eq!(
            items,
            vec![
                (ItemKind::Material, sand.id),
                (ItemKind::Material, brick.id),
                (ItemKind::Labor, helper.id),
            ]
        );
        assert!(!items.contains(&(ItemKind::Material, first.material.id)));
        assert!(!items.contains(&(ItemKind::Labor, first.labor.id)));
        assert_close(lines[0].line.total_cost, 30.0);
        assert_close(lines[1].line.total_cost, 12.0);
        assert_close(lines[2].line.total_cost, 180.0);

        assert_close(
            crate::core::summary::project_total_cost(store.reader(), project.id).await?,
            222.0,
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_update_recalculates_at_current_prices() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let item =
            create_test_work_item(&store, project.id, category.id, 1.0, Some(priced.template.id))
                .await?;

        crate::core::catalog::update_material(
            &store,
            TEST_OWNER,
            priced.material.id,
            "Cement",
            "kg",
            300.0,
        )
        .await?;

        let written = update_work_item(
            &store,
            TEST_OWNER,
            item.id,
            &work_item_input(category.id, 2.0, Some(priced.template.id)),
            CostFailurePolicy::Strict,
        )
        .await?;
        let lines = find_by_work_item(store.reader(), item.id).await?;
        assert_eq!(lines.len(), 2);
        assert_close(lines[0].line.unit_price_at_creation, 300.0);
        assert_close(lines[0].line.total_cost, 2.0 * 2.0 * 300.0);
        assert_eq!(written.work_item.volume, 2.0);

        // Dropping the template clears the snapshot
        let written = update_work_item(
            &store,
            TEST_OWNER,
            item.id,
            &work_item_input(category.id, 2.0, None),
            CostFailurePolicy::Strict,
        )
        .await?;
        assert_eq!(written.calculation, CostOutcome::NoTemplate);
        assert!(find_by_work_item(store.reader(), item.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_work_item_removes_lines() -> Result<()> {
        let (store, project, category) = setup_with_project().await?;
        let priced = create_priced_template(&store).await?;
        let item =
            create_test_work_item(&store, project.id, category.id, 1.0, Some(priced.template.id))
                .await?;

        let result = delete_work_item(&store, OTHER_OWNER, item.id).await;
        assert!(matches!(result, Err(Error::OwnershipViolation { .. })));

        assert_eq!(delete_work_item(&store, TEST_OWNER, item.id).await?, 2);
        assert!(find_by_work_item(store.reader(), item.id).await?.is_empty());
        assert!(matches!(
            get_owned_work_item(store.reader(), TEST_OWNER, item.id).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_work_items() -> Result<()> {
        let (store, project, structure) = setup_with_project().await?;
        let preparation =
            category::create_category(&store, TEST_OWNER, "Preparation", 0).await?;
        let priced = create_priced_template(&store).await?;
        let beam =
            create_test_work_item(&store, project.id, structure.id, 2.0, Some(priced.template.id))
                .await?;
        let clearing =
            create_test_work_item(&store, project.id, preparation.id, 10.0, None).await?;

        let rows = list_work_items(store.reader(), TEST_OWNER, project.id).await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].work_item.id, clearing.id);
        assert_eq!(rows[0].category_name, "Preparation");
        assert_eq!(rows[0].template_name, None);
        assert_eq!(rows[0].total_cost, 0.0);
        assert_eq!(rows[1].work_item.id, beam.id);
        assert_eq!(rows[1].template_name.as_deref(), Some("Concrete 1:2:3"));
        assert_close(rows[1].total_cost, 550.0);

        let result = list_work_items(store.reader(), OTHER_OWNER, project.id).await;
        assert!(matches!(result, Err(Error::OwnershipViolation { .. })));
        Ok(())
    }
}
