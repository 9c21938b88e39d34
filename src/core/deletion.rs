//! Deletion guard - decides whether catalog entries, templates and work categories
//! may be deleted, and carries out the delete.
//!
//! | entity        | policy                                   |
//! |---------------|------------------------------------------|
//! | material      | cascade to components and cost lines     |
//! | labor type    | cascade to components and cost lines     |
//! | template      | `policy.template_delete` (block default) |
//! | work category | block while work items use it            |
//!
//! Every delete re-checks references inside its own write transaction.

use crate::{
    config::{
        database::Store,
        settings::{DeletePolicy, PolicyConfig},
    },
    core::{catalog, category, template},
    entities::{
        ItemCost, ItemKind, LaborType, Material, Template, TemplateLaborComponent,
        TemplateMaterialComponent, WorkCategory, WorkItem, item_cost, template_labor_component,
        template_material_component, work_item,
    },
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, QueryTrait, prelude::*};
use tracing::{info, instrument};

/// Kinds of rows protected by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedEntity {
    /// Row of `materials`
    Material,
    /// Row of `labor_types`
    LaborType,
    /// Row of `templates`
    Template,
    /// Row of `work_categories`
    WorkCategory,
}

impl GuardedEntity {
    /// Entity name used in errors and logs
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::LaborType => "labor type",
            Self::Template => "template",
            Self::WorkCategory => "work category",
        }
    }

    const fn item_kind(self) -> Option<ItemKind> {
        match self {
            Self::Material => Some(ItemKind::Material),
            Self::LaborType => Some(ItemKind::Labor),
            Self::Template | Self::WorkCategory => None,
        }
    }
}

/// The delete policy in force for `entity`.
#[must_use]
pub const fn policy_for(entity: GuardedEntity, policy: &PolicyConfig) -> DeletePolicy {
    match entity {
        GuardedEntity::Material | GuardedEntity::LaborType => DeletePolicy::Cascade,
        GuardedEntity::Template => policy.template_delete,
        GuardedEntity::WorkCategory => DeletePolicy::Block,
    }
}

/// Live counts of rows pointing at a guarded row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct References {
    /// Template components referencing a catalog entry, or owned by a template
    pub template_components: u64,
    /// Cost line items that would be removed with the row
    pub cost_lines: u64,
    /// Work items using a template or category
    pub work_items: u64,
}

impl References {
    /// True if nothing points at the row.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.template_components == 0 && self.cost_lines == 0 && self.work_items == 0
    }
}

/// Whether a row is currently referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceState {
    /// At least one dependent row exists
    Referenced,
    /// Nothing depends on the row
    Unreferenced,
}

/// Answer of [`can_delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCheck {
    /// What was checked
    pub entity: GuardedEntity,
    /// Primary key of the row
    pub id: i64,
    /// Whether the delete may go ahead
    pub allowed: bool,
    /// Why the delete is refused, if it is
    pub reason: Option<String>,
    /// What currently points at the row
    pub references: References,
    /// The policy that was applied
    pub policy: DeletePolicy,
}

impl DeletionCheck {
    /// Referenced or unreferenced, derived from the live counts.
    #[must_use]
    pub const fn state(&self) -> ReferenceState {
        if self.references.is_empty() {
            ReferenceState::Unreferenced
        } else {
            ReferenceState::Referenced
        }
    }
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

async fn exists<C>(db: &C, entity: GuardedEntity, id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let found = match entity {
        GuardedEntity::Material => Material::find_by_id(id).count(db).await?,
        GuardedEntity::LaborType => LaborType::find_by_id(id).count(db).await?,
        GuardedEntity::Template => Template::find_by_id(id).count(db).await?,
        GuardedEntity::WorkCategory => WorkCategory::find_by_id(id).count(db).await?,
    };
    Ok(found > 0)
}

/// Counts the rows that reference a guarded row.
pub async fn count_references<C>(db: &C, entity: GuardedEntity, id: i64) -> Result<References>
where
    C: ConnectionTrait,
{
    let references = match entity {
        GuardedEntity::Material => References {
            template_components: TemplateMaterialComponent::find()
                .filter(template_material_component::Column::MaterialId.eq(id))
                .count(db)
                .await?,
            cost_lines: count_catalog_lines(db, ItemKind::Material, id).await?,
            work_items: 0,
        },
        GuardedEntity::LaborType => References {
            template_components: TemplateLaborComponent::find()
                .filter(template_labor_component::Column::LaborTypeId.eq(id))
                .count(db)
                .await?,
            cost_lines: count_catalog_lines(db, ItemKind::Labor, id).await?,
            work_items: 0,
        },
        GuardedEntity::Template => {
            let material_components = TemplateMaterialComponent::find()
                .filter(template_material_component::Column::TemplateId.eq(id))
                .count(db)
                .await?;
            let labor_components = TemplateLaborComponent::find()
                .filter(template_labor_component::Column::TemplateId.eq(id))
                .count(db)
                .await?;
            References {
                template_components: material_components + labor_components,
                cost_lines: ItemCost::find()
                    .filter(
                        item_cost::Column::WorkItemId
                            .in_subquery(work_items_with(work_item::Column::TemplateId, id)),
                    )
                    .count(db)
                    .await?,
                work_items: WorkItem::find()
                    .filter(work_item::Column::TemplateId.eq(id))
                    .count(db)
                    .await?,
            }
        }
        GuardedEntity::WorkCategory => References {
            work_items: WorkItem::find()
                .filter(work_item::Column::CategoryId.eq(id))
                .count(db)
                .await?,
            ..References::default()
        },
    };
    Ok(references)
}

async fn count_catalog_lines<C>(db: &C, kind: ItemKind, item_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    ItemCost::find()
        .filter(item_cost::Column::ItemKind.eq(kind))
        .filter(item_cost::Column::ItemId.eq(item_id))
        .count(db)
        .await
        .map_err(Into::into)
}

fn work_items_with(column: work_item::Column, id: i64) -> sea_orm::sea_query::SelectStatement {
    WorkItem::find()
        .select_only()
        .column(work_item::Column::Id)
        .filter(column.eq(id))
        .into_query()
}

/// Decides whether `entity` `id` may be deleted under `policy`.
///
/// Returns `NotFound` if the row does not exist. Ownership is not checked here.
pub async fn can_delete<C>(
    db: &C,
    entity: GuardedEntity,
    id: i64,
    policy: &PolicyConfig,
) -> Result<DeletionCheck>
where
    C: ConnectionTrait,
{
    if !exists(db, entity, id).await? {
        return Err(Error::NotFound {
            entity: entity.label(),
            id,
        });
    }

    let references = count_references(db, entity, id).await?;
    let policy = policy_for(entity, policy);
    let reason = match policy {
        DeletePolicy::Block if references.work_items > 0 => Some(format!(
            "referenced by {}",
            plural(references.work_items, "work item")
        )),
        DeletePolicy::Block | DeletePolicy::Cascade => None,
    };

    Ok(DeletionCheck {
        entity,
        id,
        allowed: reason.is_none(),
        reason,
        references,
        policy,
    })
}

fn refuse(check: DeletionCheck) -> Error {
    Error::ReferentialIntegrity {
        entity: check.entity.label(),
        id: check.id,
        reason: check.reason.unwrap_or_default(),
    }
}

/// Checks the guard inside `txn` and returns the check if the delete may proceed.
async fn require_deletable<C>(
    db: &C,
    entity: GuardedEntity,
    id: i64,
    policy: &PolicyConfig,
) -> Result<DeletionCheck>
where
    C: ConnectionTrait,
{
    let check = can_delete(db, entity, id, policy).await?;
    if check.allowed {
        Ok(check)
    } else {
        Err(refuse(check))
    }
}

async fn cascade_catalog_entry<C>(db: &C, entity: GuardedEntity, id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(kind) = entity.item_kind() else {
        return Ok(());
    };
    match kind {
        ItemKind::Material => {
            TemplateMaterialComponent::delete_many()
                .filter(template_material_component::Column::MaterialId.eq(id))
                .exec(db)
                .await?;
            Material::delete_by_id(id).exec(db).await?;
        }
        ItemKind::Labor => {
            TemplateLaborComponent::delete_many()
                .filter(template_labor_component::Column::LaborTypeId.eq(id))
                .exec(db)
                .await?;
            LaborType::delete_by_id(id).exec(db).await?;
        }
    }
    ItemCost::delete_many()
        .filter(item_cost::Column::ItemKind.eq(kind))
        .filter(item_cost::Column::ItemId.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Deletes a material owned by `user_id`, along with the template components and
/// cost line items that reference it.
#[instrument(skip(store))]
pub async fn delete_material(store: &Store, user_id: i64, material_id: i64) -> Result<References> {
    let txn = store.begin_write().await?;
    let material = catalog::get_material_by_id(&*txn, material_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "material",
            id: material_id,
        })?;
    catalog::require_catalog_owner("material", material_id, material.owner_id, user_id)?;

    let check = require_deletable(
        &*txn,
        GuardedEntity::Material,
        material_id,
        &PolicyConfig::default(),
    )
    .await?;
    cascade_catalog_entry(&*txn, GuardedEntity::Material, material_id).await?;
    txn.commit().await?;

    info!(
        "Deleted material {material_id} with {} components and {} cost lines",
        check.references.template_components, check.references.cost_lines
    );
    Ok(check.references)
}

/// Deletes a labor type owned by `user_id`, cascading like [`delete_material`].
#[instrument(skip(store))]
pub async fn delete_labor_type(
    store: &Store,
    user_id: i64,
    labor_type_id: i64,
) -> Result<References> {
    let txn = store.begin_write().await?;
    let labor_type = catalog::get_labor_type_by_id(&*txn, labor_type_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "labor type",
            id: labor_type_id,
        })?;
    catalog::require_catalog_owner("labor type", labor_type_id, labor_type.owner_id, user_id)?;

    let check = require_deletable(
        &*txn,
        GuardedEntity::LaborType,
        labor_type_id,
        &PolicyConfig::default(),
    )
    .await?;
    cascade_catalog_entry(&*txn, GuardedEntity::LaborType, labor_type_id).await?;
    txn.commit().await?;

    info!(
        "Deleted labor type {labor_type_id} with {} components and {} cost lines",
        check.references.template_components, check.references.cost_lines
    );
    Ok(check.references)
}

/// Deletes a template owned by `user_id`.
///
/// Under [`DeletePolicy::Block`] this fails with `ReferentialIntegrity` while any
/// work item uses the template. Under [`DeletePolicy::Cascade`] those work items
/// and their cost line items are deleted with it.
#[instrument(skip(store))]
pub async fn delete_template(
    store: &Store,
    user_id: i64,
    template_id: i64,
    policy: &PolicyConfig,
) -> Result<References> {
    let txn = store.begin_write().await?;
    template::get_owned_template(&*txn, user_id, template_id).await?;
    let check = require_deletable(&*txn, GuardedEntity::Template, template_id, policy).await?;

    ItemCost::delete_many()
        .filter(
            item_cost::Column::WorkItemId
                .in_subquery(work_items_with(work_item::Column::TemplateId, template_id)),
        )
        .exec(&*txn)
        .await?;
    WorkItem::delete_many()
        .filter(work_item::Column::TemplateId.eq(template_id))
        .exec(&*txn)
        .await?;
    TemplateMaterialComponent::delete_many()
        .filter(template_material_component::Column::TemplateId.eq(template_id))
        .exec(&*txn)
        .await?;
    TemplateLaborComponent::delete_many()
        .filter(template_labor_component::Column::TemplateId.eq(template_id))
        .exec(&*txn)
        .await?;
    Template::delete_by_id(template_id).exec(&*txn).await?;
    txn.commit().await?;

    info!(
        "Deleted template {template_id} ({} components, {} work items)",
        check.references.template_components, check.references.work_items
    );
    Ok(check.references)
}

/// Deletes a work category owned by `user_id`. Refused while any work item uses it.
#[instrument(skip(store))]
pub async fn delete_work_category(store: &Store, user_id: i64, category_id: i64) -> Result<()> {
    let txn = store.begin_write().await?;
    category::get_owned_category(&*txn, user_id, category_id).await?;
    require_deletable(
        &*txn,
        GuardedEntity::WorkCategory,
        category_id,
        &PolicyConfig::default(),
    )
    .await?;

    WorkCategory::delete_by_id(category_id).exec(&*txn).await?;
    txn.commit().await?;

    info!("Deleted work category {category_id}");
    Ok(())
}
