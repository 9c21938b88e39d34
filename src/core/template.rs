//! Template business logic - AHSP templates and their coefficient lists.
//!
//! A template owns two component lists, one per catalog. Each component says how
//! much of a catalog item one unit of work consumes. Components reference catalog
//! rows by id and are cascaded away when the catalog row is deleted.

use crate::{
    config::database::Store,
    core::{
        MAX_NAME_LEN, MAX_UNIT_LEN,
        catalog::{self, CatalogEntry},
        now, require_owner, require_positive, require_text,
    },
    entities::{
        ItemKind, Template, TemplateLaborComponent, TemplateMaterialComponent, template,
        template_labor_component, template_material_component,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::debug;

/// One coefficient of a template, whichever catalog it points into.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateComponent {
    /// Which component table the row lives in
    pub kind: ItemKind,
    /// Component primary key (unique per kind)
    pub id: i64,
    /// Owning template
    pub template_id: i64,
    /// Referenced material or labor type
    pub item_id: i64,
    /// Quantity per unit of work
    pub coefficient: f64,
}

impl From<template_material_component::Model> for TemplateComponent {
    fn from(model: template_material_component::Model) -> Self {
        Self {
            kind: ItemKind::Material,
            id: model.id,
            template_id: model.template_id,
            item_id: model.material_id,
            coefficient: model.coefficient,
        }
    }
}

impl From<template_labor_component::Model> for TemplateComponent {
    fn from(model: template_labor_component::Model) -> Self {
        Self {
            kind: ItemKind::Labor,
            id: model.id,
            template_id: model.template_id,
            item_id: model.labor_type_id,
            coefficient: model.coefficient,
        }
    }
}

/// A component joined with the current state of its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDetail {
    /// The component itself
    pub component: TemplateComponent,
    /// Catalog entry as it is now
    pub entry: CatalogEntry,
    /// `coefficient * price`: what this component adds to one unit of work
    pub unit_cost: f64,
}

/// Creates an empty template.
pub async fn create_template(
    store: &Store,
    owner_id: i64,
    name: &str,
    unit: &str,
) -> Result<template::Model> {
    let name = require_text("Template name", name, MAX_NAME_LEN)?;
    let unit = require_text("Template unit", unit, MAX_UNIT_LEN)?;

    let txn = store.begin_write().await?;
    let timestamp = now();
    let model = template::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(name),
        unit: Set(unit),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    debug!("Created template {} ({})", model.id, model.name);
    Ok(model)
}

/// Finds a template by id regardless of owner.
pub async fn get_template_by_id<C>(db: &C, template_id: i64) -> Result<Option<template::Model>>
where
    C: ConnectionTrait,
{
    Template::find_by_id(template_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a template owned by `user_id`.
pub async fn get_owned_template<C>(db: &C, user_id: i64, template_id: i64) -> Result<template::Model>
where
    C: ConnectionTrait,
{
    let model = get_template_by_id(db, template_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "template",
            id: template_id,
        })?;
    require_owner("template", template_id, model.owner_id, user_id)?;
    Ok(model)
}

/// Lists the user's templates alphabetically.
pub async fn list_templates<C>(db: &C, user_id: i64) -> Result<Vec<template::Model>>
where
    C: ConnectionTrait,
{
    Template::find()
        .filter(template::Column::OwnerId.eq(user_id))
        .order_by_asc(template::Column::Name)
        .order_by_asc(template::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a template or changes its unit. Existing cost snapshots are unaffected.
pub async fn update_template(
    store: &Store,
    user_id: i64,
    template_id: i64,
    name: &str,
    unit: &str,
) -> Result<template::Model> {
    let name = require_text("Template name", name, MAX_NAME_LEN)?;
    let unit = require_text("Template unit", unit, MAX_UNIT_LEN)?;

    let txn = store.begin_write().await?;
    let existing = get_owned_template(&*txn, user_id, template_id).await?;
    let mut active: template::ActiveModel = existing.into();
    active.name = Set(name);
    active.unit = Set(unit);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Adds a material coefficient to a template the user owns.
///
/// The material must be the user's own or system-wide.
pub async fn add_material_component(
    store: &Store,
    user_id: i64,
    template_id: i64,
    material_id: i64,
    coefficient: f64,
) -> Result<TemplateComponent> {
    let coefficient = require_positive(coefficient)?;

    let txn = store.begin_write().await?;
    get_owned_template(&*txn, user_id, template_id).await?;
    catalog::get_visible_material(&*txn, user_id, material_id).await?;

    let timestamp = now();
    let model = template_material_component::ActiveModel {
        template_id: Set(template_id),
        material_id: Set(material_id),
        coefficient: Set(coefficient),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    Ok(model.into())
}

/// Adds a labor coefficient to a template the user owns.
pub async fn add_labor_component(
    store: &Store,
    user_id: i64,
    template_id: i64,
    labor_type_id: i64,
    coefficient: f64,
) -> Result<TemplateComponent> {
    let coefficient = require_positive(coefficient)?;

    let txn = store.begin_write().await?;
    get_owned_template(&*txn, user_id, template_id).await?;
    catalog::get_visible_labor_type(&*txn, user_id, labor_type_id).await?;

    let timestamp = now();
    let model = template_labor_component::ActiveModel {
        template_id: Set(template_id),
        labor_type_id: Set(labor_type_id),
        coefficient: Set(coefficient),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    Ok(model.into())
}

async fn find_component<C>(db: &C, kind: ItemKind, component_id: i64) -> Result<TemplateComponent>
where
    C: ConnectionTrait,
{
    let component = match kind {
        ItemKind::Material => TemplateMaterialComponent::find_by_id(component_id)
            .one(db)
            .await?
            .map(TemplateComponent::from),
        ItemKind::Labor => TemplateLaborComponent::find_by_id(component_id)
            .one(db)
            .await?
            .map(TemplateComponent::from),
    };
    component.ok_or(Error::NotFound {
        entity: "template component",
        id: component_id,
    })
}

/// Changes the coefficient of one component. Takes effect on the next recalculation.
pub async fn update_component_coefficient(
    store: &Store,
    user_id: i64,
    kind: ItemKind,
    component_id: i64,
    coefficient: f64,
) -> Result<TemplateComponent> {
    let coefficient = require_positive(coefficient)?;

    let txn = store.begin_write().await?;
    let component = find_component(&*txn, kind, component_id).await?;
    get_owned_template(&*txn, user_id, component.template_id).await?;

    let timestamp = now();
    let updated: TemplateComponent = match kind {
        ItemKind::Material => template_material_component::ActiveModel {
            id: Set(component_id),
            coefficient: Set(coefficient),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .update(&*txn)
        .await?
        .into(),
        ItemKind::Labor => template_labor_component::ActiveModel {
            id: Set(component_id),
            coefficient: Set(coefficient),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .update(&*txn)
        .await?
        .into(),
    };
    txn.commit().await?;
    Ok(updated)
}

/// Removes one component from a template the user owns.
pub async fn remove_component(
    store: &Store,
    user_id: i64,
    kind: ItemKind,
    component_id: i64,
) -> Result<()> {
    let txn = store.begin_write().await?;
    let component = find_component(&*txn, kind, component_id).await?;
    get_owned_template(&*txn, user_id, component.template_id).await?;

    match kind {
        ItemKind::Material => {
            TemplateMaterialComponent::delete_by_id(component_id)
                .exec(&*txn)
                .await?;
        }
        ItemKind::Labor => {
            TemplateLaborComponent::delete_by_id(component_id)
                .exec(&*txn)
                .await?;
        }
    }
    txn.commit().await?;

    debug!(
        "Removed {kind} component {component_id} from template {}",
        component.template_id
    );
    Ok(())
}

/// Loads the material components of a template, ordered by component id.
pub async fn get_material_components<C>(db: &C, template_id: i64) -> Result<Vec<TemplateComponent>>
where
    C: ConnectionTrait,
{
    Ok(TemplateMaterialComponent::find()
        .filter(template_material_component::Column::TemplateId.eq(template_id))
        .order_by_asc(template_material_component::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(TemplateComponent::from)
        .collect())
}

/// Loads the labor components of a template, ordered by component id.
pub async fn get_labor_components<C>(db: &C, template_id: i64) -> Result<Vec<TemplateComponent>>
where
    C: ConnectionTrait,
{
    Ok(TemplateLaborComponent::find()
        .filter(template_labor_component::Column::TemplateId.eq(template_id))
        .order_by_asc(template_labor_component::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(TemplateComponent::from)
        .collect())
}

/// All components of a template: materials first, then labor.
pub async fn get_components<C>(db: &C, template_id: i64) -> Result<Vec<TemplateComponent>>
where
    C: ConnectionTrait,
{
    let mut components = get_material_components(db, template_id).await?;
    components.extend(get_labor_components(db, template_id).await?);
    Ok(components)
}

/// Components of a template joined with their current catalog entries.
///
/// Components whose catalog row no longer exists are left out.
pub async fn get_components_with_catalog<C>(
    db: &C,
    template_id: i64,
) -> Result<Vec<ComponentDetail>>
where
    C: ConnectionTrait,
{
    let components = get_components(db, template_id).await?;
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

    Ok(components
        .into_iter()
        .filter_map(|component| {
            let entries = match component.kind {
                ItemKind::Material => &materials,
                ItemKind::Labor => &labor,
            };
            let entry = entries.get(&component.item_id)?.clone();
            let unit_cost = component.coefficient * entry.price;
            Some(ComponentDetail {
                component,
                entry,
                unit_cost,
            })
        })
        .collect())
}

/// Cost of one unit of work at current catalog prices.
pub async fn template_unit_cost<C>(db: &C, template_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    Ok(get_components_with_catalog(db, template_id)
        .await?
        .iter()
        .map(|detail| detail.unit_cost)
        .sum())
}
