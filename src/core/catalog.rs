//! Catalog business logic - materials and labor types.
//!
//! Both catalogs share one shape: an optional owner, a name, a unit and a current
//! price. Entries without an owner are system-wide defaults visible to everyone and
//! editable by no one. Price changes only affect future calculations; cost line items
//! already written keep the price they were calculated with.

use crate::{
    config::{
        database::Store,
        settings::{CatalogSeed, Config},
    },
    core::{MAX_NAME_LEN, MAX_UNIT_LEN, now, require_owner, require_price, require_text},
    entities::{ItemKind, LaborType, Material, labor_type, material},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info};

/// A material or labor type seen through the common catalog shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Which catalog the entry lives in
    pub kind: ItemKind,
    /// Primary key within that catalog
    pub id: i64,
    /// Owning user, or None for system-wide defaults
    pub owner_id: Option<i64>,
    /// Display name
    pub name: String,
    /// Unit the price is quoted in
    pub unit: String,
    /// Unit price for materials, daily wage for labor
    pub price: f64,
}

impl From<material::Model> for CatalogEntry {
    fn from(model: material::Model) -> Self {
        Self {
            kind: ItemKind::Material,
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            unit: model.unit,
            price: model.unit_price,
        }
    }
}

impl From<labor_type::Model> for CatalogEntry {
    fn from(model: labor_type::Model) -> Self {
        Self {
            kind: ItemKind::Labor,
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            unit: model.unit,
            price: model.daily_wage,
        }
    }
}

/// Counts of rows inserted by [`seed_default_catalog`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// New system-wide materials
    pub materials: usize,
    /// New system-wide labor types
    pub labor_types: usize,
}

/// Rows with no owner, or owned by `user_id`.
fn visible_to(owner_column: impl ColumnTrait, user_id: i64) -> Condition {
    Condition::any()
        .add(owner_column.is_null())
        .add(owner_column.eq(user_id))
}

/// Rejects edits of system-wide rows and rows owned by someone else.
pub(crate) fn require_catalog_owner(
    entity: &'static str,
    id: i64,
    owner_id: Option<i64>,
    user_id: i64,
) -> Result<()> {
    match owner_id {
        Some(owner) => require_owner(entity, id, owner, user_id),
        None => Err(Error::OwnershipViolation { entity, id }),
    }
}

/// Creates a material. `owner_id` of None adds it to the system-wide catalog.
pub async fn create_material(
    store: &Store,
    owner_id: Option<i64>,
    name: &str,
    unit: &str,
    unit_price: f64,
) -> Result<material::Model> {
    let name = require_text("Material name", name, MAX_NAME_LEN)?;
    let unit = require_text("Material unit", unit, MAX_UNIT_LEN)?;
    let unit_price = require_price(unit_price)?;

    let txn = store.begin_write().await?;
    let timestamp = now();
    let model = material::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(name),
        unit: Set(unit),
        unit_price: Set(unit_price),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    debug!("Created material {} ({})", model.id, model.name);
    Ok(model)
}

/// Finds a material by id regardless of owner.
pub async fn get_material_by_id<C>(db: &C, material_id: i64) -> Result<Option<material::Model>>
where
    C: ConnectionTrait,
{
    Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a material that `user_id` may use: their own or a system-wide one.
///
/// Returns `NotFound` if it does not exist and `OwnershipViolation` if it belongs
/// to someone else.
pub async fn get_visible_material<C>(db: &C, user_id: i64, material_id: i64) -> Result<material::Model>
where
    C: ConnectionTrait,
{
    let model = get_material_by_id(db, material_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "material",
            id: material_id,
        })?;
    if let Some(owner) = model.owner_id {
        require_owner("material", material_id, owner, user_id)?;
    }
    Ok(model)
}

/// Lists the user's own materials together with the system-wide ones, oldest first.
pub async fn list_materials<C>(db: &C, user_id: i64) -> Result<Vec<material::Model>>
where
    C: ConnectionTrait,
{
    Material::find()
        .filter(visible_to(material::Column::OwnerId, user_id))
        .order_by_asc(material::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a material owned by `user_id`.
///
/// The new price is used the next time a work item is calculated; existing cost
/// line items are not touched.
pub async fn update_material(
    store: &Store,
    user_id: i64,
    material_id: i64,
    name: &str,
    unit: &str,
    unit_price: f64,
) -> Result<material::Model> {
    let name = require_text("Material name", name, MAX_NAME_LEN)?;
    let unit = require_text("Material unit", unit, MAX_UNIT_LEN)?;
    let unit_price = require_price(unit_price)?;

    let txn = store.begin_write().await?;
    let existing = get_material_by_id(&*txn, material_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "material",
            id: material_id,
        })?;
    require_catalog_owner("material", material_id, existing.owner_id, user_id)?;

    let mut active: material::ActiveModel = existing.into();
    active.name = Set(name);
    active.unit = Set(unit);
    active.unit_price = Set(unit_price);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;
    txn.commit().await?;

    info!(
        "Material {} now priced at {} per {}",
        model.id, model.unit_price, model.unit
    );
    Ok(model)
}

/// Creates a labor type. `owner_id` of None adds it to the system-wide catalog.
pub async fn create_labor_type(
    store: &Store,
    owner_id: Option<i64>,
    name: &str,
    unit: &str,
    daily_wage: f64,
) -> Result<labor_type::Model> {
    let name = require_text("Labor type name", name, MAX_NAME_LEN)?;
    let unit = require_text("Labor type unit", unit, MAX_UNIT_LEN)?;
    let daily_wage = require_price(daily_wage)?;

    let txn = store.begin_write().await?;
    let timestamp = now();
    let model = labor_type::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(name),
        unit: Set(unit),
        daily_wage: Set(daily_wage),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    debug!("Created labor type {} ({})", model.id, model.name);
    Ok(model)
}

/// Finds a labor type by id regardless of owner.
pub async fn get_labor_type_by_id<C>(db: &C, labor_type_id: i64) -> Result<Option<labor_type::Model>>
where
    C: ConnectionTrait,
{
    LaborType::find_by_id(labor_type_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a labor type that `user_id` may use: their own or a system-wide one.
pub async fn get_visible_labor_type<C>(
    db: &C,
    user_id: i64,
    labor_type_id: i64,
) -> Result<labor_type::Model>
where
    C: ConnectionTrait,
{
    let model = get_labor_type_by_id(db, labor_type_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "labor type",
            id: labor_type_id,
        })?;
    if let Some(owner) = model.owner_id {
        require_owner("labor type", labor_type_id, owner, user_id)?;
    }
    Ok(model)
}

/// Lists the user's own labor types together with the system-wide ones, oldest first.
pub async fn list_labor_types<C>(db: &C, user_id: i64) -> Result<Vec<labor_type::Model>>
where
    C: ConnectionTrait,
{
    LaborType::find()
        .filter(visible_to(labor_type::Column::OwnerId, user_id))
        .order_by_asc(labor_type::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a labor type owned by `user_id`. Not retroactive, like [`update_material`].
pub async fn update_labor_type(
    store: &Store,
    user_id: i64,
    labor_type_id: i64,
    name: &str,
    unit: &str,
    daily_wage: f64,
) -> Result<labor_type::Model> {
    let name = require_text("Labor type name", name, MAX_NAME_LEN)?;
    let unit = require_text("Labor type unit", unit, MAX_UNIT_LEN)?;
    let daily_wage = require_price(daily_wage)?;

    let txn = store.begin_write().await?;
    let existing = get_labor_type_by_id(&*txn, labor_type_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "labor type",
            id: labor_type_id,
        })?;
    require_catalog_owner("labor type", labor_type_id, existing.owner_id, user_id)?;

    let mut active: labor_type::ActiveModel = existing.into();
    active.name = Set(name);
    active.unit = Set(unit);
    active.daily_wage = Set(daily_wage);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;
    txn.commit().await?;

    info!(
        "Labor type {} now paid {} per {}",
        model.id, model.daily_wage, model.unit
    );
    Ok(model)
}

/// Loads the catalog entries of one kind with the given ids, keyed by id.
///
/// Ids with no matching row are simply absent from the map.
pub async fn find_catalog_entries<C>(
    db: &C,
    kind: ItemKind,
    ids: &[i64],
) -> Result<HashMap<i64, CatalogEntry>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let entries: Vec<CatalogEntry> = match kind {
        ItemKind::Material => Material::find()
            .filter(material::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(CatalogEntry::from)
            .collect(),
        ItemKind::Labor => LaborType::find()
            .filter(labor_type::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(CatalogEntry::from)
            .collect(),
    };

    Ok(entries.into_iter().map(|entry| (entry.id, entry)).collect())
}

async fn seed_materials<C>(db: &C, seeds: &[CatalogSeed]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut added = 0;
    for seed in seeds {
        let name = require_text("Material name", &seed.name, MAX_NAME_LEN)?;
        let exists = Material::find()
            .filter(material::Column::OwnerId.is_null())
            .filter(material::Column::Name.eq(name.as_str()))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let timestamp = now();
        material::ActiveModel {
            owner_id: Set(None),
            name: Set(name),
            unit: Set(require_text("Material unit", &seed.unit, MAX_UNIT_LEN)?),
            unit_price: Set(require_price(seed.price)?),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(db)
        .await?;
        added += 1;
    }
    Ok(added)
}

async fn seed_labor_types<C>(db: &C, seeds: &[CatalogSeed]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut added = 0;
    for seed in seeds {
        let name = require_text("Labor type name", &seed.name, MAX_NAME_LEN)?;
        let exists = LaborType::find()
            .filter(labor_type::Column::OwnerId.is_null())
            .filter(labor_type::Column::Name.eq(name.as_str()))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let timestamp = now();
        labor_type::ActiveModel {
            owner_id: Set(None),
            name: Set(name),
            unit: Set(require_text("Labor type unit", &seed.unit, MAX_UNIT_LEN)?),
            daily_wage: Set(require_price(seed.price)?),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(db)
        .await?;
        added += 1;
    }
    Ok(added)
}

/// Inserts the system-wide default catalog from config.toml.
///
/// Entries are matched by name against existing system-wide rows, so running this on
/// every startup only adds what is new. Existing prices are left alone.
pub async fn seed_default_catalog(store: &Store, config: &Config) -> Result<SeedReport> {
    let txn = store.begin_write().await?;
    let report = SeedReport {
        materials: seed_materials(&*txn, &config.materials).await?,
        labor_types: seed_labor_types(&*txn, &config.labor_types).await?,
    };
    txn.commit().await?;

    if report.materials + report.labor_types > 0 {
        info!(
            "Seeded {} materials and {} labor types",
            report.materials, report.labor_types
        );
    }
    Ok(report)
}
