//! Material entity - Priced catalog entries consumed by template components.
//!
//! A material with no `owner_id` is part of the system-wide default catalog and is
//! visible to every user. The `unit_price` is the *current* price; cost line items
//! freeze their own copy when they are calculated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, or None for system-wide defaults
    pub owner_id: Option<i64>,
    /// Display name (e.g. "Portland cement")
    pub name: String,
    /// Unit the price is quoted in (e.g. "kg", "m3")
    pub unit: String,
    /// Current price per unit
    pub unit_price: f64,
    /// When the material was created
    pub created_at: DateTime,
    /// When the material was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One material is referenced by many template components
    #[sea_orm(has_many = "super::template_material_component::Entity")]
    TemplateComponents,
}

impl Related<super::template_material_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplateComponents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
