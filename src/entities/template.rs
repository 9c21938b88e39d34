//! Template entity - A named AHSP unit-price analysis.
//!
//! A template bundles material and labor coefficients that together yield the cost
//! of one unit of work (e.g. "1 m3 of 1:2:3 concrete").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Template database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "templates")]
pub struct Model {
    /// Unique identifier for the template
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub owner_id: i64,
    /// Template name
    pub name: String,
    /// Unit of work the coefficients are expressed against (e.g. "m3")
    pub unit: String,
    /// When the template was created
    pub created_at: DateTime,
    /// When the template was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Template and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One template has many material components
    #[sea_orm(has_many = "super::template_material_component::Entity")]
    MaterialComponents,
    /// One template has many labor components
    #[sea_orm(has_many = "super::template_labor_component::Entity")]
    LaborComponents,
    /// One template is used by many work items
    #[sea_orm(has_many = "super::work_item::Entity")]
    WorkItems,
}

impl Related<super::template_material_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterialComponents.def()
    }
}

impl Related<super::template_labor_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LaborComponents.def()
    }
}

impl Related<super::work_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
