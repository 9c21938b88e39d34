//! Labor type entity - Worker roles priced by daily wage.
//!
//! Mirrors the material catalog: owner-less rows are system-wide defaults.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Labor type database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "labor_types")]
pub struct Model {
    /// Unique identifier for the labor type
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, or None for system-wide defaults
    pub owner_id: Option<i64>,
    /// Role name (e.g. "Mason", "Foreman")
    pub name: String,
    /// Unit the wage is quoted in, usually "OH" (person-day)
    pub unit: String,
    /// Current daily wage
    pub daily_wage: f64,
    /// When the labor type was created
    pub created_at: DateTime,
    /// When the labor type was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `LaborType` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One labor type is referenced by many template components
    #[sea_orm(has_many = "super::template_labor_component::Entity")]
    TemplateComponents,
}

impl Related<super::template_labor_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplateComponents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
