//! Work category entity - groups work items inside a project (e.g. "Foundation").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Work category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub owner_id: i64,
    /// Category name
    pub name: String,
    /// Sort position when listing categories
    pub display_order: i32,
    /// When the category was created
    pub created_at: DateTime,
    /// When the category was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `WorkCategory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One category holds many work items
    #[sea_orm(has_many = "super::work_item::Entity")]
    WorkItems,
}

impl Related<super::work_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
