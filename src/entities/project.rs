//! Project entity - a construction project owned by one user.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Project database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Unique identifier for the project
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub owner_id: i64,
    /// Project name
    pub name: String,
    /// Site location
    pub location: String,
    /// Client the estimate is prepared for
    pub client_name: String,
    /// When the project was created
    pub created_at: DateTime,
    /// When the project was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Project and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One project has many work items
    #[sea_orm(has_many = "super::work_item::Entity")]
    WorkItems,
}

impl Related<super::work_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
