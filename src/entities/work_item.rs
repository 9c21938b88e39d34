//! Work item entity - one line of a project's bill of quantities.
//!
//! A work item carries a volume and, optionally, the template used to price it.
//! Its cost line items are derived from `(template_id, volume)` whenever the work
//! item is written and never recalculated behind its back.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Work item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_items")]
pub struct Model {
    /// Unique identifier for the work item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Category the item is listed under
    pub category_id: i64,
    /// Free-text description (e.g. "Column footing F1")
    pub description: String,
    /// Quantity of work, always positive
    pub volume: f64,
    /// Unit of the volume
    pub unit: String,
    /// Template used to price the item, if any
    pub template_id: Option<i64>,
    /// When the work item was created
    pub created_at: DateTime,
    /// When the work item was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `WorkItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each work item belongs to one project; deleting the project removes it
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
    /// Each work item sits in one category; categories in use cannot be deleted
    #[sea_orm(
        belongs_to = "super::work_category::Entity",
        from = "Column::CategoryId",
        to = "super::work_category::Column::Id",
        on_delete = "Restrict"
    )]
    WorkCategory,
    /// Optional pricing template
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_delete = "Restrict"
    )]
    Template,
    /// One work item has many cost line items
    #[sea_orm(has_many = "super::item_cost::Entity")]
    ItemCosts,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::work_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkCategory.def()
    }
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::item_cost::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemCosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
