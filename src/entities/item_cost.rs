//! Item cost entity - the frozen cost snapshot of one work item.
//!
//! Each row records what one catalog item cost for one work item at the moment the
//! work item was calculated. `item_name`, `coefficient` and `unit_price_at_creation`
//! are copies, not references: later catalog edits never touch them. Rows are only
//! ever replaced wholesale when their work item is recalculated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which catalog a cost line (or template component) refers to.
///
/// Declaration order is the display order: materials sort before labor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ItemKind {
    /// Entry of the `materials` catalog
    #[sea_orm(string_value = "MATERIAL")]
    Material,
    /// Entry of the `labor_types` catalog
    #[sea_orm(string_value = "LABOR")]
    Labor,
}

impl ItemKind {
    /// Label used in logs and reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Material => "MATERIAL",
            Self::Labor => "LABOR",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Item cost database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_item_costs")]
pub struct Model {
    /// Unique identifier for the cost line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Work item this line was calculated for
    pub work_item_id: i64,
    /// Which catalog `item_id` points into
    pub item_kind: ItemKind,
    /// Referenced material or labor type id (not a foreign key; see `item_kind`)
    pub item_id: i64,
    /// Catalog name at calculation time
    pub item_name: String,
    /// Template coefficient at calculation time
    pub coefficient: f64,
    /// `coefficient * volume`
    pub quantity_needed: f64,
    /// Catalog price at calculation time
    pub unit_price_at_creation: f64,
    /// `quantity_needed * unit_price_at_creation`
    pub total_cost: f64,
    /// When the line was calculated
    pub created_at: DateTime,
    /// When the line was last written
    pub updated_at: DateTime,
}

/// Defines relationships between `ItemCost` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cost line belongs to one work item and goes away with it
    #[sea_orm(
        belongs_to = "super::work_item::Entity",
        from = "Column::WorkItemId",
        to = "super::work_item::Column::Id",
        on_delete = "Cascade"
    )]
    WorkItem,
}

impl Related<super::work_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
