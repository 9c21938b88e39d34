//! Template material component - coefficient of one material per unit of work.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Template material component database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "template_material_components")]
pub struct Model {
    /// Unique identifier for the component
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning template
    pub template_id: i64,
    /// Referenced material
    pub material_id: i64,
    /// Quantity of the material required per unit of work
    pub coefficient: f64,
    /// When the component was created
    pub created_at: DateTime,
    /// When the component was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between the component and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each component belongs to one template
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_delete = "Cascade"
    )]
    Template,
    /// Each component references one material
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id",
        on_delete = "Cascade"
    )]
    Material,
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
