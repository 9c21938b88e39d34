//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod item_cost;
pub mod labor_type;
pub mod material;
pub mod project;
pub mod template;
pub mod template_labor_component;
pub mod template_material_component;
pub mod work_category;
pub mod work_item;

// Re-export specific types to avoid conflicts
pub use item_cost::{
    Column as ItemCostColumn, Entity as ItemCost, ItemKind, Model as ItemCostModel,
};
pub use labor_type::{Column as LaborTypeColumn, Entity as LaborType, Model as LaborTypeModel};
pub use material::{Column as MaterialColumn, Entity as Material, Model as MaterialModel};
pub use project::{Column as ProjectColumn, Entity as Project, Model as ProjectModel};
pub use template::{Column as TemplateColumn, Entity as Template, Model as TemplateModel};
pub use template_labor_component::{
    Column as TemplateLaborComponentColumn, Entity as TemplateLaborComponent,
    Model as TemplateLaborComponentModel,
};
pub use template_material_component::{
    Column as TemplateMaterialComponentColumn, Entity as TemplateMaterialComponent,
    Model as TemplateMaterialComponentModel,
};
pub use work_category::{
    Column as WorkCategoryColumn, Entity as WorkCategory, Model as WorkCategoryModel,
};
pub use work_item::{Column as WorkItemColumn, Entity as WorkItem, Model as WorkItemModel};
