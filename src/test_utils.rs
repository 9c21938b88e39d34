//! Shared test utilities for RAB Maker.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::{database::Store, settings::CostFailurePolicy},
    core::{category, catalog, project, template, work_item},
    entities::{
        labor_type, material, project as project_entity, template as template_entity,
        work_category, work_item as work_item_entity,
    },
    errors::Result,
};

/// Owner used by every helper unless a test says otherwise
pub const TEST_OWNER: i64 = 1;
/// A second owner for ownership-violation tests
pub const OTHER_OWNER: i64 = 2;

/// Floating-point tolerance for cost assertions
pub const EPSILON: f64 = 1e-9;

/// Asserts two floats are within [`EPSILON`] of each other.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {expected}, got {actual}"
    );
}

/// Creates an in-memory `SQLite` store with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_store() -> Result<Store> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(Store::from_connection(db))
}

/// Creates a material owned by [`TEST_OWNER`].
pub async fn create_test_material(
    store: &Store,
    name: &str,
    unit_price: f64,
) -> Result<material::Model> {
    catalog::create_material(
        store,
        Some(TEST_OWNER),
        name,
        "kg",
        unit_price,
    )
    .await
}

/// Creates a labor type owned by [`TEST_OWNER`].
pub async fn create_test_labor(
    store: &Store,
    name: &str,
    daily_wage: f64,
) -> Result<labor_type::Model> {
    catalog::create_labor_type(
        store,
        Some(TEST_OWNER),
        name,
        "OH",
        daily_wage,
    )
    .await
}

/// Creates an empty template owned by [`TEST_OWNER`].
pub async fn create_test_template(store: &Store, name: &str) -> Result<template_entity::Model> {
    template::create_template(store, TEST_OWNER, name, "m3").await
}

/// Creates a category owned by [`TEST_OWNER`].
pub async fn create_test_category(store: &Store, name: &str) -> Result<work_category::Model> {
    category::create_category(store, TEST_OWNER, name, 1).await
}

/// Creates a project owned by [`TEST_OWNER`].
pub async fn create_test_project(store: &Store, name: &str) -> Result<project_entity::Model> {
    project::create_project(
        store,
        TEST_OWNER,
        name,
        "Bandung",
        "PT Test Client",
    )
    .await
}

/// Builds a work-item input with a fixed unit and description.
#[must_use]
pub fn work_item_input(
    category_id: i64,
    volume: f64,
    template_id: Option<i64>,
) -> work_item::WorkItemInput {
    work_item::WorkItemInput {
        category_id,
        description: "Test work item".to_string(),
        volume,
        unit: "m3".to_string(),
        template_id,
    }
}

/// Creates a work item under the strict policy.
pub async fn create_test_work_item(
    store: &Store,
    project_id: i64,
    category_id: i64,
    volume: f64,
    template_id: Option<i64>,
) -> Result<work_item_entity::Model> {
    let written = work_item::create_work_item(
        store,
        TEST_OWNER,
        project_id,
        &work_item_input(category_id, volume, template_id),
        CostFailurePolicy::Strict,
    )
    .await?;
    Ok(written.work_item)
}

/// A fully priced template: one material and one labor component.
pub struct PricedTemplate {
    /// The template
    pub template: template_entity::Model,
    /// Material referenced with coefficient 2.0
    pub material: material::Model,
    /// Labor type referenced with coefficient 0.5
    pub labor: labor_type::Model,
}

/// Creates a template with cement (coefficient 2.0 @ 100.0) and a mason (0.5 @ 150.0).
pub async fn create_priced_template(store: &Store) -> Result<PricedTemplate> {
    let material = create_test_material(store, "Cement", 100.0).await?;
    let labor = create_test_labor(store, "Mason", 150.0).await?;
    let template = create_test_template(store, "Concrete 1:2:3").await?;
    template::add_material_component(store, TEST_OWNER, template.id, material.id, 2.0).await?;
    template::add_labor_component(store, TEST_OWNER, template.id, labor.id, 0.5).await?;
    Ok(PricedTemplate {
        template,
        material,
        labor,
    })
}

/// Sets up a store with one project and one category.
/// Returns (store, project, category) for work item scenarios.
pub async fn setup_with_project() -> Result<(Store, project_entity::Model, work_category::Model)> {
    let store = setup_test_store().await?;
    let project = create_test_project(&store, "Test Project").await?;
    let category = create_test_category(&store, "Structure").await?;
    Ok((store, project, category))
}
