//! Project business logic - projects and the ownership checks everything else leans on.
//!
//! A project owns its work items, and they own their cost line items, so deleting
//! a project removes all three in one write transaction.

use crate::{
    config::database::Store,
    core::{MAX_NAME_LEN, now, require_owner, require_text},
    entities::{ItemCost, Project, WorkItem, item_cost, project, work_item},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, QueryTrait, Set, prelude::*};
use tracing::info;

const MAX_DETAIL_LEN: usize = 255;

fn optional_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_DETAIL_LEN {
        return Err(Error::validation(format!(
            "{field} must be at most {MAX_DETAIL_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Creates a project for `owner_id`. Location and client may be left blank.
pub async fn create_project(
    store: &Store,
    owner_id: i64,
    name: &str,
    location: &str,
    client_name: &str,
) -> Result<project::Model> {
    let name = require_text("Project name", name, MAX_NAME_LEN)?;
    let location = optional_text("Location", location)?;
    let client_name = optional_text("Client name", client_name)?;

    let txn = store.begin_write().await?;
    let timestamp = now();
    let model = project::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(name),
        location: Set(location),
        client_name: Set(client_name),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;

    info!("Created project {} ({})", model.id, model.name);
    Ok(model)
}

/// Finds a project by id regardless of owner.
pub async fn get_project_by_id<C>(db: &C, project_id: i64) -> Result<Option<project::Model>>
where
    C: ConnectionTrait,
{
    Project::find_by_id(project_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a project owned by `user_id`.
///
/// Returns `NotFound` for a missing project and `OwnershipViolation` for someone else's.
pub async fn get_owned_project<C>(db: &C, user_id: i64, project_id: i64) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    let model = get_project_by_id(db, project_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "project",
            id: project_id,
        })?;
    require_owner("project", project_id, model.owner_id, user_id)?;
    Ok(model)
}

/// Lists the user's projects, most recently created first.
pub async fn list_projects<C>(db: &C, user_id: i64) -> Result<Vec<project::Model>>
where
    C: ConnectionTrait,
{
    Project::find()
        .filter(project::Column::OwnerId.eq(user_id))
        .order_by_desc(project::Column::CreatedAt)
        .order_by_desc(project::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates the descriptive fields of a project.
pub async fn update_project(
    store: &Store,
    user_id: i64,
    project_id: i64,
    name: &str,
    location: &str,
    client_name: &str,
) -> Result<project::Model> {
    let name = require_text("Project name", name, MAX_NAME_LEN)?;
    let location = optional_text("Location", location)?;
    let client_name = optional_text("Client name", client_name)?;

    let txn = store.begin_write().await?;
    let existing = get_owned_project(&*txn, user_id, project_id).await?;
    let mut active: project::ActiveModel = existing.into();
    active.name = Set(name);
    active.location = Set(location);
    active.client_name = Set(client_name);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Deletes a project with all its work items and their cost line items.
pub async fn delete_project(store: &Store, user_id: i64, project_id: i64) -> Result<()> {
    let txn = store.begin_write().await?;
    get_owned_project(&*txn, user_id, project_id).await?;

    let work_item_ids = WorkItem::find()
        .select_only()
        .column(work_item::Column::Id)
        .filter(work_item::Column::ProjectId.eq(project_id))
        .into_query();
    let lines = ItemCost::delete_many()
        .filter(item_cost::Column::WorkItemId.in_subquery(work_item_ids))
        .exec(&*txn)
        .await?;
    let items = WorkItem::delete_many()
        .filter(work_item::Column::ProjectId.eq(project_id))
        .exec(&*txn)
        .await?;
    Project::delete_by_id(project_id).exec(&*txn).await?;
    txn.commit().await?;

    info!(
        "Deleted project {project_id} with {} work items and {} cost lines",
        items.rows_affected, lines.rows_affected
    );
    Ok(())
}
