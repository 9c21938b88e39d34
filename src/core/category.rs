//! Work category business logic.
//!
//! Categories group a project's work items (e.g. "Preparation", "Structure").
//! Deleting them goes through [`deletion`](crate::core::deletion), which refuses while
//! any work item still uses the category.

use crate::{
    config::database::Store,
    core::{MAX_NAME_LEN, now, require_owner, require_text},
    entities::{WorkCategory, work_category},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Creates a category for `owner_id`.
pub async fn create_category(
    store: &Store,
    owner_id: i64,
    name: &str,
    display_order: i32,
) -> Result<work_category::Model> {
    let name = require_text("Category name", name, MAX_NAME_LEN)?;

    let txn = store.begin_write().await?;
    let timestamp = now();
    let model = work_category::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(name),
        display_order: Set(display_order),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&*txn)
    .await?;
    txn.commit().await?;
    Ok(model)
}

/// Finds a category by id regardless of owner.
pub async fn get_category_by_id<C>(db: &C, category_id: i64) -> Result<Option<work_category::Model>>
where
    C: ConnectionTrait,
{
    WorkCategory::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a category owned by `user_id`.
pub async fn get_owned_category<C>(
    db: &C,
    user_id: i64,
    category_id: i64,
) -> Result<work_category::Model>
where
    C: ConnectionTrait,
{
    let model = get_category_by_id(db, category_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "work category",
            id: category_id,
        })?;
    require_owner("work category", category_id, model.owner_id, user_id)?;
    Ok(model)
}

/// Lists the user's categories by display order, then name.
pub async fn list_categories<C>(db: &C, user_id: i64) -> Result<Vec<work_category::Model>>
where
    C: ConnectionTrait,
{
    WorkCategory::find()
        .filter(work_category::Column::OwnerId.eq(user_id))
        .order_by_asc(work_category::Column::DisplayOrder)
        .order_by_asc(work_category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames or reorders a category.
pub async fn update_category(
    store: &Store,
    user_id: i64,
    category_id: i64,
    name: &str,
    display_order: i32,
) -> Result<work_category::Model> {
    let name = require_text("Category name", name, MAX_NAME_LEN)?;

    let txn = store.begin_write().await?;
    let existing = get_owned_category(&*txn, user_id, category_id).await?;
    let mut active: work_category::ActiveModel = existing.into();
    active.name = Set(name);
    active.display_order = Set(display_order);
    active.updated_at = Set(now());
    let model = active.update(&*txn).await?;
    txn.commit().await?;
    Ok(model)
}
