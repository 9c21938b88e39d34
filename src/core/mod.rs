//! Core business logic - framework-agnostic catalog, template, project and costing operations.
//!
//! Reads take any `ConnectionTrait` so they can run against the read pool or inside a
//! write transaction. Writes take the [`Store`](crate::config::database::Store) and open
//! their own [`WriteTxn`](crate::config::database::WriteTxn).

/// Materials and labor types
pub mod catalog;
/// Work categories
pub mod category;
/// Cost calculation engine
pub mod costing;
/// Portfolio statistics
pub mod dashboard;
/// Deletion guard for catalog entries, templates and categories
pub mod deletion;
/// Projects and ownership checks
pub mod project;
/// Plain-text rendering of summaries
pub mod report;
/// Cost snapshot store
pub mod snapshot;
/// Aggregation engine
pub mod summary;
/// AHSP templates and their components
pub mod template;
/// Work item writes that drive the cost engine
pub mod work_item;

use crate::errors::{Error, Result};

/// Longest name accepted for catalog entries, templates, categories and projects.
pub const MAX_NAME_LEN: usize = 100;
/// Longest unit label accepted.
pub const MAX_UNIT_LEN: usize = 20;

/// Trims `value` and rejects it if empty or longer than `max_len` characters.
pub(crate) fn require_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Accepts finite, non-negative prices.
pub(crate) fn require_price(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

/// Accepts finite, strictly positive volumes and coefficients.
pub(crate) fn require_positive(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

/// Ensures a row owned by `owner_id` may be modified by `user_id`.
pub(crate) fn require_owner(
    entity: &'static str,
    id: i64,
    owner_id: i64,
    user_id: i64,
) -> Result<()> {
    if owner_id == user_id {
        Ok(())
    } else {
        Err(Error::OwnershipViolation { entity, id })
    }
}

pub(crate) fn now() -> sea_orm::prelude::DateTime {
    chrono::Utc::now().naive_utc()
}
