//! Portfolio statistics for one user.

use crate::{
    core::summary,
    entities::{Project, project},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};

/// Headline numbers for a user's projects.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    /// Number of projects the user owns
    pub project_count: u64,
    /// Σ total cost of every line item across those projects
    pub total_cost: f64,
    /// Most recently created projects, newest first
    pub recent_projects: Vec<project::Model>,
}

/// Builds the dashboard for `owner_id`, listing at most `recent_limit` recent projects.
pub async fn get_dashboard<C>(db: &C, owner_id: i64, recent_limit: u64) -> Result<DashboardStats>
where
    C: ConnectionTrait,
{
    let project_count = Project::find()
        .filter(project::Column::OwnerId.eq(owner_id))
        .count(db)
        .await?;
    let total_cost = summary::portfolio_total_cost(db, owner_id).await?;
    let recent_projects = Project::find()
        .filter(project::Column::OwnerId.eq(owner_id))
        .order_by_desc(project::Column::CreatedAt)
        .order_by_desc(project::Column::Id)
        .limit(recent_limit)
        .all(db)
        .await?;

    Ok(DashboardStats {
        project_count,
        total_cost,
        recent_projects,
    })
}
