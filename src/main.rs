use rab_maker::{
    config::{
        database::{self, Store},
        settings,
        users::{self, SessionUser},
    },
    core::{catalog, dashboard, project, report, summary},
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const RECENT_PROJECTS: u64 = 5;

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_database_dir(database_url: &str) -> Result<()> {
    if database_url.contains(":memory:") {
        return Ok(());
    }
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn print_portfolio(store: &Store, user: SessionUser) -> Result<()> {
    let stats = dashboard::get_dashboard(store.reader(), user.user_id, RECENT_PROJECTS).await?;
    println!("{}", report::render_dashboard(&stats));

    let rows = summary::summarize_all(store.reader(), user.user_id).await?;
    let rows: Vec<&summary::Summary> = rows.iter().collect();
    println!("{}", report::render_summary_table("All projects", &rows));
    Ok(())
}

async fn print_project(store: &Store, user: SessionUser, project_id: i64) -> Result<()> {
    let project = project::get_owned_project(store.reader(), user.user_id, project_id).await?;
    let summary = summary::summarize_project_with_fallback(store.reader(), project.id).await?;
    if summary.is_degraded() {
        warn!("Showing plain summary for project {project_id}");
    }
    println!("{}", report::render_project_summary(&project.name, &summary));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load config.toml (policies and default catalog)
    let config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!(
        "Policies: cost failure {:?}, template delete {:?}",
        config.policy.cost_failure, config.policy.template_delete
    );

    // 4. Open the database and make sure the schema exists
    let database_url = database::get_database_url();
    ensure_database_dir(&database_url)?;
    let store = Store::connect(&database_url)
        .await
        .inspect_err(|e| error!("Failed to open database: {e}"))?;
    let txn = store.begin_write().await?;
    database::create_tables(&*txn).await?;
    txn.commit().await?;

    // 5. Seed the system-wide catalog
    catalog::seed_default_catalog(&store, &config)
        .await
        .inspect_err(|e| error!("Failed to seed default catalog: {e}"))?;

    // 6. Print a report for the session user, if there is one
    let Some(user) = users::get_session_user() else {
        info!("RAB_USER_ID not set; database is ready");
        return Ok(());
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => print_portfolio(&store, user).await,
        [command, id] if command == "project" => {
            let project_id = id.parse::<i64>().map_err(|_| Error::Validation {
                message: format!("Invalid project id: {id}"),
            })?;
            print_project(&store, user, project_id).await
        }
        _ => Err(Error::Validation {
            message: "Usage: rab-maker [project <id>]".to_string(),
        }),
    }
    .inspect_err(|e| error!("{e} (status {})", e.status_code()))
}
