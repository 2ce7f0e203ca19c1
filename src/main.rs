use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handover_core::config::{
    contingency_rule_from_env_value, load_checklist, retry_policy_from_env_value,
    save_debounce_from_env_value, shift_tag_from_env_value,
};
use handover_core::constants::DEFAULT_DATA_DIR;
use handover_core::{CoreConfig, FileSectionStore, HandoverService, StaticRoster};

mod routes;

use routes::AppState;

const DEFAULT_ROSTER_FILE: &str = "demos/roster.yaml";

/// Main entry point for the handover service
///
/// Loads configuration from the environment (and `.env`), opens a handover session over
/// the roster's patients and serves it over REST.
///
/// # Environment Variables
/// - `HANDOVER_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HANDOVER_DATA_DIR`: directory for saved sections (default: "handover_data")
/// - `HANDOVER_ROSTER_FILE`: roster YAML with patients and staff (default: "demos/roster.yaml")
/// - `HANDOVER_SHIFT`: current shift transition, e.g. "Night→Day" or "Day->Evening"
/// - `HANDOVER_SAVE_DEBOUNCE_MS`: quiet period before a section is saved (default: 1000)
/// - `HANDOVER_SAVE_MAX_ATTEMPTS`: save attempts for transient failures (default: 3)
/// - `HANDOVER_CONTINGENCY_DELETE`: `assigned_physician` or `assigned_physician_current_shift`
/// - `HANDOVER_CHECKLIST_FILE`: optional YAML confirmation checklist
///
/// # Errors
/// Returns an error if the configuration or roster is invalid, the data directory cannot
/// be created, or the server fails to bind or run.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("handover=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("HANDOVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;

    let cfg = Arc::new(config_from_env()?);
    tokio::fs::create_dir_all(cfg.data_dir()).await?;

    let roster_file =
        std::env::var("HANDOVER_ROSTER_FILE").unwrap_or_else(|_| DEFAULT_ROSTER_FILE.into());
    let roster = Arc::new(StaticRoster::load(Path::new(&roster_file))?);

    let store = Arc::new(FileSectionStore::from_config(&cfg));
    let service = HandoverService::new(cfg.clone(), store).open(roster.clone())?;

    tracing::info!(
        "++ Starting handover REST on {} (shift {}, data in {})",
        addr,
        cfg.current_shift(),
        cfg.data_dir().display()
    );

    let app = routes::router(AppState { service, roster }).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Resolves [`CoreConfig`] from environment variables once at startup.
fn config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = std::env::var("HANDOVER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let shift = shift_tag_from_env_value(std::env::var("HANDOVER_SHIFT").ok())?;
    let debounce = save_debounce_from_env_value(std::env::var("HANDOVER_SAVE_DEBOUNCE_MS").ok())?;
    let retry = retry_policy_from_env_value(std::env::var("HANDOVER_SAVE_MAX_ATTEMPTS").ok())?;
    let rule =
        contingency_rule_from_env_value(std::env::var("HANDOVER_CONTINGENCY_DELETE").ok())?;

    let mut cfg = CoreConfig::new(data_dir, shift)
        .with_save_debounce(debounce)
        .with_retry_policy(retry)?
        .with_contingency_delete_rule(rule);

    if let Ok(path) = std::env::var("HANDOVER_CHECKLIST_FILE") {
        let items = load_checklist(Path::new(&path))?;
        cfg = cfg.with_checklist(items)?;
    }

    Ok(cfg)
}
