mod api;
mod cli;
mod runtime;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use pf_domain::config::{Config, ConfigSeverity, CorsConfig};
use pf_llm::{MockLlmProvider, OpenAiCompatProvider};
use pf_store::SessionStore;

use cli::{Cli, Command, ConfigCommand};
use runtime::backup::BackupScheduler;
use runtime::conductor::ConductorRegistry;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            let valid = cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("phaseforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pf_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("PhaseForge starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Workflow catalog ──────────────────────────────────────────────
    let catalog = Arc::new(
        pf_catalog::Catalog::load(&config.workflow.definition_path).context("loading workflow catalog")?,
    );
    tracing::info!(
        path = %config.workflow.definition_path.display(),
        phases = catalog.all_phases().len(),
        "workflow catalog loaded"
    );

    // ── Session store ─────────────────────────────────────────────────
    let store = SessionStore::open(&config.store.database_url)
        .await
        .context("opening session store")?;
    tracing::info!("session store ready");

    // ── Broadcaster ───────────────────────────────────────────────────
    let broadcast = Arc::new(pf_broadcast::Broadcaster::new());
    tracing::info!("broadcaster ready");

    // ── Tool Server ───────────────────────────────────────────────────
    let tools = Arc::new(pf_toolserver::ToolServer::new(
        catalog.clone(),
        store.clone(),
        broadcast.clone(),
    ));
    tracing::info!("tool server ready");

    // ── Context builder ───────────────────────────────────────────────
    let context: Arc<dyn pf_contextpack::ContextBuilder> = Arc::new(pf_contextpack::StoreContextBuilder::new(
        catalog.clone(),
        store.clone(),
    ));
    tracing::info!("context builder ready");

    // ── LLM provider ───────────────────────────────────────────────────
    let llm: Arc<dyn pf_llm::LlmProvider> = match config.llm.ai_provider.as_str() {
        "mock" => Arc::new(MockLlmProvider::default()),
        provider => {
            let base_url = config
                .llm
                .base_url
                .clone()
                .with_context(|| format!("llm.base_url is required for provider {provider}"))?;
            let api_key = std::env::var("PF_LLM_API_KEY").unwrap_or_default();
            Arc::new(OpenAiCompatProvider::new(
                provider,
                base_url,
                api_key,
                config.llm.ai_model.clone(),
            ))
        }
    };
    tracing::info!(provider = %llm.provider_id(), model = %config.llm.ai_model, "llm provider ready");

    // ── Conductor registry ─────────────────────────────────────────────
    let conductors = Arc::new(ConductorRegistry::new());
    tracing::info!("conductor registry ready");

    let state = AppState {
        config: config.clone(),
        catalog: catalog.clone(),
        store: store.clone(),
        tools,
        broadcast: broadcast.clone(),
        llm,
        context,
        conductors,
    };

    // ── Backup scheduler ──────────────────────────────────────────────
    let backup = Arc::new(BackupScheduler::new(store.clone(), &config.backup));
    {
        let backup = backup.clone();
        let interval_minutes = config.backup.interval_minutes;
        tokio::spawn(async move { backup.run(interval_minutes).await });
    }

    // ── Periodic store checkpoint ────────────────────────────────────
    {
        let store = store.clone();
        let interval_secs = config.store.checkpoint_interval_sec.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = store.checkpoint().await {
                    tracing::warn!(error = %e, "session store checkpoint failed");
                }
            }
        });
    }

    // ── Periodic broadcaster pruning ─────────────────────────────────
    {
        let broadcast = broadcast.clone();
        let idle_timeout = config.timer.inactivity_timeout_seconds as i64 * 2;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                broadcast.prune_stale(idle_timeout);
            }
        });
    }

    // ── Periodic catalog hot-reload check ────────────────────────────
    {
        let catalog = catalog.clone();
        let interval_secs = config.workflow.reload_check_interval_sec.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match catalog.check_and_reload() {
                    Ok(true) => tracing::info!("workflow catalog reloaded"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "workflow catalog reload failed"),
                }
            }
        });
    }

    // ── CORS layer ────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    let app = api::router()
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(256))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "PhaseForge listening");

    let serve_result = axum::serve(listener, app).await.context("axum server error");

    backup.final_snapshot().await;
    serve_result
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard port (e.g. `http://localhost:*`).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
