//! Server entry point: configuration, logging, wiring and transport select.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nordvaer::config::{Config, EXIT_CONFIG};
use nordvaer::gazetteer::{PlaceStore, Resolver};
use nordvaer::metrics::MetricsRegistry;
use nordvaer::router::McpRouter;
use nordvaer::tools::{self, AppState};
use nordvaer::transport::{HttpTransport, StdioTransport};
use nordvaer::upstream::{RequestPolicy, UpstreamClient};
use nordvaer::{prompts, resources};

#[derive(Parser, Debug)]
#[command(name = "nordvaer")]
#[command(about = "MCP tool server for Nordic weather and Norwegian place names")]
struct Args {
    /// Serve HTTP on this port (overrides NORDVAER_HTTP_PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level: debug, info, warn, error (overrides NORDVAER_LOG_LEVEL).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(config.log_level.as_filter());

    // Stdout is reserved for protocol frames; all diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nordvaer={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(config, args.port).await {
        tracing::error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run(config: Config, port_override: Option<u16>) -> nordvaer::Result<()> {
    let proxy = UpstreamClient::new(RequestPolicy::proxy(
        &config.proxy_url,
        config.proxy_timeout,
        config.proxy_connect_timeout,
    ))
    .map_err(|e| nordvaer::Error::Internal(e.to_string()))?;
    let frost = UpstreamClient::new(RequestPolicy::frost(
        &config.frost_url,
        config.frost_client_id.as_deref(),
        config.frost_timeout,
    ))
    .map_err(|e| nordvaer::Error::Internal(e.to_string()))?;

    // The gazetteer is optional: without it the server runs with the
    // weather tools only.
    let resolver = match PlaceStore::open(&config.gazetteer_path) {
        Ok(store) => Some(Arc::new(Resolver::new(Arc::new(store)))),
        Err(e) => {
            tracing::warn!(error = %e, "Continuing without the place resolver");
            None
        }
    };

    let metrics = MetricsRegistry::new();
    let state = Arc::new(AppState::new(proxy, frost, resolver.clone()));
    tools::register_all(&state, &metrics);

    tracing::info!(
        proxy_reachable = state.proxy.probe_health().await,
        frost_reachable = state.frost.probe_health().await,
        "Upstream health at startup"
    );

    let mut router = McpRouter::new()
        .server_info("nordvaer", env!("CARGO_PKG_VERSION"))
        .instructions(
            "Weather and place-name tools for Norway and the Nordics. \
             Resolve place names with places.resolve_name, fetch forecasts \
             with the weather.get_* tools, and use weather.assess_* for \
             activity windows and marine route risk. All weather data is \
             from MET Norway (CC BY 4.0).",
        )
        .toolset(state.tools.clone());
    for resource in resources::build_all(resolver.as_ref()) {
        router = router.resource(resource);
    }
    for prompt in prompts::build_all() {
        router = router.prompt(prompt);
    }

    let port = port_override.or(config.http_port);
    match port {
        Some(port) => {
            let transport = HttpTransport::new(router, metrics)
                .with_auth(config.auth_mode, config.auth_secret.clone());
            transport.serve(&format!("0.0.0.0:{}", port)).await
        }
        None => StdioTransport::new(router).run().await,
    }
}
