// # ddnsd - DDNS Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add business logic, DNS logic, or retry logic here
// - All DDNS logic lives in ddns-core
//
// The ddnsd daemon is responsible for:
// 1. Reading configuration (JSON file or environment variables)
// 2. Initializing logging and the runtime
// 3. Registering providers and IP discovery
// 4. Running reconciliation cycles until SIGINT/SIGTERM
//
// ## Configuration
//
// - `DDNS_CONFIG_FILE`: JSON configuration file; when set, the variables
//   below (except the daemon options) are ignored
//
// ### DNS Provider
// - `DDNS_PROVIDER_TYPE`: Provider type (esa, cloudflare; default esa)
// - `DDNS_ACCESS_KEY_ID` / `DDNS_ACCESS_KEY_SECRET`: ESA credentials
// - `DDNS_ESA_ENDPOINT`: ESA endpoint override
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token
//
// ### Domains
// - `DDNS_IPV4_DOMAINS` / `DDNS_IPV6_DOMAINS`: Comma-separated entries,
//   `host[?k=v&...]`, host optionally written `sub:root`
// - `DDNS_IPV4_URLS` / `DDNS_IPV6_URLS`: IP discovery endpoints
// - `DDNS_TTL`: TTL override (default: provider's own)
//
// ### Engine
// - `DDNS_INTERVAL_SECS`: Seconds between cycles (default 300)
// - `DDNS_CONCURRENCY`: Domains reconciled at once per pass (default 4)
//
// ### Daemon
// - `DDNS_RUN_ONCE`: Run a single cycle and exit
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DDNS_MODE=dry-run`: Read from the provider, log writes only
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_TYPE=esa
// export DDNS_ACCESS_KEY_ID=your_id
// export DDNS_ACCESS_KEY_SECRET=your_secret
// export DDNS_IPV4_DOMAINS=home.example.com,nas.example.com
//
// ddnsd
// ```

mod config;

use anyhow::Result;
use ddns_core::{DdnsConfig, DdnsEngine, DomainSet, EngineEvent, IpCaches, ProviderRegistry};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::DaemonOptions;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected, or failed domains in run-once mode)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Everything a running daemon needs
struct Daemon {
    engine: DdnsEngine,
    events: tokio::sync::mpsc::Receiver<EngineEvent>,
    discovery: Box<dyn ddns_core::IpDiscovery>,
    domains: DomainSet,
    interval: Duration,
}

fn main() -> ExitCode {
    // Load configuration
    let (config, options) = match config::from_env() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(options.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");
    info!(
        "Configuration loaded: provider {}, {} IPv4 / {} IPv6 domain(s)",
        config.provider.type_name(),
        config.ipv4.domains.len(),
        config.ipv6.domains.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let daemon = match build_daemon(&config) {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup error: {}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match run_daemon(daemon, &options).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Wire provider, discovery, caches and engine from configuration
fn build_daemon(config: &DdnsConfig) -> ddns_core::Result<Daemon> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "esa")]
    ddns_provider_esa::register(&registry);

    #[cfg(feature = "cloudflare")]
    ddns_provider_cloudflare::register(&registry);

    #[cfg(feature = "http")]
    ddns_ip_http::register(&registry);

    debug!("Registered providers: {:?}", registry.list_providers());

    let provider = registry.create_provider(&config.provider, &config.engine)?;
    let discovery = registry.create_ip_discovery("http", config)?;
    let domains = DomainSet::from_config(config)?;
    let caches = Arc::new(IpCaches::new(config.engine.force_compare_cycles));
    let (engine, events) = DdnsEngine::new(provider, caches, config)?;

    for domain in domains.ipv4.iter().chain(domains.ipv6.iter()) {
        info!("Managing record: {}", domain);
    }

    Ok(Daemon {
        engine,
        events,
        discovery,
        domains,
        interval: Duration::from_secs(config.engine.interval_secs),
    })
}

/// Run the daemon
async fn run_daemon(daemon: Daemon, options: &DaemonOptions) -> Result<DdnsExitCode> {
    let Daemon {
        engine,
        mut events,
        discovery,
        mut domains,
        interval,
    } = daemon;

    // Engine events are only logged
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let code = if options.run_once {
        let report = engine.run_cycle(discovery.as_ref(), &mut domains).await;
        info!("Cycle finished: {}", report);
        if report.failed() > 0 {
            warn!("{} domain(s) failed", report.failed());
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    } else {
        info!("Running a cycle every {:?}", interval);
        let shutdown = shutdown_signal()?;
        engine
            .run_until(discovery.as_ref(), &mut domains, interval, shutdown)
            .await?;
        DdnsExitCode::CleanShutdown
    };

    // Closing the sender lets the event task finish
    drop(engine);
    if let Err(e) = event_log.await {
        warn!("Event log task ended abnormally: {}", e);
    }

    info!("Shutting down daemon");
    Ok(code)
}

/// Resolves on the first SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Resolves on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            return;
        }
        info!("Received shutdown signal: SIGINT");
    })
}
