use anyhow::{Context, Result};
use clap::Parser;
use formfill::cli::{CheckArgs, Cli, Commands, describe_config};
use formfill::engine::{Engine, EngineOptions, Services};
use formfill::fill::{HookRegistry, ScreenCapture};
use formfill::indicator::{Indicator, LogIndicator};
use formfill::report::{LogNotifier, Notifier};
use formfill::store::{HotReloader, JsonFileStore, RuleBook};
use formfill::{Bridge, BridgeServer, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first to get debug flag
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        None => {
            let config_path = cli.config.unwrap_or_else(|| PathBuf::from("config.yaml"));
            run_coordinator(&config_path).await?
        }
        Some(Commands::Check(args)) => handle_check_command(&args)?,
    }

    Ok(())
}

/// Run the coordinator until Ctrl+C
async fn run_coordinator(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path)?;
    let definitions = config.definitions().context("Failed to load rules")?;

    let state_dir = config.state_dir();
    let state = Arc::new(JsonFileStore::new(&state_dir));
    let book = Arc::new(RuleBook::new(definitions));
    let bridge = Bridge::new(config.bridge.response_timeout);

    // Without the bridge, browser UI updates only go to the log
    let (indicator, notifier, capture): (Arc<dyn Indicator>, Arc<dyn Notifier>, _) =
        if config.bridge.enabled {
            (
                Arc::new(bridge.clone()),
                Arc::new(bridge.clone()),
                Some(Arc::new(bridge.clone()) as Arc<dyn ScreenCapture>),
            )
        } else {
            (Arc::new(LogIndicator), Arc::new(LogNotifier), None)
        };

    let services = Services {
        rules: book.clone(),
        workflows: book.clone(),
        state,
        channel: Arc::new(bridge.clone()),
        indicator,
        notifier,
        capture,
        hooks: Arc::new(HookRegistry::new()),
    };
    let (mut engine, events) = Engine::new(services, EngineOptions::from(&config));
    engine.bootstrap().await;
    let handle = engine.handle();
    let engine_task = tokio::spawn(engine.run(events));

    let server_task = if config.bridge.enabled {
        let server = BridgeServer::new(&config.bridge, bridge, handle.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("❌ Page bridge failed: {:#}", e);
            }
        }))
    } else {
        info!("Page bridge disabled in configuration");
        None
    };

    let _reloader =
        HotReloader::new(config_path, book.clone()).context("Failed to watch config file")?;

    println!("🎯 formfill started");
    println!("📂 Config file: {}", config_path.display());
    println!("💾 State directory: {}", state_dir.display());
    if config.bridge.enabled {
        println!(
            "🌐 Page bridge at ws://{}:{}/bridge",
            config.bridge.host, config.bridge.port
        );
    }
    println!("🛑 Press Ctrl+C to stop");

    signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c")?;
    println!("\n🛑 Received Ctrl+C, shutting down...");

    if let Some(task) = server_task {
        task.abort();
    }
    drop(handle);
    engine_task.abort();

    Ok(())
}

/// Handle check command
fn handle_check_command(args: &CheckArgs) -> Result<()> {
    let config = Config::from_file(&args.config).context("Failed to load config")?;
    let definitions = config.definitions().context("Failed to compile config")?;
    print!("{}", describe_config(&config, &definitions));
    Ok(())
}
