#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use grimoire_core::config::{self, EventStoreConfig};
use grimoire_core::demo_rules::DemoRuleEngine;
use grimoire_core::directory::StaticRoomDirectory;
use grimoire_core::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use grimoire_core::logging;
use grimoire_core::room_registry::RoomRegistry;
use grimoire_core::transport::{self, AppState};

/// Grimoire -- event-sourced room core for a hidden-information social-deduction game
#[derive(Parser, Debug)]
#[command(name = "grimoire-server")]
#[command(about = "Real-time room backend for a hidden-information social-deduction game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let validation = config::validate_config(&cfg);

    if cli.validate_config {
        match validation {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Bind: {}:{}", cfg.bind_addr, cfg.port);
                println!(
                    "  Event store: {}",
                    match &cfg.event_store {
                        EventStoreConfig::InMemory => "in-memory".to_string(),
                        EventStoreConfig::Postgres { .. } => "postgres".to_string(),
                    }
                );
                println!("  Snapshot interval: {}", cfg.room.snapshot_interval);
                println!("  Mailbox capacity: {}", cfg.room.mailbox_capacity);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation?;

    logging::init_with_config(&cfg.logging);

    let addr: SocketAddr = format!("{}:{}", cfg.bind_addr, cfg.port).parse()?;
    tracing::info!(%addr, "starting grimoire-server");

    let store: Arc<dyn EventStore> = match &cfg.event_store {
        EventStoreConfig::InMemory => Arc::new(InMemoryEventStore::new()),
        EventStoreConfig::Postgres { database_url, max_connections } => {
            Arc::new(PostgresEventStore::connect(database_url, *max_connections).await?)
        }
    };

    let registry = Arc::new(RoomRegistry::new(Arc::clone(&store), cfg.room.clone()));
    let engine = Arc::new(DemoRuleEngine);
    let directory = Arc::new(StaticRoomDirectory::new());

    let state = Arc::new(AppState {
        registry,
        engine,
        directory,
        store,
        subscriber_buffer_size: cfg.room.subscriber_buffer_size,
    });

    let app: Router = transport::router::<DemoRuleEngine>().with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "grimoire-server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
