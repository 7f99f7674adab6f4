use std::env;
use std::sync::Arc;

use bson::oid::ObjectId;
use mongorm::config::MongormConfig;
use mongorm::context::RepositoryContext;
use mongorm_core::{ChangeNotifier, Document, DocumentFields, NavigationMap};
use mongorm_macros::Document;
use parking_lot::RwLock;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A minimal tracked document, wired up only to exercise one end-to-end
/// save/reload cycle from the command line.
#[derive(Default, Document)]
#[mongorm(collection = "notes")]
struct Note {
    #[mongorm(id)]
    id: RwLock<ObjectId>,
    #[mongorm(nav)]
    nav: RwLock<NavigationMap>,
    #[mongorm(notifier)]
    notifier: ChangeNotifier,
    #[mongorm(tracked)]
    body: RwLock<String>,
}

fn print_help() {
    eprintln!("mongorm {VERSION} - identity-mapped, change-tracked document mapper");
    eprintln!();
    eprintln!("Usage: mongorm [CONFIG_PATH]");
    eprintln!();
    eprintln!("Runs one demo save/reload cycle against the configured database.");
    eprintln!("CONFIG_PATH defaults to ./mongorm.toml.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --version   Print version information");
    eprintln!("  --help      Print this help message");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = "mongorm.toml".to_string();

    for arg in &args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("mongorm {VERSION}");
                return;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {arg}");
                eprintln!("Run 'mongorm --help' for usage information.");
                std::process::exit(1);
            }
            path => config_path = path.to_string(),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting mongorm v{VERSION}");

    let raw = match std::fs::read_to_string(&config_path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("failed to read {config_path}: {err}");
            std::process::exit(1);
        }
    };
    let config = match MongormConfig::from_toml_str(&raw) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to parse {config_path}: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "demo cycle failed");
        std::process::exit(1);
    }
}

async fn run(config: MongormConfig) -> mongorm::error::Result<()> {
    let context = RepositoryContext::connect(config).await?;
    let notes = context.document_set::<Note>();

    let note = Arc::new(Note::default());
    note.set_field_bson("body", bson::Bson::String("hello from mongorm".to_string()))?;
    let entry = notes.add(Arc::clone(&note));

    context.save_changes::<Note>().await?;
    tracing::info!(id = %entry.identity(), state = ?entry.state(), "saved note");

    context.reload(&entry).await?;
    tracing::info!(stats = ?context.statistics(), "reloaded note");

    context.shutdown();
    Ok(())
}
