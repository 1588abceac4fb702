//! Linkweave — hybrid vector + graph retrieval server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;
mod state;

use linkweave_core::LinkweaveConfig;
use linkweave_runtime::Engine;
use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("LINKWEAVE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn open_engine(data_dir: &std::path::Path) -> anyhow::Result<Engine> {
    let config = LinkweaveConfig::from_env(data_dir)?;
    Engine::open(config).map_err(|e| anyhow::anyhow!("Failed to open stores: {}", e))
}

fn print_help() {
    println!("Linkweave — hybrid vector + graph retrieval server");
    println!();
    println!("Usage: linkweave [command]");
    println!();
    println!("Commands:");
    println!("  (none)                   Start the server");
    println!("  stats [data-dir]         Print store statistics and exit");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  LINKWEAVE_DATA_DIR       Data directory (default: data)");
    println!("  PORT                     HTTP port (default: 8000)");
    println!("  RUST_LOG                 Log filter (default: info)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--stats" | "stats" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                let engine = open_engine(&data_dir)?;
                println!("{}", serde_json::to_string_pretty(&engine.stats())?);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'linkweave help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let engine = tokio::task::spawn_blocking(move || open_engine(&data_dir)).await??;
    let port = engine.config().port;
    info!("Relation strategy: {:?}", engine.relation_strategy());

    let state = Arc::new(AppState::new(engine));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Linkweave server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
