//! hopqa: multi-hop question answering over an entity graph.

use std::path::PathBuf;
use std::sync::Arc;

use hopqa_core::HopQaConfig;
use hopqa_runtime::QueryRequest;
use hopqa_store::GraphSnapshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod scheduler;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("HOPQA_DATA_DIR")
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

fn open_state() -> anyhow::Result<AppState> {
    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let config = HopQaConfig::from_env(&data_dir)?;
    AppState::open(config).map_err(|e| anyhow::anyhow!("Failed to open graph store: {}", e))
}

fn print_help() {
    println!("hopqa: multi-hop question answering over an entity graph");
    println!();
    println!("Usage: hopqa [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve                      Start the HTTP server");
    println!("  import <graph.json>                 Load entities and relationships");
    println!("  centrality [entity-type]            Recompute PageRank scores");
    println!("  ask <question> [--hops N] [--limit N]  Answer a question");
    println!("  help                                Show this help message");
    println!();
    println!("Environment: HOPQA_DATA_DIR, PORT, RUST_LOG");
}

/// `--hops 2 --limit 5` style flags after the question text.
fn parse_ask(args: &[String]) -> anyhow::Result<QueryRequest> {
    let mut words = Vec::new();
    let mut request = QueryRequest::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--hops" | "--limit" => {
                let value: i64 = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} needs a value", arg))?
                    .parse()?;
                if arg == "--hops" {
                    request.max_hops = Some(value);
                } else {
                    request.result_limit = Some(value);
                }
            }
            _ => words.push(arg.as_str()),
        }
    }
    request.query_text = words.join(" ");
    Ok(request)
}

async fn serve() -> anyhow::Result<()> {
    let state = Arc::new(open_state()?);
    let port = state.config.port;

    scheduler::start_centrality_refresh(state.clone());

    let app = routes::build_router(state.clone());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("hopqa server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    match command {
        "serve" => serve().await,
        "import" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: hopqa import <graph.json>");
                std::process::exit(1);
            };
            let raw = std::fs::read_to_string(path)?;
            let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
            let state = open_state()?;
            let (entities, relationships) = state
                .store
                .import_graph(&snapshot)
                .map_err(|e| anyhow::anyhow!("Import failed: {}", e))?;
            println!("Imported {} entities and {} relationships", entities, relationships);
            Ok(())
        }
        "centrality" => {
            let state = open_state()?;
            let report = state
                .refresh_centrality(args.get(2).cloned())
                .await
                .map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        "ask" => {
            let request = parse_ask(&args[2..])?;
            let state = open_state()?;
            let response = state
                .engine
                .query(request)
                .await
                .map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))?;
            println!("{}", response.answer);
            println!();
            for r in &response.results {
                println!(
                    "{:>3}. {} ({:.3}){}  {}",
                    r.rank,
                    r.answer_entity,
                    r.final_score,
                    if r.type_match { "" } else { " [type mismatch]" },
                    r.path_rendering
                );
            }
            println!();
            println!(
                "{} paths found ({} explored) in {:.3}s",
                response.paths_found, response.total_paths_explored, response.execution_time_seconds
            );
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}. Use 'hopqa help' for usage.", other);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_parse_ask_flags() {
        let r = parse_ask(&args(&["Who", "founded", "--hops", "1", "it?", "--limit", "5"])).unwrap();
        assert_eq!(r.query_text, "Who founded it?");
        assert_eq!(r.max_hops, Some(1));
        assert_eq!(r.result_limit, Some(5));
    }

    #[test]
    fn test_parse_ask_missing_value() {
        assert!(parse_ask(&args(&["Who?", "--hops"])).is_err());
        assert!(parse_ask(&args(&["Who?", "--limit", "many"])).is_err());
    }
}
