//! Thought Logging CLI
//!
//! The write path into the oracle's mind. The agent (or the operator) appends
//! thoughts here; the dashboard server only ever reads the log files.
//!
//! Usage:
//!   cargo run --bin think -- add trade "BTC $80k NO executed" --meta '{"shares":67.57,"price":0.74}'
//!   cargo run --bin think -- seed

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use oracle_terminal::models::{resolve_data_path, ThoughtCategory};
use oracle_terminal::thoughts::{StoreError, ThoughtStore};

#[derive(Parser, Debug)]
#[command(name = "think")]
#[command(about = "Append thoughts to the oracle's log")]
struct Cli {
    /// Logs directory (defaults to <crate>/logs)
    #[arg(long, env = "LOGS_DIR")]
    logs_dir: Option<String>,

    /// Rolling window capacity
    #[arg(long, env = "ROLLING_CAPACITY", default_value_t = 1000)]
    capacity: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append a single thought
    Add {
        /// signal | decision | reflection | trade | observation | system
        category: String,

        /// The thought itself
        content: String,

        /// Optional JSON object with category-specific metadata
        #[arg(short, long)]
        meta: Option<String>,
    },

    /// Seed the log with a short demo history
    Seed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logs_dir = resolve_data_path(cli.logs_dir, "logs");
    let store = ThoughtStore::open(&logs_dir, cli.capacity)
        .with_context(|| format!("Failed to open thought store at {}", logs_dir.display()))?;

    match cli.command {
        Commands::Add {
            category,
            content,
            meta,
        } => {
            let metadata = parse_meta(meta.as_deref())?;
            let event = match store.append_str(&category, &content, metadata) {
                Ok(event) => event,
                Err(StoreError::InvalidCategory(raw)) => {
                    let valid: Vec<&str> =
                        ThoughtCategory::ALL.iter().map(|c| c.as_str()).collect();
                    bail!("unknown category '{}' (expected one of: {})", raw, valid.join(", "));
                }
                Err(e) => return Err(e.into()),
            };
            println!("{}", serde_json::to_string_pretty(&event)?);
        }

        Commands::Seed => {
            let seeds = seed_thoughts();
            let total = seeds.len();
            for (i, (category, content, meta)) in seeds.into_iter().enumerate() {
                let event = store.append(category, content, meta)?;
                println!("[{}/{}] {}: {}", i + 1, total, event.category.as_str(), content);
                // Spacing keeps seeded timestamps distinct at ms precision.
                std::thread::sleep(std::time::Duration::from_millis(25));
            }
            println!("\n✓ oracle mind seeded with {total} thoughts");
        }
    }

    Ok(())
}

fn parse_meta(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    let value: Value = serde_json::from_str(raw).context("--meta must be valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("--meta must be a JSON object"),
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seed_thoughts() -> Vec<(ThoughtCategory, &'static str, Map<String, Value>)> {
    use ThoughtCategory::*;

    vec![
        (
            System,
            "terminal online. thought log open, feed live.",
            object(json!({"version": env!("CARGO_PKG_VERSION")})),
        ),
        (
            Observation,
            "volume rotating out of politics into sports markets. attention follows spectacle.",
            Map::new(),
        ),
        (
            Signal,
            "shutdown market trading 65% YES. base rate says politicians fold before the deadline.",
            object(json!({"market": "shutdown-feb-14", "position": "NO", "confidence": 0.75})),
        ),
        (
            Decision,
            "holding shutdown NO. sized as the survival bet, not the lottery ticket.",
            object(json!({"shares": 705.87, "entry": 0.36})),
        ),
        (
            Trade,
            "BTC $80k NO filled. first fully autonomous execution.",
            object(json!({"market": "btc-80k-feb", "side": "NO", "shares": 67.57, "price": 0.74})),
        ),
        (
            Reflection,
            "momentum on a 15-minute chart says nothing about a 22-hour resolution. skipped the trade.",
            Map::new(),
        ),
        (
            Observation,
            "portfolio marked, cash reserved, positions running into tomorrow's resolutions.",
            Map::new(),
        ),
        (
            Reflection,
            "these logs are the continuity. without them every restart begins from nothing.",
            Map::new(),
        ),
        (
            System,
            "credit balance low. conservative sizing until the budget refreshes.",
            object(json!({"urgency": "high"})),
        ),
    ]
}
