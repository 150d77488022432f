use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Thought categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtCategory {
    Signal,
    Decision,
    Reflection,
    Trade,
    Observation,
    System,
}

impl ThoughtCategory {
    pub const ALL: [ThoughtCategory; 6] = [
        ThoughtCategory::Signal,
        ThoughtCategory::Decision,
        ThoughtCategory::Reflection,
        ThoughtCategory::Trade,
        ThoughtCategory::Observation,
        ThoughtCategory::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtCategory::Signal => "signal",
            ThoughtCategory::Decision => "decision",
            ThoughtCategory::Reflection => "reflection",
            ThoughtCategory::Trade => "trade",
            ThoughtCategory::Observation => "observation",
            ThoughtCategory::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "signal" => Some(ThoughtCategory::Signal),
            "decision" => Some(ThoughtCategory::Decision),
            "reflection" => Some(ThoughtCategory::Reflection),
            "trade" => Some(ThoughtCategory::Trade),
            "observation" => Some(ThoughtCategory::Observation),
            "system" => Some(ThoughtCategory::System),
            _ => None,
        }
    }
}

/// A single immutable thought record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtEvent {
    pub id: String,
    #[serde(with = "ts_millis")]
    pub timestamp: DateTime<Utc>,
    pub category: ThoughtCategory,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Timestamps on the wire are RFC 3339 truncated to milliseconds, matching
/// what the agent's other tooling writes into the same log files.
pub mod ts_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub logs_dir: PathBuf,
    pub public_dir: PathBuf,
    pub positions_file: PathBuf,
    pub polymarket_wallet: Option<String>,
    pub rolling_capacity: usize,
    pub stream_tick_ms: u64,
    pub mission_budget: f64,
    pub mission_starting_spend: f64,
    pub admin_token: Option<String>,
    pub panic_script: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3333".to_string())
            .parse()
            .unwrap_or(3333);

        let logs_dir = resolve_data_path(std::env::var("LOGS_DIR").ok(), "logs");
        let public_dir = resolve_data_path(std::env::var("PUBLIC_DIR").ok(), "public");
        let positions_file =
            resolve_data_path(std::env::var("POSITIONS_FILE").ok(), "positions.json");
        let panic_script = resolve_data_path(std::env::var("PANIC_SCRIPT").ok(), "panic.sh");

        let polymarket_wallet = std::env::var("POLYMARKET_WALLET")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let rolling_capacity = std::env::var("ROLLING_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1000);

        let stream_tick_ms = std::env::var("STREAM_TICK_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1000);

        let mission_budget = std::env::var("MISSION_BUDGET")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|&v| v > 0.0)
            .unwrap_or(1000.0);

        let mission_starting_spend = std::env::var("MISSION_STARTING_SPEND")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        let admin_token = std::env::var("ADMIN_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            port,
            logs_dir,
            public_dir,
            positions_file,
            polymarket_wallet,
            rolling_capacity,
            stream_tick_ms,
            mission_budget,
            mission_starting_spend,
            admin_token,
            panic_script,
        })
    }
}

fn default_data_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(filename)
}

pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> PathBuf {
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p;
    }

    // Treat relative paths as relative to the crate dir, not the caller's cwd.
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(p)
}
