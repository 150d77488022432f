//! Mission Control
//!
//! Approximate API spend and token bookkeeping for the agent, persisted as a
//! single JSON blob next to the thought logs. CRUD-level glue: load, add
//! numbers, save. The agent writes from its own process; the dashboard only
//! reads status.

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Cost per million tokens (approximate)
const MODEL_COSTS: &[(&str, f64, f64)] = &[
    ("claude-opus-4-5", 15.0, 75.0),
    ("claude-sonnet-4", 3.0, 15.0),
    ("claude-haiku", 0.25, 1.25),
    ("hermes-4.3-36b", 0.03, 0.10),
    ("hermes-4-70b", 0.05, 0.20),
    ("gpt-4o", 2.5, 10.0),
];

/// Flat fallback for calls against models missing from the table.
const UNKNOWN_MODEL_COST: f64 = 0.01;

const MAX_ACTIONS: usize = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyLog {
    pub spend: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub actions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: String,
    pub action: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionData {
    pub created: String,
    pub total_spend: f64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    #[serde(default)]
    pub daily_logs: BTreeMap<String, DailyLog>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MissionTotals {
    pub spend: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub actions: usize,
}

#[derive(Debug, Serialize)]
pub struct MissionStatus {
    pub total: MissionTotals,
    pub today: DailyLog,
    pub week_avg_spend: f64,
    pub budget: f64,
    /// Days left at the 7-day average burn rate; `None` until there is one.
    pub runway_days: Option<u64>,
    pub last_updated: String,
    pub recent_actions: Vec<ActionRecord>,
}

pub struct MissionTracker {
    path: PathBuf,
    starting_spend: f64,
    budget: f64,
    // Serializes the load-modify-save cycle within this process.
    lock: Mutex<()>,
}

impl MissionTracker {
    pub fn new(path: PathBuf, starting_spend: f64, budget: f64) -> Self {
        Self {
            path,
            starting_spend,
            budget,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> MissionData {
        // Missing or corrupt file starts a fresh mission; totals live in the
        // file, not in memory.
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| MissionData {
                created: Utc::now().to_rfc3339(),
                total_spend: self.starting_spend,
                total_tokens_in: 0,
                total_tokens_out: 0,
                daily_logs: BTreeMap::new(),
                actions: Vec::new(),
                last_updated: None,
            })
    }

    fn save(&self, data: &MissionData) -> Result<()> {
        let raw = serde_json::to_string_pretty(data).context("Failed to serialize mission data")?;
        fs::write(&self.path, raw).context("Failed to write mission file")?;
        Ok(())
    }

    pub fn status(&self) -> Result<MissionStatus> {
        let _guard = self.lock.lock();
        let data = self.load();

        let today_key = Utc::now().format("%Y-%m-%d").to_string();
        let today = data.daily_logs.get(&today_key).cloned().unwrap_or_default();

        // BTreeMap keys are date strings, already sorted: last 7 entries.
        let week: Vec<&DailyLog> = data.daily_logs.values().rev().take(7).collect();
        let week_avg_spend = if week.is_empty() {
            0.0
        } else {
            week.iter().map(|d| d.spend).sum::<f64>() / week.len() as f64
        };

        let remaining = (self.budget - data.total_spend).max(0.0);
        let runway_days = if week_avg_spend > 0.0 {
            Some((remaining / week_avg_spend).floor() as u64)
        } else {
            None
        };

        let recent_actions: Vec<ActionRecord> =
            data.actions.iter().rev().take(20).cloned().collect();

        Ok(MissionStatus {
            total: MissionTotals {
                spend: data.total_spend,
                tokens_in: data.total_tokens_in,
                tokens_out: data.total_tokens_out,
                actions: data.actions.len(),
            },
            today,
            week_avg_spend,
            budget: self.budget,
            runway_days,
            last_updated: data.last_updated.unwrap_or(data.created),
            recent_actions,
        })
    }

    /// Record one model call: updates totals, the daily log, and the capped
    /// action history.
    pub fn log_action(
        &self,
        action: &str,
        model: &str,
        tokens_in: u64,
        tokens_out: u64,
        cost: f64,
    ) -> Result<MissionData> {
        let _guard = self.lock.lock();
        let mut data = self.load();
        let now = Utc::now().to_rfc3339();
        let today_key = Utc::now().format("%Y-%m-%d").to_string();

        data.total_spend += cost;
        data.total_tokens_in += tokens_in;
        data.total_tokens_out += tokens_out;
        data.last_updated = Some(now.clone());

        let daily = data.daily_logs.entry(today_key).or_default();
        daily.spend += cost;
        daily.tokens_in += tokens_in;
        daily.tokens_out += tokens_out;
        daily.actions += 1;

        data.actions.push(ActionRecord {
            timestamp: now,
            action: action.to_string(),
            model: model.to_string(),
            tokens_in,
            tokens_out,
            cost,
        });
        if data.actions.len() > MAX_ACTIONS {
            let excess = data.actions.len() - MAX_ACTIONS;
            data.actions.drain(..excess);
        }

        self.save(&data)?;
        Ok(data)
    }

    /// Operator correction of the running total.
    pub fn set_total_spend(&self, amount: f64) -> Result<MissionData> {
        let _guard = self.lock.lock();
        let mut data = self.load();
        data.total_spend = amount;
        data.last_updated = Some(Utc::now().to_rfc3339());
        self.save(&data)?;
        Ok(data)
    }

    /// Operator correction of one day's spend.
    pub fn set_daily_spend(&self, date: &str, spend: f64) -> Result<MissionData> {
        let _guard = self.lock.lock();
        let mut data = self.load();
        data.daily_logs.entry(date.to_string()).or_default().spend = spend;
        data.last_updated = Some(Utc::now().to_rfc3339());
        self.save(&data)?;
        Ok(data)
    }
}

/// Estimate the cost of one model call from the per-million-token table.
/// Models are matched by substring so versioned names still resolve.
pub fn estimate_cost(model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    let needle = model.to_ascii_lowercase();
    for (name, input, output) in MODEL_COSTS {
        if needle.contains(name) {
            return (tokens_in as f64 * input + tokens_out as f64 * output) / 1_000_000.0;
        }
    }
    UNKNOWN_MODEL_COST
}
