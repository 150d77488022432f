//! Polymarket Positions Source
//!
//! Pass-through reshape of position data for the dashboard, from either the
//! live data API (when a wallet is configured) or a manually maintained local
//! snapshot file. No store invariants apply here; it is display plumbing.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DATA_API_BASE: &str = "https://data-api.polymarket.com";

/// One position, reshaped for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPosition {
    pub title: String,
    pub outcome: String,
    pub shares: f64,
    pub avg_price: f64,
    pub cur_price: f64,
    pub value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thesis: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_pnl: f64,
    pub cash: f64,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub positions: Vec<DisplayPosition>,
    pub summary: PortfolioSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub source: &'static str,
}

// ===== Snapshot file (manually updated, snake_case) =====

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    positions: Vec<SnapshotPosition>,
    portfolio: SnapshotPortfolio,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotPosition {
    market: String,
    side: String,
    shares: f64,
    avg_price: f64,
    current_price: f64,
    value: f64,
    pnl: f64,
    pnl_pct: f64,
    resolves: Option<String>,
    thesis: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotPortfolio {
    total_value: f64,
    pnl: f64,
    cash: f64,
    total: f64,
}

// ===== Data API (camelCase) =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataApiPosition {
    title: Option<String>,
    outcome: Option<String>,
    #[serde(default)]
    size: f64,
    #[serde(default)]
    avg_price: f64,
    #[serde(default)]
    cur_price: f64,
    #[serde(default)]
    current_value: f64,
    #[serde(default)]
    cash_pnl: f64,
    #[serde(default)]
    percent_pnl: f64,
    end_date: Option<String>,
}

pub struct PositionsSource {
    client: Client,
    snapshot_file: PathBuf,
    wallet: Option<String>,
}

impl PositionsSource {
    pub fn new(snapshot_file: PathBuf, wallet: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("oracle-terminal/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            snapshot_file,
            wallet,
        })
    }

    /// Current positions: live API when a wallet is configured, otherwise the
    /// snapshot file. A live failure degrades to the snapshot with a warning.
    pub async fn fetch(&self) -> Result<PositionsResponse> {
        if let Some(wallet) = &self.wallet {
            match self.fetch_live(wallet).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!("live positions fetch failed, falling back to snapshot: {}", e);
                }
            }
        }
        self.read_snapshot()
    }

    async fn fetch_live(&self, wallet: &str) -> Result<PositionsResponse> {
        let url = format!("{}/positions", DATA_API_BASE);
        let response = self
            .client
            .get(&url)
            .query(&[("user", wallet)])
            .send()
            .await
            .context("Failed to reach Polymarket data API")?;

        if !response.status().is_success() {
            bail!("data API error {}", response.status());
        }

        let raw: Vec<DataApiPosition> = response
            .json()
            .await
            .context("Failed to parse positions response")?;

        let positions: Vec<DisplayPosition> = raw
            .into_iter()
            .map(|p| DisplayPosition {
                title: p.title.unwrap_or_else(|| "unknown market".to_string()),
                outcome: p.outcome.unwrap_or_default(),
                shares: p.size,
                avg_price: p.avg_price,
                cur_price: p.cur_price,
                value: p.current_value,
                pnl: p.cash_pnl,
                pnl_pct: p.percent_pnl,
                end_date: p.end_date,
                thesis: None,
            })
            .collect();

        let total_value: f64 = positions.iter().map(|p| p.value).sum();
        let total_pnl: f64 = positions.iter().map(|p| p.pnl).sum();

        Ok(PositionsResponse {
            summary: PortfolioSummary {
                total_value,
                total_pnl,
                // Cash balance is not part of the positions endpoint.
                cash: 0.0,
                total: total_value,
                count: positions.len(),
            },
            positions,
            updated: None,
            source: "live",
        })
    }

    fn read_snapshot(&self) -> Result<PositionsResponse> {
        let raw = fs::read_to_string(&self.snapshot_file)
            .with_context(|| format!("Failed to read {}", self.snapshot_file.display()))?;
        let snapshot: SnapshotFile =
            serde_json::from_str(&raw).context("Failed to parse positions snapshot")?;

        let positions: Vec<DisplayPosition> = snapshot
            .positions
            .into_iter()
            .map(|p| DisplayPosition {
                title: p.market,
                outcome: p.side,
                shares: p.shares,
                avg_price: p.avg_price,
                cur_price: p.current_price,
                value: p.value,
                pnl: p.pnl,
                pnl_pct: p.pnl_pct,
                end_date: p.resolves,
                thesis: p.thesis,
            })
            .collect();

        Ok(PositionsResponse {
            summary: PortfolioSummary {
                total_value: snapshot.portfolio.total_value,
                total_pnl: snapshot.portfolio.pnl,
                cash: snapshot.portfolio.cash,
                total: snapshot.portfolio.total,
                count: positions.len(),
            },
            positions,
            updated: snapshot.updated,
            source: "snapshot",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_reshape() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("positions.json");
        fs::write(
            &file,
            json!({
                "positions": [{
                    "market": "Government shutdown by Feb 14?",
                    "side": "NO",
                    "shares": 705.87,
                    "avg_price": 0.36,
                    "current_price": 0.41,
                    "value": 289.41,
                    "pnl": 35.29,
                    "pnl_pct": 13.9,
                    "resolves": "2026-02-14",
                    "thesis": "politicians avoid pain"
                }],
                "portfolio": {"total_value": 289.41, "pnl": 35.29, "cash": 168.0, "total": 457.41},
                "updated": "2026-02-10T12:00:00Z"
            })
            .to_string(),
        )
        .unwrap();

        let source = PositionsSource::new(file, None).unwrap();
        let resp = source.read_snapshot().unwrap();

        assert_eq!(resp.source, "snapshot");
        assert_eq!(resp.positions.len(), 1);
        assert_eq!(resp.summary.count, 1);
        assert_eq!(resp.positions[0].title, "Government shutdown by Feb 14?");
        assert_eq!(resp.positions[0].outcome, "NO");
        assert_eq!(resp.positions[0].shares, 705.87);
        assert_eq!(resp.updated.as_deref(), Some("2026-02-10T12:00:00Z"));

        // Display serialization is camelCase for the dashboard.
        let json = serde_json::to_value(&resp.positions[0]).unwrap();
        assert_eq!(json["avgPrice"], 0.36);
        assert_eq!(json["pnlPct"], 13.9);
        assert_eq!(json["endDate"], "2026-02-14");
    }

    #[test]
    fn test_data_api_position_parses_partial_payload() {
        let raw = json!({
            "proxyWallet": "0xabc",
            "title": "BTC above $80k in Feb?",
            "outcome": "No",
            "size": 67.57,
            "avgPrice": 0.74,
            "curPrice": 0.78,
            "currentValue": 52.7,
            "cashPnl": 2.7,
            "percentPnl": 5.4,
            "endDate": "2026-02-28"
        });
        let parsed: DataApiPosition = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.size, 67.57);
        assert_eq!(parsed.outcome.as_deref(), Some("No"));

        // Unknown wallets come back as an empty array, not an error shape.
        let empty: Vec<DataApiPosition> = serde_json::from_value(json!([])).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = PositionsSource::new(dir.path().join("nope.json"), None).unwrap();
        assert!(source.read_snapshot().is_err());
    }
}
