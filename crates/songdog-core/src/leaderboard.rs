//! Remote leaderboard.
//!
//! Submissions and fetches are fire-and-forget from the game's point of view:
//! the event loop spawns them and feeds results back as events.  A failed
//! fetch degrades to an empty board and a failed submit is only logged.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use songdog_proto::config::LeaderboardConfig;
use songdog_proto::protocol::{Board, LeaderboardEntry, Mode, NewScore};

pub trait LeaderboardGateway: Send + Sync + 'static {
    fn submit_score(&self, score: NewScore) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Entries of `mode` created at or after `since`, highest score first.
    fn fetch_top(
        &self,
        mode: Mode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = anyhow::Result<Vec<LeaderboardEntry>>> + Send;
}

/// Ranked entries for `board`'s window ending at `now`.  Failures are logged
/// and come back as an empty list.
pub async fn fetch_board<G: LeaderboardGateway + ?Sized>(
    gateway: &G,
    board: Board,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    match gateway.fetch_top(Mode::Ranked, board.since(now), limit).await {
        Ok(entries) => {
            debug!("leaderboard: {} {} entries", entries.len(), board.label());
            entries
        }
        Err(e) => {
            warn!("leaderboard: fetch {} failed: {:#}", board.label(), e);
            Vec::new()
        }
    }
}

/// PostgREST-style table endpoint (`{url}/rest/v1/{table}`), as exposed by
/// Supabase.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(config: &LeaderboardConfig) -> anyhow::Result<Self> {
        if config.url.trim().is_empty() {
            anyhow::bail!("leaderboard url is not configured");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build leaderboard client")?;
        Ok(Self {
            client,
            endpoint: Self::endpoint_for(&config.url, &config.table),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint_for(url: &str, table: &str) -> String {
        format!("{}/rest/v1/{}", url.trim().trim_end_matches('/'), table)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

impl LeaderboardGateway for HttpGateway {
    async fn submit_score(&self, score: NewScore) -> anyhow::Result<()> {
        let response = self
            .authorized(self.client.post(&self.endpoint))
            .header("Prefer", "return=minimal")
            .json(&score)
            .send()
            .await
            .context("Failed to reach leaderboard")?;

        if !response.status().is_success() {
            anyhow::bail!("leaderboard insert returned status: {}", response.status());
        }
        debug!("leaderboard: submitted {} for {:?}", score.score, score.name);
        Ok(())
    }

    async fn fetch_top(
        &self,
        mode: Mode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let mode_filter = format!("eq.{}", mode.label());
        let since_filter = format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .header("Accept", "application/json")
            .query(&[
                ("select", "name,score,mode,created_at"),
                ("mode", mode_filter.as_str()),
                ("created_at", since_filter.as_str()),
                ("order", "score.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach leaderboard")?;

        if !response.status().is_success() {
            anyhow::bail!("leaderboard query returned status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse leaderboard response")
    }
}

/// Used when no leaderboard is configured: submissions are dropped and every
/// board is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

impl LeaderboardGateway for DisabledGateway {
    async fn submit_score(&self, score: NewScore) -> anyhow::Result<()> {
        debug!("leaderboard: disabled, dropping score {} for {:?}", score.score, score.name);
        Ok(())
    }

    async fn fetch_top(
        &self,
        _mode: Mode,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        Ok(Vec::new())
    }
}

/// Runtime choice between the configured remote board and none at all.
pub enum Gateway {
    Http(HttpGateway),
    Disabled(DisabledGateway),
}

impl Gateway {
    /// `Http` when the config enables it, `Disabled` otherwise.
    pub fn from_config(config: &LeaderboardConfig) -> anyhow::Result<Self> {
        if config.enabled {
            Ok(Gateway::Http(HttpGateway::new(config)?))
        } else {
            Ok(Gateway::Disabled(DisabledGateway))
        }
    }
}

impl LeaderboardGateway for Gateway {
    async fn submit_score(&self, score: NewScore) -> anyhow::Result<()> {
        match self {
            Gateway::Http(gw) => gw.submit_score(score).await,
            Gateway::Disabled(gw) => gw.submit_score(score).await,
        }
    }

    async fn fetch_top(
        &self,
        mode: Mode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        match self {
            Gateway::Http(gw) => gw.fetch_top(mode, since, limit).await,
            Gateway::Disabled(gw) => gw.fetch_top(mode, since, limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryGateway {
        rows: Mutex<Vec<LeaderboardEntry>>,
        fail: bool,
    }

    impl LeaderboardGateway for MemoryGateway {
        async fn submit_score(&self, score: NewScore) -> anyhow::Result<()> {
            self.rows.lock().unwrap().push(LeaderboardEntry {
                name: score.name,
                score: score.score,
                mode: score.mode,
                created_at: Utc::now(),
            });
            Ok(())
        }

        async fn fetch_top(
            &self,
            mode: Mode,
            since: DateTime<Utc>,
            limit: usize,
        ) -> anyhow::Result<Vec<LeaderboardEntry>> {
            if self.fail {
                anyhow::bail!("offline");
            }
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.mode == mode && e.created_at >= since)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.score.cmp(&a.score));
            rows.truncate(limit);
            Ok(rows)
        }
    }

    fn entry(name: &str, score: u32, mode: Mode, created_at: DateTime<Utc>) -> LeaderboardEntry {
        LeaderboardEntry {
            name: name.to_string(),
            score,
            mode,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_fetch_board_window_and_order() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let gateway = MemoryGateway::default();
        {
            let mut rows = gateway.rows.lock().unwrap();
            rows.push(entry("old", 90, Mode::Ranked, now - chrono::Duration::days(3)));
            rows.push(entry("casual", 80, Mode::Casual, now));
            rows.push(entry("low", 10, Mode::Ranked, now - chrono::Duration::hours(2)));
            rows.push(entry("high", 40, Mode::Ranked, now - chrono::Duration::hours(1)));
        }

        let daily = fetch_board(&gateway, Board::Daily, now, 100).await;
        let names: Vec<_> = daily.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["high", "low"]);

        let weekly = fetch_board(&gateway, Board::Weekly, now, 1).await;
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].name, "old");
    }

    #[tokio::test]
    async fn test_fetch_board_absorbs_failure() {
        let gateway = MemoryGateway {
            fail: true,
            ..Default::default()
        };
        assert!(fetch_board(&gateway, Board::Monthly, Utc::now(), 100)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_disabled_gateway() {
        let gateway = Gateway::from_config(&LeaderboardConfig::default()).unwrap();
        assert!(matches!(gateway, Gateway::Disabled(_)));
        gateway
            .submit_score(NewScore {
                name: "ana".to_string(),
                score: 12,
                mode: Mode::Ranked,
            })
            .await
            .unwrap();
        assert!(fetch_board(&gateway, Board::Daily, Utc::now(), 100)
            .await
            .is_empty());
    }

    #[test]
    fn test_http_gateway_needs_url() {
        let config = LeaderboardConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(Gateway::from_config(&config).is_err());
    }

    #[test]
    fn test_http_endpoint() {
        let config = LeaderboardConfig {
            enabled: true,
            url: "https://abc.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            ..Default::default()
        };
        let gateway = HttpGateway::new(&config).unwrap();
        assert_eq!(gateway.endpoint(), "https://abc.supabase.co/rest/v1/scores");
    }
}
