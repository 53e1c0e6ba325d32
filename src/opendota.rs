use std::collections::HashMap;
use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;

use crate::cache;

const DEFAULT_API_BASE: &str = "https://api.opendota.com/api";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const FETCH_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(300);
// Team ratings and hero stats drift slowly; a day-old listing is fine.
const LISTING_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// One finished match as returned by `GET /matches/{id}`. Optional sections
/// are missing on matches the replay parser has not processed.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    pub match_id: u64,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub radiant_team_id: Option<u32>,
    #[serde(default)]
    pub dire_team_id: Option<u32>,
    #[serde(default)]
    pub radiant_score: u32,
    #[serde(default)]
    pub dire_score: u32,
    #[serde(default)]
    pub radiant_gold_adv: Option<Vec<f64>>,
    #[serde(default)]
    pub radiant_xp_adv: Option<Vec<f64>>,
    #[serde(default)]
    pub objectives: Option<Vec<ObjectiveEvent>>,
    #[serde(default)]
    pub teamfights: Option<Vec<TeamfightEvent>>,
    #[serde(default)]
    pub players: Vec<MatchPlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamfightEvent {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub deaths: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchPlayer {
    #[serde(default)]
    pub hero_id: u32,
    #[serde(default)]
    pub benchmarks: HashMap<String, Benchmark>,
    #[serde(default)]
    pub purchase_rapier: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Benchmark {
    #[serde(default)]
    pub raw: Option<f64>,
    #[serde(default)]
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRecord {
    pub team_id: u32,
    #[serde(default, deserialize_with = "string_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeroStatsEntry {
    pub id: u32,
    #[serde(default)]
    pub pro_pick: u32,
    #[serde(default)]
    pub pro_ban: u32,
}

fn string_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn f64_or_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// The statistics capabilities the scoring session depends on. Implemented
/// by the live OpenDota client and by fixture providers in tests.
pub trait StatsProvider {
    fn get_match(&self, match_id: u64) -> Result<MatchRecord>;
    fn get_team(&self, team_id: u32) -> Result<TeamRecord>;
    /// Full team listing, sorted by rating descending.
    fn get_teams(&self) -> Result<Vec<TeamRecord>>;
    fn get_hero_stats(&self) -> Result<Vec<HeroStatsEntry>>;
}

pub struct OpenDota {
    base: String,
    throttle: Duration,
}

impl OpenDota {
    pub fn from_env() -> Self {
        let base = env::var("OPENDOTA_API_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let throttle_ms = env::var("OPENDOTA_THROTTLE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1000);
        Self {
            base: base.trim_end_matches('/').to_string(),
            throttle: Duration::from_millis(throttle_ms),
        }
    }

    fn fetch(&self, path: &str, max_age: Option<Duration>) -> Result<String> {
        let url = format!("{}{}", self.base, path);
        if let Some(body) = cache::lookup(&url, max_age) {
            return Ok(body);
        }

        let client = http_client()?;
        let mut last_err = None;
        for attempt in 0..FETCH_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(RETRY_DELAY);
            }
            // Stay polite on live requests; cache hits never sleep.
            if !self.throttle.is_zero() {
                thread::sleep(self.throttle);
            }
            match request_once(client, &url) {
                Ok(body) => {
                    if let Err(err) = cache::store(&url, &body) {
                        log::debug!("cache write for {url} failed: {err:#}");
                    }
                    return Ok(body);
                }
                Err(err) => {
                    log::debug!("attempt {} for {url} failed: {err:#}", attempt + 1);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed")))
    }
}

fn request_once(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .header(USER_AGENT, "dota_rewind/0.1")
        .send()
        .context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        bail!("http {status}: {body}");
    }
    // OpenDota reports some failures as 200 with an error field.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            bail!("api error: {err}");
        }
    }
    Ok(body)
}

impl StatsProvider for OpenDota {
    fn get_match(&self, match_id: u64) -> Result<MatchRecord> {
        let body = self.fetch(&format!("/matches/{match_id}"), None)?;
        serde_json::from_str(&body).with_context(|| format!("invalid match json for {match_id}"))
    }

    fn get_team(&self, team_id: u32) -> Result<TeamRecord> {
        let body = self.fetch(&format!("/teams/{team_id}"), Some(LISTING_MAX_AGE))?;
        serde_json::from_str(&body).with_context(|| format!("invalid team json for {team_id}"))
    }

    fn get_teams(&self) -> Result<Vec<TeamRecord>> {
        let body = self.fetch("/teams", Some(LISTING_MAX_AGE))?;
        serde_json::from_str(&body).context("invalid team listing json")
    }

    fn get_hero_stats(&self) -> Result<Vec<HeroStatsEntry>> {
        let body = self.fetch("/heroStats", Some(LISTING_MAX_AGE))?;
        serde_json::from_str(&body).context("invalid hero stats json")
    }
}
