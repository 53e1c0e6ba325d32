use std::collections::BTreeMap;
use std::env;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{NormalizerKey, Normalizers, Weights};
use crate::meta::MetaShareTable;
use crate::metrics::{self, Metric, MetricSet};
use crate::opendota::StatsProvider;

/// One ranked match: the composite score plus everything needed to explain
/// it. Ordering key is the score, descending.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMatch {
    pub match_id: u64,
    pub start_time: DateTime<Utc>,
    pub title: String,
    pub score: f64,
    pub metrics: MetricSet,
    pub contributions: BTreeMap<Metric, f64>,
}

impl ScoredMatch {
    /// Largest weighted contributions first: the "why" behind the score.
    pub fn top_reasons(&self, n: usize) -> Vec<(Metric, f64)> {
        let mut rows: Vec<(Metric, f64)> =
            self.contributions.iter().map(|(m, v)| (*m, *v)).collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1));
        rows.truncate(n);
        rows
    }
}

/// Weighted fold over the full metric set. Every metric key is iterated;
/// keys missing from the weight table contribute zero rather than vanishing.
pub fn composite(metrics: &MetricSet, weights: &Weights) -> (f64, BTreeMap<Metric, f64>) {
    let mut total = 0.0;
    let mut contributions = BTreeMap::new();
    for metric in Metric::ALL {
        let contribution = metrics.get(metric) * weights.get(metric);
        total += contribution;
        contributions.insert(metric, contribution);
    }
    (total, contributions)
}

/// Per-call overrides, applied to working copies of the session config.
#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    pub weights: Vec<(Metric, f64)>,
    pub normalizers: Vec<(NormalizerKey, f64)>,
}

/// A scoring session: provider plus the per-session tables (meta shares, top
/// team rating) and the base weight/normalizer config. Built once, then
/// read-only across every match it scores.
pub struct ScoreSession<P> {
    provider: P,
    meta: MetaShareTable,
    max_rating: f64,
    normalizers: Normalizers,
    weights: Weights,
}

impl<P: StatsProvider + Sync> ScoreSession<P> {
    pub fn new(provider: P, normalizers: Normalizers, weights: Weights) -> Result<Self> {
        let hero_stats = provider
            .get_hero_stats()
            .context("hero stats fetch failed")?;
        let meta = MetaShareTable::from_hero_stats(&hero_stats)
            .context("meta share table unavailable")?;

        let teams = provider.get_teams().context("team listing fetch failed")?;
        let max_rating = teams.first().map(|t| t.rating).unwrap_or(0.0);
        if max_rating <= 0.0 {
            bail!("team listing is empty or unrated, cannot scale rating metrics");
        }

        log::info!(
            "scoring session ready: {} heroes in meta table, top rating {max_rating:.0}",
            meta.len()
        );
        Ok(Self {
            provider,
            meta,
            max_rating,
            normalizers,
            weights,
        })
    }

    pub fn score_match(&self, match_id: u64) -> Result<ScoredMatch> {
        self.score_match_with(match_id, &ScoreOptions::default())
    }

    pub fn score_match_with(&self, match_id: u64, options: &ScoreOptions) -> Result<ScoredMatch> {
        let normalizers = self.normalizers.overridden(&options.normalizers);
        let weights = self.weights.overridden(&options.weights);

        let record = self
            .provider
            .get_match(match_id)
            .with_context(|| format!("match {match_id} fetch failed"))?;
        let radiant_id = record
            .radiant_team_id
            .with_context(|| format!("match {match_id} has no radiant team id"))?;
        let dire_id = record
            .dire_team_id
            .with_context(|| format!("match {match_id} has no dire team id"))?;
        let radiant = self
            .provider
            .get_team(radiant_id)
            .with_context(|| format!("radiant team {radiant_id} fetch failed"))?;
        let dire = self
            .provider
            .get_team(dire_id)
            .with_context(|| format!("dire team {dire_id} fetch failed"))?;

        let extraction = metrics::extract(
            &record,
            &radiant,
            &dire,
            &self.meta,
            self.max_rating,
            &normalizers,
        );
        let (score, contributions) = composite(&extraction.metrics, &weights);

        let start_time = Utc
            .timestamp_opt(record.start_time, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(ScoredMatch {
            match_id,
            start_time,
            title: format!("{} vs. {}", extraction.radiant_name, extraction.dire_name),
            score,
            metrics: extraction.metrics,
            contributions,
        })
    }

    /// Score a batch of match ids, most interesting first. A failure on one
    /// id drops that match with a warning; the batch never aborts.
    pub fn rank_matches(&self, match_ids: &[u64]) -> Vec<ScoredMatch> {
        let mut scored: Vec<ScoredMatch> = with_score_pool(|| {
            match_ids
                .par_iter()
                .filter_map(|&match_id| match self.score_match(match_id) {
                    Ok(scored) => Some(scored),
                    Err(err) => {
                        log::warn!("skipping match {match_id}: {err:#}");
                        None
                    }
                })
                .collect()
        });
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        log::info!("ranked {} of {} matches", scored.len(), match_ids.len());
        scored
    }
}

fn with_score_pool<T>(action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let threads = score_parallelism();
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

fn score_parallelism() -> usize {
    env::var("REWIND_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(1, 16)
}
