use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::Normalizers;
use crate::flips::{self, FlipSummary};
use crate::meta::MetaShareTable;
use crate::opendota::{MatchRecord, TeamRecord};

const AEGIS_PICKUP: &str = "CHAT_MESSAGE_AEGIS";
const AEGIS_STOLEN: &str = "CHAT_MESSAGE_AEGIS_STOLEN";

/// The fixed set of interest metrics every match is scored on. `AegisDeny`
/// and `RapierDrop` are reserved at 0 until the upstream data exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Duration,
    KillsTotal,
    KillsDifference,
    AdvantageFlipsGold,
    AdvantageFlipsExperience,
    TeamRatingAverage,
    TeamRatingDifference,
    NonMetaPicks,
    AegisPick,
    AegisDeny,
    AegisStolen,
    RapierPick,
    RapierDrop,
    Teamfights,
    GoldPerMin,
    XpPerMin,
    LastHitsPerMin,
    SurpriseFactor,
}

impl Metric {
    pub const ALL: [Metric; 18] = [
        Metric::Duration,
        Metric::KillsTotal,
        Metric::KillsDifference,
        Metric::AdvantageFlipsGold,
        Metric::AdvantageFlipsExperience,
        Metric::TeamRatingAverage,
        Metric::TeamRatingDifference,
        Metric::NonMetaPicks,
        Metric::AegisPick,
        Metric::AegisDeny,
        Metric::AegisStolen,
        Metric::RapierPick,
        Metric::RapierDrop,
        Metric::Teamfights,
        Metric::GoldPerMin,
        Metric::XpPerMin,
        Metric::LastHitsPerMin,
        Metric::SurpriseFactor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Duration => "duration",
            Metric::KillsTotal => "kills_total",
            Metric::KillsDifference => "kills_difference",
            Metric::AdvantageFlipsGold => "advantage_flips_gold",
            Metric::AdvantageFlipsExperience => "advantage_flips_experience",
            Metric::TeamRatingAverage => "team_rating_average",
            Metric::TeamRatingDifference => "team_rating_difference",
            Metric::NonMetaPicks => "non_meta_picks",
            Metric::AegisPick => "aegis_pick",
            Metric::AegisDeny => "aegis_deny",
            Metric::AegisStolen => "aegis_stolen",
            Metric::RapierPick => "rapier_pick",
            Metric::RapierDrop => "rapier_drop",
            Metric::Teamfights => "teamfights",
            Metric::GoldPerMin => "gold_per_min",
            Metric::XpPerMin => "xp_per_min",
            Metric::LastHitsPerMin => "last_hits_per_min",
            Metric::SurpriseFactor => "surprise_factor",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown metric '{s}'"))
    }
}

/// Scores for every metric of one match; every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet(BTreeMap<Metric, f64>);

impl MetricSet {
    pub fn zeroed() -> Self {
        Self(Metric::ALL.into_iter().map(|m| (m, 0.0)).collect())
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::zeroed()
    }
}

pub struct Extraction {
    pub metrics: MetricSet,
    pub radiant_name: String,
    pub dire_name: String,
}

/// Derive the complete metric set for one match. Missing or malformed
/// sections degrade the affected metric to 0 with a warning; extraction of
/// the remaining metrics always continues.
pub fn extract(
    record: &MatchRecord,
    radiant: &TeamRecord,
    dire: &TeamRecord,
    meta: &MetaShareTable,
    max_rating: f64,
    normalizers: &Normalizers,
) -> Extraction {
    let match_id = record.match_id;
    let mut metrics = MetricSet::zeroed();

    metrics.set(Metric::Duration, f64::from(record.duration) / normalizers.duration);

    // Kill counts.
    let radiant_kills = f64::from(record.radiant_score);
    let dire_kills = f64::from(record.dire_score);
    metrics.set(Metric::KillsTotal, (radiant_kills + dire_kills) / normalizers.kills);
    let better_kills = radiant_kills.max(dire_kills);
    if better_kills > 0.0 {
        let spread = (radiant_kills - dire_kills).abs();
        metrics.set(Metric::KillsDifference, 1.0 - spread / better_kills);
    } else {
        log::warn!("match {match_id} has no kills, kills_difference degraded to 0");
    }

    // Momentum swings on the two advantage series.
    let gold_flips = series_flips(match_id, "gold", record.radiant_gold_adv.as_deref());
    let xp_flips = series_flips(match_id, "experience", record.radiant_xp_adv.as_deref());
    metrics.set(Metric::AdvantageFlipsGold, gold_flips.score);
    metrics.set(Metric::AdvantageFlipsExperience, xp_flips.score);

    // Rating-based scores are squared: pro team ratings cluster tightly, so
    // the square stretches small differences into a usable spread.
    if max_rating > 0.0 {
        let average = (radiant.rating + dire.rating) / 2.0;
        metrics.set(Metric::TeamRatingAverage, (average / max_rating).powi(2));
    } else {
        log::warn!("top team rating is 0, team_rating_average degraded to 0");
    }
    let better_rating = radiant.rating.max(dire.rating);
    if better_rating > 0.0 {
        let spread = (radiant.rating - dire.rating).abs();
        metrics.set(Metric::TeamRatingDifference, (1.0 - spread / better_rating).powi(2));
    } else {
        log::warn!("match {match_id} has unrated teams, team_rating_difference degraded to 0");
    }

    // Draft spice: off-meta picks score high, contested picks can go negative.
    let off_meta: f64 = record
        .players
        .iter()
        .map(|p| 1.0 - meta.share(p.hero_id))
        .sum();
    metrics.set(Metric::NonMetaPicks, off_meta / 10.0);

    match record.objectives.as_deref() {
        Some(objectives) => {
            let picks = objectives.iter().filter(|o| o.kind == AEGIS_PICKUP).count();
            let steals = objectives.iter().filter(|o| o.kind == AEGIS_STOLEN).count();
            metrics.set(Metric::AegisPick, picks as f64 / normalizers.aegis_pick);
            metrics.set(Metric::AegisStolen, steals as f64 / normalizers.aegis_stolen);
        }
        None => log::warn!("match {match_id} has no objectives, aegis metrics degraded to 0"),
    }

    let rapiers: u32 = record.players.iter().map(|p| p.purchase_rapier).sum();
    metrics.set(Metric::RapierPick, f64::from(rapiers) / normalizers.rapier);

    match record.teamfights.as_deref() {
        Some(fights) => {
            metrics.set(Metric::Teamfights, fights.len() as f64 / normalizers.teamfights)
        }
        None => log::warn!("match {match_id} has no teamfight data, teamfights degraded to 0"),
    }

    for (key, metric) in [
        ("gold_per_min", Metric::GoldPerMin),
        ("xp_per_min", Metric::XpPerMin),
        ("last_hits_per_min", Metric::LastHitsPerMin),
    ] {
        let mut total = 0.0;
        let mut seen = false;
        for player in &record.players {
            if let Some(pct) = player.benchmarks.get(key).and_then(|b| b.pct) {
                total += pct;
                seen = true;
            }
        }
        if !seen {
            log::warn!("match {match_id} has no {key} benchmarks, metric degraded to 0");
        }
        metrics.set(metric, total / 10.0);
    }

    // A match surprises when the rating gap and the actual closeness of the
    // game disagree: underdogs keeping it close, or equals getting stomped.
    let best_flip = gold_flips.score.max(xp_flips.score);
    if best_flip > 0.0 {
        let closeness = (gold_flips.score + xp_flips.score) / (2.0 * best_flip);
        let surprise = (metrics.get(Metric::TeamRatingDifference) - closeness).abs();
        metrics.set(Metric::SurpriseFactor, surprise);
    } else {
        log::warn!("match {match_id} has no flip signal, surprise_factor degraded to 0");
    }

    Extraction {
        metrics,
        radiant_name: team_label(radiant),
        dire_name: team_label(dire),
    }
}

fn series_flips(match_id: u64, label: &str, series: Option<&[f64]>) -> FlipSummary {
    match series {
        Some(series) if !series.is_empty() => flips::flip_score(series),
        _ => {
            log::warn!("match {match_id} has no {label} advantage series, flip score degraded to 0");
            FlipSummary::default()
        }
    }
}

fn team_label(team: &TeamRecord) -> String {
    if team.name.trim().is_empty() {
        format!("team {}", team.team_id)
    } else {
        team.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opendota::{Benchmark, HeroStatsEntry, MatchPlayer, ObjectiveEvent, TeamfightEvent};
    use std::collections::HashMap;

    fn team(id: u32, name: &str, rating: f64) -> TeamRecord {
        TeamRecord {
            team_id: id,
            name: name.to_string(),
            rating,
        }
    }

    fn meta_table() -> MetaShareTable {
        MetaShareTable::from_hero_stats(&[
            HeroStatsEntry { id: 1, pro_pick: 60, pro_ban: 40 },
            HeroStatsEntry { id: 2, pro_pick: 30, pro_ban: 20 },
            HeroStatsEntry { id: 3, pro_pick: 0, pro_ban: 0 },
        ])
        .unwrap()
    }

    fn player(hero_id: u32, rapiers: u32, gpm_pct: Option<f64>) -> MatchPlayer {
        let mut benchmarks = HashMap::new();
        if let Some(pct) = gpm_pct {
            benchmarks.insert(
                "gold_per_min".to_string(),
                Benchmark { raw: Some(500.0), pct: Some(pct) },
            );
        }
        MatchPlayer {
            hero_id,
            benchmarks,
            purchase_rapier: rapiers,
        }
    }

    fn base_record() -> MatchRecord {
        MatchRecord {
            match_id: 1,
            start_time: 1_700_000_000,
            duration: 2700,
            radiant_team_id: Some(10),
            dire_team_id: Some(20),
            radiant_score: 30,
            dire_score: 20,
            radiant_gold_adv: Some(vec![0.0, 100.0, 50.0, 150.0, 150.0]),
            radiant_xp_adv: Some(vec![0.0, 50.0, 100.0, 150.0, 200.0]),
            objectives: Some(vec![
                ObjectiveEvent { kind: AEGIS_PICKUP.to_string(), time: Some(1800) },
                ObjectiveEvent { kind: "building_kill".to_string(), time: Some(2000) },
                ObjectiveEvent { kind: AEGIS_STOLEN.to_string(), time: Some(2400) },
            ]),
            teamfights: Some(vec![
                TeamfightEvent { start: Some(500), end: Some(560), deaths: Some(4) },
                TeamfightEvent { start: Some(900), end: Some(1000), deaths: Some(6) },
            ]),
            players: vec![player(1, 1, Some(0.9)), player(3, 0, Some(0.5))],
        }
    }

    fn extract_base() -> Extraction {
        extract(
            &base_record(),
            &team(10, "Radiant Club", 1500.0),
            &team(20, "Dire Club", 1400.0),
            &meta_table(),
            1500.0,
            &Normalizers::default(),
        )
    }

    #[test]
    fn kill_metrics_match_worked_example() {
        let out = extract_base();
        assert!((out.metrics.get(Metric::KillsTotal) - 0.5).abs() < 1e-12);
        assert!((out.metrics.get(Metric::KillsDifference) - (1.0 - 10.0 / 30.0)).abs() < 1e-12);
    }

    #[test]
    fn duration_and_objective_metrics() {
        let out = extract_base();
        assert!((out.metrics.get(Metric::Duration) - 0.75).abs() < 1e-12);
        assert!((out.metrics.get(Metric::AegisPick) - 1.0 / 3.0).abs() < 1e-12);
        assert!((out.metrics.get(Metric::AegisStolen) - 1.0).abs() < 1e-12);
        assert!((out.metrics.get(Metric::RapierPick) - 0.5).abs() < 1e-12);
        assert!((out.metrics.get(Metric::Teamfights) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn rating_metrics_are_squared() {
        let out = extract_base();
        let expected_avg = (1450.0_f64 / 1500.0).powi(2);
        let expected_diff = (1.0_f64 - 100.0 / 1500.0).powi(2);
        assert!((out.metrics.get(Metric::TeamRatingAverage) - expected_avg).abs() < 1e-12);
        assert!((out.metrics.get(Metric::TeamRatingDifference) - expected_diff).abs() < 1e-12);
    }

    #[test]
    fn non_meta_counts_every_player() {
        let out = extract_base();
        // hero 1 share = 1.0 + 100/150, hero 3 share = 0.
        let expected = ((1.0 - (1.0 + 100.0 / 150.0)) + 1.0) / 10.0;
        assert!((out.metrics.get(Metric::NonMetaPicks) - expected).abs() < 1e-12);
    }

    #[test]
    fn reserved_metrics_stay_zero() {
        let out = extract_base();
        assert_eq!(out.metrics.get(Metric::AegisDeny), 0.0);
        assert_eq!(out.metrics.get(Metric::RapierDrop), 0.0);
    }

    #[test]
    fn missing_sections_degrade_not_abort() {
        let mut record = base_record();
        record.objectives = None;
        record.teamfights = None;
        record.radiant_gold_adv = None;
        record.radiant_xp_adv = None;
        record.players.clear();

        let out = extract(
            &record,
            &team(10, "A", 1500.0),
            &team(20, "B", 1400.0),
            &meta_table(),
            1500.0,
            &Normalizers::default(),
        );
        assert_eq!(out.metrics.get(Metric::AegisPick), 0.0);
        assert_eq!(out.metrics.get(Metric::Teamfights), 0.0);
        assert_eq!(out.metrics.get(Metric::AdvantageFlipsGold), 0.0);
        assert_eq!(out.metrics.get(Metric::GoldPerMin), 0.0);
        assert_eq!(out.metrics.get(Metric::SurpriseFactor), 0.0);
        // Unaffected metrics still extracted.
        assert!(out.metrics.get(Metric::Duration) > 0.0);
        assert!(out.metrics.get(Metric::KillsDifference) > 0.0);
    }

    #[test]
    fn surprise_factor_combines_flips_and_rating_gap() {
        let out = extract_base();
        let gold = out.metrics.get(Metric::AdvantageFlipsGold);
        let xp = out.metrics.get(Metric::AdvantageFlipsExperience);
        assert!(gold > 0.0);
        assert_eq!(xp, 0.0); // xp series is monotonic
        let closeness = (gold + xp) / (2.0 * gold.max(xp));
        let expected = (out.metrics.get(Metric::TeamRatingDifference) - closeness).abs();
        assert!((out.metrics.get(Metric::SurpriseFactor) - expected).abs() < 1e-12);
    }

    #[test]
    fn every_metric_key_is_present() {
        let out = extract_base();
        let keys: Vec<Metric> = out.metrics.iter().map(|(m, _)| m).collect();
        assert_eq!(keys.len(), Metric::ALL.len());
    }

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert!("no_such_metric".parse::<Metric>().is_err());
    }
}
