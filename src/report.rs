use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::score::ScoredMatch;

const OPENDOTA_MATCH_URL: &str = "https://www.opendota.com/matches/";

/// Ranked table, most interesting match first. `vods` may be empty; rows
/// without a broadcast link just omit the column.
pub fn render_table(
    matches: &[ScoredMatch],
    vods: &HashMap<u64, String>,
    top_reasons: usize,
) -> String {
    let mut out = String::new();
    if matches.is_empty() {
        out.push_str("no matches scored\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>4}  {:>7}  {:<10}  {:<34}  {}",
        "#", "score", "date", "match", "why"
    );
    for (idx, m) in matches.iter().enumerate() {
        let reasons = m
            .top_reasons(top_reasons)
            .into_iter()
            .map(|(metric, value)| format!("{metric} {value:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{:>4}  {:>7.3}  {:<10}  {:<34}  {}",
            idx + 1,
            m.score,
            m.start_time.format("%Y-%m-%d"),
            truncate(&m.title, 34),
            reasons
        );
        let _ = writeln!(out, "      {}{}", OPENDOTA_MATCH_URL, m.match_id);
        if let Some(vod) = vods.get(&m.match_id) {
            let _ = writeln!(out, "      vod: {vod}");
        }
    }
    out
}

/// Human-readable single-match breakdown: every metric with its weighted
/// contribution, largest first.
pub fn render_breakdown(scored: &ScoredMatch) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", scored.title, scored.start_time.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out, "score: {:.3}", scored.score);
    let _ = writeln!(out, "{}{}", OPENDOTA_MATCH_URL, scored.match_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<28}  {:>8}  {:>8}", "metric", "value", "weighted");
    for (metric, contribution) in scored.top_reasons(usize::MAX) {
        let _ = writeln!(
            out,
            "{:<28}  {:>8.3}  {:>8.3}",
            metric.name(),
            scored.metrics.get(metric),
            contribution
        );
    }
    out
}

pub fn render_json(scored: &ScoredMatch) -> Result<String> {
    serde_json::to_string_pretty(scored).context("serialize scored match")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
