/// Momentum reversals in one advantage series (gold or experience lead,
/// sampled once per game minute).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlipSummary {
    pub count: u32,
    pub score: f64,
}

/// Count direction reversals and accumulate their magnitude, normalized to a
/// per-15-minutes intensity so long matches don't dominate short ones.
///
/// A reversal is a sign change between two consecutive deltas; a zero delta
/// on either side is not a reversal. Each reversal contributes the size of
/// its second leg relative to the largest absolute lead of the whole series.
pub fn flip_score(series: &[f64]) -> FlipSummary {
    if series.len() < 3 {
        return FlipSummary::default();
    }

    let max_abs = series.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max_abs == 0.0 {
        // Flat zero series: magnitude normalization is undefined, and a
        // reversal-free score of zero is the honest answer.
        log::warn!("advantage series is all zeros, flip score degraded to 0");
        return FlipSummary::default();
    }

    let mut count = 0u32;
    let mut accumulated = 0.0_f64;
    for w in series.windows(3) {
        let first = w[1] - w[0];
        let second = w[2] - w[1];
        if first * second < 0.0 {
            count += 1;
            accumulated += second.abs() / max_abs;
        }
    }

    let per_window = series.len() as f64 / 15.0;
    FlipSummary {
        count,
        score: accumulated / per_window,
    }
}
