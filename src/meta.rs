use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::opendota::HeroStatsEntry;

/// Per-hero "contest share" for the current patch: how hotly contested a hero
/// is in professional drafts, on a 0..=2 scale. The two terms reward absolute
/// popularity (vs. the most contested hero) and overall presence (vs. the
/// whole pool).
#[derive(Debug, Clone, Default)]
pub struct MetaShareTable {
    shares: HashMap<u32, f64>,
}

impl MetaShareTable {
    pub fn from_hero_stats(stats: &[HeroStatsEntry]) -> Result<Self> {
        if stats.is_empty() {
            bail!("hero stats listing is empty, cannot derive meta shares");
        }

        let contests: Vec<u64> = stats
            .iter()
            .map(|h| u64::from(h.pro_pick) + u64::from(h.pro_ban))
            .collect();
        let max_contest = contests.iter().copied().max().unwrap_or(0);
        let total_contest: u64 = contests.iter().sum();
        if max_contest == 0 {
            bail!("hero stats listing has no picks or bans at all");
        }

        let shares = stats
            .iter()
            .zip(contests)
            .map(|(hero, contest)| {
                let share = contest as f64 / max_contest as f64
                    + contest as f64 / total_contest as f64;
                (hero.id, share)
            })
            .collect();
        Ok(Self { shares })
    }

    /// Contest share for a hero; unknown heroes read as fully off-meta.
    pub fn share(&self, hero_id: u32) -> f64 {
        match self.shares.get(&hero_id) {
            Some(share) => *share,
            None => {
                log::debug!("hero {hero_id} missing from meta table, treating as off-meta");
                0.0
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}
