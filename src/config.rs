use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::metrics::Metric;

/// Divisors that rescale raw counts and durations into comparable ranges.
/// An immutable session value; `overridden` derives a new one per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizers {
    pub duration: f64,
    pub kills: f64,
    pub teamfights: f64,
    pub rapier: f64,
    pub aegis_pick: f64,
    pub aegis_deny: f64,
    pub aegis_stolen: f64,
}

impl Default for Normalizers {
    fn default() -> Self {
        // An hour-long 100-kill match with ten teamfights saturates at 1.0.
        Self {
            duration: 3600.0,
            kills: 100.0,
            teamfights: 10.0,
            rapier: 2.0,
            aegis_pick: 3.0,
            aegis_deny: 1.0,
            aegis_stolen: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerKey {
    Duration,
    Kills,
    Teamfights,
    Rapier,
    AegisPick,
    AegisDeny,
    AegisStolen,
}

impl NormalizerKey {
    pub const ALL: [NormalizerKey; 7] = [
        NormalizerKey::Duration,
        NormalizerKey::Kills,
        NormalizerKey::Teamfights,
        NormalizerKey::Rapier,
        NormalizerKey::AegisPick,
        NormalizerKey::AegisDeny,
        NormalizerKey::AegisStolen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NormalizerKey::Duration => "duration",
            NormalizerKey::Kills => "kills",
            NormalizerKey::Teamfights => "teamfights",
            NormalizerKey::Rapier => "rapier",
            NormalizerKey::AegisPick => "aegis_pick",
            NormalizerKey::AegisDeny => "aegis_deny",
            NormalizerKey::AegisStolen => "aegis_stolen",
        }
    }
}

impl fmt::Display for NormalizerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NormalizerKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NormalizerKey::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown normalizer '{s}'"))
    }
}

impl Normalizers {
    pub fn overridden(&self, overrides: &[(NormalizerKey, f64)]) -> Self {
        let mut out = *self;
        for (key, value) in overrides {
            match key {
                NormalizerKey::Duration => out.duration = *value,
                NormalizerKey::Kills => out.kills = *value,
                NormalizerKey::Teamfights => out.teamfights = *value,
                NormalizerKey::Rapier => out.rapier = *value,
                NormalizerKey::AegisPick => out.aegis_pick = *value,
                NormalizerKey::AegisDeny => out.aegis_deny = *value,
                NormalizerKey::AegisStolen => out.aegis_stolen = *value,
            }
        }
        out
    }
}

/// Per-metric weights for the composite score. Metrics absent from the table
/// contribute zero; the default weighs every metric at 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights(BTreeMap<Metric, f64>);

impl Default for Weights {
    fn default() -> Self {
        Self(Metric::ALL.into_iter().map(|m| (m, 1.0)).collect())
    }
}

impl Weights {
    pub fn none() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn overridden(&self, overrides: &[(Metric, f64)]) -> Self {
        let mut out = self.0.clone();
        for (metric, value) in overrides {
            out.insert(*metric, *value);
        }
        Self(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizer_overrides_leave_base_unchanged() {
        let base = Normalizers::default();
        let derived = base.overridden(&[
            (NormalizerKey::Kills, 80.0),
            (NormalizerKey::Duration, 2400.0),
        ]);
        assert_eq!(derived.kills, 80.0);
        assert_eq!(derived.duration, 2400.0);
        assert_eq!(derived.teamfights, base.teamfights);
        assert_eq!(base.kills, 100.0);
        assert_eq!(base.duration, 3600.0);
    }

    #[test]
    fn weight_overrides_leave_base_unchanged() {
        let base = Weights::default();
        let derived = base.overridden(&[(Metric::KillsTotal, 2.5)]);
        assert_eq!(derived.get(Metric::KillsTotal), 2.5);
        assert_eq!(base.get(Metric::KillsTotal), 1.0);
        assert_eq!(derived.get(Metric::Duration), 1.0);
    }

    #[test]
    fn absent_weight_contributes_zero() {
        assert_eq!(Weights::none().get(Metric::Duration), 0.0);
    }

    #[test]
    fn normalizer_names_round_trip() {
        for key in NormalizerKey::ALL {
            assert_eq!(key.name().parse::<NormalizerKey>().unwrap(), key);
        }
        assert!("bogus".parse::<NormalizerKey>().is_err());
    }
}
