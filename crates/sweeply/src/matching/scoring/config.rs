use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Relative weight of each scoring component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub distance: f64,
    pub rating: f64,
    pub eco: f64,
    pub team: f64,
}

/// Additive bonus for providers whose team can cover multi-provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamBonus {
    pub two: f64,
    pub three_plus: f64,
}

/// Tunable scoring parameters. Read by every scoring pass as one snapshot;
/// mutated only by configuration management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub distance_max_km: f64,
    pub weights: ScoreWeights,
    pub team_bonus: TeamBonus,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_max_km: 20.0,
            weights: ScoreWeights {
                distance: 0.4,
                rating: 0.3,
                eco: 0.15,
                team: 0.15,
            },
            team_bonus: TeamBonus {
                two: 0.5,
                three_plus: 1.0,
            },
        }
    }
}

struct VersionedConfig {
    version: u32,
    config: MatchingConfig,
}

/// Read-mostly holder for the active `MatchingConfig`. Scoring takes a
/// snapshot once per pass; replacements take effect for subsequent calls.
pub struct MatchingConfigStore {
    inner: RwLock<VersionedConfig>,
}

impl MatchingConfigStore {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            inner: RwLock::new(VersionedConfig { version: 1, config }),
        }
    }

    pub fn snapshot(&self) -> (MatchingConfig, u32) {
        let guard = self.inner.read().expect("config lock poisoned");
        (guard.config.clone(), guard.version)
    }

    /// Swap in a new configuration, returning the new version.
    pub fn replace(&self, config: MatchingConfig) -> u32 {
        let mut guard = self.inner.write().expect("config lock poisoned");
        guard.version += 1;
        guard.config = config;
        guard.version
    }
}

impl Default for MatchingConfigStore {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}
