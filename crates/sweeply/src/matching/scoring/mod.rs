mod config;
mod rules;

pub use config::{MatchingConfig, MatchingConfigStore, ScoreWeights, TeamBonus};

use serde::{Deserialize, Serialize};

use super::domain::{Booking, Location, ProviderId, ProviderProfile, ServiceCategory, TimeWindow};

/// The subset of a booking the scorer needs. Derived from a stored booking or
/// supplied directly by a caller probing the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCriteria {
    pub service: ServiceCategory,
    pub window: TimeWindow,
    #[serde(default)]
    pub location: Option<Location>,
    pub required_providers: u8,
    #[serde(default)]
    pub eco_preference: bool,
}

impl BookingCriteria {
    pub fn from_booking(booking: &Booking) -> Self {
        Self {
            service: booking.service,
            window: booking.window,
            location: booking.location.clone(),
            required_providers: booking.required_providers,
            eco_preference: booking.eco_preference,
        }
    }
}

/// Validation errors raised before any scoring happens.
#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("time window must end after it starts")]
    EmptyWindow,
    #[error("at least one provider must be requested")]
    NoProvidersRequested,
}

/// Scoring dimensions surfaced in the per-candidate breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    DistanceProximity,
    Rating,
    EcoMatch,
    TeamCapacity,
}

impl ScoreFactor {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DistanceProximity => "distance_proximity",
            Self::Rating => "rating",
            Self::EcoMatch => "eco_match",
            Self::TeamCapacity => "team_capacity",
        }
    }
}

/// Discrete contribution to a candidate's score, kept for audit and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub raw: f64,
    pub weighted: f64,
    pub notes: String,
}

/// One eligible provider with its composite score and rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub provider_id: ProviderId,
    pub score: f64,
    pub components: Vec<ScoreComponent>,
    pub rank: usize,
}

/// Stateless scorer: a pure function of the provider snapshot and one config
/// snapshot. No candidates is an empty list, never an error.
pub struct CandidateScorer;

impl CandidateScorer {
    pub fn score(
        criteria: &BookingCriteria,
        providers: &[ProviderProfile],
        config: &MatchingConfig,
        limit: usize,
    ) -> Result<Vec<RankedCandidate>, CriteriaError> {
        if !criteria.window.is_valid() {
            return Err(CriteriaError::EmptyWindow);
        }
        if criteria.required_providers == 0 {
            return Err(CriteriaError::NoProvidersRequested);
        }

        let mut candidates: Vec<RankedCandidate> = providers
            .iter()
            .filter(|provider| provider.active && provider.serves_category(criteria.service))
            .filter_map(|provider| {
                rules::score_provider(criteria, provider, config).map(|(components, score)| {
                    RankedCandidate {
                        provider_id: provider.id.clone(),
                        score,
                        components,
                        rank: 0,
                    }
                })
            })
            .collect();

        // Descending score, ascending provider id on ties, so repeated passes
        // over the same snapshot reproduce the same ranking.
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        candidates.truncate(limit);
        for (index, candidate) in candidates.iter_mut().enumerate() {
            candidate.rank = index + 1;
        }

        Ok(candidates)
    }
}
