use super::super::domain::{GeoPoint, ProviderProfile};
use super::config::MatchingConfig;
use super::{BookingCriteria, ScoreComponent, ScoreFactor};

const EARTH_RADIUS_KM: f64 = 6371.0;
const NEUTRAL_COMPONENT: f64 = 0.5;

/// Great-circle distance between two points.
pub(crate) fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Score one provider against the criteria. Returns `None` when the provider
/// sits beyond the distance cutoff and must not appear in results at all.
pub(crate) fn score_provider(
    criteria: &BookingCriteria,
    provider: &ProviderProfile,
    config: &MatchingConfig,
) -> Option<(Vec<ScoreComponent>, f64)> {
    let mut components = Vec::with_capacity(4);
    let mut total = 0.0;

    let booking_coords = criteria
        .location
        .as_ref()
        .and_then(|location| location.coords);
    let (distance_raw, distance_notes) = match (booking_coords, provider.base) {
        (Some(origin), Some(base)) => {
            let km = distance_km(origin, base);
            if km > config.distance_max_km {
                return None;
            }
            let proximity = 1.0 - km / config.distance_max_km;
            (proximity, format!("{km:.1} km from booking"))
        }
        _ => (NEUTRAL_COMPONENT, "location unresolved".to_string()),
    };
    let weighted = distance_raw * config.weights.distance;
    components.push(ScoreComponent {
        factor: ScoreFactor::DistanceProximity,
        raw: distance_raw,
        weighted,
        notes: distance_notes,
    });
    total += weighted;

    let rating_raw = if provider.rating_count == 0 {
        NEUTRAL_COMPONENT
    } else {
        (provider.rating_avg as f64 / 5.0).clamp(0.0, 1.0)
    };
    let weighted = rating_raw * config.weights.rating;
    components.push(ScoreComponent {
        factor: ScoreFactor::Rating,
        raw: rating_raw,
        weighted,
        notes: format!(
            "{:.1} average over {} ratings",
            provider.rating_avg, provider.rating_count
        ),
    });
    total += weighted;

    let (eco_raw, eco_notes) = if !criteria.eco_preference {
        (NEUTRAL_COMPONENT, "no eco preference".to_string())
    } else if provider.eco_certified {
        (1.0, "eco certified".to_string())
    } else {
        (0.0, "not eco certified".to_string())
    };
    let weighted = eco_raw * config.weights.eco;
    components.push(ScoreComponent {
        factor: ScoreFactor::EcoMatch,
        raw: eco_raw,
        weighted,
        notes: eco_notes,
    });
    total += weighted;

    let team_raw = team_bonus(criteria.required_providers, provider.team_size, config);
    if team_raw > 0.0 {
        let weighted = team_raw * config.weights.team;
        components.push(ScoreComponent {
            factor: ScoreFactor::TeamCapacity,
            raw: team_raw,
            weighted,
            notes: format!(
                "team of {} covers {} requested providers",
                provider.team_size, criteria.required_providers
            ),
        });
        total += weighted;
    }

    Some((components, total))
}

fn team_bonus(required: u8, team_size: u8, config: &MatchingConfig) -> f64 {
    if required >= 3 && team_size >= 3 {
        config.team_bonus.three_plus
    } else if required >= 2 && team_size >= 2 {
        config.team_bonus.two
    } else {
        0.0
    }
}
