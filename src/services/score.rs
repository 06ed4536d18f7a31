//! Visibility scoring engine.
//!
//! Pure function of the primary aurora/weather readings and the two
//! astronomical penalties. Four weighted positive components (40/30/20/10)
//! sum to at most 100; the moon and sun deductions come off that sum and the
//! result is clamped into [0, 100].

use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::round1;
use crate::services::astro::{MoonPenalty, SunPenalty};
use crate::services::sources::{AuroraReading, WeatherReading};

/// Per-component contribution to the total score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    /// Aurora activity points, 0–40
    pub aurora: f64,
    /// Cloud cover points, 0–30
    pub clouds: f64,
    /// Visibility points, 0–20
    pub visibility: f64,
    /// Precipitation points, 0–10
    pub precipitation: f64,
    pub moon: MoonPenalty,
    pub sun: SunPenalty,
}

/// Final score with its breakdown and a human-readable recommendation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VisibilityScore {
    /// Total visibility score, 0–100
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    pub recommendation: String,
}

/// Aurora activity points. KP below 3 is marginal for mid-latitudes and maps
/// linearly onto 0–10; KP 3–9 maps linearly onto 10–40.
fn aurora_pts(kp: f64) -> f64 {
    let pts = if kp < 3.0 {
        (kp / 3.0) * 10.0
    } else {
        10.0 + ((kp - 3.0) / 6.0) * 30.0
    };
    pts.clamp(0.0, 40.0)
}

/// Cloud cover points, stepped by quarter (roughly 2/4/6 oktas).
fn cloud_pts(cloud_cover_pct: f64) -> f64 {
    if cloud_cover_pct < 25.0 {
        30.0
    } else if cloud_cover_pct < 50.0 {
        20.0
    } else if cloud_cover_pct < 75.0 {
        10.0
    } else {
        0.0
    }
}

fn visibility_pts(visibility_km: f64) -> f64 {
    if visibility_km > 20.0 {
        20.0
    } else if visibility_km > 10.0 {
        15.0
    } else if visibility_km > 5.0 {
        10.0
    } else {
        5.0
    }
}

fn precipitation_pts(precipitation_mm_per_h: f64) -> f64 {
    if precipitation_mm_per_h == 0.0 {
        10.0
    } else if precipitation_mm_per_h < 1.0 {
        5.0
    } else {
        0.0
    }
}

/// Calculate the aurora visibility score for the primary readings of both
/// families plus the astronomical penalties for the same instant.
pub fn calculate_visibility_score(
    aurora: &AuroraReading,
    weather: &WeatherReading,
    moon: MoonPenalty,
    sun: SunPenalty,
) -> VisibilityScore {
    let aurora_score = aurora_pts(aurora.kp_index);
    let cloud_score = cloud_pts(weather.cloud_cover_pct);
    let vis_score = visibility_pts(weather.visibility_km);
    let precip_score = precipitation_pts(weather.precipitation_mm_per_h);

    let positive_sum = aurora_score + cloud_score + vis_score + precip_score;
    // Upper clamp is redundant while component maxima sum to 100, but keeps
    // the [0, 100] contract independent of the tables above
    let total = (positive_sum - moon.penalty_pts - sun.penalty_pts).clamp(0.0, 100.0);

    let recommendation =
        recommendation(total, aurora.kp_index, weather.cloud_cover_pct).to_string();

    VisibilityScore {
        total_score: round1(total),
        breakdown: ScoreBreakdown {
            aurora: round1(aurora_score),
            clouds: round1(cloud_score),
            visibility: round1(vis_score),
            precipitation: round1(precip_score),
            moon,
            sun,
        },
        recommendation,
    }
}

/// Pick the recommendation text for a final score. The fair and poor bands
/// call out the dominant limiting factor: low geomagnetic activity reads
/// differently from a weather problem.
fn recommendation(score: f64, kp_index: f64, cloud_cover_pct: f64) -> &'static str {
    if score >= 80.0 {
        "Excellent conditions! Great chance to see aurora. Get outside!"
    } else if score >= 60.0 {
        "Good conditions. Worth checking outside if it's dark."
    } else if score >= 40.0 {
        if kp_index < 3.0 {
            "Fair conditions, but aurora activity is low."
        } else if cloud_cover_pct > 75.0 {
            "Fair conditions, but heavy cloud cover may block visibility."
        } else {
            "Fair conditions. Aurora may be visible."
        }
    } else if score >= 20.0 {
        if kp_index < 3.0 {
            "Poor conditions. Aurora activity too low for this latitude."
        } else {
            "Poor conditions. Weather not favorable for aurora viewing."
        }
    } else {
        "Very poor conditions. Aurora viewing not recommended."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::astro::{MoonPenalty, SunPenalty, TwilightPhase};
    use chrono::Utc;

    fn aurora(kp: f64) -> AuroraReading {
        AuroraReading {
            source: "test".to_string(),
            kp_index: kp,
            probability: None,
            observed_at: Utc::now(),
        }
    }

    fn weather(cloud: f64, vis: f64, precip: f64) -> WeatherReading {
        WeatherReading {
            source: "test".to_string(),
            cloud_cover_pct: cloud,
            visibility_km: vis,
            precipitation_mm_per_h: precip,
            temperature_c: Some(-2.0),
            observed_at: Utc::now(),
        }
    }

    fn no_moon() -> MoonPenalty {
        MoonPenalty {
            illumination: 0.0,
            elevation_deg: -30.0,
            penalty_pts: 0.0,
        }
    }

    fn dark_sun() -> SunPenalty {
        SunPenalty {
            elevation_deg: -35.0,
            twilight_phase: TwilightPhase::Darkness,
            penalty_pts: 0.0,
        }
    }

    #[test]
    fn test_aurora_pts_monotonic_and_bounded() {
        let mut prev = -1.0;
        for i in 0..=90 {
            let kp = i as f64 / 10.0;
            let pts = aurora_pts(kp);
            assert!((0.0..=40.0).contains(&pts), "kp={}", kp);
            assert!(pts >= prev, "not monotonic at kp={}", kp);
            prev = pts;
        }
    }

    #[test]
    fn test_aurora_pts_anchors() {
        assert_eq!(aurora_pts(0.0), 0.0);
        assert!((aurora_pts(3.0) - 10.0).abs() < 1e-9);
        assert!((aurora_pts(9.0) - 40.0).abs() < 1e-9);
        assert!((aurora_pts(6.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cloud_pts_steps() {
        assert_eq!(cloud_pts(0.0), 30.0);
        assert_eq!(cloud_pts(24.9), 30.0);
        assert_eq!(cloud_pts(25.0), 20.0);
        assert_eq!(cloud_pts(49.9), 20.0);
        assert_eq!(cloud_pts(50.0), 10.0);
        assert_eq!(cloud_pts(75.0), 0.0);
        assert_eq!(cloud_pts(100.0), 0.0);
    }

    #[test]
    fn test_visibility_pts_steps() {
        assert_eq!(visibility_pts(25.0), 20.0);
        assert_eq!(visibility_pts(20.0), 15.0);
        assert_eq!(visibility_pts(10.0), 10.0);
        assert_eq!(visibility_pts(5.0), 5.0);
        assert_eq!(visibility_pts(0.0), 5.0);
    }

    #[test]
    fn test_precipitation_pts_steps() {
        assert_eq!(precipitation_pts(0.0), 10.0);
        assert_eq!(precipitation_pts(0.5), 5.0);
        assert_eq!(precipitation_pts(1.0), 0.0);
        assert_eq!(precipitation_pts(4.0), 0.0);
    }

    #[test]
    fn test_excellent_conditions() {
        let score =
            calculate_visibility_score(&aurora(6.0), &weather(10.0, 25.0, 0.0), no_moon(), dark_sun());

        assert!(score.total_score >= 80.0);
        assert_eq!(score.breakdown.clouds, 30.0);
        assert_eq!(score.breakdown.visibility, 20.0);
        assert_eq!(score.breakdown.precipitation, 10.0);
        assert!(score.recommendation.to_lowercase().contains("excellent"));
    }

    #[test]
    fn test_low_activity_poor_band_example() {
        // kp=0.5 → ~1.7 aurora pts; overcast → 0; 60.8 km → 20; dry → 10
        let score = calculate_visibility_score(
            &aurora(0.5),
            &weather(100.0, 60.8, 0.0),
            no_moon(),
            dark_sun(),
        );

        assert!((score.total_score - 31.7).abs() < 1e-9);
        assert!((score.breakdown.aurora - 1.7).abs() < 1e-9);
        assert_eq!(score.breakdown.clouds, 0.0);
        assert_eq!(score.breakdown.visibility, 20.0);
        assert_eq!(score.breakdown.precipitation, 10.0);
        assert_eq!(
            score.recommendation,
            "Poor conditions. Aurora activity too low for this latitude."
        );
    }

    #[test]
    fn test_penalties_subtract_from_total() {
        let moon = MoonPenalty {
            illumination: 1.0,
            elevation_deg: 90.0,
            penalty_pts: 15.0,
        };
        let sun = SunPenalty {
            elevation_deg: -10.0,
            twilight_phase: TwilightPhase::NauticalTwilight,
            penalty_pts: 20.0,
        };
        let score = calculate_visibility_score(&aurora(9.0), &weather(0.0, 25.0, 0.0), moon, sun);

        // 100 positive − 15 − 20
        assert!((score.total_score - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let moon = MoonPenalty {
            illumination: 1.0,
            elevation_deg: 80.0,
            penalty_pts: 15.0,
        };
        let sun = SunPenalty {
            elevation_deg: 20.0,
            twilight_phase: TwilightPhase::Daylight,
            penalty_pts: 50.0,
        };
        let score = calculate_visibility_score(&aurora(0.0), &weather(100.0, 2.0, 3.0), moon, sun);

        assert_eq!(score.total_score, 0.0);
    }

    #[test]
    fn test_score_bounds_over_input_grid() {
        for kp in [0.0, 2.9, 3.0, 5.5, 9.0] {
            for cloud in [0.0, 30.0, 60.0, 100.0] {
                for moon_pts in [0.0, 7.5, 15.0] {
                    for sun_pts in [0.0, 8.0, 20.0, 40.0, 50.0] {
                        let moon = MoonPenalty {
                            illumination: 1.0,
                            elevation_deg: 45.0,
                            penalty_pts: moon_pts,
                        };
                        let sun = SunPenalty {
                            elevation_deg: 0.0,
                            twilight_phase: TwilightPhase::Daylight,
                            penalty_pts: sun_pts,
                        };
                        let score = calculate_visibility_score(
                            &aurora(kp),
                            &weather(cloud, 12.0, 0.2),
                            moon,
                            sun,
                        );
                        assert!(
                            (0.0..=100.0).contains(&score.total_score),
                            "kp={} cloud={} moon={} sun={}",
                            kp,
                            cloud,
                            moon_pts,
                            sun_pts
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_recommendation_bands() {
        assert!(recommendation(85.0, 5.0, 10.0).to_lowercase().contains("excellent"));
        assert!(recommendation(65.0, 4.0, 30.0).to_lowercase().contains("good"));
        assert!(recommendation(45.0, 3.5, 50.0).to_lowercase().contains("fair"));
        assert!(recommendation(25.0, 4.0, 60.0).to_lowercase().contains("poor"));
        assert!(recommendation(15.0, 1.0, 80.0)
            .to_lowercase()
            .contains("very poor"));
    }

    #[test]
    fn test_recommendation_calls_out_limiting_factor() {
        assert!(recommendation(45.0, 2.0, 10.0).contains("activity is low"));
        assert!(recommendation(45.0, 5.0, 90.0).contains("cloud cover"));
        assert!(recommendation(25.0, 1.5, 10.0).contains("too low for this latitude"));
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let a = calculate_visibility_score(
            &aurora(4.2),
            &weather(33.0, 18.0, 0.1),
            no_moon(),
            dark_sun(),
        );
        let b = calculate_visibility_score(
            &aurora(4.2),
            &weather(33.0, 18.0, 0.1),
            no_moon(),
            dark_sun(),
        );
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.recommendation, b.recommendation);
    }
}
