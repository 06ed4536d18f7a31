//! Astronomical penalty calculator.
//!
//! Closed-form solar and lunar positions (low-precision Meeus series, the same
//! family of formulas behind most sun/moon calculators), good to a few tenths
//! of a degree near the horizon — ample for twilight bucketing and moonlight
//! penalties. No refraction correction is applied; penalties are defined on
//! geometric elevation.
//!
//! Both penalty functions are pure in (coordinate, UTC instant): no network,
//! no cache, no ambient clock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::f64::consts::PI;
use utoipa::ToSchema;

use crate::helpers::{round1, round3};
use crate::services::sources::Coordinate;

const RAD: f64 = PI / 180.0;

/// Obliquity of the ecliptic, J2000 (degrees).
const OBLIQUITY_DEG: f64 = 23.4397;

/// Mean sun-earth distance in km, used for the illumination phase angle.
const SUN_DISTANCE_KM: f64 = 149_598_000.0;

/// Maximum moonlight deduction in points.
pub const MAX_MOON_PENALTY: f64 = 15.0;

/// Moonlight contribution to the score deduction.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct MoonPenalty {
    /// Illuminated fraction of the disc, 0 (new) to 1 (full)
    pub illumination: f64,
    /// Elevation above the horizon in degrees (negative = below)
    pub elevation_deg: f64,
    /// Points deducted from the total score, 0–15
    pub penalty_pts: f64,
}

/// Residual-daylight contribution to the score deduction.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct SunPenalty {
    /// Sun elevation above the horizon in degrees (negative = below)
    pub elevation_deg: f64,
    pub twilight_phase: TwilightPhase,
    /// Points deducted from the total score: 50, 40, 20, 8 or 0
    pub penalty_pts: f64,
}

/// Named solar-elevation band. Buckets are half-open on the lower bound so no
/// elevation value is ambiguous: -6.0° is civil twilight, never nautical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TwilightPhase {
    Daylight,
    CivilTwilight,
    NauticalTwilight,
    AstronomicalTwilight,
    Darkness,
}

impl TwilightPhase {
    /// Bucket a geometric sun elevation (degrees) into its twilight phase.
    pub fn classify(elevation_deg: f64) -> Self {
        if elevation_deg >= 0.0 {
            TwilightPhase::Daylight
        } else if elevation_deg >= -6.0 {
            TwilightPhase::CivilTwilight
        } else if elevation_deg >= -12.0 {
            TwilightPhase::NauticalTwilight
        } else if elevation_deg >= -18.0 {
            TwilightPhase::AstronomicalTwilight
        } else {
            TwilightPhase::Darkness
        }
    }

    /// Fixed deduction for this phase.
    pub fn penalty_pts(&self) -> f64 {
        match self {
            TwilightPhase::Daylight => 50.0,
            TwilightPhase::CivilTwilight => 40.0,
            TwilightPhase::NauticalTwilight => 20.0,
            TwilightPhase::AstronomicalTwilight => 8.0,
            TwilightPhase::Darkness => 0.0,
        }
    }
}

/// Equatorial coordinates in radians.
#[derive(Debug, Clone, Copy)]
struct Equatorial {
    ra: f64,
    dec: f64,
}

/// Days since the J2000.0 epoch (2000-01-01 12:00 UTC), fractional.
fn days_since_j2000(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5 - 2_451_545.0
}

fn ecliptic_to_equatorial(lambda: f64, beta: f64) -> Equatorial {
    let e = OBLIQUITY_DEG * RAD;
    Equatorial {
        ra: (lambda.sin() * e.cos() - beta.tan() * e.sin()).atan2(lambda.cos()),
        dec: (beta.sin() * e.cos() + beta.cos() * e.sin() * lambda.sin()).asin(),
    }
}

/// Solar ecliptic longitude (radians) from mean anomaly + equation of center.
fn solar_ecliptic_longitude(d: f64) -> f64 {
    let m = (357.5291 + 0.985_600_28 * d) * RAD;
    let c = (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin()) * RAD;
    let perihelion = 102.9372 * RAD;
    m + c + perihelion + PI
}

fn solar_coords(d: f64) -> Equatorial {
    ecliptic_to_equatorial(solar_ecliptic_longitude(d), 0.0)
}

/// Lunar position (equatorial) and distance in km.
fn lunar_coords(d: f64) -> (Equatorial, f64) {
    let l = (218.316 + 13.176_396 * d) * RAD; // mean longitude
    let m = (134.963 + 13.064_993 * d) * RAD; // mean anomaly
    let f = (93.272 + 13.229_350 * d) * RAD; // argument of latitude

    let lambda = l + 6.289 * RAD * m.sin();
    let beta = 5.128 * RAD * f.sin();
    let distance_km = 385_001.0 - 20_905.0 * m.cos();

    (ecliptic_to_equatorial(lambda, beta), distance_km)
}

/// Local sidereal time in radians for a longitude (degrees east).
fn sidereal_time(d: f64, lon_deg: f64) -> f64 {
    (280.16 + 360.985_623_5 * d + lon_deg) * RAD
}

/// Geometric elevation of a body above the horizon, in degrees.
fn elevation_deg(coord: Coordinate, d: f64, body: Equatorial) -> f64 {
    let phi = coord.lat() * RAD;
    let hour_angle = sidereal_time(d, coord.lon()) - body.ra;
    let sin_elev =
        phi.sin() * body.dec.sin() + phi.cos() * body.dec.cos() * hour_angle.cos();
    sin_elev.clamp(-1.0, 1.0).asin() / RAD
}

/// Illuminated fraction of the lunar disc, 0–1, from the geocentric
/// sun-moon elongation and the moon's distance.
fn lunar_illumination(sun: Equatorial, moon: Equatorial, moon_distance_km: f64) -> f64 {
    let elongation = (sun.dec.sin() * moon.dec.sin()
        + sun.dec.cos() * moon.dec.cos() * (sun.ra - moon.ra).cos())
    .clamp(-1.0, 1.0)
    .acos();
    let phase_angle = (SUN_DISTANCE_KM * elongation.sin())
        .atan2(moon_distance_km - SUN_DISTANCE_KM * elongation.cos());
    (1.0 + phase_angle.cos()) / 2.0
}

/// Moonlight deduction, 0–15 pts, from illumination fraction and elevation.
///
/// factor = illumination × max(0, sin(elevation)); pts = min(15, round(factor × 15, 1)).
/// At or below the horizon the penalty is exactly 0 regardless of phase.
pub(crate) fn moon_penalty_pts(illumination: f64, elevation_deg: f64) -> f64 {
    if elevation_deg <= 0.0 {
        return 0.0;
    }
    let factor = illumination * (elevation_deg * RAD).sin().max(0.0);
    round1(factor * MAX_MOON_PENALTY).min(MAX_MOON_PENALTY)
}

/// Compute the moonlight penalty for a coordinate at a UTC instant.
pub fn moon_penalty(coord: Coordinate, at: DateTime<Utc>) -> MoonPenalty {
    let d = days_since_j2000(at);
    let sun = solar_coords(d);
    let (moon, distance_km) = lunar_coords(d);

    let illumination = lunar_illumination(sun, moon, distance_km);
    let elevation = elevation_deg(coord, d, moon);

    MoonPenalty {
        illumination: round3(illumination),
        elevation_deg: round1(elevation),
        penalty_pts: moon_penalty_pts(illumination, elevation),
    }
}

/// Compute the residual-daylight penalty for a coordinate at a UTC instant.
pub fn sun_penalty(coord: Coordinate, at: DateTime<Utc>) -> SunPenalty {
    let d = days_since_j2000(at);
    let elevation = elevation_deg(coord, d, solar_coords(d));
    let phase = TwilightPhase::classify(elevation);

    SunPenalty {
        elevation_deg: round1(elevation),
        twilight_phase: phase,
        penalty_pts: phase.penalty_pts(),
    }
}
