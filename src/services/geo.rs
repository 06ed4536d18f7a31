//! Global aurora-probability grid with bilinear point interpolation.
//!
//! The NOAA OVATION feed samples the whole globe on a one-degree lattice:
//! 360 longitude steps (0..=359, degrees east) by 181 latitude steps
//! (90..=-90). `AuroraGrid` stores that lattice sparsely enough to notice
//! missing samples — a truncated or corrupt payload surfaces as a
//! `GridError::MissingSample` instead of silently interpolating zeros.

/// Longitude steps on the lattice (one per whole degree east, 0..=359).
pub const GRID_LON_STEPS: usize = 360;
/// Latitude steps on the lattice (one per whole degree, +90 down to -90).
pub const GRID_LAT_STEPS: usize = 181;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("grid sample missing at lat index {lat_idx}, lon index {lon_idx}")]
    MissingSample { lat_idx: usize, lon_idx: usize },
}

/// A rectangular lattice of aurora-probability samples.
///
/// Indexed internally as `[lat_idx][lon_idx]` where `lat_idx = 90 - lat`
/// (north pole first) and `lon_idx` is degrees east, matching the OVATION
/// payload layout.
pub struct AuroraGrid {
    cells: Vec<Option<f64>>,
}

impl AuroraGrid {
    /// Create an empty grid; samples are filled in via [`AuroraGrid::set`].
    pub fn new() -> Self {
        Self {
            cells: vec![None; GRID_LAT_STEPS * GRID_LON_STEPS],
        }
    }

    /// Store one sample from a `[lon, lat, value]` payload triple.
    /// Out-of-lattice coordinates are clamped the same way the feed's
    /// integer grid is defined (lon wraps, lat clamps at the poles).
    pub fn set(&mut self, lon_deg: f64, lat_deg: f64, value: f64) {
        let lon_idx = (lon_deg.round() as i64).rem_euclid(GRID_LON_STEPS as i64) as usize;
        let lat_idx = (90.0 - lat_deg).round().clamp(0.0, (GRID_LAT_STEPS - 1) as f64) as usize;
        self.cells[lat_idx * GRID_LON_STEPS + lon_idx] = Some(value);
    }

    fn get(&self, lat_idx: usize, lon_idx: usize) -> Result<f64, GridError> {
        self.cells[lat_idx * GRID_LON_STEPS + lon_idx]
            .ok_or(GridError::MissingSample { lat_idx, lon_idx })
    }

    /// Bilinearly interpolate the grid at an arbitrary point.
    ///
    /// The four lattice points surrounding `(lat, lon)` are weighted by the
    /// fractional distance along each axis. Longitude wraps across the ±180°
    /// seam; latitude clamps at the poles. An exact lattice hit returns the
    /// stored sample with no averaging drift.
    pub fn interpolate(&self, lat: f64, lon: f64) -> Result<f64, GridError> {
        // Negated comparison so NaN is rejected too
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GridError::LatitudeOutOfRange(lat));
        }

        // Degrees east in [0, 360); guard against rem_euclid rounding to 360.0
        // for tiny negative inputs
        let mut lon_e = lon.rem_euclid(360.0);
        if lon_e >= 360.0 {
            lon_e = 0.0;
        }

        // North pole first, matching storage order
        let lat_pos = 90.0 - lat;

        let lon_i0 = lon_e.floor() as usize;
        let lon_i1 = (lon_i0 + 1) % GRID_LON_STEPS;
        let lon_frac = lon_e - lon_e.floor();

        let lat_i0 = (lat_pos.floor() as usize).min(GRID_LAT_STEPS - 1);
        let lat_i1 = (lat_i0 + 1).min(GRID_LAT_STEPS - 1);
        let lat_frac = lat_pos - lat_pos.floor();

        let v00 = self.get(lat_i0, lon_i0)?;
        let v01 = self.get(lat_i0, lon_i1)?;
        let v10 = self.get(lat_i1, lon_i0)?;
        let v11 = self.get(lat_i1, lon_i1)?;

        let north = v00 * (1.0 - lon_frac) + v01 * lon_frac;
        let south = v10 * (1.0 - lon_frac) + v11 * lon_frac;
        Ok(north * (1.0 - lat_frac) + south * lat_frac)
    }

    /// Number of populated samples (payload sanity check).
    pub fn sample_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

impl Default for AuroraGrid {
    fn default() -> Self {
        Self::new()
    }
}
