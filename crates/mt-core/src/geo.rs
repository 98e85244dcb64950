//! Geographic coordinates, bearings, and turn classification.
//!
//! `GeoPoint` stores single-precision latitude/longitude (about 1 m at the
//! equator).  Bearings are computed in `f64` because turn classification
//! compares differences of nearly equal angles.

/// A WGS-84 geographic coordinate stored as single-precision floats.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f32,
    pub lon: f32,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f32 {
        const R: f32 = 6_371_000.0; // mean Earth radius, metres

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        R * c
    }

    /// Initial great-circle bearing from `self` towards `other`, in degrees
    /// clockwise from north, normalised to `[0, 360)`.
    ///
    /// Identical points yield `0.0`.
    pub fn bearing_to(self, other: GeoPoint) -> f64 {
        let lat1 = (self.lat as f64).to_radians();
        let lat2 = (other.lat as f64).to_radians();
        let d_lon = (other.lon as f64 - self.lon as f64).to_radians();

        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
        if x == 0.0 && y == 0.0 {
            return 0.0;
        }
        normalize_bearing(y.atan2(x).to_degrees())
    }

    /// Linear interpolation between two points; `t` is clamped to `[0, 1]`.
    ///
    /// Good enough for positions along a single road segment.
    pub fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        let t = t.clamp(0.0, 1.0) as f32;
        GeoPoint::new(
            self.lat + (other.lat - self.lat) * t,
            self.lon + (other.lon - self.lon) * t,
        )
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Map any angle in degrees onto `[0, 360)`.
#[inline]
pub fn normalize_bearing(deg: f64) -> f64 {
    let b = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if b >= 360.0 { 0.0 } else { b }
}

/// The opposite compass heading.
#[inline]
pub fn reverse_bearing(deg: f64) -> f64 {
    normalize_bearing(deg + 180.0)
}

// ── Direction ─────────────────────────────────────────────────────────────────

/// Eight-sector classification of a heading change.
///
/// Sectors are 45° wide and centred on multiples of 45°; `Up` means no
/// change of heading, `Right` a 90° clockwise turn, `Down` a U-turn.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    #[default]
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl Direction {
    const SECTORS: [Direction; 8] = [
        Direction::Up,
        Direction::UpRight,
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::DownLeft,
        Direction::Left,
        Direction::UpLeft,
    ];

    /// Classify the turn from heading `from` to heading `to` (both degrees).
    pub fn between(from: f64, to: f64) -> Direction {
        let diff = normalize_bearing(to - from);
        let sector = ((diff + 22.5) / 45.0).floor() as usize % 8;
        Self::SECTORS[sector]
    }

    /// `true` for the three sectors on the right-hand side.
    #[inline]
    pub fn is_rightward(self) -> bool {
        matches!(self, Direction::UpRight | Direction::Right | Direction::DownRight)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::UpRight => "up-right",
            Direction::Right => "right",
            Direction::DownRight => "down-right",
            Direction::Down => "down",
            Direction::DownLeft => "down-left",
            Direction::Left => "left",
            Direction::UpLeft => "up-left",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
