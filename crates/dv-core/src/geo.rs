//! Planar and geographic coordinates and the distance metrics over them.

/// A coordinate pair.
///
/// For planar metrics `x`/`y` are plain Cartesian coordinates.  For
/// [`Metric::GreatCircle`] `x` is the latitude and `y` the longitude, both
/// in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Mean Earth radius used by the haversine formula, in kilometres.
const EARTH_RADIUS_KM: f64 = 6_373.0;

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn euclidean(self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn manhattan(self, other: Point) -> f64 {
        (other.x - self.x).abs() + (other.y - self.y).abs()
    }

    /// Haversine great-circle distance in kilometres.
    pub fn great_circle_km(self, other: Point) -> f64 {
        let lat1 = self.x.to_radians();
        let lat2 = other.x.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.y - self.y).to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        EARTH_RADIUS_KM * 2.0 * a.sqrt().clamp(0.0, 1.0).asin()
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

/// Selects one of the distance functions on [`Point`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
    GreatCircle,
}

impl Metric {
    #[inline]
    pub fn distance(self, a: Point, b: Point) -> f64 {
        match self {
            Metric::Euclidean => a.euclidean(b),
            Metric::Manhattan => a.manhattan(b),
            Metric::GreatCircle => a.great_circle_km(b),
        }
    }
}
