//! Working projections.

use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

use geo::Coord;

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Spatial reference the geometry is built in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees (EPSG:4326).
    Geographic,
    /// Spherical Web Mercator in metres (EPSG:3857).
    #[default]
    WebMercator,
}

impl Projection {
    /// EPSG code of the projection.
    pub const fn srid(self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::WebMercator => 3857,
        }
    }

    /// Cumulative length after which long lines are split, in projection
    /// units.
    pub const fn split_at(self) -> f64 {
        match self {
            Self::Geographic => 1.0,
            Self::WebMercator => 100_000.0,
        }
    }

    /// Project a coordinate with `x = longitude` and `y = latitude`.
    pub fn project(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => coord,
            Self::WebMercator => {
                let lat = coord.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
                Coord {
                    x: coord.x.to_radians() * EARTH_RADIUS_M,
                    y: (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS_M,
                }
            }
        }
    }

    /// Inverse of [`Projection::project`].
    pub fn unproject(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => coord,
            Self::WebMercator => Coord {
                x: (coord.x / EARTH_RADIUS_M).to_degrees(),
                y: (2.0 * (coord.y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees(),
            },
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.srid())
    }
}

/// Error returned when a projection name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown projection {0:?}; expected 4326 or 3857")]
pub struct ParseProjectionError(pub String);

impl FromStr for Projection {
    type Err = ParseProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4326" | "epsg:4326" | "latlong" | "geographic" => Ok(Self::Geographic),
            "3857" | "epsg:3857" | "900913" | "mercator" | "webmercator" => Ok(Self::WebMercator),
            _ => Err(ParseProjectionError(s.to_owned())),
        }
    }
}
