//! Quantized node coordinate cache.
//!
//! Coordinates are stored as fixed-point integers (`degrees × scale`) to keep
//! the per-node footprint at eight bytes. Two allocation strategies exist:
//!
//! - [`CacheStrategy::Dense`]: a flat array indexed by node id. Fast, but
//!   memory grows with the largest id, and an id beyond the configured bound
//!   is fatal.
//! - [`CacheStrategy::Sparse`]: fixed-size blocks allocated on demand under a
//!   byte budget. When the budget is spent the oldest block is evicted and its
//!   nodes read back as "not cached"; callers retry against a persistent store
//!   when one exists.
//!
//! Lookups never return stale coordinates: a node is either resolved exactly
//! as stored (up to quantization) or reported missing.

use geo::Coord;
use thiserror::Error;

use crate::OsmId;

mod dense;
mod sparse;

use dense::DenseCache;
use sparse::SparseCache;

/// Default quantization for geographic coordinates (seven decimal places).
pub const DEFAULT_SCALE: f64 = 10_000_000.0;

/// Errors raised by [`NodeCache`].
#[derive(Debug, Error, PartialEq)]
pub enum NodeCacheError {
    /// A dense cache received an id outside its preallocated range.
    #[error("node {id} is outside the dense cache range 0..={max_id}")]
    DenseCapacity {
        /// Offending node id.
        id: OsmId,
        /// Largest id the cache was sized for.
        max_id: OsmId,
    },
    /// The coordinate does not fit the fixed-point representation.
    #[error("node {id} has coordinate ({lat}, {lon}) outside the quantized range")]
    CoordinateOutOfRange {
        /// Offending node id.
        id: OsmId,
        /// Latitude as supplied.
        lat: f64,
        /// Longitude as supplied.
        lon: f64,
    },
}

/// How the cache allocates storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Flat array indexed by id, sized for ids in `0..=max_id`.
    Dense {
        /// Largest node id the array may hold.
        max_id: OsmId,
    },
    /// On-demand blocks bounded by a byte budget; lossy when exhausted.
    Sparse {
        /// Memory budget in bytes.
        max_bytes: usize,
    },
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self::Sparse {
            max_bytes: 800 * 1024 * 1024,
        }
    }
}

/// Configuration for a [`NodeCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeCacheConfig {
    /// Allocation strategy.
    pub strategy: CacheStrategy,
    /// Multiplier applied to degrees before truncation to integers.
    pub scale: f64,
}

impl Default for NodeCacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::default(),
            scale: DEFAULT_SCALE,
        }
    }
}

/// Fixed-point coordinate pair. `EMPTY` marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedCoord {
    lat: i32,
    lon: i32,
}

impl FixedCoord {
    pub(crate) const EMPTY: Self = Self {
        lat: i32::MIN,
        lon: i32::MIN,
    };

    pub(crate) fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// Coordinates resolved for a list of node ids.
///
/// `coords` matches the request positionally; unresolved entries hold NaN in
/// both axes. `resolved` counts the entries that are not NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeList {
    /// Coordinates with `x = longitude` and `y = latitude` (or projected
    /// equivalents once reprojected).
    pub coords: Vec<Coord<f64>>,
    /// Number of entries that could be resolved.
    pub resolved: usize,
}

impl NodeList {
    /// A list of `len` unresolved entries.
    pub fn unresolved(len: usize) -> Self {
        Self {
            coords: vec![missing_coord(); len],
            resolved: 0,
        }
    }

    /// Fill position `idx` if it is still unresolved. NaN input is ignored.
    pub fn fill(&mut self, idx: usize, coord: Coord<f64>) {
        if !is_resolved(coord) {
            return;
        }
        if let Some(slot) = self.coords.get_mut(idx)
            && !is_resolved(*slot)
        {
            *slot = coord;
            self.resolved += 1;
        }
    }

    /// Positions that are still unresolved.
    pub fn missing_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.coords
            .iter()
            .enumerate()
            .filter(|(_, coord)| !is_resolved(**coord))
            .map(|(idx, _)| idx)
    }

    /// Resolved coordinates only, in request order.
    pub fn resolved_coords(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.coords.iter().copied().filter(|coord| is_resolved(*coord))
    }
}

/// Sentinel used for unresolved nodes.
pub fn missing_coord() -> Coord<f64> {
    Coord {
        x: f64::NAN,
        y: f64::NAN,
    }
}

/// Whether a coordinate is a real position rather than the NaN sentinel.
pub fn is_resolved(coord: Coord<f64>) -> bool {
    coord.x.is_finite() && coord.y.is_finite()
}

/// Quantized coordinate cache keyed by node id.
///
/// # Examples
/// ```
/// use osm2sql_core::{CacheStrategy, NodeCache, NodeCacheConfig};
///
/// # fn main() -> Result<(), osm2sql_core::NodeCacheError> {
/// let mut cache = NodeCache::new(NodeCacheConfig {
///     strategy: CacheStrategy::Dense { max_id: 100 },
///     ..NodeCacheConfig::default()
/// });
/// cache.set(7, 51.5, -0.12)?;
/// let list = cache.get_list(&[7, 8]);
/// assert_eq!(list.resolved, 1);
/// assert!(list.coords[1].x.is_nan());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NodeCache {
    scale: f64,
    store: CacheStore,
}

#[derive(Debug)]
enum CacheStore {
    Dense(DenseCache),
    Sparse(SparseCache),
}

impl NodeCache {
    /// Build a cache for the given configuration.
    pub fn new(config: NodeCacheConfig) -> Self {
        let store = match config.strategy {
            CacheStrategy::Dense { max_id } => CacheStore::Dense(DenseCache::new(max_id)),
            CacheStrategy::Sparse { max_bytes } => {
                CacheStore::Sparse(SparseCache::with_budget(max_bytes))
            }
        };
        Self {
            scale: config.scale,
            store,
        }
    }

    /// Store a node position, overwriting any previous value.
    ///
    /// In sparse mode a full budget evicts the oldest block instead of
    /// failing. In dense mode an id outside the preallocated range is an
    /// error the caller must treat as fatal.
    pub fn set(&mut self, id: OsmId, lat: f64, lon: f64) -> Result<(), NodeCacheError> {
        let fixed = self
            .encode(lat, lon)
            .ok_or(NodeCacheError::CoordinateOutOfRange { id, lat, lon })?;
        match &mut self.store {
            CacheStore::Dense(cache) => cache.set(id, fixed),
            CacheStore::Sparse(cache) => {
                cache.set(id, fixed);
                Ok(())
            }
        }
    }

    /// Look up a single node.
    pub fn get(&self, id: OsmId) -> Option<Coord<f64>> {
        let fixed = match &self.store {
            CacheStore::Dense(cache) => cache.get(id),
            CacheStore::Sparse(cache) => cache.get(id),
        }?;
        Some(self.decode(fixed))
    }

    /// Resolve `ids` positionally; see [`NodeList`].
    pub fn get_list(&self, ids: &[OsmId]) -> NodeList {
        let mut list = NodeList::unresolved(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            if let Some(coord) = self.get(*id) {
                list.fill(idx, coord);
            }
        }
        list
    }

    /// Forget a node. Unknown ids are ignored.
    pub fn delete(&mut self, id: OsmId) {
        match &mut self.store {
            CacheStore::Dense(cache) => cache.delete(id),
            CacheStore::Sparse(cache) => cache.delete(id),
        }
    }

    /// Whether the cache may forget nodes on its own.
    pub const fn is_lossy(&self) -> bool {
        matches!(self.store, CacheStore::Sparse(_))
    }

    /// Quantization factor in use.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Round-trip a coordinate through the fixed-point representation.
    ///
    /// Persistent stores use this so their coordinates compare bit-for-bit
    /// with cached ones.
    pub fn quantize(&self, lat: f64, lon: f64) -> Option<Coord<f64>> {
        self.encode(lat, lon).map(|fixed| self.decode(fixed))
    }

    fn encode(&self, lat: f64, lon: f64) -> Option<FixedCoord> {
        let lat = to_fixed(lat, self.scale)?;
        let lon = to_fixed(lon, self.scale)?;
        let fixed = FixedCoord { lat, lon };
        (!fixed.is_empty()).then_some(fixed)
    }

    fn decode(&self, fixed: FixedCoord) -> Coord<f64> {
        Coord {
            x: f64::from(fixed.lon) / self.scale,
            y: f64::from(fixed.lat) / self.scale,
        }
    }
}

// None outside the i32 range.
fn to_fixed(degrees: f64, scale: f64) -> Option<i32> {
    let scaled = (degrees * scale).round();
    let in_range = scaled.is_finite()
        && scaled > f64::from(i32::MIN)
        && scaled <= f64::from(i32::MAX);
    in_range.then_some(scaled as i32)
}
