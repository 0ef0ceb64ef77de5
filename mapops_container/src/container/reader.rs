//! The [`ArchiveReader`] trait: a uniform view onto a tile archive.
//!
//! All coordinates at this interface are XYZ; backends that store rows in
//! another scheme convert internally. A missing tile is the common
//! no-coverage case and is always `Ok(None)`, never an error — archives
//! routinely cover only a small bounding box of the world.

use anyhow::Result;
use async_trait::async_trait;
use mapops_core::{ArchiveMetadata, Blob, TileCoord};
use std::fmt::Debug;

#[async_trait]
pub trait ArchiveReader: Debug + Send + Sync {
	/// Short name of the backing container format ("mbtiles", "pmtiles", …).
	fn container_name(&self) -> &str;

	/// Name of the concrete source (usually the file path), for logging.
	fn source_name(&self) -> &str;

	/// Archive metadata, parsed once at open time and cached.
	fn metadata(&self) -> &ArchiveMetadata;

	/// Fetches the stored bytes of a single tile.
	///
	/// Returns `Ok(None)` if the archive has no tile at this coordinate,
	/// including coordinates outside the declared zoom range (those are
	/// answered without touching the archive).
	async fn get_tile(&self, coord: &TileCoord) -> Result<Option<Blob>>;

	/// Total number of addressable tiles in the archive.
	async fn tile_count(&self) -> Result<u64>;

	/// Returns a bounded slice of the archive's tiles in a deterministic
	/// order, for end-to-end traversal. `offset` past the end yields an
	/// empty vector. Readers are safe for concurrent callers; batches only
	/// bound how much tile data is resident at once.
	async fn tile_batch(&self, offset: u64, limit: u64) -> Result<Vec<(TileCoord, Blob)>>;
}
