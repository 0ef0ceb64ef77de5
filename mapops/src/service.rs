//! [`TileService`] is the shared core of every serving strategy: it parses
//! the tile path the renderer asked for, resolves the basemap against the
//! registry, and answers with bytes or a uniform "no tile" — never an
//! error. All three protocols delegate here, which is what keeps their
//! not-found semantics identical.

use crate::registry::{BasemapRegistry, TileSourceRef};
use mapops_core::{Blob, TileCompression, TileCoord};
use std::sync::Arc;

/// A servable tile: stored bytes plus the headers they need.
#[derive(Debug, Clone)]
pub struct ServedTile {
	pub blob: Blob,
	pub mime: &'static str,
	/// Transport encoding of the stored bytes (`gzip`/`br`), if any.
	pub encoding: Option<&'static str>,
}

pub struct TileService {
	registry: Arc<BasemapRegistry>,
}

impl TileService {
	pub fn new(registry: Arc<BasemapRegistry>) -> TileService {
		TileService { registry }
	}

	pub fn registry(&self) -> &Arc<BasemapRegistry> {
		&self.registry
	}

	/// Serves a renderer request of the form
	/// `{basemap}/{z}/{x}/{y}.{ext}` (leading slash tolerated).
	///
	/// `None` covers every non-servable case the same way: malformed path,
	/// unknown or not-yet-ready basemap, tile outside coverage, or a failed
	/// read (logged, but still not an error to the renderer).
	pub async fn get_tile_response(&self, path: &str) -> Option<ServedTile> {
		let (basemap_id, coord) = parse_tile_path(path)?;
		self.get_tile_for(&basemap_id, &coord).await
	}

	/// Same lookup addressed by coordinate, used by the message bridge.
	pub async fn get_tile(&self, basemap_id: &str, coord: &TileCoord) -> Option<Blob> {
		self.get_tile_for(basemap_id, coord).await.map(|tile| tile.blob)
	}

	async fn get_tile_for(&self, basemap_id: &str, coord: &TileCoord) -> Option<ServedTile> {
		let reader = match self.registry.resolve_source(basemap_id)? {
			TileSourceRef::Local(reader) => reader,
			// fallback slots are served by the remote URL template, not here
			TileSourceRef::Remote(_) => return None,
		};

		let blob = match reader.get_tile(coord).await {
			Ok(blob) => blob?,
			Err(err) => {
				log::warn!("tile read failed for '{basemap_id}' {coord:?}: {err:#}");
				return None;
			}
		};

		let metadata = reader.metadata();
		Some(ServedTile {
			blob,
			mime: metadata.tile_format.as_mime_str(),
			encoding: match metadata.tile_compression {
				TileCompression::Uncompressed => None,
				TileCompression::Gzip => Some("gzip"),
				TileCompression::Brotli => Some("br"),
			},
		})
	}
}

/// Splits `{basemap}/{z}/{x}/{y}.{ext}` into its parts. The extension is
/// ignored for addressing; the archive's declared format decides what the
/// bytes are.
pub(crate) fn parse_tile_path(path: &str) -> Option<(String, TileCoord)> {
	let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
	if parts.len() != 4 {
		return None;
	}

	let level = parts[1].parse::<u8>().ok()?;
	let x = parts[2].parse::<u32>().ok()?;
	let y = parts[3].split('.').next()?.parse::<u32>().ok()?;

	let coord = TileCoord::new(level, x, y).ok()?;
	Some((parts[0].to_owned(), coord))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::tests::{fixture_mbtiles, mbtiles_basemap, test_config};

	#[test]
	fn path_parsing() {
		let (id, coord) = parse_tile_path("topo/5/10/12.png").unwrap();
		assert_eq!(id, "topo");
		assert_eq!(coord, TileCoord::new(5, 10, 12).unwrap());

		let (id, coord) = parse_tile_path("/satellite/0/0/0.jpg").unwrap();
		assert_eq!(id, "satellite");
		assert_eq!(coord.level, 0);

		// extension is optional, compression suffix tolerated
		assert!(parse_tile_path("topo/5/10/12").is_some());
		assert!(parse_tile_path("topo/5/10/12.mvt.gz").is_some());

		assert!(parse_tile_path("").is_none());
		assert!(parse_tile_path("topo/5/10").is_none());
		assert!(parse_tile_path("topo/5/10/12/13.png").is_none());
		assert!(parse_tile_path("topo/a/b/c.png").is_none());
		assert!(parse_tile_path("topo/5/10/99.png").is_none()); // y out of range
	}

	#[tokio::test]
	async fn serves_tiles_with_uniform_not_found() -> anyhow::Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let archive = temp.path().join("topo.mbtiles");
		fixture_mbtiles(&archive)?;

		let config = test_config(temp.path(), vec![mbtiles_basemap("topo", &archive)]);
		let registry = Arc::new(BasemapRegistry::new(&config)?);
		let service = TileService::new(registry.clone());

		// not yet activated: indistinguishable from "no tile"
		assert!(service.get_tile_response("topo/1/0/0.png").await.is_none());

		registry.activate("topo").await?;

		let tile = service.get_tile_response("topo/1/0/0.png").await.unwrap();
		assert_eq!(tile.mime, "image/png");
		assert!(tile.encoding.is_none());
		assert!(tile.blob.as_slice().starts_with(b"\x89PNG"));

		// tile outside coverage / unknown basemap / malformed path
		assert!(service.get_tile_response("topo/5/0/0.png").await.is_none());
		assert!(service.get_tile_response("nope/1/0/0.png").await.is_none());
		assert!(service.get_tile_response("topo/not/a/tile").await.is_none());

		// coordinate addressing used by the bridge
		assert!(service.get_tile("topo", &TileCoord::new(1, 1, 1)?).await.is_some());
		Ok(())
	}
}
