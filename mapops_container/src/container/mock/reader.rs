//! In-memory [`ArchiveReader`] used by tests of the extraction pipeline,
//! the serving protocols and the registry.

use crate::ArchiveReader;
use anyhow::Result;
use async_trait::async_trait;
use mapops_core::{ArchiveMetadata, Blob, TileCompression, TileCoord, TileFormat};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct MockArchiveReader {
	metadata: ArchiveMetadata,
	tiles: BTreeMap<TileCoord, Blob>,
}

impl MockArchiveReader {
	pub fn from_tiles(
		tile_format: TileFormat,
		tile_compression: TileCompression,
		tiles: Vec<(TileCoord, Blob)>,
	) -> MockArchiveReader {
		let mut metadata = ArchiveMetadata::new(tile_format, tile_compression);
		metadata.min_zoom = tiles.iter().map(|(c, _)| c.level).min().unwrap_or(0);
		metadata.max_zoom = tiles.iter().map(|(c, _)| c.level).max().unwrap_or(0);
		MockArchiveReader {
			metadata,
			tiles: tiles.into_iter().collect(),
		}
	}

	/// Full tile pyramid up to `max_zoom`, each tile a PNG-magic payload
	/// that encodes its own coordinate.
	pub fn new_mock(max_zoom: u8) -> MockArchiveReader {
		let mut tiles = Vec::new();
		for level in 0..=max_zoom {
			let n = 1u32 << level;
			for y in 0..n {
				for x in 0..n {
					let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
					bytes.extend_from_slice(format!("{level}/{x}/{y}").as_bytes());
					tiles.push((TileCoord::new(level, x, y).unwrap(), Blob::from(bytes)));
				}
			}
		}
		Self::from_tiles(TileFormat::PNG, TileCompression::Uncompressed, tiles)
	}
}

#[async_trait]
impl ArchiveReader for MockArchiveReader {
	fn container_name(&self) -> &str {
		"mock"
	}

	fn source_name(&self) -> &str {
		"mock archive"
	}

	fn metadata(&self) -> &ArchiveMetadata {
		&self.metadata
	}

	async fn get_tile(&self, coord: &TileCoord) -> Result<Option<Blob>> {
		Ok(self.tiles.get(coord).cloned())
	}

	async fn tile_count(&self) -> Result<u64> {
		Ok(self.tiles.len() as u64)
	}

	async fn tile_batch(&self, offset: u64, limit: u64) -> Result<Vec<(TileCoord, Blob)>> {
		Ok(
			self
				.tiles
				.iter()
				.skip(offset as usize)
				.take(limit as usize)
				.map(|(coord, blob)| (*coord, blob.clone()))
				.collect(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn pyramid() -> Result<()> {
		let reader = MockArchiveReader::new_mock(2);
		assert_eq!(reader.tile_count().await?, 1 + 4 + 16);

		let tile = reader.get_tile(&TileCoord::new(2, 3, 1)?).await?.unwrap();
		assert!(tile.as_slice().starts_with(b"\x89PNG"));
		assert!(tile.as_slice().ends_with(b"2/3/1"));

		assert!(reader.get_tile(&TileCoord::new(3, 0, 0)?).await?.is_none());

		let batch = reader.tile_batch(1, 4).await?;
		assert_eq!(batch.len(), 4);
		assert_eq!(batch[0].0.level, 1);
		Ok(())
	}
}
