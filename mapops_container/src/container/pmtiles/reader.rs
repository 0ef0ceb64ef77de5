//! Read tiles from a PMTiles v3 archive.
//!
//! Every access is a random byte-range read against a [`DataReader`]; the
//! archive is never loaded into memory. A lookup costs the cached root
//! directory search plus at most one leaf-directory read, then one read of
//! the tile bytes themselves. Decoded leaf directories are kept in a small
//! bounded cache since Hilbert ordering makes neighbouring requests hit the
//! same leaf.

use super::types::{EntriesV3, EntryV3, HeaderV3};
use crate::ArchiveReader;
use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use futures::lock::Mutex;
use mapops_core::{
	ArchiveMetadata, Blob, ByteRange, TileCompression, TileCoord, TileId,
	compression::decompress,
	io::{DataReader, DataReaderFile},
};
use std::{collections::HashMap, fmt::Debug, path::Path, sync::Arc};

/// Decoded leaf directories kept in memory at most.
const LEAF_CACHE_SIZE: usize = 64;

pub struct PmtilesReader {
	data_reader: DataReader,
	header: HeaderV3,
	internal_compression: TileCompression,
	metadata: ArchiveMetadata,
	root_entries: Arc<EntriesV3>,
	leaves_cache: Mutex<HashMap<ByteRange, Arc<EntriesV3>>>,
	flat_entries: Mutex<Option<Arc<Vec<EntryV3>>>>,
}

impl PmtilesReader {
	pub async fn open_path(path: &Path) -> Result<PmtilesReader> {
		PmtilesReader::open_reader(DataReaderFile::open(path)?).await
	}

	/// Opens an archive from any byte-range source: reads and validates the
	/// header, the root directory and the metadata blob.
	pub async fn open_reader(data_reader: DataReader) -> Result<PmtilesReader> {
		log::debug!("open pmtiles '{}'", data_reader.get_name());

		let header_blob = data_reader
			.read_range(&ByteRange::new(0, HeaderV3::len()))
			.await
			.with_context(|| format!("reading PMTiles header of '{}'", data_reader.get_name()))?;
		let header = HeaderV3::deserialize(&header_blob)?;
		log::trace!("header: {header:?}");

		let internal_compression = header.internal_compression.as_value()?;

		let mut metadata = ArchiveMetadata::new(header.tile_type.as_value()?, header.tile_compression.as_value()?);
		metadata.min_zoom = header.min_zoom;
		metadata.max_zoom = header.max_zoom;
		metadata.bounds = Some(header.bounds());

		if header.metadata.length > 0 {
			let blob = decompress(data_reader.read_range(&header.metadata).await?, internal_compression)?;
			parse_metadata_json(&mut metadata, &blob);
		}

		let root_blob = decompress(data_reader.read_range(&header.root_dir).await?, internal_compression)?;
		let root_entries = Arc::new(EntriesV3::from_blob(&root_blob)?);
		log::trace!("root directory has {} entries", root_entries.len());

		Ok(PmtilesReader {
			data_reader,
			header,
			internal_compression,
			metadata,
			root_entries,
			leaves_cache: Mutex::new(HashMap::new()),
			flat_entries: Mutex::new(None),
		})
	}

	async fn read_leaf_dir(&self, range: &ByteRange) -> Result<Arc<EntriesV3>> {
		let mut cache = self.leaves_cache.lock().await;
		if let Some(entries) = cache.get(range) {
			return Ok(entries.clone());
		}

		let blob = self
			.data_reader
			.read_range(&range.get_shifted_forward(self.header.leaf_dirs.offset))
			.await?;
		let blob = decompress(blob, self.internal_compression)?;
		let entries = Arc::new(EntriesV3::from_blob(&blob)?);

		if cache.len() >= LEAF_CACHE_SIZE {
			cache.clear();
		}
		cache.insert(*range, entries.clone());
		Ok(entries)
	}

	async fn read_tile_data(&self, range: &ByteRange) -> Result<Blob> {
		self
			.data_reader
			.read_range(&range.get_shifted_forward(self.header.tile_data.offset))
			.await
	}

	/// All tile entries (leaf directories resolved), sorted by tile id.
	/// Built once on first traversal; directories are small compared to the
	/// tile-data region.
	async fn flat_entries(&self) -> Result<Arc<Vec<EntryV3>>> {
		let mut guard = self.flat_entries.lock().await;
		if let Some(entries) = &*guard {
			return Ok(entries.clone());
		}

		let mut flat: Vec<EntryV3> = Vec::new();
		for entry in self.root_entries.iter() {
			if entry.is_leaf_dir() {
				let leaf = self.read_leaf_dir(&entry.range).await?;
				for sub in leaf.iter() {
					ensure!(!sub.is_leaf_dir(), "nested PMTiles leaf directories are not supported");
					flat.push(*sub);
				}
			} else {
				flat.push(*entry);
			}
		}

		let entries = Arc::new(flat);
		*guard = Some(entries.clone());
		Ok(entries)
	}
}

/// Pulls the descriptive fields out of the archive's JSON metadata blob.
/// The blob is advisory; parse failures only cost those fields.
fn parse_metadata_json(metadata: &mut ArchiveMetadata, blob: &Blob) {
	let Ok(value) = serde_json::from_slice::<serde_json::Value>(blob.as_slice()) else {
		log::debug!("ignoring unparsable PMTiles metadata JSON");
		return;
	};
	let get = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_owned);
	metadata.name = get("name");
	metadata.attribution = get("attribution");
	metadata.description = get("description");
}

#[async_trait]
impl ArchiveReader for PmtilesReader {
	fn container_name(&self) -> &str {
		"pmtiles"
	}

	fn source_name(&self) -> &str {
		self.data_reader.get_name()
	}

	fn metadata(&self) -> &ArchiveMetadata {
		&self.metadata
	}

	async fn get_tile(&self, coord: &TileCoord) -> Result<Option<Blob>> {
		log::trace!("get_tile {coord:?}");

		// outside the declared zoom range: no directory read needed
		if !self.metadata.covers_zoom(coord.level) {
			return Ok(None);
		}

		let tile_id = coord.to_tile_id()?;
		let mut entries = self.root_entries.clone();

		// root plus at most one leaf level; the extra iterations only guard
		// against malformed archives
		for _depth in 0..3 {
			let Some(entry) = entries.find_tile(tile_id) else {
				return Ok(None);
			};

			if entry.range.length == 0 {
				return Ok(None);
			}

			if entry.is_leaf_dir() {
				entries = self.read_leaf_dir(&entry.range).await?;
			} else {
				return Ok(Some(self.read_tile_data(&entry.range).await?));
			}
		}

		bail!("PMTiles directory depth exceeded in '{}'", self.source_name())
	}

	async fn tile_count(&self) -> Result<u64> {
		let entries = self.flat_entries().await?;
		Ok(entries.iter().map(|e| u64::from(e.run_length)).sum())
	}

	async fn tile_batch(&self, offset: u64, limit: u64) -> Result<Vec<(TileCoord, Blob)>> {
		let entries = self.flat_entries().await?;
		let mut batch: Vec<(TileCoord, Blob)> = Vec::new();
		let mut cursor: u64 = 0;

		for entry in entries.iter() {
			let count = u64::from(entry.run_length);
			if cursor + count <= offset {
				cursor += count;
				continue;
			}
			if batch.len() as u64 >= limit {
				break;
			}

			// one read per entry; every id in a run shares the same bytes
			let bytes = self.read_tile_data(&entry.range).await?;
			for i in 0..count {
				if cursor + i < offset {
					continue;
				}
				if batch.len() as u64 >= limit {
					break;
				}
				let coord = TileCoord::from_tile_id(entry.tile_id + i)?;
				batch.push((coord, bytes.clone()));
			}
			cursor += count;
		}

		Ok(batch)
	}
}

impl Debug for PmtilesReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PmtilesReader")
			.field("name", &self.data_reader.get_name())
			.field("metadata", &self.metadata)
			.finish()
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::container::pmtiles::types::{PMTilesCompression, PMTilesType};
	use mapops_core::{compression::compress, io::DataReaderTrait};
	use std::sync::atomic::{AtomicU64, Ordering};

	/// In-memory byte-range source that counts reads.
	#[derive(Debug)]
	pub struct CountingReader {
		data: Blob,
		pub reads: Arc<AtomicU64>,
	}

	#[async_trait]
	impl DataReaderTrait for CountingReader {
		async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
			self.reads.fetch_add(1, Ordering::SeqCst);
			self.data.read_range(range)
		}

		fn len(&self) -> u64 {
			self.data.len()
		}

		fn get_name(&self) -> &str {
			"memory"
		}
	}

	/// Builds a complete little archive: three tiles at zoom 0 and 1, one of
	/// them covering two consecutive ids via a run. With `with_leaf`, the
	/// root directory holds a single leaf pointer instead of tile entries.
	pub fn build_fixture(internal: TileCompression, with_leaf: bool) -> Result<Blob> {
		let payloads: &[&[u8]] = &[b"tile-a", b"tile-b", b"tile-c"];
		let mut tile_data: Vec<u8> = Vec::new();
		let mut tile_entries = EntriesV3::new();
		// ids 0 (z0), 1 (z1 0/0) and a run covering ids 3 and 4
		let ids_and_runs = [(0u64, 1u32), (1, 1), (3, 2)];
		for (payload, (tile_id, run_length)) in payloads.iter().zip(ids_and_runs) {
			tile_entries.push(EntryV3::new(
				tile_id,
				ByteRange::new(tile_data.len() as u64, payload.len() as u64),
				run_length,
			));
			tile_data.extend_from_slice(payload);
		}

		let tile_dir = compress(tile_entries.serialize(), internal)?;

		let (root_dir, leaf_dirs) = if with_leaf {
			let mut root = EntriesV3::new();
			root.push(EntryV3::new(0, ByteRange::new(0, tile_dir.len()), 0));
			(compress(root.serialize(), internal)?, tile_dir)
		} else {
			(tile_dir, Blob::new_empty())
		};

		let metadata = compress(
			Blob::from(r#"{"name":"fixture","attribution":"test data"}"#),
			internal,
		)?;

		let header_len = HeaderV3::len();
		let root_range = ByteRange::new(header_len, root_dir.len());
		let metadata_range = ByteRange::new(root_range.offset + root_range.length, metadata.len());
		let leaf_range = ByteRange::new(metadata_range.offset + metadata_range.length, leaf_dirs.len());
		let data_range = ByteRange::new(leaf_range.offset + leaf_range.length, tile_data.len() as u64);

		let header = HeaderV3 {
			root_dir: root_range,
			metadata: metadata_range,
			leaf_dirs: leaf_range,
			tile_data: data_range,
			addressed_tiles_count: 4,
			tile_entries_count: 3,
			tile_contents_count: 3,
			clustered: true,
			internal_compression: PMTilesCompression::from_value(internal),
			tile_compression: PMTilesCompression::None,
			tile_type: PMTilesType::PNG,
			min_zoom: 0,
			max_zoom: 2,
			min_lon_e7: -1118000000,
			min_lat_e7: 405000000,
			max_lon_e7: -1116000000,
			max_lat_e7: 407000000,
			center_zoom: 1,
			center_lon_e7: -1117000000,
			center_lat_e7: 406000000,
		};

		let mut file = header.serialize().into_vec();
		file.extend_from_slice(root_dir.as_slice());
		file.extend_from_slice(metadata.as_slice());
		file.extend_from_slice(leaf_dirs.as_slice());
		file.extend_from_slice(&tile_data);
		Ok(Blob::from(file))
	}

	async fn open_fixture(internal: TileCompression, with_leaf: bool) -> Result<(PmtilesReader, Arc<AtomicU64>)> {
		let file = build_fixture(internal, with_leaf)?;
		let reads = Arc::new(AtomicU64::new(0));
		let reader = PmtilesReader::open_reader(Box::new(CountingReader {
			data: file,
			reads: reads.clone(),
		}))
		.await?;
		Ok((reader, reads))
	}

	#[tokio::test]
	async fn metadata() -> Result<()> {
		let (reader, _) = open_fixture(TileCompression::Gzip, false).await?;
		assert_eq!(reader.container_name(), "pmtiles");

		let metadata = reader.metadata();
		assert_eq!(metadata.min_zoom, 0);
		assert_eq!(metadata.max_zoom, 2);
		assert_eq!(metadata.name.as_deref(), Some("fixture"));
		assert_eq!(metadata.attribution.as_deref(), Some("test data"));
		assert!((metadata.bounds.unwrap()[0] - -111.8).abs() < 1e-9);
		Ok(())
	}

	#[tokio::test]
	async fn lookup_hits_and_misses() -> Result<()> {
		for internal in [TileCompression::Uncompressed, TileCompression::Gzip, TileCompression::Brotli] {
			let (reader, _) = open_fixture(internal, false).await?;

			let tile = reader.get_tile(&TileCoord::new(0, 0, 0)?).await?.unwrap();
			assert_eq!(tile.as_slice(), b"tile-a");

			// id 1 = z1 (0, 0)
			let tile = reader.get_tile(&TileCoord::from_tile_id(1)?).await?.unwrap();
			assert_eq!(tile.as_slice(), b"tile-b");

			// ids 3 and 4 share one run entry
			let run_a = reader.get_tile(&TileCoord::from_tile_id(3)?).await?.unwrap();
			let run_b = reader.get_tile(&TileCoord::from_tile_id(4)?).await?.unwrap();
			assert_eq!(run_a.as_slice(), b"tile-c");
			assert_eq!(run_b.as_slice(), b"tile-c");

			// id 2 lies between entries
			assert!(reader.get_tile(&TileCoord::from_tile_id(2)?).await?.is_none());
		}
		Ok(())
	}

	#[tokio::test]
	async fn leaf_directory_recursion() -> Result<()> {
		let (reader, _) = open_fixture(TileCompression::Gzip, true).await?;

		let tile = reader.get_tile(&TileCoord::new(0, 0, 0)?).await?.unwrap();
		assert_eq!(tile.as_slice(), b"tile-a");
		let tile = reader.get_tile(&TileCoord::from_tile_id(4)?).await?.unwrap();
		assert_eq!(tile.as_slice(), b"tile-c");
		assert!(reader.get_tile(&TileCoord::from_tile_id(2)?).await?.is_none());
		Ok(())
	}

	#[tokio::test]
	async fn zoom_out_of_range_reads_nothing() -> Result<()> {
		let (reader, reads) = open_fixture(TileCompression::Gzip, false).await?;

		let before = reads.load(Ordering::SeqCst);
		assert!(reader.get_tile(&TileCoord::new(20, 0, 0)?).await?.is_none());
		assert_eq!(reads.load(Ordering::SeqCst), before);
		Ok(())
	}

	#[tokio::test]
	async fn batch_enumeration_expands_runs() -> Result<()> {
		let (reader, _) = open_fixture(TileCompression::Gzip, false).await?;

		assert_eq!(reader.tile_count().await?, 4);

		let all = reader.tile_batch(0, 100).await?;
		assert_eq!(all.len(), 4);
		assert_eq!(all[0].0, TileCoord::new(0, 0, 0)?);
		assert_eq!(all[2].1.as_slice(), b"tile-c");
		assert_eq!(all[3].1.as_slice(), b"tile-c");
		assert_eq!(all[2].0, TileCoord::from_tile_id(3)?);
		assert_eq!(all[3].0, TileCoord::from_tile_id(4)?);

		// batches partition the enumeration, including mid-run splits
		let mut pieces = reader.tile_batch(0, 3).await?;
		pieces.extend(reader.tile_batch(3, 3).await?);
		assert_eq!(pieces, all);

		assert!(reader.tile_batch(4, 10).await?.is_empty());
		Ok(())
	}

	#[tokio::test]
	async fn rejects_garbage() -> Result<()> {
		let reads = Arc::new(AtomicU64::new(0));
		let result = PmtilesReader::open_reader(Box::new(CountingReader {
			data: Blob::from(vec![0u8; 200]),
			reads,
		}))
		.await;
		assert!(result.is_err());
		Ok(())
	}
}
