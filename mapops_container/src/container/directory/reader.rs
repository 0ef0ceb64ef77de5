//! Read tiles from an extracted directory tree.
//!
//! This is the serving counterpart of the extraction pipeline: once an
//! archive has been materialized as
//! ```text
//! <root>/<z>/<x>/<y>.<format>[.<compression>]
//! ```
//! runtimes that cannot query archives directly (or a dumb static file
//! server) read individual tile files instead.
//!
//! Two modes:
//! - [`open_path`](DirectoryReader::open_path) scans and indexes a finished
//!   tree; format and compression are inferred from the tile filenames and
//!   must be uniform.
//! - [`open_live`](DirectoryReader::open_live) serves a tree that is still
//!   being written by the pipeline: nothing is indexed, every lookup probes
//!   the filesystem, so a tile becomes servable the moment its file lands.
//!   Format and compression come from the `metadata.json` the pipeline
//!   writes before the first tile.

use crate::ArchiveReader;
use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use mapops_core::{ArchiveMetadata, Blob, TileCompression, TileCoord, TileFormat};
use std::{
	collections::BTreeMap,
	fmt::Debug,
	fs, io,
	path::{Path, PathBuf},
};

pub struct DirectoryReader {
	name: String,
	dir: PathBuf,
	metadata: ArchiveMetadata,
	/// `None` in live mode: lookups probe the filesystem directly.
	tile_map: Option<BTreeMap<TileCoord, PathBuf>>,
}

impl DirectoryReader {
	/// Scans a finished tile tree and indexes every tile file it contains.
	///
	/// # Errors
	/// Returns an error if the directory does not exist, contains no tiles,
	/// or mixes tile formats or compressions.
	pub fn open_path(dir: &Path) -> Result<DirectoryReader> {
		log::debug!("open directory {dir:?}");

		ensure!(dir.exists(), "path {dir:?} does not exist");
		ensure!(dir.is_dir(), "path {dir:?} is not a directory");

		let scan = scan_tree(dir)?;
		if scan.tile_map.is_empty() {
			bail!("no tiles found in {dir:?}");
		}

		let mut metadata = ArchiveMetadata::new(scan.format.unwrap(), scan.compression.unwrap());
		metadata.min_zoom = scan.min_zoom;
		metadata.max_zoom = scan.max_zoom;
		merge_descriptive_json(&mut metadata, &dir.join("metadata.json"));

		Ok(DirectoryReader {
			name: dir.to_string_lossy().to_string(),
			dir: dir.to_path_buf(),
			metadata,
			tile_map: Some(scan.tile_map),
		})
	}

	/// Opens a tree an extraction run is still filling. Requires the
	/// pipeline's `metadata.json` (written before the first tile) to learn
	/// format and compression; lookups then probe for files on demand, so
	/// already-extracted tiles are immediately servable and the rest are
	/// plain misses.
	pub fn open_live(dir: &Path) -> Result<DirectoryReader> {
		log::debug!("open live directory {dir:?}");

		ensure!(dir.is_dir(), "path {dir:?} is not a directory");

		let path = dir.join("metadata.json");
		let text = fs::read_to_string(&path).with_context(|| format!("reading {path:?}"))?;
		let value: serde_json::Value =
			serde_json::from_str(&text).with_context(|| format!("parsing {path:?}"))?;

		let format = TileFormat::try_from_str(value.get("format").and_then(|v| v.as_str()).unwrap_or(""))?;
		let compression = TileCompression::parse_str(value.get("compression").and_then(|v| v.as_str()).unwrap_or("none"))?;

		let mut metadata = ArchiveMetadata::new(format, compression);
		metadata.min_zoom = value.get("minzoom").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
		metadata.max_zoom = value.get("maxzoom").and_then(|v| v.as_u64()).unwrap_or(31) as u8;
		merge_descriptive_json(&mut metadata, &path);

		Ok(DirectoryReader {
			name: dir.to_string_lossy().to_string(),
			dir: dir.to_path_buf(),
			metadata,
			tile_map: None,
		})
	}

	fn tile_extension(&self) -> String {
		format!(
			"{}{}",
			self.metadata.tile_format.as_extension(),
			self.metadata.tile_compression.extension()
		)
	}
}

struct TreeScan {
	tile_map: BTreeMap<TileCoord, PathBuf>,
	format: Option<TileFormat>,
	compression: Option<TileCompression>,
	min_zoom: u8,
	max_zoom: u8,
}

fn scan_tree(dir: &Path) -> Result<TreeScan> {
	let mut scan = TreeScan {
		tile_map: BTreeMap::new(),
		format: None,
		compression: None,
		min_zoom: u8::MAX,
		max_zoom: 0,
	};

	for entry_z in fs::read_dir(dir)? {
		let entry_z = entry_z?;
		let Ok(level) = entry_z.file_name().to_string_lossy().parse::<u8>() else {
			continue;
		};
		if !entry_z.path().is_dir() {
			continue;
		}

		for entry_x in fs::read_dir(entry_z.path())? {
			let entry_x = entry_x?;
			let Ok(x) = entry_x.file_name().to_string_lossy().parse::<u32>() else {
				continue;
			};

			for entry_y in fs::read_dir(entry_x.path())? {
				let entry_y = entry_y?;
				let mut filename = entry_y.file_name().to_string_lossy().to_string();

				let compression = TileCompression::from_filename(&mut filename);
				let Some((stem, extension)) = filename.rsplit_once('.') else {
					continue;
				};
				let Ok(format) = TileFormat::try_from_str(extension) else {
					continue;
				};
				let Ok(y) = stem.parse::<u32>() else {
					continue;
				};

				if let Some(known) = scan.format {
					ensure!(known == format, "found multiple tile formats in {dir:?}");
				}
				if let Some(known) = scan.compression {
					ensure!(known == compression, "found multiple tile compressions in {dir:?}");
				}
				scan.format = Some(format);
				scan.compression = Some(compression);

				scan.min_zoom = scan.min_zoom.min(level);
				scan.max_zoom = scan.max_zoom.max(level);
				scan.tile_map.insert(TileCoord::new(level, x, y)?, entry_y.path());
			}
		}
	}

	Ok(scan)
}

/// Restores descriptive fields from `metadata.json` if present. The file is
/// advisory; the tree itself stays authoritative for format, compression
/// and zoom range.
fn merge_descriptive_json(metadata: &mut ArchiveMetadata, path: &Path) {
	let Ok(text) = fs::read_to_string(path) else {
		return;
	};
	let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
		log::debug!("ignoring unparsable {path:?}");
		return;
	};

	let get = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_owned);
	metadata.name = get("name");
	metadata.attribution = get("attribution");
	metadata.description = get("description");

	if let Some(bounds) = value.get("bounds").and_then(|v| v.as_array()) {
		let values: Vec<f64> = bounds.iter().filter_map(|v| v.as_f64()).collect();
		if values.len() == 4 {
			metadata.bounds = Some([values[0], values[1], values[2], values[3]]);
		}
	}
}

#[async_trait]
impl ArchiveReader for DirectoryReader {
	fn container_name(&self) -> &str {
		"directory"
	}

	fn source_name(&self) -> &str {
		&self.name
	}

	fn metadata(&self) -> &ArchiveMetadata {
		&self.metadata
	}

	async fn get_tile(&self, coord: &TileCoord) -> Result<Option<Blob>> {
		log::trace!("get_tile {coord:?}");

		match &self.tile_map {
			Some(map) => match map.get(coord) {
				Some(path) => Ok(Some(Blob::from(fs::read(path)?))),
				None => Ok(None),
			},
			None => {
				let path = self
					.dir
					.join(coord.level.to_string())
					.join(coord.x.to_string())
					.join(format!("{}{}", coord.y, self.tile_extension()));
				match fs::read(&path) {
					Ok(bytes) => Ok(Some(Blob::from(bytes))),
					Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
					Err(err) => Err(err).with_context(|| format!("reading tile {path:?}")),
				}
			}
		}
	}

	async fn tile_count(&self) -> Result<u64> {
		match &self.tile_map {
			Some(map) => Ok(map.len() as u64),
			None => Ok(scan_tree(&self.dir)?.tile_map.len() as u64),
		}
	}

	async fn tile_batch(&self, offset: u64, limit: u64) -> Result<Vec<(TileCoord, Blob)>> {
		let scanned;
		let map = match &self.tile_map {
			Some(map) => map,
			None => {
				scanned = scan_tree(&self.dir)?.tile_map;
				&scanned
			}
		};

		let mut batch = Vec::new();
		for (coord, path) in map.iter().skip(offset as usize).take(limit as usize) {
			batch.push((*coord, Blob::from(fs::read(path)?)));
		}
		Ok(batch)
	}
}

impl Debug for DirectoryReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DirectoryReader")
			.field("name", &self.name)
			.field("live", &self.tile_map.is_none())
			.field("metadata", &self.metadata)
			.finish()
	}
}
