//! Materialize an archive into a flat tile-file tree.
//!
//! The pipeline walks an [`ArchiveReader`] end-to-end in bounded batches and
//! writes every tile to
//! ```text
//! <root>/<basemap_id>/<z>/<x>/<y>.<format>[.<compression>]
//! ```
//! A sentinel marker file (`.complete`) written only after a fully
//! successful run makes extraction resumable and idempotent:
//!
//! - marker present → the run is skipped entirely;
//! - marker absent → the run starts from scratch, overwriting any partial
//!   files a crashed run left behind (files are never deleted mid-run, and
//!   the source archive is never modified).
//!
//! Serving may read from the partially extracted tree while a run is in
//! flight; a not-yet-extracted tile is simply a miss.

use crate::ArchiveReader;
use anyhow::{Context, Result};
use mapops_core::progress::ProgressSink;
use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
};

/// Sentinel file marking a fully extracted basemap directory.
pub const COMPLETE_MARKER: &str = ".complete";

/// Tiles fetched per batch; bounds resident tile data, not correctness.
const DEFAULT_BATCH_SIZE: u64 = 500;

/// Progress snapshot of one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionState {
	pub basemap_id: String,
	pub total_tiles: u64,
	pub extracted_count: u64,
	pub completed: bool,
	pub last_error: Option<String>,
}

pub struct ExtractionPipeline {
	root: PathBuf,
	batch_size: u64,
}

impl ExtractionPipeline {
	pub fn new(root: &Path) -> ExtractionPipeline {
		ExtractionPipeline {
			root: root.to_path_buf(),
			batch_size: DEFAULT_BATCH_SIZE,
		}
	}

	pub fn with_batch_size(mut self, batch_size: u64) -> ExtractionPipeline {
		self.batch_size = batch_size.max(1);
		self
	}

	pub fn output_dir(&self, basemap_id: &str) -> PathBuf {
		self.root.join(basemap_id)
	}

	/// True if a previous run finished and left the marker.
	pub fn is_complete(&self, basemap_id: &str) -> bool {
		self.output_dir(basemap_id).join(COMPLETE_MARKER).exists()
	}

	/// Creates the output directory and writes `metadata.json`, the two
	/// things a live tree reader needs before it can serve the partial tree
	/// while extraction is still running. Idempotent; [`extract`] calls it
	/// too.
	///
	/// [`extract`]: Self::extract
	pub fn prepare(&self, basemap_id: &str, reader: &dyn ArchiveReader) -> Result<()> {
		let out_dir = self.output_dir(basemap_id);
		fs::create_dir_all(&out_dir).with_context(|| format!("creating {out_dir:?}"))?;
		fs::write(out_dir.join("metadata.json"), reader.metadata().as_json())?;
		Ok(())
	}

	/// Runs the extraction. Reports `extracted/total` to `sink` after every
	/// batch. Returns early with a completed state if the marker exists.
	///
	/// # Errors
	/// Any IO or archive error aborts the run *before* the marker is
	/// written, so the next attempt restarts cleanly.
	pub async fn extract(
		&self,
		basemap_id: &str,
		reader: &dyn ArchiveReader,
		sink: &dyn ProgressSink,
	) -> Result<ExtractionState> {
		let out_dir = self.output_dir(basemap_id);

		if self.is_complete(basemap_id) {
			log::debug!("basemap '{basemap_id}' already extracted, skipping");
			let total = reader.tile_count().await?;
			sink.finish(total);
			return Ok(ExtractionState {
				basemap_id: basemap_id.to_owned(),
				total_tiles: total,
				extracted_count: total,
				completed: true,
				last_error: None,
			});
		}

		log::info!("extracting basemap '{basemap_id}' from '{}'", reader.source_name());

		let total = reader.tile_count().await?;
		let metadata = reader.metadata();
		let extension = format!(
			"{}{}",
			metadata.tile_format.as_extension(),
			metadata.tile_compression.extension()
		);

		self.prepare(basemap_id, reader)?;

		// avoids one existence check per tile
		let mut known_dirs: HashSet<PathBuf> = HashSet::new();
		let mut extracted: u64 = 0;

		loop {
			let batch = reader.tile_batch(extracted, self.batch_size).await?;
			if batch.is_empty() {
				break;
			}

			for (coord, blob) in &batch {
				let dir = out_dir.join(coord.level.to_string()).join(coord.x.to_string());
				if !known_dirs.contains(&dir) {
					fs::create_dir_all(&dir).with_context(|| format!("creating {dir:?}"))?;
					known_dirs.insert(dir.clone());
				}

				let path = dir.join(format!("{}{extension}", coord.y));
				fs::write(&path, blob.as_slice()).with_context(|| format!("writing tile {path:?}"))?;
			}

			extracted += batch.len() as u64;
			sink.report(extracted, total);
			log::debug!("basemap '{basemap_id}': extracted {extracted}/{total}");
		}

		fs::write(out_dir.join(COMPLETE_MARKER), b"")?;
		sink.finish(total);
		log::info!("basemap '{basemap_id}': extraction complete ({extracted} tiles)");

		Ok(ExtractionState {
			basemap_id: basemap_id.to_owned(),
			total_tiles: total,
			extracted_count: extracted,
			completed: true,
			last_error: None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{DirectoryReader, MockArchiveReader};
	use mapops_core::TileCoord;
	use mapops_core::progress::{ProgressDrain, ProgressFn};
	use std::sync::Mutex;

	#[tokio::test]
	async fn extracts_and_reports_batches() -> Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let reader = MockArchiveReader::new_mock(2); // 21 tiles
		let pipeline = ExtractionPipeline::new(temp.path()).with_batch_size(8);

		let reports = Mutex::new(Vec::new());
		let sink = ProgressFn(|done, total| reports.lock().unwrap().push((done, total)));

		let state = pipeline.extract("topo", &reader, &sink).await?;
		assert!(state.completed);
		assert_eq!(state.total_tiles, 21);
		assert_eq!(state.extracted_count, 21);
		assert_eq!(*reports.lock().unwrap(), vec![(8, 21), (16, 21), (21, 21)]);

		// the tree is immediately servable
		let out = DirectoryReader::open_path(&pipeline.output_dir("topo"))?;
		let tile = out.get_tile(&TileCoord::new(2, 3, 1)?).await?.unwrap();
		assert!(tile.as_slice().ends_with(b"2/3/1"));
		assert!(pipeline.is_complete("topo"));
		Ok(())
	}

	#[tokio::test]
	async fn second_run_is_a_noop() -> Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let reader = MockArchiveReader::new_mock(1);
		let pipeline = ExtractionPipeline::new(temp.path());

		pipeline.extract("topo", &reader, &ProgressDrain).await?;

		let tile_path = pipeline.output_dir("topo").join("1").join("0").join("0.png");
		let mtime_before = fs::metadata(&tile_path)?.modified()?;

		let state = pipeline.extract("topo", &reader, &ProgressDrain).await?;
		assert!(state.completed);
		assert_eq!(fs::metadata(&tile_path)?.modified()?, mtime_before);
		Ok(())
	}

	#[tokio::test]
	async fn partial_run_without_marker_restarts_and_completes() -> Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let reader = MockArchiveReader::new_mock(1);
		let pipeline = ExtractionPipeline::new(temp.path());

		// simulate a crashed run: some tiles on disk, no marker
		let stale = pipeline.output_dir("topo").join("0").join("0");
		fs::create_dir_all(&stale)?;
		fs::write(stale.join("0.png"), b"stale bytes")?;
		assert!(!pipeline.is_complete("topo"));

		let state = pipeline.extract("topo", &reader, &ProgressDrain).await?;
		assert!(state.completed);
		assert!(pipeline.is_complete("topo"));

		// the stale file was overwritten, matching a clean single pass
		let bytes = fs::read(stale.join("0.png"))?;
		let expected = reader.get_tile(&TileCoord::new(0, 0, 0)?).await?.unwrap();
		assert_eq!(bytes, expected.as_slice().to_vec());
		Ok(())
	}

	#[tokio::test]
	async fn compression_extension_in_filenames() -> Result<()> {
		use mapops_core::{Blob, TileCompression, TileFormat};

		let temp = assert_fs::TempDir::new()?;
		let reader = MockArchiveReader::from_tiles(
			TileFormat::MVT,
			TileCompression::Gzip,
			vec![(TileCoord::new(3, 1, 2)?, Blob::from("gzip bytes"))],
		);
		let pipeline = ExtractionPipeline::new(temp.path());
		pipeline.extract("vector", &reader, &ProgressDrain).await?;

		let path = pipeline.output_dir("vector").join("3").join("1").join("2.mvt.gz");
		assert!(path.exists());
		Ok(())
	}
}
