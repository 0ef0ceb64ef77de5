//! The `extract` command: materialize an archive into a tile-file tree.

use anyhow::Result;
use mapops_container::{ArchiveKind, ExtractionPipeline, open_archive};
use mapops_core::progress::ProgressLog;
use std::path::Path;

pub async fn run(kind: &str, archive: &Path, output: &Path, basemap_id: &str) -> Result<()> {
	let kind = ArchiveKind::parse_str(kind)?;
	let reader = open_archive(kind, archive).await?;

	let pipeline = ExtractionPipeline::new(output);
	let sink = ProgressLog::new(&format!("extracting '{basemap_id}'"));
	let state = pipeline.extract(basemap_id, reader.as_ref(), &sink).await?;

	eprintln!(
		"extracted {} of {} tiles into {:?}",
		state.extracted_count,
		state.total_tiles,
		pipeline.output_dir(basemap_id)
	);
	Ok(())
}
