//! Archive opening by declared kind.
//!
//! The archive format of each basemap is declared in configuration and
//! carried as a tagged [`ArchiveKind`]; nothing sniffs file contents to
//! decide which backend to use.

use crate::{ArchiveReader, DirectoryReader, MbtilesReader, PmtilesReader};
use anyhow::{Context, Result, bail};
use std::fmt::Display;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
	Mbtiles,
	Pmtiles,
	/// A previously extracted `<z>/<x>/<y>` tile tree.
	Directory,
}

impl ArchiveKind {
	pub fn parse_str(value: &str) -> Result<Self> {
		Ok(match value.to_lowercase().trim() {
			"mbtiles" => ArchiveKind::Mbtiles,
			"pmtiles" => ArchiveKind::Pmtiles,
			"directory" | "dir" => ArchiveKind::Directory,
			_ => bail!("unknown archive kind '{value}', expected mbtiles, pmtiles or directory"),
		})
	}

	pub fn as_str(&self) -> &str {
		match self {
			ArchiveKind::Mbtiles => "mbtiles",
			ArchiveKind::Pmtiles => "pmtiles",
			ArchiveKind::Directory => "directory",
		}
	}
}

impl Display for ArchiveKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Opens an archive with the backend the configuration declares.
pub async fn open_archive(kind: ArchiveKind, path: &Path) -> Result<Box<dyn ArchiveReader>> {
	let reader: Box<dyn ArchiveReader> = match kind {
		ArchiveKind::Mbtiles => Box::new(MbtilesReader::open_path(path)?),
		ArchiveKind::Pmtiles => Box::new(PmtilesReader::open_path(path).await?),
		ArchiveKind::Directory => Box::new(DirectoryReader::open_path(path)?),
	};
	log::debug!("opened {} archive '{}'", reader.container_name(), reader.source_name());
	Ok(reader)
}

/// Same as [`open_archive`] with a combined error context, used by the
/// registry where the basemap id is known.
pub async fn open_archive_for(kind: ArchiveKind, path: &Path, basemap_id: &str) -> Result<Box<dyn ArchiveReader>> {
	open_archive(kind, path)
		.await
		.with_context(|| format!("opening {kind} archive for basemap '{basemap_id}'"))
}
