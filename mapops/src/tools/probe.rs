//! The `probe` command: print what an archive declares about itself.

use anyhow::Result;
use mapops_container::{ArchiveKind, open_archive};
use std::path::Path;

pub async fn run(kind: &str, archive: &Path) -> Result<()> {
	let kind = ArchiveKind::parse_str(kind)?;
	let reader = open_archive(kind, archive).await?;
	let metadata = reader.metadata();

	println!("container:   {}", reader.container_name());
	println!("source:      {}", reader.source_name());
	println!("format:      {}", metadata.tile_format);
	println!("compression: {}", metadata.tile_compression);
	println!("zoom:        {} - {}", metadata.min_zoom, metadata.max_zoom);
	if let Some(bounds) = metadata.bounds {
		println!("bounds:      [{}, {}, {}, {}]", bounds[0], bounds[1], bounds[2], bounds[3]);
	}
	if let Some(name) = &metadata.name {
		println!("name:        {name}");
	}
	if let Some(attribution) = &metadata.attribution {
		println!("attribution: {attribution}");
	}
	println!("tiles:       {}", reader.tile_count().await?);
	Ok(())
}
