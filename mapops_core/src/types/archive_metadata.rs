//! [`ArchiveMetadata`] is the parsed-once view of an archive's `metadata`
//! table (MBTiles) or header + JSON blob (PMTiles): what format the tiles
//! are in, how they are compressed, the zoom range the archive declares and
//! a few descriptive fields surfaced to the UI.

use super::{TileCompression, TileFormat};
use anyhow::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMetadata {
	pub name: Option<String>,
	pub attribution: Option<String>,
	pub description: Option<String>,
	pub tile_format: TileFormat,
	pub tile_compression: TileCompression,
	pub min_zoom: u8,
	pub max_zoom: u8,
	/// `[min_lon, min_lat, max_lon, max_lat]` in WGS84 degrees.
	pub bounds: Option<[f64; 4]>,
}

impl ArchiveMetadata {
	pub fn new(tile_format: TileFormat, tile_compression: TileCompression) -> Self {
		Self {
			name: None,
			attribution: None,
			description: None,
			tile_format,
			tile_compression,
			min_zoom: 0,
			max_zoom: 31,
			bounds: None,
		}
	}

	/// True if the zoom level lies inside the declared range. Lookups outside
	/// it can be answered with "no tile" without touching the archive.
	pub fn covers_zoom(&self, level: u8) -> bool {
		level >= self.min_zoom && level <= self.max_zoom
	}

	/// Parses a `bounds` value as it appears in MBTiles metadata:
	/// `"minlon,minlat,maxlon,maxlat"`.
	pub fn set_bounds_str(&mut self, value: &str) -> Result<()> {
		let values = value
			.split(',')
			.map(|s| Ok(s.trim().parse::<f64>()?))
			.collect::<Result<Vec<f64>>>()?;
		anyhow::ensure!(values.len() == 4, "bounds must have 4 values, got {}", values.len());
		self.bounds = Some([values[0], values[1], values[2], values[3]]);
		Ok(())
	}

	/// Serializes the fields the extracted-tree reader needs to restore.
	pub fn as_json(&self) -> String {
		let mut parts = vec![
			format!("\"format\":\"{}\"", self.tile_format.as_str()),
			format!("\"compression\":\"{}\"", self.tile_compression.as_str()),
			format!("\"minzoom\":{}", self.min_zoom),
			format!("\"maxzoom\":{}", self.max_zoom),
		];
		if let Some(name) = &self.name {
			parts.push(format!("\"name\":\"{}\"", escape_json(name)));
		}
		if let Some(attribution) = &self.attribution {
			parts.push(format!("\"attribution\":\"{}\"", escape_json(attribution)));
		}
		if let Some(description) = &self.description {
			parts.push(format!("\"description\":\"{}\"", escape_json(description)));
		}
		if let Some(bounds) = &self.bounds {
			parts.push(format!(
				"\"bounds\":[{},{},{},{}]",
				bounds[0], bounds[1], bounds[2], bounds[3]
			));
		}
		format!("{{{}}}", parts.join(","))
	}
}

fn escape_json(value: &str) -> String {
	value.replace('\\', "\\\\").replace('"', "\\\"")
}
