//! The [`TileFormat`] enum names the payload formats this subsystem serves:
//! raster images (PNG, JPEG, WebP), Mapbox vector tiles and raw binary.
//! It carries the canonical file extension, the MIME type and a magic-byte
//! check used by probing and tests.

use anyhow::{Result, bail};
use std::fmt::{Display, Formatter};

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TileFormat {
	BIN,
	JPG,
	MVT,
	PNG,
	WEBP,
}

impl TileFormat {
	pub fn as_str(&self) -> &str {
		match self {
			TileFormat::BIN => "bin",
			TileFormat::JPG => "jpg",
			TileFormat::MVT => "mvt",
			TileFormat::PNG => "png",
			TileFormat::WEBP => "webp",
		}
	}

	/// Parses format names as they appear in MBTiles metadata and config
	/// files (case-insensitive, `pbf` is the MBTiles name for vector tiles).
	pub fn try_from_str(value: &str) -> Result<Self> {
		Ok(match value.to_lowercase().trim() {
			"bin" => TileFormat::BIN,
			"jpeg" | "jpg" => TileFormat::JPG,
			"pbf" | "mvt" => TileFormat::MVT,
			"png" => TileFormat::PNG,
			"webp" => TileFormat::WEBP,
			_ => bail!("Unknown tile format: '{}'", value),
		})
	}

	pub fn as_mime_str(&self) -> &'static str {
		match self {
			TileFormat::BIN => "application/octet-stream",
			TileFormat::JPG => "image/jpeg",
			TileFormat::MVT => "application/vnd.mapbox-vector-tile",
			TileFormat::PNG => "image/png",
			TileFormat::WEBP => "image/webp",
		}
	}

	/// Canonical file extension, with leading dot.
	pub fn as_extension(&self) -> &str {
		match self {
			TileFormat::BIN => ".bin",
			TileFormat::JPG => ".jpg",
			TileFormat::MVT => ".mvt",
			TileFormat::PNG => ".png",
			TileFormat::WEBP => ".webp",
		}
	}

	/// Guesses the format from the first bytes of a decoded tile payload.
	///
	/// Vector tiles have no magic number; anything unrecognized maps to
	/// `None`.
	pub fn from_magic_bytes(data: &[u8]) -> Option<TileFormat> {
		if data.starts_with(b"\x89PNG\r\n\x1a\n") {
			Some(TileFormat::PNG)
		} else if data.starts_with(b"\xff\xd8\xff") {
			Some(TileFormat::JPG)
		} else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
			Some(TileFormat::WEBP)
		} else {
			None
		}
	}

	/// Checks a decoded payload against this format's magic number. Formats
	/// without one (MVT, BIN) accept anything.
	pub fn magic_matches(&self, data: &[u8]) -> bool {
		match self {
			TileFormat::BIN | TileFormat::MVT => true,
			_ => TileFormat::from_magic_bytes(data) == Some(*self),
		}
	}
}

impl Display for TileFormat {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
