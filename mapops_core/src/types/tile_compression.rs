//! [`TileCompression`] names the transport compression a tile payload is
//! stored with inside an archive (independent of the tile format itself).

use anyhow::{Result, bail};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileCompression {
	Uncompressed,
	Gzip,
	Brotli,
}

impl TileCompression {
	pub fn as_str(&self) -> &str {
		match self {
			TileCompression::Uncompressed => "none",
			TileCompression::Gzip => "gzip",
			TileCompression::Brotli => "brotli",
		}
	}

	/// File extension appended after the format extension, e.g. `.gz` in
	/// `12/654/1583.mvt.gz`. Uncompressed tiles get none.
	pub fn extension(&self) -> &str {
		match self {
			TileCompression::Uncompressed => "",
			TileCompression::Gzip => ".gz",
			TileCompression::Brotli => ".br",
		}
	}

	/// Strips a recognized compression extension from `filename` and returns
	/// the compression it named.
	pub fn from_filename(filename: &mut String) -> TileCompression {
		if let Some(index) = filename.rfind('.') {
			let compression = match filename.get(index..).unwrap() {
				".gz" => TileCompression::Gzip,
				".br" => TileCompression::Brotli,
				_ => TileCompression::Uncompressed,
			};

			if compression != TileCompression::Uncompressed {
				filename.truncate(index);
			}
			return compression;
		}
		TileCompression::Uncompressed
	}

	pub fn parse_str(value: &str) -> Result<Self> {
		Ok(match value.to_lowercase().trim() {
			"br" | "brotli" => TileCompression::Brotli,
			"gz" | "gzip" => TileCompression::Gzip,
			"none" | "raw" => TileCompression::Uncompressed,
			_ => bail!("Unknown tile compression. Expected brotli, gzip or none"),
		})
	}
}

impl Display for TileCompression {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extensions() {
		assert_eq!(TileCompression::Uncompressed.extension(), "");
		assert_eq!(TileCompression::Gzip.extension(), ".gz");
		assert_eq!(TileCompression::Brotli.extension(), ".br");
	}

	#[test]
	fn from_filename() {
		let mut filename = String::from("3.mvt.gz");
		assert_eq!(TileCompression::from_filename(&mut filename), TileCompression::Gzip);
		assert_eq!(filename, "3.mvt");

		let mut filename = String::from("3.png");
		assert_eq!(
			TileCompression::from_filename(&mut filename),
			TileCompression::Uncompressed
		);
		assert_eq!(filename, "3.png");
	}

	#[test]
	fn parse() -> Result<()> {
		assert_eq!(TileCompression::parse_str("gzip")?, TileCompression::Gzip);
		assert_eq!(TileCompression::parse_str("BR")?, TileCompression::Brotli);
		assert_eq!(TileCompression::parse_str("none")?, TileCompression::Uncompressed);
		assert!(TileCompression::parse_str("zstd").is_err());
		Ok(())
	}
}
