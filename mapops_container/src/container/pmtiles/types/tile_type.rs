//! Tile type codes as stored in the PMTiles v3 header.

use anyhow::{Result, bail};
use mapops_core::TileFormat;

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PMTilesType {
	Unknown = 0x0,
	MVT = 0x1,
	PNG = 0x2,
	JPEG = 0x3,
	WEBP = 0x4,
	AVIF = 0x5,
}

impl PMTilesType {
	pub fn from_u8(value: u8) -> Result<Self> {
		match value {
			0 => Ok(PMTilesType::Unknown),
			1 => Ok(PMTilesType::MVT),
			2 => Ok(PMTilesType::PNG),
			3 => Ok(PMTilesType::JPEG),
			4 => Ok(PMTilesType::WEBP),
			5 => Ok(PMTilesType::AVIF),
			_ => bail!("unknown value {value} for PMTiles tile type"),
		}
	}

	pub fn from_value(value: TileFormat) -> Self {
		match value {
			TileFormat::MVT => PMTilesType::MVT,
			TileFormat::PNG => PMTilesType::PNG,
			TileFormat::JPG => PMTilesType::JPEG,
			TileFormat::WEBP => PMTilesType::WEBP,
			TileFormat::BIN => PMTilesType::Unknown,
		}
	}

	pub fn as_value(&self) -> Result<TileFormat> {
		Ok(match self {
			PMTilesType::Unknown => TileFormat::BIN,
			PMTilesType::MVT => TileFormat::MVT,
			PMTilesType::PNG => TileFormat::PNG,
			PMTilesType::JPEG => TileFormat::JPG,
			PMTilesType::WEBP => TileFormat::WEBP,
			PMTilesType::AVIF => bail!("AVIF tiles are not supported"),
		})
	}
}
