//! The fixed 127-byte PMTiles v3 header.
//!
//! Field order and widths follow the published specification exactly; the
//! header is always the first read against an archive and validates the
//! magic bytes and version before anything else is touched.

use super::{PMTilesCompression, PMTilesType};
use anyhow::{Result, ensure};
use mapops_core::{Blob, ByteRange, io::ValueReaderSlice};

#[derive(Debug, PartialEq)]
pub struct HeaderV3 {
	pub root_dir: ByteRange,
	pub metadata: ByteRange,
	pub leaf_dirs: ByteRange,
	pub tile_data: ByteRange,
	pub addressed_tiles_count: u64,
	pub tile_entries_count: u64,
	pub tile_contents_count: u64,
	pub clustered: bool,
	pub internal_compression: PMTilesCompression,
	pub tile_compression: PMTilesCompression,
	pub tile_type: PMTilesType,
	pub min_zoom: u8,
	pub max_zoom: u8,
	pub min_lon_e7: i32,
	pub min_lat_e7: i32,
	pub max_lon_e7: i32,
	pub max_lat_e7: i32,
	pub center_zoom: u8,
	pub center_lon_e7: i32,
	pub center_lat_e7: i32,
}

impl HeaderV3 {
	pub fn len() -> u64 {
		127
	}

	/// Geographic bounds in WGS84 degrees.
	pub fn bounds(&self) -> [f64; 4] {
		[
			f64::from(self.min_lon_e7) / 1e7,
			f64::from(self.min_lat_e7) / 1e7,
			f64::from(self.max_lon_e7) / 1e7,
			f64::from(self.max_lat_e7) / 1e7,
		]
	}

	pub fn deserialize(blob: &Blob) -> Result<Self> {
		let buffer = blob.as_slice();

		ensure!(buffer.len() == 127, "pmtiles header must be 127 bytes");
		ensure!(&buffer[0..7] == b"PMTiles", "pmtiles magic number mismatch");
		ensure!(buffer[7] == 3, "pmtiles version must be 3");

		let mut reader = ValueReaderSlice::new_le(blob.as_slice());
		reader.set_position(8)?; // skip magic and version byte

		let header = Self {
			root_dir: ByteRange::new(reader.read_u64()?, reader.read_u64()?),
			metadata: ByteRange::new(reader.read_u64()?, reader.read_u64()?),
			leaf_dirs: ByteRange::new(reader.read_u64()?, reader.read_u64()?),
			tile_data: ByteRange::new(reader.read_u64()?, reader.read_u64()?),
			addressed_tiles_count: reader.read_u64()?,
			tile_entries_count: reader.read_u64()?,
			tile_contents_count: reader.read_u64()?,
			clustered: reader.read_u8()? == 1,
			internal_compression: PMTilesCompression::from_u8(reader.read_u8()?)?,
			tile_compression: PMTilesCompression::from_u8(reader.read_u8()?)?,
			tile_type: PMTilesType::from_u8(reader.read_u8()?)?,
			min_zoom: reader.read_u8()?,
			max_zoom: reader.read_u8()?,
			min_lon_e7: reader.read_i32()?,
			min_lat_e7: reader.read_i32()?,
			max_lon_e7: reader.read_i32()?,
			max_lat_e7: reader.read_i32()?,
			center_zoom: reader.read_u8()?,
			center_lon_e7: reader.read_i32()?,
			center_lat_e7: reader.read_i32()?,
		};

		Ok(header)
	}

	pub fn serialize(&self) -> Blob {
		let mut buffer = Vec::with_capacity(127);
		buffer.extend_from_slice(b"PMTiles");
		buffer.push(3); // version

		let write_u64 = |buffer: &mut Vec<u8>, value: u64| buffer.extend_from_slice(&value.to_le_bytes());
		write_u64(&mut buffer, self.root_dir.offset);
		write_u64(&mut buffer, self.root_dir.length);
		write_u64(&mut buffer, self.metadata.offset);
		write_u64(&mut buffer, self.metadata.length);
		write_u64(&mut buffer, self.leaf_dirs.offset);
		write_u64(&mut buffer, self.leaf_dirs.length);
		write_u64(&mut buffer, self.tile_data.offset);
		write_u64(&mut buffer, self.tile_data.length);
		write_u64(&mut buffer, self.addressed_tiles_count);
		write_u64(&mut buffer, self.tile_entries_count);
		write_u64(&mut buffer, self.tile_contents_count);

		buffer.push(u8::from(self.clustered));
		buffer.push(self.internal_compression as u8);
		buffer.push(self.tile_compression as u8);
		buffer.push(self.tile_type as u8);
		buffer.push(self.min_zoom);
		buffer.push(self.max_zoom);
		buffer.extend_from_slice(&self.min_lon_e7.to_le_bytes());
		buffer.extend_from_slice(&self.min_lat_e7.to_le_bytes());
		buffer.extend_from_slice(&self.max_lon_e7.to_le_bytes());
		buffer.extend_from_slice(&self.max_lat_e7.to_le_bytes());
		buffer.push(self.center_zoom);
		buffer.extend_from_slice(&self.center_lon_e7.to_le_bytes());
		buffer.extend_from_slice(&self.center_lat_e7.to_le_bytes());

		Blob::from(buffer)
	}
}
