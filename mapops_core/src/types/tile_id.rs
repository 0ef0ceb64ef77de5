//! Conversion between tile coordinates and PMTiles v3 tile ids.
//!
//! A tile id is the cumulative number of tiles on all lower zoom levels plus
//! the Hilbert-curve index of `(x, y)` within the tile's own level. The
//! encoding must match the published PMTiles specification bit for bit:
//! a deviation does not fail loudly, it silently misses every lookup.

use super::TileCoord;
use anyhow::{Result, bail};

pub trait TileId {
	fn to_tile_id(&self) -> Result<u64>;
	fn from_tile_id(id: u64) -> Result<Self>
	where
		Self: Sized;
}

impl TileId for TileCoord {
	fn to_tile_id(&self) -> Result<u64> {
		coord_to_id(self.x, self.y, self.level)
	}

	fn from_tile_id(id: u64) -> Result<Self> {
		id_to_coord(id)
	}
}

fn coord_to_id(x: u32, y: u32, level: u8) -> Result<u64> {
	if level >= 32 {
		bail!("tile zoom exceeds 64-bit limit");
	}

	let n = 1u32 << level;
	if x >= n || y >= n {
		bail!("tile x/y outside zoom level bounds");
	}

	// tiles on all levels below this one
	let mut acc: i64 = 0;
	for t_z in 0..(level as i64) {
		acc += 1i64 << (t_z * 2);
	}

	let mut tx: i64 = x as i64;
	let mut ty: i64 = y as i64;
	let mut d: i64 = 0;
	let mut s: i64 = n as i64 / 2;
	while s > 0 {
		let rx: u8 = u8::from((tx & s) > 0);
		let ry: u8 = u8::from((ty & s) > 0);
		d += s * s * ((3 * rx) ^ ry) as i64;
		rotate(s, &mut tx, &mut ty, rx, ry);
		s /= 2;
	}

	Ok((acc + d) as u64)
}

fn rotate(s: i64, tx: &mut i64, ty: &mut i64, rx: u8, ry: u8) {
	if ry == 0 {
		if rx == 1 {
			*tx = s - 1 - *tx;
			*ty = s - 1 - *ty;
		}
		std::mem::swap(tx, ty);
	}
}

fn id_to_coord(id: u64) -> Result<TileCoord> {
	let mut acc = 0u64;
	for t_z in 0..32u8 {
		let num_tiles = (1u64 << t_z) * (1u64 << t_z);
		if acc + num_tiles > id {
			let n = 1i64 << t_z;
			let mut t = id - acc;
			let mut tx: i64 = 0;
			let mut ty: i64 = 0;

			let mut s: i64 = 1;
			while s < n {
				let rx = ((t / 2) & 1) as u8;
				let ry = ((t ^ u64::from(rx)) & 1) as u8;
				rotate(s, &mut tx, &mut ty, rx, ry);
				if rx == 1 {
					tx += s;
				}
				if ry == 1 {
					ty += s;
				}
				t /= 4;
				s *= 2;
			}

			return TileCoord::new(t_z, tx as u32, ty as u32);
		}
		acc += num_tiles;
	}
	bail!("tile id exceeds 64-bit limit")
}
