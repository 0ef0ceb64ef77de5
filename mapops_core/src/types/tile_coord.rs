//! [`TileCoord`] is a tile address in the XYZ scheme used by map renderers:
//! `y = 0` at the north edge. MBTiles stores rows in the TMS scheme
//! (`y = 0` at the south edge); [`TileCoord::flip_y`] converts between the
//! two and is applied at exactly one boundary, the archive read, so a
//! coordinate is never flipped twice.

use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

#[derive(Eq, PartialEq, Clone, Hash, Copy)]
pub struct TileCoord {
	pub x: u32,
	pub y: u32,
	pub level: u8,
}

impl TileCoord {
	pub fn new(level: u8, x: u32, y: u32) -> Result<TileCoord> {
		ensure!(level <= 31, "level ({level}) must be <= 31");
		let max = 1u64 << level;
		ensure!(
			(x as u64) < max && (y as u64) < max,
			"tile [{x},{y}] outside level {level} bounds"
		);
		Ok(TileCoord { x, y, level })
	}

	/// Highest valid x/y index at this zoom level.
	pub fn max_index(&self) -> u32 {
		2u32.pow(self.level as u32) - 1
	}

	/// Converts between XYZ and TMS row numbering. The conversion is its own
	/// inverse.
	pub fn flip_y(&mut self) {
		self.y = self.max_index() - self.y;
	}

	pub fn as_flipped(&self) -> TileCoord {
		let mut coord = *self;
		coord.flip_y();
		coord
	}

	pub fn is_valid(&self) -> bool {
		if self.level > 31 {
			return false;
		}
		let max = 1u64 << self.level;
		(self.x as u64) < max && (self.y as u64) < max
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_fmt(format_args!("TileCoord({}, [{}, {}])", &self.level, &self.x, &self.y))
	}
}

impl PartialOrd for TileCoord {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for TileCoord {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self
			.level
			.cmp(&other.level)
			.then(self.y.cmp(&other.y))
			.then(self.x.cmp(&other.x))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_and_getters() -> Result<()> {
		let coord = TileCoord::new(5, 3, 4)?;
		assert_eq!(coord.x, 3);
		assert_eq!(coord.y, 4);
		assert_eq!(coord.level, 5);
		assert!(coord.is_valid());
		Ok(())
	}

	#[test]
	fn new_rejects_out_of_bounds() {
		assert!(TileCoord::new(32, 0, 0).is_err());
		assert!(TileCoord::new(3, 8, 0).is_err());
		assert!(TileCoord::new(3, 0, 8).is_err());
		assert!(TileCoord::new(0, 0, 0).is_ok());
	}

	#[test]
	fn flip_round_trip() -> Result<()> {
		for (level, y) in [(1u8, 0u32), (5, 12), (5, 19), (12, 1543), (20, 0)] {
			let coord = TileCoord::new(level, 0, y)?;
			let mut flipped = coord;
			flipped.flip_y();
			flipped.flip_y();
			assert_eq!(flipped, coord);
		}
		Ok(())
	}

	#[test]
	fn flip_matches_tms_formula() -> Result<()> {
		// 19 = 2^5 - 1 - 12
		let coord = TileCoord::new(5, 10, 12)?;
		assert_eq!(coord.as_flipped(), TileCoord::new(5, 10, 19)?);
		Ok(())
	}

	#[test]
	fn ordering() -> Result<()> {
		let c = TileCoord::new(2, 2, 2)?;
		assert!(TileCoord::new(1, 1, 1)? < c);
		assert!(TileCoord::new(2, 1, 2)? < c);
		assert!(TileCoord::new(2, 3, 2)? > c);
		assert!(TileCoord::new(2, 2, 3)? > c);
		assert_eq!(TileCoord::new(2, 2, 2)?, c);
		Ok(())
	}
}
