//! PMTiles v3 directory entries.
//!
//! A directory is a varint-encoded, column-ordered list of entries sorted by
//! tile id: first the entry count, then tile-id deltas, then run lengths,
//! then byte lengths, then offsets (0 means "contiguous with the previous
//! entry", anything else is the real offset plus one). An entry with
//! `run_length == 0` points at a leaf sub-directory instead of tile data;
//! an entry with `run_length > 1` covers that many consecutive tile ids
//! with the same bytes.

use anyhow::{Result, bail};
use mapops_core::{
	Blob, ByteRange,
	io::{ValueReaderSlice, write_varint},
};
use std::{cmp::Ordering, slice::Iter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryV3 {
	pub tile_id: u64,
	pub range: ByteRange,
	pub run_length: u32,
}

impl EntryV3 {
	pub fn new(tile_id: u64, range: ByteRange, run_length: u32) -> Self {
		Self {
			tile_id,
			range,
			run_length,
		}
	}

	/// True if this entry points at a leaf sub-directory rather than tiles.
	pub fn is_leaf_dir(&self) -> bool {
		self.run_length == 0
	}
}

#[derive(Debug, Default, PartialEq)]
pub struct EntriesV3 {
	entries: Vec<EntryV3>,
}

impl EntriesV3 {
	pub fn new() -> Self {
		Self { entries: Vec::new() }
	}

	pub fn from_blob(data: &Blob) -> Result<Self> {
		let mut reader = ValueReaderSlice::new_le(data.as_slice());

		let num_entries = reader.read_varint()? as usize;
		if num_entries > 10_000_000_000 {
			bail!("PMTiles directory claims more than 10 billion entries");
		}

		let mut entries: Vec<EntryV3> = Vec::with_capacity(num_entries);
		let mut last_id: u64 = 0;
		for _ in 0..num_entries {
			last_id += reader.read_varint()?;
			entries.push(EntryV3::new(last_id, ByteRange::empty(), 0));
		}

		for entry in &mut entries {
			entry.run_length = reader.read_varint()? as u32;
		}

		for entry in &mut entries {
			entry.range.length = reader.read_varint()?;
		}

		for i in 0..num_entries {
			let value = reader.read_varint()?;
			if value == 0 {
				if i == 0 {
					bail!("invalid offset in first PMTiles directory entry");
				}
				entries[i].range.offset = entries[i - 1].range.offset + entries[i - 1].range.length;
			} else {
				entries[i].range.offset = value - 1;
			}
		}

		Ok(EntriesV3 { entries })
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn push(&mut self, entry: EntryV3) {
		self.entries.push(entry);
	}

	pub fn iter(&self) -> Iter<'_, EntryV3> {
		self.entries.iter()
	}

	/// Binary search by tile id, honoring run lengths: an entry covers
	/// `[tile_id, tile_id + run_length)`, and a leaf-dir entry covers
	/// everything up to the next entry.
	pub fn find_tile(&self, tile_id: u64) -> Option<EntryV3> {
		let mut m: i64 = 0;
		let mut n: i64 = self.entries.len() as i64 - 1;

		while m <= n {
			let k = (n + m) >> 1;
			let entry_id = self.entries[k as usize].tile_id;
			match tile_id.cmp(&entry_id) {
				Ordering::Greater => m = k + 1,
				Ordering::Less => n = k - 1,
				Ordering::Equal => return Some(self.entries[k as usize]),
			}
		}

		// at this point, m > n
		if n >= 0 {
			let entry = self.entries[n as usize];
			if entry.run_length == 0 {
				return Some(entry);
			}
			if tile_id - entry.tile_id < u64::from(entry.run_length) {
				return Some(entry);
			}
		}

		None
	}

	/// Serializes the directory. Entries must already be sorted by tile id.
	pub fn serialize(&self) -> Blob {
		let mut buffer: Vec<u8> = Vec::new();
		let entries = &self.entries;

		write_varint(&mut buffer, entries.len() as u64);

		let mut last_id: u64 = 0;
		for entry in entries {
			write_varint(&mut buffer, entry.tile_id - last_id);
			last_id = entry.tile_id;
		}

		for entry in entries {
			write_varint(&mut buffer, u64::from(entry.run_length));
		}

		for entry in entries {
			write_varint(&mut buffer, entry.range.length);
		}

		for i in 0..entries.len() {
			let offset = if i > 0 && entries[i].range.offset == entries[i - 1].range.offset + entries[i - 1].range.length {
				0
			} else {
				entries[i].range.offset + 1 // add 1 to not conflict with 0
			};
			write_varint(&mut buffer, offset);
		}

		Blob::from(buffer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_entries() -> EntriesV3 {
		let mut entries = EntriesV3::new();
		entries.push(EntryV3::new(1, ByteRange::new(100, 100), 1));
		entries.push(EntryV3::new(2, ByteRange::new(200, 100), 3));
		entries.push(EntryV3::new(10, ByteRange::new(300, 50), 0));
		entries
	}

	#[test]
	fn serialization_round_trip() -> Result<()> {
		let entries = sample_entries();
		let blob = entries.serialize();
		assert_eq!(EntriesV3::from_blob(&blob)?, entries);
		Ok(())
	}

	#[test]
	fn contiguous_offsets_round_trip() -> Result<()> {
		let mut entries = EntriesV3::new();
		for i in 0..10u64 {
			entries.push(EntryV3::new(i, ByteRange::new(i * 100, 100), 1));
		}
		let blob = entries.serialize();
		assert_eq!(EntriesV3::from_blob(&blob)?, entries);
		Ok(())
	}

	#[test]
	fn find_exact_and_run_coverage() {
		let entries = sample_entries();

		assert_eq!(entries.find_tile(1).unwrap().tile_id, 1);
		// id 4 is covered by the run starting at id 2 (run_length 3)
		assert_eq!(entries.find_tile(4).unwrap().tile_id, 2);
		// id 5 is past the run but before the leaf entry at 10
		assert!(entries.find_tile(5).is_none());
		// ids at or after a leaf-dir entry resolve to that leaf
		let leaf = entries.find_tile(15).unwrap();
		assert_eq!(leaf.tile_id, 10);
		assert!(leaf.is_leaf_dir());
	}

	#[test]
	fn find_before_first() {
		let entries = sample_entries();
		assert!(entries.find_tile(0).is_none());
	}

	#[test]
	fn empty_directory() -> Result<()> {
		let entries = EntriesV3::new();
		let blob = entries.serialize();
		let parsed = EntriesV3::from_blob(&blob)?;
		assert!(parsed.is_empty());
		assert!(parsed.find_tile(0).is_none());
		Ok(())
	}

	#[test]
	fn rejects_absurd_entry_count() {
		let mut buffer = Vec::new();
		write_varint(&mut buffer, 10_000_000_001);
		assert!(EntriesV3::from_blob(&Blob::from(buffer)).is_err());
	}

	#[test]
	fn large_directory_lookup() {
		let mut entries = EntriesV3::new();
		for i in 0..100_000u64 {
			entries.push(EntryV3::new(i, ByteRange::new(i * 10, 10), 1));
		}
		assert!(entries.find_tile(99_999).is_some());
		assert!(entries.find_tile(100_000).is_none());
	}
}
