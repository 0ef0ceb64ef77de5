//! Read tiles and metadata from an MBTiles (SQLite) database.
//!
//! MBTiles stores rows in the TMS scheme (`tile_row = 0` at the south
//! edge); this reader converts from XYZ at the SQL boundary, so callers and
//! all other code stay in XYZ. The `format` metadata field determines tile
//! format and transport compression per the MBTiles 1.3 spec:
//!
//! - `format = "png"`  → PNG,  uncompressed
//! - `format = "jpg"`  → JPEG, uncompressed
//! - `format = "webp"` → WebP, uncompressed
//! - `format = "pbf"`  → MVT,  gzip
//!
//! The database is opened read-only through a small connection pool; no
//! write lock is ever taken, so concurrent lookups are safe.

use crate::ArchiveReader;
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use mapops_core::{ArchiveMetadata, Blob, TileCompression, TileCoord, TileFormat};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use r2d2_sqlite::rusqlite::{OpenFlags, OptionalExtension};
use std::path::Path;

pub struct MbtilesReader {
	name: String,
	pool: Pool<SqliteConnectionManager>,
	metadata: ArchiveMetadata,
}

impl MbtilesReader {
	/// Opens an MBTiles database and loads its metadata.
	///
	/// # Errors
	/// Returns an error if the file is missing, is not a SQLite database
	/// with `metadata` and `tiles` tables, or does not declare a tile
	/// format.
	pub fn open_path(path: &Path) -> Result<MbtilesReader> {
		log::debug!("open {path:?}");

		ensure!(path.exists(), "file {path:?} does not exist");
		ensure!(path.is_file(), "path {path:?} must be a file");

		let manager = SqliteConnectionManager::file(path).with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY);
		let pool = Pool::builder()
			.max_size(10)
			.build(manager)
			.with_context(|| format!("opening MBTiles at {path:?}"))?;

		let mut reader = MbtilesReader {
			name: path.to_string_lossy().to_string(),
			pool,
			metadata: ArchiveMetadata::new(TileFormat::BIN, TileCompression::Uncompressed),
		};

		reader.validate_schema()?;
		reader.load_metadata()?;

		Ok(reader)
	}

	fn validate_schema(&self) -> Result<()> {
		let conn = self.pool.get()?;
		for table in ["metadata", "tiles"] {
			let found: Option<String> = conn
				.query_row(
					"SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
					[table],
					|row| row.get(0),
				)
				.optional()
				.with_context(|| format!("'{}' is not a SQLite database", self.name))?;
			ensure!(
				found.is_some(),
				"'{}' is not an MBTiles file: missing '{table}' table",
				self.name
			);
		}
		Ok(())
	}

	/// Reads the `metadata` table once and derives format, compression,
	/// zoom range and descriptive fields. The zoom range falls back to a
	/// scan of the `tiles` table when the metadata omits it.
	fn load_metadata(&mut self) -> Result<()> {
		log::debug!("load metadata from '{}'", self.name);

		let conn = self.pool.get()?;
		let mut stmt = conn.prepare("SELECT name, value FROM metadata")?;
		let entries = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

		let mut tile_format: Option<TileFormat> = None;
		let mut min_zoom: Option<u8> = None;
		let mut max_zoom: Option<u8> = None;

		for entry in entries {
			let (key, value) = entry?;
			match key.as_str() {
				"format" => tile_format = Some(TileFormat::try_from_str(&value)?),
				"bounds" => self.metadata.set_bounds_str(&value)?,
				"minzoom" => min_zoom = Some(value.parse::<u8>()?),
				"maxzoom" => max_zoom = Some(value.parse::<u8>()?),
				"name" => self.metadata.name = Some(value),
				"attribution" => self.metadata.attribution = Some(value),
				"description" => self.metadata.description = Some(value),
				_ => {}
			}
		}

		let tile_format =
			tile_format.with_context(|| format!("mbtiles file '{}' does not specify a tile format", self.name))?;
		self.metadata.tile_format = tile_format;
		self.metadata.tile_compression = match tile_format {
			TileFormat::MVT => TileCompression::Gzip,
			_ => TileCompression::Uncompressed,
		};

		self.metadata.min_zoom = match min_zoom {
			Some(z) => z,
			None => conn.query_row("SELECT MIN(zoom_level) FROM tiles", [], |row| row.get::<_, u8>(0))?,
		};
		self.metadata.max_zoom = match max_zoom {
			Some(z) => z,
			None => conn.query_row("SELECT MAX(zoom_level) FROM tiles", [], |row| row.get::<_, u8>(0))?,
		};

		Ok(())
	}
}

#[async_trait]
impl ArchiveReader for MbtilesReader {
	fn container_name(&self) -> &str {
		"mbtiles"
	}

	fn source_name(&self) -> &str {
		&self.name
	}

	fn metadata(&self) -> &ArchiveMetadata {
		&self.metadata
	}

	/// Point lookup by XYZ coordinate; the row index is flipped to TMS here
	/// and nowhere else.
	async fn get_tile(&self, coord: &TileCoord) -> Result<Option<Blob>> {
		log::trace!("get_tile {coord:?}");

		if !self.metadata.covers_zoom(coord.level) {
			return Ok(None);
		}

		let tms = coord.as_flipped();
		let conn = self.pool.get()?;
		let mut stmt =
			conn.prepare_cached("SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3")?;

		let row = stmt
			.query_row([u32::from(tms.level), tms.x, tms.y], |row| row.get::<_, Vec<u8>>(0))
			.optional()?;

		Ok(row.map(Blob::from))
	}

	async fn tile_count(&self) -> Result<u64> {
		let conn = self.pool.get()?;
		Ok(conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get::<_, i64>(0))? as u64)
	}

	async fn tile_batch(&self, offset: u64, limit: u64) -> Result<Vec<(TileCoord, Blob)>> {
		log::trace!("tile_batch offset={offset} limit={limit}");

		let conn = self.pool.get()?;
		let mut stmt = conn.prepare_cached(
			"SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles \
			 ORDER BY zoom_level, tile_column, tile_row LIMIT ?1 OFFSET ?2",
		)?;

		let rows = stmt.query_map([limit as i64, offset as i64], |row| {
			Ok((
				row.get::<_, u8>(0)?,
				row.get::<_, u32>(1)?,
				row.get::<_, u32>(2)?,
				row.get::<_, Vec<u8>>(3)?,
			))
		})?;

		let mut batch = Vec::new();
		for row in rows {
			let (level, x, tms_row, data) = row?;
			let mut coord = TileCoord::new(level, x, tms_row)?;
			coord.flip_y();
			batch.push((coord, Blob::from(data)));
		}
		Ok(batch)
	}
}

impl std::fmt::Debug for MbtilesReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MbtilesReader")
			.field("name", &self.name)
			.field("metadata", &self.metadata)
			.finish()
	}
}
