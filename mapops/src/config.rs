//! YAML configuration for the serve command and embedding hosts.
//!
//! ```yaml
//! data_dir: /var/lib/mapops
//! server:
//!   ip: 127.0.0.1
//!   port: 9876
//!   strategy: http
//! basemaps:
//!   - id: topo
//!     kind: pmtiles
//!     bundled: /opt/mapops/assets/topo.pmtiles
//!     fallback_url: https://tile.example.org/topo/{z}/{x}/{y}.png
//!   - id: satellite
//!     kind: mbtiles
//!     url: https://files.example.org/satellite.mbtiles
//!     min_size: 1048576
//!     extract: true
//! ```

use anyhow::{Context, Result, ensure};
use mapops_container::ArchiveKind;
use serde::Deserialize;
use std::{collections::HashSet, fs, path::{Path, PathBuf}};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Directory for acquired archives and extracted tile trees.
	pub data_dir: PathBuf,

	#[serde(default)]
	pub server: ServerConfig,

	#[serde(default)]
	pub basemaps: Vec<BasemapConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
	pub ip: Option<String>,
	pub port: Option<u16>,
	/// Serving strategy: `http` (default), `scheme` or `bridge`.
	pub strategy: Option<String>,
}

impl ServerConfig {
	pub fn ip(&self) -> &str {
		self.ip.as_deref().unwrap_or("127.0.0.1")
	}

	pub fn port(&self) -> u16 {
		self.port.unwrap_or(9876)
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BasemapConfig {
	pub id: String,

	#[serde(default)]
	pub display_name: Option<String>,

	/// Archive format, declared up front: `mbtiles`, `pmtiles` or
	/// `directory`. Never inferred from file contents.
	pub kind: String,

	/// Archive already on disk, used in place.
	#[serde(default)]
	pub path: Option<PathBuf>,

	/// Bundled asset copied into the data directory on first activation.
	#[serde(default)]
	pub bundled: Option<PathBuf>,

	/// Remote archive, downloaded with resume support.
	#[serde(default)]
	pub url: Option<String>,

	/// Smallest plausible archive size in bytes; smaller local copies are
	/// treated as corrupt and re-acquired.
	#[serde(default)]
	pub min_size: Option<u64>,

	/// Materialize tiles to individual files and serve from the tree.
	#[serde(default)]
	pub extract: bool,

	/// Online tile URL template used when acquisition or extraction keeps
	/// failing, so the slot never goes blank.
	#[serde(default)]
	pub fallback_url: Option<String>,
}

impl BasemapConfig {
	pub fn archive_kind(&self) -> Result<ArchiveKind> {
		ArchiveKind::parse_str(&self.kind).with_context(|| format!("basemap '{}'", self.id))
	}

	pub fn display_name(&self) -> &str {
		self.display_name.as_deref().unwrap_or(&self.id)
	}
}

impl Config {
	pub fn from_string(text: &str) -> Result<Self> {
		let config: Config = serde_yaml_ng::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).with_context(|| format!("reading config {path:?}"))?;
		Self::from_string(&text).with_context(|| format!("parsing config {path:?}"))
	}

	fn validate(&self) -> Result<()> {
		let mut seen = HashSet::new();
		for basemap in &self.basemaps {
			ensure!(!basemap.id.is_empty(), "basemap id must not be empty");
			ensure!(
				!basemap.id.contains('/') && !basemap.id.contains('.'),
				"basemap id '{}' must not contain '/' or '.'",
				basemap.id
			);
			ensure!(seen.insert(&basemap.id), "duplicate basemap id '{}'", basemap.id);
			basemap.archive_kind()?;
			ensure!(
				basemap.path.is_some() || basemap.bundled.is_some() || basemap.url.is_some(),
				"basemap '{}' needs one of: path, bundled, url",
				basemap.id
			);
		}
		Ok(())
	}

	pub fn basemap(&self, id: &str) -> Option<&BasemapConfig> {
		self.basemaps.iter().find(|b| b.id == id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const EXAMPLE: &str = r"
data_dir: /tmp/mapops-test
server:
  port: 51234
  strategy: http
basemaps:
  - id: topo
    kind: pmtiles
    bundled: /opt/assets/topo.pmtiles
    fallback_url: https://tile.example.org/topo/{z}/{x}/{y}.png
  - id: satellite
    kind: mbtiles
    url: https://files.example.org/satellite.mbtiles
    min_size: 1048576
    extract: true
";

	#[test]
	fn parse_example() -> Result<()> {
		let config = Config::from_string(EXAMPLE)?;
		assert_eq!(config.server.port(), 51234);
		assert_eq!(config.server.ip(), "127.0.0.1");
		assert_eq!(config.basemaps.len(), 2);

		let topo = config.basemap("topo").unwrap();
		assert_eq!(topo.archive_kind()?, ArchiveKind::Pmtiles);
		assert_eq!(topo.display_name(), "topo");
		assert!(!topo.extract);

		let satellite = config.basemap("satellite").unwrap();
		assert!(satellite.extract);
		assert_eq!(satellite.min_size, Some(1048576));
		Ok(())
	}

	#[test]
	fn rejects_duplicate_ids() {
		let text = r"
data_dir: /tmp/x
basemaps:
  - { id: topo, kind: mbtiles, path: /a.mbtiles }
  - { id: topo, kind: pmtiles, path: /b.pmtiles }
";
		assert!(Config::from_string(text).is_err());
	}

	#[test]
	fn rejects_sourceless_basemap() {
		let text = r"
data_dir: /tmp/x
basemaps:
  - { id: topo, kind: mbtiles }
";
		assert!(Config::from_string(text).is_err());
	}

	#[test]
	fn rejects_unknown_kind() {
		let text = r"
data_dir: /tmp/x
basemaps:
  - { id: topo, kind: tar, path: /a.tar }
";
		assert!(Config::from_string(text).is_err());
	}

	#[test]
	fn rejects_unsafe_id() {
		let text = r"
data_dir: /tmp/x
basemaps:
  - { id: '../topo', kind: mbtiles, path: /a.mbtiles }
";
		assert!(Config::from_string(text).is_err());
	}
}
