//! End-to-end test: configure two basemaps, bring them up through the
//! registry and fetch tiles over the loopback HTTP protocol.

use anyhow::Result;
use mapops::config::Config;
use mapops::protocol::HttpProtocol;
use mapops::registry::BasemapRegistry;
use mapops::service::TileService;
use r2d2_sqlite::rusqlite::Connection;
use std::{path::Path, sync::Arc};

fn fixture_mbtiles(path: &Path, tag: &str) -> Result<()> {
	let conn = Connection::open(path)?;
	conn.execute_batch(
		"CREATE TABLE metadata (name TEXT, value TEXT);
		 CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
		 INSERT INTO metadata VALUES ('format', 'png');
		 INSERT INTO metadata VALUES ('minzoom', '1');
		 INSERT INTO metadata VALUES ('maxzoom', '1');",
	)?;
	let mut stmt = conn.prepare("INSERT INTO tiles VALUES (1, ?1, ?2, ?3)")?;
	for (x, tms_row) in [(0u32, 0u32), (0, 1), (1, 0), (1, 1)] {
		let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
		bytes.extend_from_slice(format!("{tag}:{x}:{tms_row}").as_bytes());
		stmt.execute((x, tms_row, bytes))?;
	}
	Ok(())
}

#[tokio::test]
async fn serve_two_basemaps_over_http() -> Result<()> {
	let temp = assert_fs::TempDir::new()?;
	let topo = temp.path().join("topo.mbtiles");
	let satellite = temp.path().join("satellite.mbtiles");
	fixture_mbtiles(&topo, "topo")?;
	fixture_mbtiles(&satellite, "sat")?;

	let config = Config::from_string(&format!(
		r"
data_dir: {data_dir}
basemaps:
  - id: topo
    kind: mbtiles
    path: {topo}
  - id: satellite
    kind: mbtiles
    path: {satellite}
    extract: true
",
		data_dir = temp.path().display(),
		topo = topo.display(),
		satellite = satellite.display(),
	))?;

	let registry = Arc::new(BasemapRegistry::new(&config)?);
	let mut server = HttpProtocol::new("127.0.0.1", 0, Arc::new(TileService::new(registry.clone())));
	server.start().await?;
	let addr = server.local_addr().unwrap();

	// the server is up before any basemap is ready; requests simply miss
	assert_eq!(reqwest::get(format!("http://{addr}/status")).await?.text().await?, "ready!");
	assert_eq!(reqwest::get(format!("http://{addr}/topo/1/0/0.png")).await?.status(), 404);

	registry.switch_basemap("topo").await?;
	assert_eq!(registry.active_basemap().as_deref(), Some("topo"));

	let response = reqwest::get(format!("http://{addr}/topo/1/0/0.png")).await?;
	assert_eq!(response.status(), 200);
	assert_eq!(response.headers()["content-type"], "image/png");
	assert_eq!(response.headers()["access-control-allow-origin"], "*");
	let bytes = response.bytes().await?;
	assert!(bytes.starts_with(b"\x89PNG"));
	// XYZ y=0 is TMS row 1 at zoom 1
	assert!(bytes.ends_with(b"topo:0:1"));

	// switching: topo keeps serving until satellite (extract pipeline) is ready
	registry.switch_basemap("satellite").await?;
	assert_eq!(registry.active_basemap().as_deref(), Some("satellite"));
	assert_eq!(registry.resolve_reader("satellite").unwrap().container_name(), "directory");

	// both basemaps answer side by side; the extracted tree is byte-identical
	let sat_tile = reqwest::get(format!("http://{addr}/satellite/1/0/0.png")).await?.bytes().await?;
	assert!(sat_tile.ends_with(b"sat:0:1"));
	let topo_tile = reqwest::get(format!("http://{addr}/topo/1/0/0.png")).await?.bytes().await?;
	assert!(topo_tile.ends_with(b"topo:0:1"));

	// valid-but-absent stays 404 on both
	assert_eq!(
		reqwest::get(format!("http://{addr}/satellite/3/0/0.png")).await?.status(),
		404
	);

	server.stop().await;
	Ok(())
}
