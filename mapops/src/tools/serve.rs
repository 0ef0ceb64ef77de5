//! The `serve` command: bring up the configured basemaps and serve them
//! over the loopback HTTP strategy until interrupted.

use crate::config::Config;
use crate::protocol::{HttpProtocol, ServingStrategy};
use crate::registry::BasemapRegistry;
use crate::service::TileService;
use anyhow::{Result, ensure};
use std::{path::Path, sync::Arc};

pub async fn run(config_path: &Path) -> Result<()> {
	let config = Config::from_path(config_path)?;
	let strategy = ServingStrategy::parse_str(config.server.strategy.as_deref().unwrap_or("http"))?;
	ensure!(
		strategy == ServingStrategy::Http,
		"the serve command drives the '{}' strategy only from an embedding host; use strategy 'http'",
		strategy.as_str()
	);

	let registry = Arc::new(BasemapRegistry::new(&config)?);
	let service = Arc::new(TileService::new(registry.clone()));

	let mut server = HttpProtocol::new(config.server.ip(), config.server.port(), service);
	server.start().await?;

	// serving starts immediately; basemaps come up behind it and the first
	// configured one becomes active once it is ready
	for basemap_id in registry.basemap_ids().to_vec() {
		let registry = registry.clone();
		let make_active = Some(&basemap_id) == registry.basemap_ids().first();
		tokio::spawn(async move {
			let result = if make_active {
				registry.switch_basemap(&basemap_id).await
			} else {
				registry.activate(&basemap_id).await
			};
			if let Err(err) = result {
				log::warn!("basemap '{basemap_id}' unavailable: {err:#}");
			}
		});
	}

	// the extension is ignored for addressing, so the template works for
	// every archive format
	for basemap in &config.basemaps {
		eprintln!("  {} -> {}", basemap.display_name(), server.url_template(&basemap.id, ""));
	}

	tokio::signal::ctrl_c().await?;
	server.stop().await;
	Ok(())
}
