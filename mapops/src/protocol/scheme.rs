//! Scheme interception: the renderer registers a handler for a custom URL
//! scheme (`mapops://…`) and every tile fetch lands here as a direct
//! in-process call — no socket, no serialization, just bytes back.

use crate::service::{ServedTile, TileService};
use std::sync::Arc;

pub const DEFAULT_SCHEME: &str = "mapops";

pub struct SchemeProtocol {
	scheme: String,
	service: Arc<TileService>,
}

impl SchemeProtocol {
	pub fn new(service: Arc<TileService>) -> SchemeProtocol {
		SchemeProtocol {
			scheme: DEFAULT_SCHEME.to_owned(),
			service,
		}
	}

	pub fn with_scheme(mut self, scheme: &str) -> SchemeProtocol {
		self.scheme = scheme.to_owned();
		self
	}

	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	/// The URL template handed to the renderer's style definition.
	pub fn url_template(&self, basemap_id: &str, extension: &str) -> String {
		format!("{}://{basemap_id}/{{z}}/{{x}}/{{y}}{extension}", self.scheme)
	}

	/// Entry point for the renderer's protocol hook: the full intercepted
	/// URL in, the raw tile out. `None` means "no tile" — the renderer
	/// shows nothing for that square, it does not error.
	pub async fn handle(&self, url: &str) -> Option<ServedTile> {
		let prefix = format!("{}://", self.scheme);
		let path = url.strip_prefix(&prefix)?;
		self.service.get_tile_response(path).await
	}
}
