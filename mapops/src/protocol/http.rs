//! Loopback HTTP tile server.
//!
//! Serves `GET /{basemap}/{z}/{x}/{y}.{ext}` from the shared
//! [`TileService`] plus a `/status` health endpoint. Valid-but-absent tiles
//! are 404, never 500, and every response carries permissive CORS headers —
//! the renderer usually runs under a different origin (a webview, a file://
//! page). Stored-compressed tiles are sent as-is with the matching
//! `Content-Encoding`.

use crate::service::{ServedTile, TileService};
use anyhow::{Context, Result};
use axum::{
	Router,
	body::Body,
	extract::{Path, State},
	http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE},
	response::Response,
	routing::get,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::oneshot::Sender;

pub struct HttpProtocol {
	ip: String,
	port: u16,
	service: Arc<TileService>,
	exit_signal: Option<Sender<()>>,
	local_addr: Option<SocketAddr>,
}

impl HttpProtocol {
	/// Port 0 binds an ephemeral port; see [`local_addr`](Self::local_addr).
	pub fn new(ip: &str, port: u16, service: Arc<TileService>) -> HttpProtocol {
		HttpProtocol {
			ip: ip.to_owned(),
			port,
			service,
			exit_signal: None,
			local_addr: None,
		}
	}

	pub async fn start(&mut self) -> Result<()> {
		if self.exit_signal.is_some() {
			self.stop().await;
		}

		log::info!("starting tile server");

		let router = Router::new()
			.route("/status", get(|| async { "ready!" }))
			.route("/{*path}", get(serve_tile))
			.with_state(self.service.clone());

		let addr = format!("{}:{}", self.ip, self.port);
		let listener = tokio::net::TcpListener::bind(&addr)
			.await
			.with_context(|| format!("binding {addr}"))?;
		self.local_addr = Some(listener.local_addr()?);
		log::info!("tile server listening on {}", self.local_addr.unwrap());

		let (tx, rx) = tokio::sync::oneshot::channel::<()>();
		tokio::spawn(async {
			axum::serve(listener, router.into_make_service())
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await
				.unwrap()
		});

		self.exit_signal = Some(tx);
		Ok(())
	}

	pub async fn stop(&mut self) {
		if let Some(tx) = self.exit_signal.take() {
			log::info!("stopping tile server");
			tx.send(()).ok();
		}
	}

	/// The bound address; only available after [`start`](Self::start).
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.local_addr
	}

	/// The URL template handed to the renderer's style definition.
	pub fn url_template(&self, basemap_id: &str, extension: &str) -> String {
		let addr = self
			.local_addr
			.map_or_else(|| format!("{}:{}", self.ip, self.port), |a| a.to_string());
		format!("http://{addr}/{basemap_id}/{{z}}/{{x}}/{{y}}{extension}")
	}
}

async fn serve_tile(Path(path): Path<String>, State(service): State<Arc<TileService>>) -> Response<Body> {
	match service.get_tile_response(&path).await {
		Some(tile) => ok_tile(tile),
		None => {
			log::debug!("not found: {path}");
			not_found()
		}
	}
}

fn ok_tile(tile: ServedTile) -> Response<Body> {
	let mut response = Response::builder()
		.status(200)
		.header(CONTENT_TYPE, tile.mime)
		.header(CACHE_CONTROL, "public, max-age=86400, no-transform")
		.header(ACCESS_CONTROL_ALLOW_ORIGIN, "*");

	if let Some(encoding) = tile.encoding {
		response = response.header(CONTENT_ENCODING, encoding);
	}

	response.body(Body::from(tile.blob.into_vec())).unwrap()
}

fn not_found() -> Response<Body> {
	Response::builder()
		.status(404)
		.header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
		.body(Body::from("Not Found"))
		.unwrap()
}
