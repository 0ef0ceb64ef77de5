//! Message-passing bridge for sandboxed renderers.
//!
//! Some webview sandboxes allow neither custom URL schemes nor sockets;
//! tile requests then travel as messages. Each request carries a
//! monotonically increasing correlation id; the host answers asynchronously
//! with the same id. A request the host never answers resolves to "tile
//! unavailable" after a bounded wait instead of hanging the renderer's tile
//! scheduler — timeouts are expected under load and logged at DEBUG only.
//! Cancellation is implicit: an abandoned request is dropped from the
//! pending map and a late host answer falls on the floor.

use crate::service::TileService;
use dashmap::DashMap;
use mapops_core::{Blob, TileCoord};
use std::{
	sync::Arc,
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};
use tokio::sync::{mpsc, oneshot};

/// Reference default; chosen so a stalled host degrades to empty tiles
/// before the renderer's own fetch queue backs up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Renderer → host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
	pub id: u64,
	pub basemap_id: String,
	pub coord: TileCoord,
}

/// Host → renderer, tagged with the request's correlation id.
#[derive(Debug, Clone)]
pub struct TileResponse {
	pub id: u64,
	pub data: Option<Blob>,
}

pub struct BridgeProtocol {
	timeout: Duration,
	next_id: AtomicU64,
	pending: DashMap<u64, oneshot::Sender<Option<Blob>>>,
	request_tx: mpsc::UnboundedSender<TileRequest>,
	request_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<TileRequest>>>,
}

impl BridgeProtocol {
	pub fn new() -> Arc<BridgeProtocol> {
		Self::with_timeout(DEFAULT_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Arc<BridgeProtocol> {
		let (request_tx, request_rx) = mpsc::unbounded_channel();
		Arc::new(BridgeProtocol {
			timeout,
			next_id: AtomicU64::new(1),
			pending: DashMap::new(),
			request_tx,
			request_rx: parking_lot::Mutex::new(Some(request_rx)),
		})
	}

	/// Renderer half: requests a tile and waits for the host's answer.
	/// Resolves to `None` — "tile unavailable" — if the host does not
	/// answer within the configured wait.
	pub async fn request_tile(&self, basemap_id: &str, coord: &TileCoord) -> Option<Blob> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = oneshot::channel();
		self.pending.insert(id, tx);

		let request = TileRequest {
			id,
			basemap_id: basemap_id.to_owned(),
			coord: *coord,
		};
		if self.request_tx.send(request).is_err() {
			self.pending.remove(&id);
			return None;
		}

		match tokio::time::timeout(self.timeout, rx).await {
			Ok(Ok(data)) => data,
			_ => {
				// expected under load; the host-side lookup is not cancelled
				self.pending.remove(&id);
				log::debug!("bridge request {id} timed out after {:?}", self.timeout);
				None
			}
		}
	}

	/// Host half: the stream of requests to answer. Can be taken once.
	pub fn take_requests(&self) -> Option<mpsc::UnboundedReceiver<TileRequest>> {
		self.request_rx.lock().take()
	}

	/// Host half: delivers an answer. An id nobody is waiting for anymore
	/// (timed out, renderer gone) is dropped silently.
	pub fn deliver(&self, response: TileResponse) {
		if let Some((_, tx)) = self.pending.remove(&response.id) {
			tx.send(response.data).ok();
		} else {
			log::debug!("dropping late bridge response {}", response.id);
		}
	}

	/// Wires the host half to a [`TileService`]: every incoming request is
	/// answered from the service on its own task, so one slow archive read
	/// does not stall the queue.
	pub fn spawn_host(self: &Arc<Self>, service: Arc<TileService>) {
		let mut requests = self.take_requests().expect("bridge host already attached");
		let bridge = self.clone();

		tokio::spawn(async move {
			while let Some(request) = requests.recv().await {
				let bridge = bridge.clone();
				let service = service.clone();
				tokio::spawn(async move {
					let data = service.get_tile(&request.basemap_id, &request.coord).await;
					bridge.deliver(TileResponse { id: request.id, data });
				});
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::BasemapRegistry;
	use crate::registry::tests::{fixture_mbtiles, mbtiles_basemap, test_config};
	use anyhow::Result;

	#[tokio::test]
	async fn answers_through_the_host() -> Result<()> {
		let temp = assert_fs::TempDir::new()?;
		let archive = temp.path().join("topo.mbtiles");
		fixture_mbtiles(&archive)?;

		let config = test_config(temp.path(), vec![mbtiles_basemap("topo", &archive)]);
		let registry = Arc::new(BasemapRegistry::new(&config)?);
		registry.activate("topo").await?;

		let bridge = BridgeProtocol::new();
		bridge.spawn_host(Arc::new(TileService::new(registry)));

		let tile = bridge.request_tile("topo", &TileCoord::new(1, 0, 0)?).await.unwrap();
		assert!(tile.as_slice().starts_with(b"\x89PNG"));

		// missing tile: unavailable, not an error, and no timeout wait
		assert!(bridge.request_tile("topo", &TileCoord::new(7, 0, 0)?).await.is_none());
		Ok(())
	}

	#[tokio::test]
	async fn unanswered_request_times_out_to_unavailable() -> Result<()> {
		// no host attached: nothing will ever answer
		let bridge = BridgeProtocol::with_timeout(Duration::from_millis(50));

		let started = std::time::Instant::now();
		let result = bridge.request_tile("topo", &TileCoord::new(1, 0, 0)?).await;
		assert!(result.is_none());
		assert!(started.elapsed() >= Duration::from_millis(50));

		// the abandoned request left no pending entry behind
		assert!(bridge.pending.is_empty());
		Ok(())
	}

	#[tokio::test]
	async fn correlation_ids_are_monotonic_and_answers_match() -> Result<()> {
		let bridge = BridgeProtocol::with_timeout(Duration::from_secs(1));
		let mut requests = bridge.take_requests().unwrap();

		// manual host: answer the two requests in reverse order
		let bridge_host = bridge.clone();
		let host = tokio::spawn(async move {
			let first = requests.recv().await.unwrap();
			let second = requests.recv().await.unwrap();
			assert!(second.id > first.id);
			bridge_host.deliver(TileResponse {
				id: second.id,
				data: Some(Blob::from("tile-two")),
			});
			bridge_host.deliver(TileResponse {
				id: first.id,
				data: Some(Blob::from("tile-one")),
			});
		});

		let coord_one = TileCoord::new(1, 0, 0)?;
		let coord_two = TileCoord::new(1, 1, 0)?;
		let (one, two) = tokio::join!(
			bridge.request_tile("topo", &coord_one),
			bridge.request_tile("topo", &coord_two)
		);
		host.await?;

		assert_eq!(one.unwrap().as_str(), "tile-one");
		assert_eq!(two.unwrap().as_str(), "tile-two");
		Ok(())
	}

	#[tokio::test]
	async fn late_answer_is_dropped() -> Result<()> {
		let bridge = BridgeProtocol::with_timeout(Duration::from_millis(20));
		let mut requests = bridge.take_requests().unwrap();

		let result = bridge.request_tile("topo", &TileCoord::new(1, 0, 0)?).await;
		assert!(result.is_none());

		// the host answers after the renderer has given up
		let request = requests.recv().await.unwrap();
		bridge.deliver(TileResponse {
			id: request.id,
			data: Some(Blob::from("too late")),
		});
		assert!(bridge.pending.is_empty());
		Ok(())
	}
}
