//! The [`BasemapRegistry`] owns every configured basemap and its lifecycle:
//! `Registered → Downloading → Extracting (optional) → Ready → Closed`, with
//! failures routed to a configured online fallback instead of a blank map.
//!
//! The registry is an explicit instance constructed once at startup and
//! shared by reference; nothing here is a global. Activation is
//! single-flight per basemap: a second concurrent request parks on the
//! slot's activation lock and attaches to the outcome of the run already in
//! flight, so no duplicate download or extraction can start. Switching is
//! non-blocking for the renderer: the outgoing basemap keeps serving until
//! the incoming one is `Ready`.

use crate::acquire::Acquirer;
use crate::config::{BasemapConfig, Config};
use anyhow::{Context, Result};
use mapops_container::{ArchiveReader, DirectoryReader, ExtractionPipeline, open_archive_for};
use mapops_core::progress::ProgressFn;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasemapPhase {
	Registered,
	Downloading,
	Extracting,
	Ready,
	Error,
	Closed,
}

/// Progress/status surface pushed to the UI, one channel per basemap.
#[derive(Debug, Clone)]
pub struct BasemapStatus {
	pub basemap_id: String,
	pub phase: BasemapPhase,
	pub fraction: f64,
	pub message: String,
}

/// Where tile requests for a basemap should be answered from.
#[derive(Clone)]
pub enum TileSourceRef {
	/// A local archive reader or extracted tree.
	Local(Arc<dyn ArchiveReader>),
	/// Online tile URL template, used after repeated local failure.
	Remote(String),
}

struct BasemapSlot {
	config: BasemapConfig,
	status_tx: watch::Sender<BasemapStatus>,
	reader: parking_lot::RwLock<Option<Arc<dyn ArchiveReader>>>,
	activation: tokio::sync::Mutex<()>,
}

impl BasemapSlot {
	fn set_status(&self, phase: BasemapPhase, fraction: f64, message: &str) {
		self.status_tx.send_replace(BasemapStatus {
			basemap_id: self.config.id.clone(),
			phase,
			fraction,
			message: message.to_owned(),
		});
	}
}

pub struct BasemapRegistry {
	acquirer: Acquirer,
	pipeline: ExtractionPipeline,
	slots: HashMap<String, Arc<BasemapSlot>>,
	order: Vec<String>,
	active_tx: watch::Sender<Option<String>>,
}

impl BasemapRegistry {
	pub fn new(config: &Config) -> Result<BasemapRegistry> {
		let mut slots = HashMap::new();
		let mut order = Vec::new();

		for basemap in &config.basemaps {
			let (status_tx, _) = watch::channel(BasemapStatus {
				basemap_id: basemap.id.clone(),
				phase: BasemapPhase::Registered,
				fraction: 0.0,
				message: String::from("registered"),
			});
			order.push(basemap.id.clone());
			slots.insert(
				basemap.id.clone(),
				Arc::new(BasemapSlot {
					config: basemap.clone(),
					status_tx,
					reader: parking_lot::RwLock::new(None),
					activation: tokio::sync::Mutex::new(()),
				}),
			);
		}

		Ok(BasemapRegistry {
			acquirer: Acquirer::new(&config.data_dir),
			pipeline: ExtractionPipeline::new(&config.data_dir.join("tiles")),
			slots,
			order,
			active_tx: watch::channel(None).0,
		})
	}

	fn slot(&self, basemap_id: &str) -> Result<&Arc<BasemapSlot>> {
		self
			.slots
			.get(basemap_id)
			.with_context(|| format!("unknown basemap '{basemap_id}'"))
	}

	/// Basemap ids in configuration order.
	pub fn basemap_ids(&self) -> &[String] {
		&self.order
	}

	/// Status stream for one basemap; fires on every phase/progress change.
	pub fn status(&self, basemap_id: &str) -> Option<watch::Receiver<BasemapStatus>> {
		self.slots.get(basemap_id).map(|slot| slot.status_tx.subscribe())
	}

	/// Fires whenever the active basemap changes, so the renderer can
	/// re-request visible tiles.
	pub fn subscribe_active(&self) -> watch::Receiver<Option<String>> {
		self.active_tx.subscribe()
	}

	pub fn active_basemap(&self) -> Option<String> {
		self.active_tx.borrow().clone()
	}

	pub fn is_ready(&self, basemap_id: &str) -> bool {
		self
			.slots
			.get(basemap_id)
			.is_some_and(|slot| slot.status_tx.borrow().phase == BasemapPhase::Ready)
	}

	/// The reader currently serving this basemap. During extraction this is
	/// the live view onto the partial tree — serving never waits for
	/// extraction to finish.
	pub fn resolve_reader(&self, basemap_id: &str) -> Option<Arc<dyn ArchiveReader>> {
		self.slots.get(basemap_id)?.reader.read().clone()
	}

	/// The serving source for a basemap: the local reader when one is open
	/// (`Ready`, or `Extracting` with the partial tree already answering),
	/// the configured online fallback after a failed activation, `None`
	/// while acquisition is still underway.
	pub fn resolve_source(&self, basemap_id: &str) -> Option<TileSourceRef> {
		let slot = self.slots.get(basemap_id)?;
		if let Some(reader) = slot.reader.read().clone() {
			return Some(TileSourceRef::Local(reader));
		}
		if slot.status_tx.borrow().phase == BasemapPhase::Error {
			if let Some(url) = &slot.config.fallback_url {
				return Some(TileSourceRef::Remote(url.clone()));
			}
		}
		None
	}

	/// Drives a basemap to `Ready`: acquire the archive, open it, extract if
	/// configured. Concurrent calls for the same basemap attach to the run
	/// already in flight. Failures leave the slot in `Error` with the online
	/// fallback (if any) answering for it; the next call retries.
	pub async fn activate(&self, basemap_id: &str) -> Result<()> {
		let slot = self.slot(basemap_id)?.clone();

		if self.is_ready(basemap_id) {
			return Ok(());
		}

		let _guard = slot.activation.lock().await;
		if self.is_ready(basemap_id) {
			// an in-flight run finished while we waited
			return Ok(());
		}

		match self.run_activation(&slot).await {
			Ok(()) => {
				slot.set_status(BasemapPhase::Ready, 1.0, "ready");
				log::info!("basemap '{basemap_id}' is ready");
				Ok(())
			}
			Err(err) => {
				log::warn!("activating basemap '{basemap_id}' failed: {err:#}");
				slot.set_status(BasemapPhase::Error, 0.0, &format!("{err:#}"));
				Err(err)
			}
		}
	}

	async fn run_activation(&self, slot: &Arc<BasemapSlot>) -> Result<()> {
		let id = slot.config.id.clone();

		slot.set_status(BasemapPhase::Downloading, 0.0, "acquiring archive");
		let status_tx = slot.status_tx.clone();
		let sink_id = id.clone();
		let sink = ProgressFn(move |done, total| {
			status_tx.send_replace(BasemapStatus {
				basemap_id: sink_id.clone(),
				phase: BasemapPhase::Downloading,
				fraction: fraction(done, total),
				message: format!("downloading {done}/{total} bytes"),
			});
		});
		let path = self.acquirer.ensure_local(&slot.config, &sink).await?;

		let reader = open_archive_for(slot.config.archive_kind()?, &path, &id).await?;
		let mut reader: Arc<dyn ArchiveReader> = Arc::from(reader);

		if slot.config.extract {
			slot.set_status(BasemapPhase::Extracting, 0.0, "extracting tiles");

			// already-extracted tiles are servable while the run continues;
			// a not-yet-extracted tile is just a miss
			self.pipeline.prepare(&id, reader.as_ref())?;
			let live = DirectoryReader::open_live(&self.pipeline.output_dir(&id))?;
			*slot.reader.write() = Some(Arc::new(live));

			let status_tx = slot.status_tx.clone();
			let sink_id = id.clone();
			let sink = ProgressFn(move |done, total| {
				status_tx.send_replace(BasemapStatus {
					basemap_id: sink_id.clone(),
					phase: BasemapPhase::Extracting,
					fraction: fraction(done, total),
					message: format!("extracted {done}/{total} tiles"),
				});
			});
			if let Err(err) = self.pipeline.extract(&id, reader.as_ref(), &sink).await {
				*slot.reader.write() = None;
				return Err(err);
			}

			// swap the live view for the indexed tree; the source archive
			// handle is dropped here
			let tree = DirectoryReader::open_path(&self.pipeline.output_dir(&id))?;
			reader = Arc::new(tree);
		}

		*slot.reader.write() = Some(reader);
		Ok(())
	}

	/// Makes a basemap the active one. If it is not yet `Ready`, the current
	/// basemap keeps serving while this one is activated; the swap happens
	/// only on success. Subscribers of [`subscribe_active`] are signalled so
	/// the renderer re-requests visible tiles.
	///
	/// [`subscribe_active`]: Self::subscribe_active
	pub async fn switch_basemap(&self, basemap_id: &str) -> Result<()> {
		self.slot(basemap_id)?;

		if !self.is_ready(basemap_id) {
			self.activate(basemap_id).await?;
		}

		self.active_tx.send_replace(Some(basemap_id.to_owned()));
		log::info!("active basemap is now '{basemap_id}'");
		Ok(())
	}

	/// Releases a basemap's reader. Idempotent; a later `activate` reopens.
	pub fn close(&self, basemap_id: &str) -> Result<()> {
		let slot = self.slot(basemap_id)?;
		*slot.reader.write() = None;
		slot.set_status(BasemapPhase::Closed, 0.0, "closed");

		if self.active_basemap().as_deref() == Some(basemap_id) {
			self.active_tx.send_replace(None);
		}
		Ok(())
	}
}

fn fraction(done: u64, total: u64) -> f64 {
	if total > 0 { done as f64 / total as f64 } else { 0.0 }
}
