//! Archive acquisition: get a basemap's archive onto local disk.
//!
//! Three sources, in order of preference: a `path` used in place, a
//! `bundled` asset copied on first activation, or a remote `url` downloaded
//! with HTTP `Range` resume. Downloads stream into a `.part` file that is
//! renamed into place only when complete, so a crash never leaves a
//! plausible-looking truncated archive under the final name. An existing
//! local copy at least as large as the configured minimum size is reused
//! without re-acquiring; smaller copies are treated as corrupt.

use crate::config::BasemapConfig;
use anyhow::{Context, Result, bail, ensure};
use mapops_core::progress::ProgressSink;
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};

/// Fallback plausibility threshold when the config gives none. Even a
/// single-tile archive is bigger than this.
const DEFAULT_MIN_SIZE: u64 = 1024;

pub struct Acquirer {
	client: reqwest::Client,
	archives_dir: PathBuf,
}

impl Acquirer {
	pub fn new(data_dir: &Path) -> Acquirer {
		Acquirer {
			client: reqwest::Client::new(),
			archives_dir: data_dir.join("archives"),
		}
	}

	/// Returns the local path of the basemap's archive, acquiring it first
	/// if needed. Reports download progress to `sink`.
	pub async fn ensure_local(&self, basemap: &BasemapConfig, sink: &dyn ProgressSink) -> Result<PathBuf> {
		if let Some(path) = &basemap.path {
			ensure!(path.exists(), "archive {path:?} for basemap '{}' does not exist", basemap.id);
			return Ok(path.clone());
		}

		let kind = basemap.archive_kind()?;
		let extension = kind.as_str();
		let dest = self.archives_dir.join(format!("{}.{extension}", basemap.id));
		let min_size = basemap.min_size.unwrap_or(DEFAULT_MIN_SIZE);

		if let Ok(metadata) = dest.metadata() {
			if metadata.len() >= min_size {
				log::debug!("reusing local archive {dest:?} ({} bytes)", metadata.len());
				return Ok(dest);
			}
			log::warn!(
				"local archive {dest:?} is undersized ({} < {min_size} bytes), re-acquiring",
				metadata.len()
			);
		}

		fs::create_dir_all(&self.archives_dir)?;

		if let Some(bundled) = &basemap.bundled {
			log::info!("copying bundled archive {bundled:?} -> {dest:?}");
			fs::copy(bundled, &dest).with_context(|| format!("copying bundled archive {bundled:?}"))?;
		} else if let Some(url) = &basemap.url {
			self.download(url, &dest, sink).await?;
		} else {
			bail!("basemap '{}' has no archive source", basemap.id);
		}

		let size = dest.metadata()?.len();
		ensure!(
			size >= min_size,
			"acquired archive {dest:?} is undersized ({size} < {min_size} bytes)"
		);
		Ok(dest)
	}

	/// Streams `url` into `<dest>.part`, resuming a previous partial
	/// download when the server supports byte ranges, then renames.
	async fn download(&self, url: &str, dest: &Path, sink: &dyn ProgressSink) -> Result<()> {
		let part = part_path(dest);
		let existing = part.metadata().map(|m| m.len()).unwrap_or(0);

		let mut request = self.client.get(url);
		if existing > 0 {
			request = request.header(reqwest::header::RANGE, format!("bytes={existing}-"));
		}

		let response = request
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.with_context(|| format!("downloading {url}"))?;

		// a 206 continues the partial file; anything else starts over
		let resumed = existing > 0 && response.status() == reqwest::StatusCode::PARTIAL_CONTENT;
		let mut downloaded = if resumed { existing } else { 0 };
		let total = response.content_length().map(|len| len + downloaded).unwrap_or(0);

		log::info!(
			"downloading {url} ({} bytes{})",
			total,
			if resumed { ", resumed" } else { "" }
		);

		let mut file = if resumed {
			OpenOptions::new().append(true).open(&part)?
		} else {
			File::create(&part)?
		};

		let mut response = response;
		while let Some(chunk) = response.chunk().await.with_context(|| format!("reading from {url}"))? {
			file.write_all(&chunk)?;
			downloaded += chunk.len() as u64;
			sink.report(downloaded, total);
		}
		file.flush()?;
		drop(file);

		fs::rename(&part, dest)?;
		sink.finish(downloaded);
		Ok(())
	}
}

fn part_path(dest: &Path) -> PathBuf {
	let mut name = dest.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
	name.push(".part");
	dest.with_file_name(name)
}
