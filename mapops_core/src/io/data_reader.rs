//! [`DataReaderTrait`] abstracts random byte-range access to an archive
//! file. The PMTiles backend is written entirely against this trait: it
//! never loads a whole archive, only the ranges the header and directories
//! point at.

use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Boxed dynamic data reader.
pub type DataReader = Box<dyn DataReaderTrait>;

#[async_trait]
pub trait DataReaderTrait: Debug + Send + Sync {
	/// Reads exactly the requested byte range.
	async fn read_range(&self, range: &ByteRange) -> Result<Blob>;

	/// Total size of the underlying data in bytes.
	fn len(&self) -> u64;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Name of the data source, for log and error messages.
	fn get_name(&self) -> &str;
}
