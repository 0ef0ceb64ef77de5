//! Archive readers and the extraction pipeline.
//!
//! Two archive formats are supported for offline basemaps: MBTiles (a
//! SQLite container keyed in the TMS scheme) and PMTiles (a single indexed
//! binary file ordered along a Hilbert curve). Both are exposed through the
//! object-safe [`ArchiveReader`] trait; a third backend reads a previously
//! extracted `<z>/<x>/<y>` file tree.
//!
//! The [`ExtractionPipeline`] walks any reader end-to-end and materializes
//! its tiles to individual files, resumable across crashes via a sentinel
//! marker file.

mod container;
pub use container::*;

mod extract;
pub use extract::*;
