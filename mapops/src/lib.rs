//! Offline basemap management and local tile serving.
//!
//! A [`registry::BasemapRegistry`] owns the configured basemaps: it acquires
//! their archives (bundled copy or resumable download), opens them through
//! `mapops_container`, optionally extracts them to tile-file trees, and
//! tracks which basemap the renderer is currently using. Tiles reach the
//! renderer through one of three interchangeable [`protocol`] strategies:
//! in-process scheme interception, a loopback HTTP server, or an
//! asynchronous message bridge for sandboxed renderers.

pub mod acquire;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod tools;
