//! Three interchangeable ways to put tiles in front of a renderer, chosen
//! per deployment target at configuration time:
//!
//! - [`SchemeProtocol`] — the renderer supports pluggable URL schemes and
//!   calls straight into the process; lowest latency.
//! - [`HttpProtocol`] — a loopback HTTP server for renderers that can only
//!   fetch over the network stack.
//! - [`BridgeProtocol`] — correlation-id message passing for sandboxed
//!   renderers with neither scheme handlers nor socket access.
//!
//! All three answer a missing tile with an empty result, never an error;
//! the shared [`TileService`](crate::service::TileService) enforces that.

mod bridge;
mod http;
mod scheme;

pub use bridge::*;
pub use http::*;
pub use scheme::*;

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingStrategy {
	Scheme,
	Http,
	Bridge,
}

impl ServingStrategy {
	pub fn parse_str(value: &str) -> Result<Self> {
		Ok(match value.to_lowercase().trim() {
			"scheme" => ServingStrategy::Scheme,
			"http" => ServingStrategy::Http,
			"bridge" => ServingStrategy::Bridge,
			_ => bail!("unknown serving strategy '{value}', expected scheme, http or bridge"),
		})
	}

	pub fn as_str(&self) -> &str {
		match self {
			ServingStrategy::Scheme => "scheme",
			ServingStrategy::Http => "http",
			ServingStrategy::Bridge => "bridge",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_strategy() -> Result<()> {
		assert_eq!(ServingStrategy::parse_str("http")?, ServingStrategy::Http);
		assert_eq!(ServingStrategy::parse_str("Scheme")?, ServingStrategy::Scheme);
		assert_eq!(ServingStrategy::parse_str("bridge")?, ServingStrategy::Bridge);
		assert!(ServingStrategy::parse_str("carrier-pigeon").is_err());
		Ok(())
	}
}
