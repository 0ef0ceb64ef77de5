mod compression;
mod entries_v3;
mod header_v3;
mod tile_type;

pub use compression::*;
pub use entries_v3::*;
pub use header_v3::*;
pub use tile_type::*;
