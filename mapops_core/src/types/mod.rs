mod archive_metadata;
mod blob;
mod byte_range;
mod tile_compression;
mod tile_coord;
mod tile_format;
mod tile_id;

pub use archive_metadata::*;
pub use blob::*;
pub use byte_range::*;
pub use tile_compression::*;
pub use tile_coord::*;
pub use tile_format::*;
pub use tile_id::*;
