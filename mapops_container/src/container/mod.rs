mod directory;
mod getters;
mod mbtiles;
mod mock;
mod pmtiles;
mod reader;

pub use directory::*;
pub use getters::*;
pub use mbtiles::*;
pub use mock::*;
pub use pmtiles::*;
pub use reader::*;
