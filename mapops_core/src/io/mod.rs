mod data_reader;
mod data_reader_file;
mod value_reader;

pub use data_reader::*;
pub use data_reader_file::*;
pub use value_reader::*;
