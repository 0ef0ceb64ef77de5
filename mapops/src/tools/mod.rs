pub mod extract;
pub mod probe;
pub mod serve;
