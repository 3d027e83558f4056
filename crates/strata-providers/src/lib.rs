pub mod json_file;
pub mod memory;

pub use json_file::JsonFileProvider;
pub use memory::{DataNode, MemoryProvider};
