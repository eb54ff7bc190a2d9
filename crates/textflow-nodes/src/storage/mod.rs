//! Storage nodes
//!
//! Nodes for file I/O.

mod read_file;
mod write_file;

pub use read_file::ReadFileNode;
pub use write_file::WriteFileNode;
