//! D64 disk-image filesystem layer.

pub mod d64;

pub use d64::{CheckReport, D64, DirEntry, FileType};
