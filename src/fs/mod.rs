//! Filesystem utilities for warden.
//!
//! Two primitives carry all on-disk state: atomic replacement of a file's
//! content (records and holder metadata) and atomic create-if-absent of a file
//! with content (lock markers and reader tokens).

pub mod atomic;
mod exclusive;

pub use atomic::{atomic_write, atomic_write_file};
pub use exclusive::{create_exclusive, remove_if_exists};
