//! Warden: a data store whose records are guarded by cross-process
//! reader/writer file locks with crash recovery.
//!
//! The lock core lives in [`locks`]; [`store`] is its primary consumer.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod store;

#[cfg(test)]
mod test_support;
