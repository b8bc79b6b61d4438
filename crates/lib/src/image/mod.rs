//! Byte-exact firmware image formats.
//!
//! Everything here is synchronous and free of subprocesses; builders call
//! into these modules from blocking tasks.

pub mod compose;
pub mod env;
pub mod layout;
pub mod qspi;
pub mod uboot;
pub mod version;
