//! fwbuild-lib: core types and logic for fwbuild
//!
//! This crate provides the pieces that turn many independently-versioned
//! source trees into flashable firmware bundles:
//! - `registry`: immutable target definitions and build requests
//! - `execute`: the dependency-graph scheduler and subprocess invocation
//! - `builder`: per-target build strategies (packages, kernels, bootloaders, ...)
//! - `image`: byte-exact firmware formats (environment block, QSPI header,
//!   version block, packaged archive)
//! - `catalog`: the product-line target registry

pub mod builder;
pub mod catalog;
pub mod config;
pub mod consts;
pub mod execute;
pub mod image;
pub mod registry;
pub mod util;
