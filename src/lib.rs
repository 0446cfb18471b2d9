//! setup-vapoursynth - VapourSynth provisioning for CI workers
//!
//! Resolves a VapourSynth version, restores a matching cached build or
//! compiles zimg and VapourSynth from source, caches the result and exposes
//! the installation to later workflow steps.

pub mod build;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod process;
pub mod provision;
pub mod ui;

#[cfg(test)]
mod testutil;

pub use error::{ProvisionError, ProvisionResult};
