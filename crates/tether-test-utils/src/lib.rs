//! Test utilities for Tether development.
//!
//! Provides [`TestBackend`], a deterministic reference implementation of
//! [`PhysicsBackend`](tether_backend::PhysicsBackend), a shared
//! [`BackendProbe`] for inspecting it after it has been moved into an
//! executor, and descriptor fixtures for common scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod fixtures;

pub use backend::{BackendProbe, TestBackend};
