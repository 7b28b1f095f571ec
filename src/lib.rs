//! precache: a cache-first asset worker.
//!
//! A worker precaches a fixed list of assets into one named cache when it is
//! installed, activates immediately, and then answers every intercepted
//! request from that cache before falling through to the network.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
