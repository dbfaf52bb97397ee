//! launchtrack library
//!
//! Launch telemetry service: backfills launches, rockets and launchpads from
//! the SpaceX API into a document store, and serves filtered listings and
//! statistics over HTTP behind a read-through cache.

pub mod app;
pub mod backfill;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod filter;
pub mod query;
pub mod refresh;
pub mod server;
pub mod service;
pub mod store;
