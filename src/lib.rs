//! Demand Planner Library
//!
//! Stores customer demand history, applies scoped percentage adjustments to a
//! working copy of it, and derives robust forecasts and inventory parameters
//! (lead-time demand, EOQ, safety stock, reorder point) from the adjusted data.
//!
//! Bulk adjustments, the monthly forecast aggregate and the audit log change
//! together inside one transaction; see [`commands::demand::BulkUpdateCommand`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod forecasting;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::{AppError, ErrorKind, ServiceError};
