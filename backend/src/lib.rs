//! # Bike-share analytics core
//!
//! Station data normalization, time-series extraction, stationarity and
//! seasonal analysis, and walk-forward forecast evaluation for a
//! dock-based bike-share system.
//!
//! ## Features
//!
//! - **Feed normalization**: join the GBFS station information, station
//!   status and Bike Angels documents into one station table
//! - **Series extraction**: arrivals, departures, net flow and occupancy per
//!   station at a fixed granularity
//! - **Analysis**: rolling statistics, the augmented Dickey-Fuller test and
//!   additive seasonal decomposition
//! - **Forecast evaluation**: repeated walk-forward validation of one-step
//!   forecasters with RMSE/MAE summaries
//! - **HTTP API**: Axum endpoints and background evaluation jobs with SSE logs
//!
//! ## Architecture
//!
//! - [`api`]: Public types re-exported for API consumers
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: Repository pattern, storage backends and the service layer
//! - [`feed`]: Raw feed documents and the sources that fetch them
//! - [`models`]: Domain types (stations, trips, series, forecast config)
//! - [`services`]: Analytics algorithms and background jobs
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod db;
pub mod feed;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
