// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable-Sync: periodic sleep-data sync for linked wearable accounts
//!
//! This crate pulls readings from Fitbit, Oura and Google Fit on a fixed
//! cadence, refreshing OAuth tokens ahead of expiry, and appends them to
//! a reading store.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::SyncScheduler;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub scheduler: Arc<SyncScheduler>,
}
