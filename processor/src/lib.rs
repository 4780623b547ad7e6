// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#[macro_use]
extern crate diesel;

pub use config::IndexerConfig;

pub mod api;
pub mod chainhook;
pub mod config;
pub mod db;
pub mod ingestion;
pub mod schema;
pub mod storage;
pub mod utils;
