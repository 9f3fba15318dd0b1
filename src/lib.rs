//! Capital-gains tax lot engine for cryptocurrency trading activity.
//!
//! Given a chronologically ordered orderbook, this crate maintains a ledger
//! of open and closed tax lots (`registry`), matches sells against open lots
//! by a configurable strategy (`engine`), and applies U.S. IRS wash-sale
//! adjustments as a fixed-point pass over closed lots (`wash`). `report` and
//! `consolidate` project the resulting registry for filing.
//!
//! Orderbook ingestion, asset-registry loading, and configuration parsing
//! (`ingest`, `asset::import_registry`, `config`) are the external-collaborator
//! interfaces; everything upstream of them (spreadsheet parsing, fee-symbol
//! resolution, price back-filling) is out of scope.

pub mod asset;
pub mod config;
pub mod consolidate;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod legacy;
pub mod lot;
pub mod order;
pub mod registry;
pub mod report;
pub mod time;
pub mod transaction;
pub mod wash;

pub use error::{Error, Result};
