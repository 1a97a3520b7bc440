//! # Worker Scripts
//!
//! Per-item policies for forensic processing workers.
//!
//! A host (processing engine) hands each discovered item to a [`worker::Worker`].
//! The worker runs the configured policies in order; each policy inspects the
//! item and returns [`effects::Effect`]s such as "exclude", "add tag" or
//! "register these child files". The accumulated result comes back to the host
//! as an [`effects::ItemOutcome`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌─────────────┐
//! │   Item   │──▶│ Worker               │──▶│ ItemOutcome │
//! │ (host)   │   │  policy → effects    │   │ (JSON line) │
//! └──────────┘   │  policy → effects    │   └─────────────┘
//!                └──────────┬───────────┘
//!                           │ digest lookups
//!                           ▼
//!                    ┌─────────────┐
//!                    │   SQLite    │
//!                    │ annotations │
//!                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Items, communications, addresses, entities |
//! | [`effects`] | Policy effects and per-item state |
//! | [`traits`] | `Policy` trait and `PolicyRegistry` |
//! | [`policies`] | Built-in policies |
//! | [`worker`] | Initialize / process / close lifecycle |
//! | [`annotations`] | Digest → tags index |
//! | [`scan`] | Items from files on disk |
//! | [`run`] | Batch processing and JSON-lines output |
//! | [`commands`] | Annotation and listing commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod annotations;
pub mod commands;
pub mod config;
pub mod db;
pub mod effects;
pub mod migrate;
pub mod models;
pub mod policies;
pub mod run;
pub mod scan;
pub mod traits;
pub mod worker;
