//! # docsync
//!
//! Keeps a local mirror of a remote documentation catalog in sync, with a
//! review step before anything local changes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ ResourceResolver │──▶ │ Orchestrator │──▶ │  .pending/  │
//! │ cache/remote/    │    │ check/commit │    │  staging    │
//! │ bundled manifest │    └──────┬───────┘    └─────────────┘
//! └──────────────────┘           │ commit
//!                                ▼
//!        ┌──────────┐     ┌─────────────┐     ┌──────────────┐
//!        │ get /    │◀────│ ContentCache│◀────│ docs/ (live) │
//!        │ search   │     └─────────────┘     │ CHANGELOG.md │
//!        └──────────┘                         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync sync                         # first download
//! docsync check                        # stage and classify upstream changes
//! docsync diff hooks.md                # review
//! docsync commit "Refresh hooks docs for new matchers"
//! docsync search "PreToolUse"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | `SyncError` taxonomy |
//! | [`models`] | Catalog and report types |
//! | [`traits`] | `Fetch` and `Transform` seams |
//! | [`fetcher`] | HTTP fetcher with retry and backoff |
//! | [`resources`] | Catalog resolution with fallback |
//! | [`store`] | Data directory layout and Live Documents |
//! | [`cache`] | Content cache with metadata headers |
//! | [`diff`] | Change detection and unified diffs |
//! | [`changelog`] | `CHANGELOG.md` ledger |
//! | [`staging`] | `.pending/` staging area |
//! | [`lock`] | Advisory lock over the data directory |
//! | [`update`] | check / commit / discard / status / sync |
//! | [`get`] | Document retrieval |
//! | [`search`] | Linear search |
//! | [`stats`] | Status and cache rendering |
//! | [`progress`] | Download progress reporting |

pub mod cache;
pub mod changelog;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetcher;
pub mod get;
pub mod lock;
pub mod models;
pub mod progress;
pub mod resources;
pub mod search;
pub mod staging;
pub mod stats;
pub mod store;
pub mod traits;
pub mod update;
