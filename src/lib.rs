//! # Digest Curator
//!
//! Aggregates articles and developer tools from web sources, lets a curator
//! review them through a candidate pool, and pushes a daily digest to a WeCom
//! group and, optionally, a WeChat MP account.
//!
//! ## Architecture
//!
//! ```text
//! scrapers ──▶ canonical ──▶ CandidateStore ──accept/promote──▶ MainPool ──▶ digest ──▶ notify
//!                                  │                               │
//!                                  └────────archive (copy)─────────┴──▶ ArchiveStore
//! ```
//!
//! 1. **Ingestion**: [`scrapers`] fetch raw items concurrently; each URL is
//!    reduced to a dedup key by [`canonical`] and dropped if any store
//!    already knows it
//! 2. **Curation**: [`curation::Curator`] applies accept / reject / archive /
//!    promote against the JSON-file [`store`]s
//! 3. **Push**: [`digest::DigestService`] samples the main pool, renders it
//!    through [`outputs`], sends via [`notify`] and clears the pools on
//!    confirmed delivery
//! 4. **Catalog and reports**: [`store::ToolCatalog`] holds developer tools
//!    that archived items link to through their tool tags;
//!    [`outputs::weekly`] lists each week's archive
//!
//! Persistence is flat JSON files under `data_dir`; see [`store`].

pub mod canonical;
pub mod cli;
pub mod config;
pub mod curation;
pub mod digest;
pub mod error;
pub mod http;
pub mod lock;
pub mod models;
pub mod notify;
pub mod outputs;
pub mod scheduler;
pub mod scrapers;
pub mod selector;
pub mod store;
pub mod utils;

pub use curation::Curator;
pub use error::{CurationError, Result};
pub use models::{Category, Item, ItemBuilder, Origin, Provenance, RawItem, Tool, ToolCandidate};
