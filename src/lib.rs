//! # Research Folio
//!
//! Storage and analysis backend for research papers. Each paper is scored
//! on content quality, novelty, methodology, and impact potential, embedded
//! for similarity search, and topic-modelled. Papers, categories, and tags
//! live in SQLite; keyword search uses FTS5 and similarity search uses the
//! stored embeddings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│          │──▶│    Analyzer     │──▶│ ModelRegistry│
//! │ (folio)  │   │ Research │   │ 4 scorers + LDA │   │  3 encoders  │
//! └──────────┘   │ Service  │   └─────────────────┘   └──────────────┘
//! ┌──────────┐   │          │   ┌─────────────────┐
//! │   HTTP   │──▶│          │──▶│ Store (SQLite / │
//! │  (axum)  │   └──────────┘   │ in-memory)      │
//! └──────────┘                  └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Text encoder abstraction and providers |
//! | [`registry`] | Loaded encoders and anchor vectors |
//! | [`analysis`] | Scoring pipeline and result records |
//! | [`topics`] | TF-IDF + LDA topic extraction |
//! | [`models`] | Papers, categories, tags |
//! | [`store`] | Storage trait with SQLite and in-memory backends |
//! | [`service`] | Validation and orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analysis;
pub mod analyze_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod migrate;
pub mod models;
pub mod paper_cmd;
pub mod registry;
pub mod server;
pub mod service;
pub mod store;
pub mod topics;
