//! # PDF Context
//!
//! Keeps a searchable page index in step with a folder of PDF documents and
//! answers questions with a chat model grounded on the most relevant pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ docs folder │──▶│ Synchronizer │──▶│ Page index   │
//! │   *.pdf     │   │ detect+index │   │ SQLite/memory│
//! └─────────────┘   └──────┬───────┘   └──────┬───────┘
//!                          │                  │ top-k pages
//!                          ▼                  ▼
//!                  ┌──────────────┐   ┌──────────────┐
//!                  │ metadata.json│   │ Chat (Ollama │
//!                  │  snapshot    │   │  / OpenAI)   │
//!                  └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfctx sync                          # bring the index up to date
//! pdfctx context "refund policy"       # show retrieved pages
//! pdfctx ask "What is the refund window?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Failure taxonomy |
//! | [`metadata`] | Persisted fingerprint snapshot |
//! | [`source`] | Folder listing and fingerprinting |
//! | [`detect`] | Change classification |
//! | [`extract`] | PDF page text extraction |
//! | [`process`] | Page cleaning and entry ids |
//! | [`index`] | Page index backends |
//! | [`embedding`] | Embedding providers for the SQLite index |
//! | [`sync`] | Synchronization pass |
//! | [`retrieve`] | Context assembly |
//! | [`chat`] | Grounded chat request |
//! | [`status`] | Status and reset commands |
//! | [`db`] | SQLite connection |
//! | [`logging`] | Diagnostic logging |

pub mod chat;
pub mod config;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod process;
pub mod retrieve;
pub mod source;
pub mod status;
pub mod sync;
