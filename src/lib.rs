//! # Mini-RAG
//!
//! A small retrieval-augmented knowledge base. Users upload documents; the
//! service extracts their text, renders each one to a markdown artifact, and
//! answers questions by keyword-searching those artifacts and handing the
//! best matches to an LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract  │──▶│ Store        │
//! │ PDF/DOCX │   │ + Chunk  │   │ .md + index  │
//! └──────────┘   └──────────┘   └──────┬───────┘
//!                                      │ keyword search
//!                                      ▼
//!                 ┌──────────┐   ┌──────────┐
//!                 │ CLI/HTTP │◀──│   LLM    │
//!                 │  (mrag)  │   │  answer  │
//!                 └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Service error taxonomy |
//! | [`extract`] | PDF, DOCX, TXT, and Markdown text extraction |
//! | [`chunk`] | Sentence-boundary text chunking |
//! | [`keywords`] | Query keyword extraction |
//! | [`index`] | Persisted document index |
//! | [`search`] | Keyword scoring and context extraction |
//! | [`store`] | Markdown artifacts and document lifecycle |
//! | [`llm`] | Chat-completions clients and answer generation |
//! | [`rag`] | Upload / query / list / delete orchestration |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod keywords;
pub mod llm;
pub mod models;
pub mod rag;
pub mod search;
pub mod server;
pub mod store;
