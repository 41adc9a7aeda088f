//! TextExtract Server Library
//!
//! Image-to-text backend: an OCR gateway with a hosted primary provider and a
//! local Tesseract fallback, heuristic clean-up of recognized text, a daily
//! usage gate, blog content with a sitemap, and an edge proxy mode.
//!
//! The server binary is in main.rs; this crate surface is shared with the
//! integration tests and benchmarks.

pub mod blog;
pub mod config;
pub mod error;
pub mod ocr;
pub mod proxy;
pub mod regions;
pub mod routes;
pub mod sitemap;
pub mod state;
pub mod text;
pub mod usage;

pub use routes::{build_edge_router, build_router};
pub use state::AppState;
