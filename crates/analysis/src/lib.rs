//! `aquiscope-analysis`: groundwater trend and extraction analysis engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns derived tables.
//! CSV parsing works on text; file access belongs to the caller.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod geo;
pub mod load;
pub mod matcher;
pub mod model;
pub mod projection;
pub mod rank;
pub mod reconcile;
pub mod series;
pub mod summary;
pub mod trend;

pub use config::AnalysisConfig;
pub use engine::run;
pub use error::{AnalysisError, Result};
pub use load::load_input;
pub use model::{AnalysisInput, AnalysisReport, WellProfile};
