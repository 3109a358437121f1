//! Spreadsheet normalization for mailed lead reports.
//!
//! This crate provides:
//! - [`normalize`] / [`normalize_all`]: tabular attachment → ordered field maps
//! - scratch-directory housekeeping for saved attachments

pub mod error;
pub mod scratch;
pub mod spreadsheet;

pub use error::NormalizeError;
pub use scratch::{remove_file_quietly, sweep_scratch_dir};
pub use spreadsheet::{normalize, normalize_all};
