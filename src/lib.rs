//! Extraction of structured security holdings (identifiers, descriptions,
//! quantities, prices, values, currencies, weights) from heterogeneous
//! financial-institution PDF statements.
//!
//! The engine detects the issuing institution, resolves the reporting
//! currency, dispatches to a format-specific extractor and runs every
//! candidate record through a shared post-processing pipeline (reference
//! enrichment, arithmetic reconciliation, weight computation, confidence
//! scoring). See [`Extractor`] for the entry points.

mod categories;
mod detect;
mod engine;
mod error;
mod extract;
pub mod grammar;
mod model;
mod postprocess;
mod refdata;
mod registry;
mod tables;

pub use categories::*;
pub use engine::Extractor;
pub use error::ExtractError;
pub use model::*;
pub use refdata::{isin_check_digit, validate_isin, ReferenceDb, ReferenceEntry};
pub use registry::{Column, ExtractorFamily, FormatSpec, REGISTRY};
pub use tables::{grids_from_text, PageRange, Table, TableSource};

#[cfg(feature = "pdf")]
pub use tables::PdfTableSource;
