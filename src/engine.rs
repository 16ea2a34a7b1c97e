//! The top-level extraction engine: wiring from table loading through
//! format detection, currency resolution, per-format extraction and
//! post-processing to the assembled result.
//!
//! This is the only place where failures from sub-components are converted
//! into the `error` and `warnings` fields of the result; everything below
//! reports misses as absent values or per-record issues. An extraction is a
//! pure function of the input document plus the immutable reference data and
//! registry, so one engine can serve concurrent callers.

use std::path::Path;

use crate::categories::{Currency, DocumentFormat};
use crate::detect::{detect_format, resolve_currency, DETECTION_PAGES};
use crate::error::ExtractError;
use crate::extract::{block, extract_records};
use crate::model::ExtractionResult;
use crate::postprocess::post_process;
use crate::refdata::ReferenceDb;
use crate::registry::{spec_for, ExtractorFamily};
use crate::tables::{grids_from_text, PageRange, Table, TableSource};

/// Pages scanned for the asset-allocation section of block-style formats.
const ALLOCATION_PAGES: std::ops::RangeInclusive<u32> = 3..=5;

/// The extraction engine.
pub struct Extractor {
    db: ReferenceDb,
    source: Option<Box<dyn TableSource + Send + Sync>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// An engine with the bundled reference seed set and the default PDF
    /// table source.
    pub fn new() -> Self {
        Self {
            db: ReferenceDb::new(),
            #[cfg(feature = "pdf")]
            source: Some(Box::new(crate::tables::PdfTableSource)),
            #[cfg(not(feature = "pdf"))]
            source: None,
        }
    }

    /// An engine that additionally loads reference data from a JSON file.
    pub fn with_reference_file(path: &Path) -> Result<Self, ExtractError> {
        let mut extractor = Self::new();
        extractor.load_reference(path)?;
        Ok(extractor)
    }

    /// An engine reading tables from a caller-supplied source instead of
    /// the bundled PDF adapter.
    pub fn with_table_source(source: Box<dyn TableSource + Send + Sync>) -> Self {
        Self {
            db: ReferenceDb::new(),
            source: Some(source),
        }
    }

    /// Additively load reference data; later entries win on collision.
    pub fn load_reference(&mut self, path: &Path) -> Result<usize, ExtractError> {
        self.db.load_from_file(path)
    }

    /// Extract structured holdings from a PDF statement.
    ///
    /// Never panics and never returns a malformed result: on failure the
    /// result carries an `error` string, an `unknown` format and an empty
    /// securities list.
    pub fn extract(&self, pdf_path: &str) -> ExtractionResult {
        log::info!("starting extraction from {pdf_path}");
        if pdf_path.trim().is_empty() {
            return Self::failure(ExtractError::InvalidPath);
        }
        let path = Path::new(pdf_path);
        if !path.exists() {
            return Self::failure(ExtractError::NotFound(path.to_owned()));
        }
        let Some(source) = &self.source else {
            return Self::failure(ExtractError::Adapter(
                "no table source configured".to_owned(),
            ));
        };
        match source.load_tables(path, PageRange::All) {
            Ok(tables) => self.process_tables(tables, None),
            Err(e) => Self::failure(e),
        }
    }

    /// Extract from text or pre-extracted tables, for callers that already
    /// ran their own PDF tooling. `hint` skips format detection.
    pub fn extract_text(&self, text: &str, hint: Option<DocumentFormat>) -> ExtractionResult {
        if text.trim().is_empty() {
            return Self::failure(ExtractError::EmptyText);
        }
        self.process_tables(grids_from_text(text), hint)
    }

    fn failure(error: ExtractError) -> ExtractionResult {
        log::error!("{error}");
        ExtractionResult::failure(DocumentFormat::Unknown, Currency::Usd, error.to_string())
    }

    fn process_tables(&self, tables: Vec<Table>, hint: Option<DocumentFormat>) -> ExtractionResult {
        let head_text = tables
            .iter()
            .filter(|t| t.page <= DETECTION_PAGES)
            .map(Table::full_text)
            .collect::<Vec<_>>()
            .join(" ");

        let (format, confidence) = match hint {
            Some(format) => (format, 1.0),
            None => detect_format(&head_text),
        };
        log::debug!("document format {format} (confidence {confidence:.1})");
        let spec = spec_for(format);
        let currency = resolve_currency(&head_text, format);

        let mut result = ExtractionResult::new(format, currency);
        let mut records = extract_records(spec, &tables, currency);

        // Summary and asset allocation only exist in block-style layouts.
        // The two sections are independent: missing one only produces a
        // warning and never disturbs the other or the records.
        let mut stated_total = None;
        if spec.family == ExtractorFamily::Block {
            let head: Vec<Table> = tables
                .iter()
                .filter(|t| t.page <= DETECTION_PAGES)
                .cloned()
                .collect();
            let summary = block::summary_from(&head);
            stated_total = summary.total_value_float;
            result.summary = Some(summary).filter(|s| !s.is_empty());
            if result.summary.is_none() {
                result.warnings.push("portfolio summary not found".to_owned());
            }

            let allocation_tables: Vec<Table> = tables
                .iter()
                .filter(|t| ALLOCATION_PAGES.contains(&t.page))
                .cloned()
                .collect();
            let allocation = block::allocation_from(&allocation_tables);
            if allocation.is_empty() {
                result.warnings.push("asset allocation not found".to_owned());
            } else {
                result.asset_allocation = Some(allocation);
            }
        }

        post_process(&self.db, &mut records, stated_total);
        log::info!(
            "extracted {} securities from {} document",
            records.len(),
            format
        );
        result.securities = records;
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::categories::{Currency, DocumentFormat, IssueCode};
    use crate::engine::Extractor;

    #[test]
    fn test_invalid_path() {
        let result = Extractor::new().extract("");
        assert!(result.error.as_deref().unwrap().contains("Invalid"));
        assert_eq!(result.document_format, DocumentFormat::Unknown);
        assert!(result.securities.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = Extractor::new().extract("/no/such/statement.pdf");
        assert!(result.error.as_deref().unwrap().contains("not found"));
        assert_eq!(result.document_format, DocumentFormat::Unknown);
        assert!(result.securities.is_empty());
    }

    #[test]
    fn test_blank_text() {
        let result = Extractor::new().extract_text("   \n  ", None);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_format_dispatch() {
        let extractor = Extractor::new();
        let result = extractor.extract_text("Interactive Brokers LLC account overview", None);
        assert_eq!(result.document_format, DocumentFormat::InteractiveBrokers);
        let result = extractor.extract_text("Vanguard Brokerage Services statement", None);
        assert_eq!(result.document_format, DocumentFormat::Vanguard);
        let result = extractor.extract_text("an unbranded holdings listing", None);
        assert_eq!(result.document_format, DocumentFormat::Generic);
    }

    #[test]
    fn test_format_hint_overrides_detection() {
        let extractor = Extractor::new();
        let result = extractor.extract_text(
            "no branding here",
            Some(DocumentFormat::InteractiveBrokers),
        );
        assert_eq!(result.document_format, DocumentFormat::InteractiveBrokers);
    }

    #[test]
    fn test_tabular_pipeline_end_to_end() {
        let extractor = Extractor::new();
        let text = "Interactive Brokers LLC\n\
                    Symbol  Description  Quantity  Price  Value\n\
                    AAPL  Apple Inc Common Stock  100  150.00  15,000.00\n\
                    MSFT  Microsoft Corporation  50  300.00  15,000.00";
        let result = extractor.extract_text(text, None);
        assert_eq!(result.document_format, DocumentFormat::InteractiveBrokers);
        assert!(result.error.is_none());
        assert_eq!(result.securities.len(), 2);

        let apple = &result.securities[0];
        assert_eq!(apple.quantity, Some(100.0));
        assert_eq!(apple.value, Some(15_000.0));
        assert_eq!(apple.weight, Some(50.0));
        assert!(!apple.has_issue(IssueCode::ValueInconsistent));
        assert!(apple.extraction_confidence > 0.9);

        let weight_sum: f64 = result.securities.iter().filter_map(|r| r.weight).sum();
        assert!((weight_sum - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_block_pipeline_with_summary_and_allocation() {
        let extractor = Extractor::new();
        let text = "MESSOS ENTERPRISES LTD.  Cornèr Banca SA\n\
                    Client Number // 366223\n\
                    Valuation as of 28.02.2025  Valuation currency // USD\n\
                    Total assets  19'510'599  100.00%\
                    \u{c}page two filler\
                    \u{c}Asset Allocation\n\
                    Liquidity  108'906  0.56%\n\
                    Bonds  11'558'957  59.24%\
                    \u{c}\
                    ISIN: US0378331005  Apple Inc position  100 shares  $ 150.00\n\
                    Maturity: 21.03.2028  Coupon: 3.5 %\n\
                    Ordinary Bonds";
        let result = extractor.extract_text(text, None);
        assert_eq!(result.document_format, DocumentFormat::Messos);
        assert_eq!(result.currency, Currency::Usd);

        let summary = result.summary.as_ref().unwrap();
        assert_eq!(summary.client_number.as_deref(), Some("366223"));
        assert_eq!(summary.total_value_float, Some(19_510_599.0));

        let allocation = result.asset_allocation.as_ref().unwrap();
        assert_eq!(allocation.bonds.as_ref().unwrap().value, "11'558'957");

        assert_eq!(result.securities.len(), 1);
        let record = &result.securities[0];
        assert_eq!(record.isin.as_deref(), Some("US0378331005"));
        assert_eq!(record.quantity, Some(100.0));
        assert_eq!(record.price, Some(150.0));
        // Derived from quantity × price.
        assert_eq!(record.value, Some(15_000.0));
        assert!(record.has_issue(IssueCode::ValueDerived));
        assert_eq!(record.coupon_rate, Some(3.5));
        assert_eq!(record.source_page, 4);
    }

    #[test]
    fn test_sections_missing_produce_warnings_not_errors() {
        let extractor = Extractor::new();
        let text = "MESSOS ENTERPRISES LTD.\n\
                    ISIN: US5949181045  Microsoft Corporation holding  50 shares  $ 300.00";
        let result = extractor.extract_text(text, None);
        assert!(result.error.is_none());
        assert!(result.summary.is_none() || result.asset_allocation.is_none());
        assert!(!result.warnings.is_empty());
        assert_eq!(result.securities.len(), 1);
    }
}
