//! Result types for one extraction: per-security records, the optional
//! portfolio summary and asset-allocation blocks, and the envelope that
//! carries them.
//!
//! Records are created inside the per-format extractors, mutated only by the
//! post-processor, then sealed into the [`ExtractionResult`]. Absent optional
//! fields are omitted from serialized output rather than written as null.

use chrono::NaiveDate;
use serde::Serialize;

use crate::categories::{Currency, DocumentFormat, IssueCode, NameSource, SecurityType};

/// One extracted security holding.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityRecord {
    /// International Securities Identification Number, when recovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    /// Canonical security name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_type: Option<SecurityType>,
    /// Share count for equities; face value ("nominal") for bonds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Always present: per-record indicators, falling back to the document
    /// currency, falling back to the format default.
    pub currency: Currency,
    /// Percent of total portfolio value, present only when the portfolio
    /// total is positive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<NaiveDate>,
    /// Coupon percentage for debt instruments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    /// 1-based page the record was found on.
    pub source_page: u32,
    /// The source text lines that produced this record, in order.
    pub raw_details: Vec<String>,
    /// Product of rule-pass ratio and field completeness, in `[0, 1]`.
    pub extraction_confidence: f64,
    pub issues: Vec<IssueCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_source: Option<NameSource>,
}

impl SecurityRecord {
    /// An empty record anchored to a page, carrying the document currency
    /// until the post-processor refines it.
    pub fn new(source_page: u32, currency: Currency) -> Self {
        Self {
            isin: None,
            description: None,
            security_type: None,
            quantity: None,
            price: None,
            value: None,
            currency,
            weight: None,
            maturity_date: None,
            coupon_rate: None,
            ticker: None,
            source_page,
            raw_details: Vec::new(),
            extraction_confidence: 0.0,
            issues: Vec::new(),
            name_source: None,
        }
    }

    /// Flag an issue, keeping the issue list duplicate-free.
    pub fn push_issue(&mut self, issue: IssueCode) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    pub fn has_issue(&self, issue: IssueCode) -> bool {
        self.issues.contains(&issue)
    }

    /// A record is only worth emitting when it identifies the security
    /// somehow.
    pub fn identifies_security(&self) -> bool {
        self.isin.is_some() || self.description.is_some()
    }
}

/// Portfolio-level summary block found in block-style statements.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortfolioSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_currency: Option<String>,
    /// Total value exactly as printed in the statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value: Option<String>,
    /// Parsed form of `total_value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value_float: Option<f64>,
    /// Performance percentage as printed (e.g. `"5.32 %"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<String>,
}

impl PortfolioSummary {
    /// Whether anything at all was recovered.
    pub fn is_empty(&self) -> bool {
        self.client_number.is_none()
            && self.valuation_date.is_none()
            && self.valuation_currency.is_none()
            && self.total_value.is_none()
            && self.performance.is_none()
    }
}

/// Value and share of one asset-allocation category.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationEntry {
    /// Value exactly as printed.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_float: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
}

/// Asset-allocation block of a block-style statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetAllocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<AllocationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonds: Option<AllocationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equities: Option<AllocationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_products: Option<AllocationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<AllocationEntry>,
}

impl AssetAllocation {
    pub fn is_empty(&self) -> bool {
        self.liquidity.is_none()
            && self.bonds.is_none()
            && self.equities.is_none()
            && self.structured_products.is_none()
            && self.other.is_none()
    }
}

/// The envelope returned for every extraction attempt.
///
/// Always well-formed: `securities` is always a list and `error` is non-null
/// exactly when no usable data could be produced. Partial failures surface
/// as `warnings` or per-record issue flags instead.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub document_format: DocumentFormat,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PortfolioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_allocation: Option<AssetAllocation>,
    pub securities: Vec<SecurityRecord>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// An empty result for a document of the given format and currency.
    pub fn new(document_format: DocumentFormat, currency: Currency) -> Self {
        Self {
            document_format,
            currency,
            summary: None,
            asset_allocation: None,
            securities: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// A total-failure result. The format is `unknown` unless detection got
    /// far enough to establish one.
    pub fn failure(document_format: DocumentFormat, currency: Currency, error: String) -> Self {
        let mut result = Self::new(document_format, currency);
        result.error = Some(error);
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::categories::{Currency, DocumentFormat, IssueCode};
    use crate::model::{ExtractionResult, SecurityRecord};

    #[test]
    fn test_absent_fields_are_omitted() {
        let record = SecurityRecord::new(3, Currency::Usd);
        let json = serde_json::to_value(&record).unwrap();
        let map = json.as_object().unwrap();
        assert!(!map.contains_key("isin"));
        assert!(!map.contains_key("weight"));
        assert_eq!(map["currency"], "USD");
        assert_eq!(map["source_page"], 3);
    }

    #[test]
    fn test_issue_serialization_names() {
        let mut record = SecurityRecord::new(1, Currency::Chf);
        record.push_issue(IssueCode::ValueInconsistent);
        record.push_issue(IssueCode::ValueInconsistent);
        assert_eq!(record.issues.len(), 1);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["issues"][0], "value_inconsistent");
    }

    #[test]
    fn test_failure_result_shape() {
        let result = ExtractionResult::failure(
            DocumentFormat::Unknown,
            Currency::Usd,
            "PDF file not found: x.pdf".to_owned(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["document_format"], "unknown");
        assert_eq!(json["securities"].as_array().unwrap().len(), 0);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }
}
