//! Unified post-processing applied to every extractor's output: numeric
//! sanitation, reference enrichment, currency assignment, arithmetic
//! reconciliation, scale correction, type detection, name normalization,
//! weight computation and confidence scoring.
//!
//! No step aborts on a bad record; anomalies become issue flags. The whole
//! pipeline is idempotent and preserves record order.

use crate::categories::{IssueCode, MatchQuality, NameSource};
use crate::grammar::currency_in;
use crate::model::SecurityRecord;
use crate::refdata::{validate_isin, ReferenceDb};

/// Relative tolerance for quantity · price ≈ value.
const CONSISTENT_BAND: (f64, f64) = (0.8, 1.2);
/// Beyond this ratio the stated value is replaced by the computed one.
const REPLACE_RATIO: f64 = 10.0;
/// Plausible unit-price range; prices outside suggest a decimal-shift error.
const PRICE_RANGE: (f64, f64) = (0.01, 50_000.0);
/// Description prefix that marks extractor boilerplate rather than a name.
const BOILERPLATE_PREFIX: &str = "Securities:";

/// Run the full pipeline over a batch.
///
/// `stated_total` is the summary-declared portfolio total, used only for a
/// cross-check; weights are always computed from the summed record values.
pub fn post_process(
    db: &ReferenceDb,
    records: &mut Vec<SecurityRecord>,
    stated_total: Option<f64>,
) {
    for record in records.iter_mut() {
        process_record(db, record);
    }
    // Records that still identify nothing are not worth emitting.
    records.retain(SecurityRecord::identifies_security);
    compute_weights(records, stated_total);
    for record in records.iter_mut() {
        record.extraction_confidence = confidence(record);
    }
}

fn process_record(db: &ReferenceDb, record: &mut SecurityRecord) {
    sanitize_numerics(record);
    check_isin(record);
    enrich_from_reference(db, record);
    assign_currency(record);
    fill_arithmetic(record);
    correct_scale(record);
    check_consistency(record);
    if record.security_type.is_none() {
        if let Some(description) = &record.description {
            record.security_type = db.detect_type(description);
        }
    }
    if let Some(description) = record.description.take() {
        record.description = Some(db.normalize_name(&description));
    }
}

/// Step 1: drop non-finite parses so later arithmetic stays meaningful.
fn sanitize_numerics(record: &mut SecurityRecord) {
    for field in [
        &mut record.quantity,
        &mut record.price,
        &mut record.value,
    ] {
        if field.map_or(false, |v| !v.is_finite()) {
            *field = None;
        }
    }
}

fn check_isin(record: &mut SecurityRecord) {
    if let Some(isin) = record.isin.clone() {
        if !validate_isin(&isin) {
            log::warn!("invalid ISIN detected: {isin}");
            record.push_issue(IssueCode::InvalidIsin);
        }
    }
}

/// Step 2: let the reference database supply or improve the identity.
fn enrich_from_reference(db: &ReferenceDb, record: &mut SecurityRecord) {
    if let Some(isin) = &record.isin {
        if let Some(entry) = db.lookup_by_isin(isin) {
            let replace = record
                .description
                .as_deref()
                .map_or(true, |d| d.starts_with(BOILERPLATE_PREFIX));
            if replace {
                record.description = Some(entry.canonical_name.clone());
                record.name_source = Some(NameSource::ReferenceDb);
            }
        }
        return;
    }
    if let Some(description) = record.description.clone() {
        if let Some((entry, quality)) = db.lookup_by_name(&description) {
            record.description = Some(entry.canonical_name.clone());
            record.isin = Some(entry.isin.clone());
            if record.ticker.is_none() {
                record.ticker = entry.ticker.clone();
            }
            record.name_source = Some(NameSource::NameLookup);
            if let MatchQuality::Partial(score) = quality {
                if score < 0.8 {
                    record.push_issue(IssueCode::NameAmbiguous);
                }
            }
        }
        return;
    }
    if let Some(ticker) = record.ticker.clone() {
        if let Some(entry) = db.lookup_by_ticker(&ticker) {
            record.description = Some(entry.canonical_name.clone());
            record.isin = Some(entry.isin.clone());
            record.name_source = Some(NameSource::TickerLookup);
        }
    }
}

/// Step 3: per-record indicators in the detail lines win over whatever
/// currency the record was created with.
fn assign_currency(record: &mut SecurityRecord) {
    let found = record.raw_details.iter().find_map(|d| currency_in(d));
    if let Some(currency) = found {
        record.currency = currency;
    }
}

/// Step 4: with two of {quantity, price, value} present, compute the third.
fn fill_arithmetic(record: &mut SecurityRecord) {
    match (record.quantity, record.price, record.value) {
        (Some(q), Some(p), None) => {
            record.value = Some(q * p);
            record.push_issue(IssueCode::ValueDerived);
        }
        (Some(q), None, Some(v)) if q != 0.0 => {
            record.price = Some(v / q);
            record.push_issue(IssueCode::PriceDerived);
        }
        (None, Some(p), Some(v)) if p != 0.0 => {
            record.quantity = Some(v / p);
            record.push_issue(IssueCode::QuantityDerived);
        }
        (None, None, None) => record.push_issue(IssueCode::MissingRequired),
        _ => {}
    }
}

/// Step 5: undo decimal-shift errors in the price.
///
/// Out-of-range prices are rescaled by 100 whenever that shrinks the
/// arithmetic error. An in-range price is only rescaled when the shifted
/// price actually reconciles quantity · price with the stated value.
fn correct_scale(record: &mut SecurityRecord) {
    if let (Some(q), Some(p), Some(v)) = (record.quantity, record.price, record.value) {
        let error = |price: f64| (q * price - v).abs();
        if p < PRICE_RANGE.0 {
            let adjusted = p * 100.0;
            if error(adjusted) < error(p) {
                record.price = Some(adjusted);
            }
        } else if p > PRICE_RANGE.1 {
            let adjusted = p / 100.0;
            if error(adjusted) < error(p) {
                record.price = Some(adjusted);
            }
        } else if v > 0.0 {
            for adjusted in [p / 100.0, p * 100.0] {
                let ratio = q * adjusted / v;
                if ratio >= CONSISTENT_BAND.0
                    && ratio <= CONSISTENT_BAND.1
                    && error(adjusted) < error(p)
                {
                    record.price = Some(adjusted);
                    break;
                }
            }
        }
    }
    if let Some(p) = record.price {
        if p < PRICE_RANGE.0 || p > PRICE_RANGE.1 {
            record.push_issue(IssueCode::OutOfRangePrice);
        }
    }
}

/// Step 6: reconcile quantity · price against the stated value.
fn check_consistency(record: &mut SecurityRecord) {
    let (Some(q), Some(p), Some(v)) = (record.quantity, record.price, record.value) else {
        return;
    };
    let ratio = if v != 0.0 { q * p / v } else { f64::INFINITY };
    if ratio >= CONSISTENT_BAND.0 && ratio <= CONSISTENT_BAND.1 {
        return;
    }
    if ratio > REPLACE_RATIO || ratio < 1.0 / REPLACE_RATIO {
        // The stated value is off by an order of magnitude or more; the
        // computed product is the better estimate.
        record.value = Some(q * p);
    }
    record.push_issue(IssueCode::ValueInconsistent);
}

/// Step 9: portfolio totals and weights, renormalized to sum to 100.
fn compute_weights(records: &mut [SecurityRecord], stated_total: Option<f64>) {
    let total: f64 = records.iter().filter_map(|r| r.value).sum();
    if let Some(stated) = stated_total {
        if total > 0.0 && stated > 0.0 && (total - stated).abs() > total * 0.2 {
            log::warn!(
                "computed portfolio total {total:.2} differs from stated total {stated:.2} by more than 20%; trusting the computed total"
            );
        }
    }
    if total <= 0.0 {
        for record in records.iter_mut() {
            record.weight = None;
        }
        return;
    }
    for record in records.iter_mut() {
        record.weight = record.value.map(|v| v / total * 100.0);
    }
    let sum: f64 = records.iter().filter_map(|r| r.weight).sum();
    if sum > 0.0 {
        for record in records.iter_mut() {
            if let Some(w) = record.weight {
                record.weight = Some(w / sum * 100.0);
            }
        }
    }
}

/// Step 10: 0.6 × rule-pass ratio + 0.4 × field completeness over
/// {isin, description, quantity, price, value}.
fn confidence(record: &SecurityRecord) -> f64 {
    let mut checks = 0u32;
    let mut passed = 0u32;
    if record.isin.is_some() {
        checks += 1;
        if !record.has_issue(IssueCode::InvalidIsin) {
            passed += 1;
        }
    }
    if record.quantity.is_some() && record.price.is_some() && record.value.is_some() {
        checks += 1;
        if !record.has_issue(IssueCode::ValueInconsistent) {
            passed += 1;
        }
    }
    if record.price.is_some() {
        checks += 1;
        if !record.has_issue(IssueCode::OutOfRangePrice) {
            passed += 1;
        }
    }
    let rule_ratio = if checks == 0 {
        1.0
    } else {
        f64::from(passed) / f64::from(checks)
    };
    let present = [
        record.isin.is_some(),
        record.description.is_some(),
        record.quantity.is_some(),
        record.price.is_some(),
        record.value.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    let completeness = present as f64 / 5.0;
    0.6 * rule_ratio + 0.4 * completeness
}

#[cfg(test)]
mod tests {
    use crate::categories::{Currency, IssueCode, NameSource};
    use crate::model::SecurityRecord;
    use crate::postprocess::post_process;
    use crate::refdata::ReferenceDb;

    fn record(
        isin: Option<&str>,
        description: Option<&str>,
        quantity: Option<f64>,
        price: Option<f64>,
        value: Option<f64>,
    ) -> SecurityRecord {
        let mut r = SecurityRecord::new(1, Currency::Usd);
        r.isin = isin.map(str::to_owned);
        r.description = description.map(str::to_owned);
        r.quantity = quantity;
        r.price = price;
        r.value = value;
        r
    }

    #[test]
    fn test_arithmetic_fill_value() {
        let db = ReferenceDb::new();
        let mut records = vec![record(None, Some("Some Holding"), Some(100.0), Some(150.0), None)];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].value, Some(15_000.0));
        assert!(records[0].has_issue(IssueCode::ValueDerived));
    }

    #[test]
    fn test_arithmetic_fill_price_and_quantity() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(None, Some("Holding A"), Some(100.0), None, Some(15_000.0)),
            record(None, Some("Holding B"), None, Some(150.0), Some(15_000.0)),
        ];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].price, Some(150.0));
        assert!(records[0].has_issue(IssueCode::PriceDerived));
        assert_eq!(records[1].quantity, Some(100.0));
        assert!(records[1].has_issue(IssueCode::QuantityDerived));
    }

    #[test]
    fn test_value_discrepancy_correction() {
        let db = ReferenceDb::new();
        let mut records = vec![record(
            None,
            Some("Some Holding"),
            Some(100.0),
            Some(150.0),
            Some(15.0),
        )];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].value, Some(15_000.0));
        assert!(records[0].has_issue(IssueCode::ValueInconsistent));
    }

    #[test]
    fn test_moderate_discrepancy_keeps_value() {
        let db = ReferenceDb::new();
        // Ratio 2.0: flagged, but the stated value stays.
        let mut records = vec![record(
            None,
            Some("Some Holding"),
            Some(100.0),
            Some(150.0),
            Some(7_500.0),
        )];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].value, Some(7_500.0));
        assert!(records[0].has_issue(IssueCode::ValueInconsistent));
    }

    #[test]
    fn test_scale_correction_in_range_price() {
        let db = ReferenceDb::new();
        let mut records = vec![record(
            None,
            Some("Some Holding"),
            Some(100.0),
            Some(15_000.0),
            Some(15_000.0),
        )];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].price, Some(150.0));
        assert!(!records[0].has_issue(IssueCode::ValueInconsistent));
    }

    #[test]
    fn test_scale_correction_tiny_price() {
        let db = ReferenceDb::new();
        let mut records = vec![record(
            None,
            Some("Some Holding"),
            Some(100.0),
            Some(0.0015),
            Some(15.0),
        )];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].price, Some(0.15));
    }

    #[test]
    fn test_weight_renormalization() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(None, Some("A holding"), None, None, Some(1_000.0)),
            record(None, Some("B holding"), None, None, Some(2_000.0)),
            record(None, Some("C holding"), None, None, Some(7_000.0)),
        ];
        post_process(&db, &mut records, None);
        let weights: Vec<f64> = records.iter().map(|r| r.weight.unwrap()).collect();
        assert!((weights[0] - 10.0).abs() < 1e-9);
        assert!((weights[1] - 20.0).abs() < 1e-9);
        assert!((weights[2] - 70.0).abs() < 1e-9);
        assert!((weights.iter().sum::<f64>() - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_no_weights_without_values() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(None, Some("A holding"), Some(10.0), None, None),
            record(None, Some("B holding"), Some(20.0), None, None),
        ];
        post_process(&db, &mut records, None);
        assert!(records.iter().all(|r| r.weight.is_none()));
    }

    #[test]
    fn test_reference_enrichment_by_isin() {
        let db = ReferenceDb::new();
        let mut records = vec![record(Some("US0378331005"), None, Some(10.0), None, None)];
        post_process(&db, &mut records, None);
        // Canonical name attached, then normalized.
        assert_eq!(records[0].description.as_deref(), Some("Apple"));
        assert_eq!(records[0].name_source, Some(NameSource::ReferenceDb));
    }

    #[test]
    fn test_reference_enrichment_by_name() {
        let db = ReferenceDb::new();
        let mut records = vec![record(None, Some("Microsoft Corporation"), Some(5.0), None, None)];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].isin.as_deref(), Some("US5949181045"));
        assert_eq!(records[0].ticker.as_deref(), Some("MSFT"));
        assert_eq!(records[0].name_source, Some(NameSource::NameLookup));
    }

    #[test]
    fn test_ticker_lookup_rescues_anonymous_record() {
        let db = ReferenceDb::new();
        let mut r = record(None, None, Some(10.0), Some(150.0), None);
        r.ticker = Some("AAPL".to_owned());
        let mut records = vec![r];
        post_process(&db, &mut records, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].isin.as_deref(), Some("US0378331005"));
        assert_eq!(records[0].name_source, Some(NameSource::TickerLookup));
    }

    #[test]
    fn test_anonymous_records_are_dropped() {
        let db = ReferenceDb::new();
        let mut records = vec![record(None, None, Some(10.0), Some(150.0), None)];
        post_process(&db, &mut records, None);
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_isin_flagged_but_kept() {
        let db = ReferenceDb::new();
        let mut records = vec![record(Some("US0378331006"), Some("Broken Co"), None, None, None)];
        post_process(&db, &mut records, None);
        assert_eq!(records.len(), 1);
        assert!(records[0].has_issue(IssueCode::InvalidIsin));
    }

    #[test]
    fn test_currency_from_details_wins() {
        let db = ReferenceDb::new();
        let mut r = record(None, Some("Nestlé position"), Some(10.0), None, None);
        r.raw_details.push("Nestlé position 10 units in CHF".to_owned());
        let mut records = vec![r];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].currency, Currency::Chf);
    }

    #[test]
    fn test_missing_required_flag() {
        let db = ReferenceDb::new();
        let mut records = vec![record(Some("US0378331005"), None, None, None, None)];
        post_process(&db, &mut records, None);
        assert!(records[0].has_issue(IssueCode::MissingRequired));
    }

    #[test]
    fn test_idempotence() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(Some("US0378331005"), None, Some(100.0), Some(150.0), None),
            record(None, Some("Microsoft Corporation"), Some(100.0), Some(150.0), Some(15.0)),
            record(None, Some("Opaque Holding Vehicle"), None, None, Some(5_000.0)),
        ];
        post_process(&db, &mut records, None);
        let once = serde_json::to_value(&records).unwrap();
        post_process(&db, &mut records, None);
        let twice = serde_json::to_value(&records).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_order_preserved() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(None, Some("Zebra Holding"), None, None, Some(9_000.0)),
            record(None, Some("Alpha Holding"), None, None, Some(1_000.0)),
        ];
        post_process(&db, &mut records, None);
        assert_eq!(records[0].description.as_deref(), Some("Zebra Holding"));
        assert_eq!(records[1].description.as_deref(), Some("Alpha Holding"));
    }

    #[test]
    fn test_confidence_bounds_and_monotonicity() {
        let db = ReferenceDb::new();
        let mut records = vec![
            record(Some("US0378331005"), None, Some(100.0), Some(150.0), Some(15_000.0)),
            record(None, Some("Opaque Holding Vehicle"), None, None, None),
        ];
        post_process(&db, &mut records, None);
        for r in &records {
            assert!((0.0..=1.0).contains(&r.extraction_confidence));
        }
        assert!(records[0].extraction_confidence > records[1].extraction_confidence);
    }
}
