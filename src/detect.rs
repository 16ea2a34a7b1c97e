//! Document-format detection and reporting-currency resolution.
//!
//! Both work on the joined text of the first few pages only; statements
//! declare who issued them and in which currency they report long before
//! the holdings tables start.

use lazy_static::lazy_static;
use regex::Regex;

use crate::categories::{Currency, DocumentFormat};
use crate::registry::{spec_for, REGISTRY};

/// How many leading pages the detector and the currency resolver read.
pub const DETECTION_PAGES: u32 = 3;

/// Confidence reported for a positive pattern match.
const MATCH_CONFIDENCE: f64 = 0.9;
/// Confidence reported for the generic fallback.
const FALLBACK_CONFIDENCE: f64 = 0.3;

lazy_static! {
    static ref VALUATION_CURRENCY: Regex = Regex::new(
        r"(?:Valuation|Reporting|Base)\s+[Cc]urrency\s*[:/]?\s*(USD|EUR|CHF|GBP|JPY|CAD)"
    )
    .unwrap();

    /// One standalone-code pattern per supported currency, in tie-break order.
    static ref CODE_PATTERNS: Vec<(Currency, Regex)> = Currency::ALL
        .iter()
        .map(|c| (*c, Regex::new(&format!(r"\b{c}\b")).unwrap()))
        .collect();
}

/// Classify a document into one institution tag.
///
/// Formats are tested in registry declaration order; the first whose
/// patterns hit wins with confidence 0.9. Documents matching nothing fall
/// back to `generic` with confidence 0.3.
pub fn detect_format(text: &str) -> (DocumentFormat, f64) {
    for spec in REGISTRY.iter() {
        if !spec.patterns.is_empty() && spec.matches(text) {
            log::debug!("detected document format {}", spec.format);
            return (spec.format, MATCH_CONFIDENCE);
        }
    }
    (DocumentFormat::Generic, FALLBACK_CONFIDENCE)
}

/// Determine the document's reporting currency.
///
/// Precedence: an explicit `Valuation/Reporting/Base currency: XXX`
/// declaration, then the most frequently mentioned code or symbol, then the
/// format's default. Ties are broken in [`Currency::ALL`] order.
pub fn resolve_currency(text: &str, format: DocumentFormat) -> Currency {
    if let Some(caps) = VALUATION_CURRENCY.captures(text) {
        if let Ok(currency) = caps.get(1).unwrap().as_str().parse() {
            return currency;
        }
    }

    let mut counts = [0usize; Currency::ALL.len()];
    for (idx, (_, code)) in CODE_PATTERNS.iter().enumerate() {
        counts[idx] += code.find_iter(text).count();
    }
    for (symbol, currency) in Currency::SYMBOLS {
        let idx = Currency::ALL.iter().position(|c| *c == currency).unwrap();
        counts[idx] += count_symbol(text, symbol);
    }

    // Strict comparison keeps the earliest currency on ties.
    let mut best: Option<(usize, Currency)> = None;
    for (idx, currency) in Currency::ALL.iter().enumerate() {
        if counts[idx] > 0 && best.map_or(true, |(n, _)| counts[idx] > n) {
            best = Some((counts[idx], *currency));
        }
    }
    match best {
        Some((_, currency)) => currency,
        None => spec_for(format).default_currency,
    }
}

/// Count non-overlapping symbol occurrences, skipping those that are part
/// of a longer symbol listed earlier (`$` inside `C$`).
fn count_symbol(text: &str, symbol: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(found) = text[from..].find(symbol) {
        let at = from + found;
        let shadowed = Currency::SYMBOLS
            .iter()
            .take_while(|(s, _)| *s != symbol)
            .any(|(longer, _)| {
                let diff = longer.len().saturating_sub(symbol.len());
                diff > 0
                    && at >= diff
                    && text.is_char_boundary(at - diff)
                    && text[at - diff..].starts_with(longer)
            });
        if !shadowed {
            count += 1;
        }
        from = at + symbol.len();
    }
    count
}
