//! Compiled pattern library for the fields that appear in statement tables.
//!
//! Every extractor references these patterns by name instead of compiling its
//! own; the patterns are compiled once on first use. Helper functions return
//! `None` on mismatch rather than failing, which is the contract the
//! extractors and the post-processor rely on.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::categories::Currency;

lazy_static! {
    /// `ISIN: XX000000000` as written in block-style statements.
    pub static ref ISIN_TAGGED: Regex =
        Regex::new(r"ISIN:\s*([A-Z]{2}[A-Z0-9]{9}[0-9])").unwrap();

    /// Relaxed tag match used by the generic extractor.
    pub static ref ISIN_LOOSE: Regex =
        Regex::new(r"(?i:isin)[:\s]*([A-Z]{2}[A-Z0-9]{9}[0-9])").unwrap();

    /// A bare identifier anywhere in a cell.
    pub static ref ISIN_ANY: Regex =
        Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}[0-9])\b").unwrap();

    /// Full-string identifier shape check.
    pub static ref ISIN_FORMAT: Regex =
        Regex::new(r"^[A-Z]{2}[A-Z0-9]{9}[0-9]$").unwrap();

    /// Quantity patterns in priority order; the first capture wins.
    pub static ref QUANTITY: Vec<Regex> = vec![
        // 100 shares
        Regex::new(r"(?i)(\d[\d.,']*)\s*(?:shares|units|bonds|stocks|pieces)\b").unwrap(),
        // Quantity: 100
        Regex::new(r"(?i)(?:quantity|amount|units|nominal|position size|holding)[:;]\s*(\d[\d.,']*)")
            .unwrap(),
        // 100 USD nominal
        Regex::new(r"(?i)(\d[\d.,']*)\s*(?:USD|EUR|CHF|GBP)\s*(?:nominal|face value)").unwrap(),
        // shares: 100 at the start of a line
        Regex::new(r"(?i)^(?:shares|units|quantity|amount)[:;]\s*(\d[\d.,']*)").unwrap(),
        // qty:100
        Regex::new(r"(?i)(?:qty|quant|pos)[:;]\s*(\d[\d.,']*)").unwrap(),
    ];

    /// `$ 150.00` or `150.00 USD`.
    pub static ref PRICE: Regex =
        Regex::new(r"[$€£]\s*(\d[\d.,']*)|(\d[\d.,']*)\s*(?:USD|EUR|CHF|GBP)\b").unwrap();

    /// `Price: 150.00` in footer rows.
    pub static ref PRICE_LABELLED: Regex =
        Regex::new(r"(?i)(?:price|rate)\s*[:\s]\s*[$€£]?\s*(\d[\d.,']*)").unwrap();

    /// `Value: 15'000` in footer rows.
    pub static ref VALUE_LABELLED: Regex =
        Regex::new(r"(?i)(?:value|worth|total|amount)\s*[:\s]\s*[$€£]?\s*(\d[\d.,']*)").unwrap();

    /// Standalone ISO currency codes.
    pub static ref CURRENCY_CODE: Regex =
        Regex::new(r"\b(USD|EUR|CHF|GBP|JPY|CAD|AUD|HKD)\b").unwrap();

    /// `currency CHF` / `in CHF` phrases.
    pub static ref CURRENCY_PHRASE: Regex =
        Regex::new(r"(?:currency|in)\s+([A-Z]{3})").unwrap();

    /// `Maturity: 21.03.2028` with ISO and slash variants.
    pub static ref MATURITY: Regex = Regex::new(
        r"(?i)maturity[:\s]\s*(?:(\d{2}\.\d{2}\.\d{4})|(\d{4}-\d{2}-\d{2})|(\d{2}/\d{2}/\d{4}))"
    )
    .unwrap();

    /// A bare `DD.MM.YYYY` date inside a cell.
    pub static ref BARE_DATE: Regex = Regex::new(r"\d{2}\.\d{2}\.\d{4}").unwrap();

    /// `Coupon: 3.5 %`.
    pub static ref COUPON: Regex = Regex::new(r"(?i)coupon:.*?(\d+\.?\d*)\s*%").unwrap();

    /// Capitalized phrase ending in a corporate suffix token.
    pub static ref SECURITY_NAME: Regex = Regex::new(
        r"([A-Z][A-Za-z0-9\s\.&\-]+(?:Corp|Inc|Ltd|LLC|SA|AG|NV|ETF|Fund|Trust|PLC|Group|Holding|Tech|Co))"
    )
    .unwrap();

    /// Security-type footer lines in block-style statements.
    pub static ref TYPE_ROW: Regex = Regex::new(
        r"(Ordinary Bonds|Zero Bonds|Structured Bonds|Bond Funds|Ordinary Stocks|Equities|Stocks|Shares|ETF)"
    )
    .unwrap();

    /// First numeric token in a string, separators included.
    static ref AMOUNT_TOKEN: Regex = Regex::new(r"-?\d[\d.,']*").unwrap();

    /// A cell that is nothing but a number once currency symbols are gone.
    static ref NUMERIC_CELL: Regex = Regex::new(r"^-?[\d.,']+$").unwrap();
}

/// Parse a number out of free text.
///
/// Accepts `'`, `,` and `.` as grouping separators; the final separator is
/// treated as the decimal point when at most two digits follow it. Currency
/// symbols and any surrounding text are ignored. Returns `None` when no
/// numeric token is present.
pub fn parse_amount(s: &str) -> Option<f64> {
    let token = AMOUNT_TOKEN.find(s)?.as_str();
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let sep_at = digits.rfind(|c| c == '.' || c == ',' || c == '\'');
    let parsed = match sep_at {
        Some(idx) if digits.len() - idx - 1 <= 2 => {
            let int_part: String = digits[..idx].chars().filter(char::is_ascii_digit).collect();
            let frac = &digits[idx + 1..];
            format!("{int_part}.{frac}").parse::<f64>().ok()?
        }
        _ => {
            let plain: String = digits.chars().filter(char::is_ascii_digit).collect();
            plain.parse::<f64>().ok()?
        }
    };
    Some(if negative { -parsed } else { parsed })
}

/// Whether a cell consists of a single numeric token (currency symbols and
/// whitespace aside), which is how tabular extractors decide that a mapped
/// column cell is usable.
pub fn looks_numeric(cell: &str) -> bool {
    let stripped: String = cell
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$' && *c != '€' && *c != '£')
        .collect();
    !stripped.is_empty() && NUMERIC_CELL.is_match(&stripped)
}

/// Try the quantity patterns in priority order against a row's joined text.
pub fn quantity_in(text: &str) -> Option<f64> {
    for pattern in QUANTITY.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(q) = caps.get(1).and_then(|m| parse_amount(m.as_str())) {
                return Some(q);
            }
        }
    }
    None
}

/// Last-resort quantity: a short bare number with at most one decimal point.
pub fn bare_quantity(cell: &str) -> Option<f64> {
    if cell.len() < 15 && cell.matches('.').count() <= 1 && AMOUNT_TOKEN.is_match(cell) {
        parse_amount(cell)
    } else {
        None
    }
}

/// A price-shaped number: symbol-prefixed or ISO-code-suffixed.
pub fn price_in(text: &str) -> Option<f64> {
    let caps = PRICE.captures(text)?;
    let m = caps.get(1).or_else(|| caps.get(2))?;
    parse_amount(m.as_str())
}

/// `Price:`/`rate:` labelled number.
pub fn price_labelled_in(text: &str) -> Option<f64> {
    let caps = PRICE_LABELLED.captures(text)?;
    parse_amount(caps.get(1)?.as_str())
}

/// `Value:`/`worth:`/`total:` labelled number.
pub fn value_labelled_in(text: &str) -> Option<f64> {
    let caps = VALUE_LABELLED.captures(text)?;
    parse_amount(caps.get(1)?.as_str())
}

/// Detect a currency in a detail line: ISO code first, then symbol, then a
/// `currency XXX` phrase.
pub fn currency_in(text: &str) -> Option<Currency> {
    if let Some(caps) = CURRENCY_CODE.captures(text) {
        if let Ok(c) = caps.get(1).unwrap().as_str().parse() {
            return Some(c);
        }
    }
    for (symbol, code) in Currency::SYMBOLS {
        if text.contains(symbol) {
            return Some(code);
        }
    }
    if let Some(caps) = CURRENCY_PHRASE.captures(text) {
        if let Ok(c) = caps.get(1).unwrap().as_str().parse() {
            return Some(c);
        }
    }
    None
}

/// `Maturity:` date in any of the supported layouts.
pub fn maturity_in(text: &str) -> Option<NaiveDate> {
    let caps = MATURITY.captures(text)?;
    if let Some(m) = caps.get(1) {
        NaiveDate::parse_from_str(m.as_str(), "%d.%m.%Y").ok()
    } else if let Some(m) = caps.get(2) {
        NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok()
    } else if let Some(m) = caps.get(3) {
        NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").ok()
    } else {
        None
    }
}

/// A bare `DD.MM.YYYY` date, as used by the generic cell scan.
pub fn bare_date_in(text: &str) -> Option<NaiveDate> {
    let m = BARE_DATE.find(text)?;
    NaiveDate::parse_from_str(m.as_str(), "%d.%m.%Y").ok()
}

/// `Coupon:` percentage.
pub fn coupon_in(text: &str) -> Option<f64> {
    let caps = COUPON.captures(text)?;
    parse_amount(caps.get(1)?.as_str())
}

/// A capitalized corporate-suffix name anywhere in the text.
pub fn security_name_in(text: &str) -> Option<String> {
    let caps = SECURITY_NAME.captures(text)?;
    Some(caps.get(1)?.as_str().trim().to_owned())
}

/// Collapse runs of whitespace and trim, mirroring what the extractors do to
/// every piece of free text before storing it.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
