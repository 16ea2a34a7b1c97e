//! The registry of supported institutions: detection patterns, default
//! currency, table-structure hints and the extractor family to dispatch to.
//!
//! Registry order is significant. The detector tests formats in declaration
//! order and the first match wins, so the legacy bank formats precede the
//! retail brokers and `generic` (with no patterns) is always last.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::categories::{Currency, DocumentFormat};

/// Logical columns a tabular statement can carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Identifier,
    Ticker,
    Name,
    Quantity,
    Price,
    Value,
    CurrencyCol,
    Date,
}

/// Which extraction algorithm a format uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtractorFamily {
    /// One security spans several consecutive rows (`ISIN:` opens a block).
    Block,
    /// One row per security; columns resolved through header synonyms.
    Tabular,
    /// Tabular with a relaxed header match: any row mentioning `ISIN`.
    Generic,
}

/// Everything the engine knows about one institution's statement format.
#[derive(Debug)]
pub struct FormatSpec {
    pub format: DocumentFormat,
    /// Ordered detection patterns, tested case-insensitively.
    pub patterns: Vec<Regex>,
    /// Currency assumed when the document declares nothing.
    pub default_currency: Currency,
    pub family: ExtractorFamily,
    /// Header-cell synonyms per logical column, matched by containment with
    /// the longest synonym winning across columns.
    pub synonyms: &'static [(Column, &'static [&'static str])],
    /// Expected column index per logical field when synonyms fail.
    pub fallback: &'static [(Column, usize)],
}

impl FormatSpec {
    /// Whether any of this format's detection patterns hits the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// The fallback index for a logical column, if one is declared.
    pub fn fallback_index(&self, column: Column) -> Option<usize> {
        self.fallback
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, idx)| *idx)
    }
}

/// Broker-style header synonyms shared by most tabular formats.
const BROKER_SYNONYMS: &[(Column, &[&str])] = &[
    (Column::Identifier, &["isin", "cusip", "security id"]),
    (Column::Ticker, &["symbol", "ticker"]),
    (
        Column::Name,
        &[
            "description",
            "security description",
            "security name",
            "fund name",
            "financial instrument",
            "investment",
            "security",
            "name",
        ],
    ),
    (
        Column::Quantity,
        &["quantity", "shares", "position", "amount", "nominal"],
    ),
    (
        Column::Price,
        &["share price", "market price", "last price", "price"],
    ),
    (
        Column::Value,
        &[
            "market value",
            "current value",
            "position value",
            "balance",
            "value",
        ],
    ),
    (Column::CurrencyCol, &["currency", "ccy"]),
    (Column::Date, &["maturity", "date"]),
];

/// Ticker-first column order used by most brokers.
const BROKER_FALLBACK: &[(Column, usize)] = &[
    (Column::Ticker, 0),
    (Column::Name, 1),
    (Column::Quantity, 2),
    (Column::Price, 3),
    (Column::Value, 4),
];

/// Vanguard puts the fund name first and the ticker second.
const NAME_FIRST_FALLBACK: &[(Column, usize)] = &[
    (Column::Name, 0),
    (Column::Ticker, 1),
    (Column::Quantity, 2),
    (Column::Price, 3),
    (Column::Value, 4),
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("invalid registry pattern")
        })
        .collect()
}

lazy_static! {
    /// All supported formats in detection order.
    pub static ref REGISTRY: Vec<FormatSpec> = vec![
        FormatSpec {
            format: DocumentFormat::Messos,
            patterns: compile(&[r"MESSOS\s+ENTERPRISES", r"Cornèr\s+Banca"]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Block,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Bofa,
            patterns: compile(&[r"Bank\s+of\s+America", r"Merrill\s+Lynch"]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Generic,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Ubs,
            patterns: compile(&[r"\bUBS\b"]),
            default_currency: Currency::Chf,
            family: ExtractorFamily::Generic,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Db,
            patterns: compile(&[r"Deutsche\s+Bank"]),
            default_currency: Currency::Eur,
            family: ExtractorFamily::Generic,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Ms,
            patterns: compile(&[r"Morgan\s+Stanley"]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Generic,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::InteractiveBrokers,
            patterns: compile(&[
                r"Interactive\s+Brokers",
                r"\bIBKR\b",
                r"INTERACTIVE\s+BROKERS\s+LLC",
                r"IB\s+Account\s+Statement",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Schwab,
            patterns: compile(&[
                r"Charles\s+Schwab",
                r"Schwab\s+One\s+Account",
                r"The\s+Charles\s+Schwab\s+Corporation",
                r"Schwab\s+Brokerage\s+Account",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Vanguard,
            patterns: compile(&[
                r"Vanguard",
                r"The\s+Vanguard\s+Group",
                r"Vanguard\s+Brokerage\s+Services",
                r"Vanguard\s+Account",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: NAME_FIRST_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Fidelity,
            patterns: compile(&[
                r"Fidelity\s+Investments",
                r"\bFMR\s+LLC\b",
                r"Fidelity\s+Brokerage\s+Services",
                r"Fidelity\s+Account",
                r"\bFidelity\b",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Tdameritrade,
            patterns: compile(&[
                r"TD\s+Ameritrade",
                r"\bTDA\b",
                r"TD\s+Ameritrade\s+Clearing",
                r"TD\s+Ameritrade\s+Account",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Etrade,
            patterns: compile(&[
                r"E\*TRADE",
                r"\bETRADE\b",
                r"E\*TRADE\s+Securities",
                r"E\*TRADE\s+Financial",
                r"E\*TRADE\s+Account",
            ]),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Tabular,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
        FormatSpec {
            format: DocumentFormat::Generic,
            patterns: Vec::new(),
            default_currency: Currency::Usd,
            family: ExtractorFamily::Generic,
            synonyms: BROKER_SYNONYMS,
            fallback: BROKER_FALLBACK,
        },
    ];
}

/// The registry entry for a format. `Unknown` maps to the generic entry.
pub fn spec_for(format: DocumentFormat) -> &'static FormatSpec {
    REGISTRY
        .iter()
        .find(|s| s.format == format)
        .unwrap_or_else(|| REGISTRY.last().expect("registry is never empty"))
}

#[cfg(test)]
mod tests {
    use crate::categories::{Currency, DocumentFormat};
    use crate::registry::{spec_for, ExtractorFamily, REGISTRY};

    #[test]
    fn test_generic_is_last_and_patternless() {
        let last = REGISTRY.last().unwrap();
        assert_eq!(last.format, DocumentFormat::Generic);
        assert!(last.patterns.is_empty());
    }

    #[test]
    fn test_bank_formats_precede_brokers() {
        let pos = |f: DocumentFormat| REGISTRY.iter().position(|s| s.format == f).unwrap();
        assert!(pos(DocumentFormat::Messos) < pos(DocumentFormat::InteractiveBrokers));
        assert!(pos(DocumentFormat::Ubs) < pos(DocumentFormat::Schwab));
    }

    #[test]
    fn test_default_currencies() {
        assert_eq!(spec_for(DocumentFormat::Ubs).default_currency, Currency::Chf);
        assert_eq!(spec_for(DocumentFormat::Db).default_currency, Currency::Eur);
        assert_eq!(spec_for(DocumentFormat::Schwab).default_currency, Currency::Usd);
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        let spec = spec_for(DocumentFormat::Unknown);
        assert_eq!(spec.format, DocumentFormat::Generic);
        assert_eq!(spec.family, ExtractorFamily::Generic);
    }

    #[test]
    fn test_detection_patterns_match() {
        assert!(spec_for(DocumentFormat::Messos).matches("MESSOS ENTERPRISES LTD."));
        assert!(spec_for(DocumentFormat::InteractiveBrokers).matches("Interactive Brokers LLC"));
        assert!(spec_for(DocumentFormat::Vanguard).matches("Vanguard Brokerage Services"));
        assert!(!spec_for(DocumentFormat::Schwab).matches("no brokerage mentioned"));
    }
}
