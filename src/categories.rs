//! Enum types used as building blocks in the main extraction result structs.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The kind of security a holding represents.
#[derive(Debug, EnumString, Display, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Equity,
    Bond,
    Etf,
    Fund,
    Option,
    Future,
    Reit,
    Commodity,
    Crypto,
    Unknown,
}

/// The issuing institution detected for a document.
///
/// Ordering of variants matters: the registry declares its detection entries
/// in this order and the first match wins, so the legacy bank formats come
/// before the retail brokers and `Generic` is always last.
#[derive(Debug, EnumString, Display, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Messos,
    Bofa,
    Ubs,
    Db,
    Ms,
    InteractiveBrokers,
    Schwab,
    Vanguard,
    Fidelity,
    Tdameritrade,
    Etrade,
    Generic,
    /// Reported when extraction failed before a format could be detected.
    Unknown,
}

/// ISO 4217 currency codes the engine recognises.
#[derive(Debug, EnumString, Display, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Chf,
    Gbp,
    Jpy,
    Cad,
    Aud,
    Hkd,
}

impl Currency {
    /// Currencies in tie-break order for mention counting. The majors come
    /// first; `AUD` and `HKD` are only ever reached via their symbols.
    pub const ALL: [Currency; 8] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Chf,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Cad,
        Currency::Aud,
        Currency::Hkd,
    ];

    /// Currency symbols and the codes they map to. Multi-character symbols
    /// must be listed before any symbol they contain (`C$` before `$`).
    pub const SYMBOLS: [(&'static str, Currency); 8] = [
        ("C$", Currency::Cad),
        ("A$", Currency::Aud),
        ("HK$", Currency::Hkd),
        ("$", Currency::Usd),
        ("€", Currency::Eur),
        ("£", Currency::Gbp),
        ("¥", Currency::Jpy),
        ("Fr.", Currency::Chf),
    ];
}

/// Per-record anomaly flags. Issues never abort a batch; they mark a record
/// for downstream review.
#[derive(Debug, EnumString, Display, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// Identifier failed syntactic or checksum validation.
    InvalidIsin,
    /// quantity · price disagrees with the stated value beyond tolerance.
    ValueInconsistent,
    /// Price outside the plausible range after scale correction.
    OutOfRangePrice,
    /// None of quantity, price or value could be recovered.
    MissingRequired,
    /// Description resolved through a partial reference match only.
    NameAmbiguous,
    /// Value was computed from quantity · price.
    ValueDerived,
    /// Price was computed from value / quantity.
    PriceDerived,
    /// Quantity was computed from value / price.
    QuantityDerived,
}

/// Where a record's description came from when the reference database
/// overrode or supplied it.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    ReferenceDb,
    NameLookup,
    TickerLookup,
}

/// The quality of a fuzzy reference-database name match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchQuality {
    Exact,
    /// Bidirectional-containment score in `[0, 1]`.
    Partial(f64),
}
