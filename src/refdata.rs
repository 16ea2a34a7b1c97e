//! Static reference data used to enrich extracted records: identifier
//! lookups, fuzzy name matching, name normalization and security-type
//! detection.
//!
//! The database is loaded once at engine start (a bundled seed set plus an
//! optional external JSON file) and is immutable afterwards, so it can be
//! shared freely between concurrent extractions. All lookups return "not
//! found" rather than failing; validation returns `false` on malformed
//! input.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::categories::{MatchQuality, SecurityType};
use crate::error::ExtractError;
use crate::grammar::{normalize_ws, ISIN_FORMAT};

/// Corporate suffix tokens stripped from the end of a name during
/// normalization.
const NAME_SUFFIXES: [&str; 12] = [
    "inc",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "limited",
    "llc",
    "sa",
    "ag",
    "nv",
    "plc",
];

/// Keyword table for security-type detection, scanned in order with the
/// first hit winning. Equity keywords come last because they are the most
/// generic.
const TYPE_KEYWORDS: [(SecurityType, &[&str]); 9] = [
    (
        SecurityType::Bond,
        &["bond", "note", "debt", "treasury", "debenture", "gilt"],
    ),
    (
        SecurityType::Etf,
        &["etf", "exchange traded fund", "exchange-traded"],
    ),
    (
        SecurityType::Fund,
        &["mutual fund", "investment fund", "hedge fund", "index fund", "fund"],
    ),
    (SecurityType::Option, &["option", "call", "put", "warrant"]),
    (SecurityType::Future, &["future", "futures contract"]),
    (
        SecurityType::Reit,
        &["reit", "real estate investment trust"],
    ),
    (
        SecurityType::Commodity,
        &["commodity", "gold", "silver", "oil", "gas"],
    ),
    (
        SecurityType::Crypto,
        &["crypto", "cryptocurrency", "token", "coin"],
    ),
    (
        SecurityType::Equity,
        &["stock", "share", "common", "preferred", "ordinary", "class a", "class b"],
    ),
];

/// Bundled seed set of widely held securities: (ticker, name, ISIN).
const SEED_SECURITIES: [(&str, &str, &str); 30] = [
    ("AAPL", "Apple Inc.", "US0378331005"),
    ("MSFT", "Microsoft Corporation", "US5949181045"),
    ("GOOGL", "Alphabet Inc.", "US02079K3059"),
    ("AMZN", "Amazon.com Inc.", "US0231351067"),
    ("META", "Meta Platforms Inc.", "US30303M1027"),
    ("NVDA", "NVIDIA Corporation", "US67066G1040"),
    ("TSLA", "Tesla Inc.", "US88160R1014"),
    ("JPM", "JPMorgan Chase & Co.", "US46625H1005"),
    ("V", "Visa Inc.", "US92826C8394"),
    ("WMT", "Walmart Inc.", "US9311421039"),
    ("UNH", "UnitedHealth Group Inc.", "US91324P1021"),
    ("JNJ", "Johnson & Johnson", "US4781601046"),
    ("BAC", "Bank of America Corp.", "US0605051046"),
    ("PG", "Procter & Gamble Co.", "US7427181091"),
    ("MA", "Mastercard Inc.", "US57636Q1040"),
    ("XOM", "Exxon Mobil Corp.", "US30231G1022"),
    ("HD", "Home Depot Inc.", "US4370761029"),
    ("CVX", "Chevron Corp.", "US1667641005"),
    ("ABBV", "AbbVie Inc.", "US00287Y1091"),
    ("PFE", "Pfizer Inc.", "US7170811035"),
    ("AVGO", "Broadcom Inc.", "US11135F1012"),
    ("CSCO", "Cisco Systems Inc.", "US17275R1023"),
    ("CMCSA", "Comcast Corp.", "US20030N1019"),
    ("PEP", "PepsiCo Inc.", "US7134481081"),
    ("INTC", "Intel Corp.", "US4581401001"),
    ("ADBE", "Adobe Inc.", "US00724F1012"),
    ("T", "AT&T Inc.", "US00206R1023"),
    ("ORCL", "Oracle Corp.", "US68389X1054"),
    ("IBM", "International Business Machines Corp.", "US4592001014"),
    ("MRK", "Merck & Co. Inc.", "US58933Y1055"),
];

/// One known security.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub isin: String,
    pub canonical_name: String,
    pub ticker: Option<String>,
    pub exchange: Option<String>,
    pub security_type: Option<SecurityType>,
}

/// Shape of the external reference-data JSON file.
#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    securities: Vec<ReferenceFileEntry>,
}

#[derive(Debug, Deserialize)]
struct ReferenceFileEntry {
    isin: Option<String>,
    name: Option<String>,
    ticker: Option<String>,
    exchange: Option<String>,
    security_type: Option<SecurityType>,
}

/// In-memory reference database with reverse indices.
#[derive(Debug)]
pub struct ReferenceDb {
    by_isin: HashMap<String, ReferenceEntry>,
    ticker_to_isin: HashMap<String, String>,
    // BTreeMap keeps fuzzy-match iteration deterministic.
    name_to_isin: BTreeMap<String, String>,
}

impl Default for ReferenceDb {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceDb {
    /// Build the database from the bundled seed set.
    pub fn new() -> Self {
        let mut db = Self {
            by_isin: HashMap::new(),
            ticker_to_isin: HashMap::new(),
            name_to_isin: BTreeMap::new(),
        };
        for (ticker, name, isin) in SEED_SECURITIES {
            db.insert(ReferenceEntry {
                isin: isin.to_owned(),
                canonical_name: name.to_owned(),
                ticker: Some(ticker.to_owned()),
                exchange: None,
                security_type: None,
            });
        }
        db
    }

    /// Add securities from a JSON file (`{"securities": [...]}`) on top of
    /// what is already loaded. Later entries win on key collision; entries
    /// without both an ISIN and a name are skipped with a warning. Returns
    /// the number of entries added.
    pub fn load_from_file(&mut self, path: &Path) -> Result<usize, ExtractError> {
        let file = File::open(path)?;
        let parsed: ReferenceFile = serde_json::from_reader(BufReader::new(file))?;
        let mut added = 0;
        for entry in parsed.securities {
            match (entry.isin, entry.name) {
                (Some(isin), Some(name)) if ISIN_FORMAT.is_match(&isin) => {
                    self.insert(ReferenceEntry {
                        isin,
                        canonical_name: name,
                        ticker: entry.ticker,
                        exchange: entry.exchange,
                        security_type: entry.security_type,
                    });
                    added += 1;
                }
                (isin, name) => {
                    log::warn!(
                        "skipping malformed reference entry (isin: {isin:?}, name: {name:?})"
                    );
                }
            }
        }
        log::info!("loaded {added} reference entries from {}", path.display());
        Ok(added)
    }

    fn insert(&mut self, entry: ReferenceEntry) {
        let lower = entry.canonical_name.to_lowercase();
        self.name_to_isin.insert(lower.clone(), entry.isin.clone());
        let stripped = strip_suffixes(&lower);
        if stripped != lower {
            self.name_to_isin.insert(stripped, entry.isin.clone());
        }
        if let Some(ticker) = &entry.ticker {
            self.ticker_to_isin.insert(ticker.clone(), entry.isin.clone());
        }
        self.by_isin.insert(entry.isin.clone(), entry);
    }

    pub fn lookup_by_isin(&self, isin: &str) -> Option<&ReferenceEntry> {
        self.by_isin.get(isin)
    }

    pub fn lookup_by_ticker(&self, ticker: &str) -> Option<&ReferenceEntry> {
        self.by_isin.get(self.ticker_to_isin.get(ticker)?)
    }

    /// Find the best reference entry for a free-text name.
    ///
    /// An exact (case-insensitive) index hit wins outright. Otherwise every
    /// indexed name of four or more characters is scored by bidirectional
    /// substring containment — `len(shorter) / len(longer)` — and the best
    /// score of at least 0.5 is returned.
    pub fn lookup_by_name(&self, name: &str) -> Option<(&ReferenceEntry, MatchQuality)> {
        if name.is_empty() {
            return None;
        }
        let query = name.to_lowercase();
        if let Some(isin) = self.name_to_isin.get(&query) {
            return Some((self.by_isin.get(isin)?, MatchQuality::Exact));
        }

        let mut best: Option<(&String, f64)> = None;
        for (indexed, isin) in &self.name_to_isin {
            // Very short names produce spurious containment hits.
            if indexed.len() < 4 {
                continue;
            }
            if indexed.contains(&query) || query.contains(indexed) {
                let shorter = indexed.len().min(query.len());
                let longer = indexed.len().max(query.len()).max(1);
                let score = shorter as f64 / longer as f64;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((isin, score));
                }
            }
        }
        match best {
            Some((isin, score)) if score >= 0.5 => {
                Some((self.by_isin.get(isin)?, MatchQuality::Partial(score)))
            }
            _ => None,
        }
    }

    /// Normalize a security name: collapse whitespace, strip trailing
    /// corporate suffixes, and title-case all-lowercase input. Idempotent.
    pub fn normalize_name(&self, name: &str) -> String {
        let collapsed = normalize_ws(name);
        let stripped = strip_suffixes(&collapsed);
        let trimmed = stripped.trim_end_matches(['.', ',', ' ']);
        if !trimmed.is_empty() && trimmed.chars().all(|c| !c.is_uppercase()) {
            title_case(trimmed)
        } else {
            trimmed.to_owned()
        }
    }

    /// Detect a security type from its description via the keyword table.
    pub fn detect_type(&self, description: &str) -> Option<SecurityType> {
        let lower = description.to_lowercase();
        for (security_type, keywords) in TYPE_KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return Some(security_type);
            }
        }
        None
    }

    /// See [`validate_isin`].
    pub fn validate_isin(&self, isin: &str) -> bool {
        validate_isin(isin)
    }
}

/// Validate an ISIN: two uppercase letters, nine alphanumerics, one check
/// digit, with the check digit verified by the Luhn scheme over the
/// digit-expanded value.
pub fn validate_isin(isin: &str) -> bool {
    if !ISIN_FORMAT.is_match(isin) {
        return false;
    }
    match isin_check_digit(&isin[..11]) {
        Some(expected) => isin.as_bytes()[11] - b'0' == expected,
        None => false,
    }
}

/// Compute the check digit for the first eleven characters of an ISIN.
/// Letters expand to two digits (A=10 … Z=35); every second digit counted
/// from the right of the expansion is doubled.
pub fn isin_check_digit(body: &str) -> Option<u8> {
    let mut digits = Vec::with_capacity(22);
    for c in body.chars() {
        let v = c.to_digit(36)?;
        if v >= 10 {
            digits.push(v / 10);
        }
        digits.push(v % 10);
    }
    let mut sum = 0;
    for (i, d) in digits.iter().rev().enumerate() {
        let mut d = *d;
        if i % 2 == 0 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    Some(((10 - sum % 10) % 10) as u8)
}

fn strip_suffixes(name: &str) -> String {
    let mut words: Vec<&str> = name.split(' ').collect();
    while words.len() > 1 {
        let last = words
            .last()
            .map(|w| w.trim_end_matches(['.', ',']).to_lowercase());
        match last {
            Some(token) if NAME_SUFFIXES.contains(&token.as_str()) => {
                words.pop();
            }
            _ => break,
        }
    }
    words.join(" ")
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
