//! Block-style extraction: one security spans several consecutive grid rows.
//!
//! A row carrying `ISIN:` opens a new candidate; rows up to the next tag are
//! appended to the candidate's detail lines and mined for the fields the
//! opening row did not provide (maturity, coupon, type, late price/value).
//! This module also parses the portfolio summary and asset-allocation
//! sections that the same statements carry on their leading pages.

use lazy_static::lazy_static;
use regex::Regex;

use crate::categories::{Currency, SecurityType};
use crate::grammar::{
    self, coupon_in, maturity_in, parse_amount, price_labelled_in, quantity_in, security_name_in,
    value_labelled_in, ISIN_TAGGED, PRICE, TYPE_ROW,
};
use crate::model::{AllocationEntry, AssetAllocation, PortfolioSummary, SecurityRecord};
use crate::tables::Table;

lazy_static! {
    static ref CLIENT_NUMBER: Regex = Regex::new(r"Client\s+Number\s+//?\s*(\d+)").unwrap();
    static ref AS_OF_DATE: Regex = Regex::new(r"as\s+of\s+(\d{2}\.\d{2}\.\d{4})").unwrap();
    static ref VALUATION_CCY: Regex = Regex::new(r"Valuation\s+currency\s+//?\s*(\w+)").unwrap();
    static ref TOTAL_LABEL: Regex = Regex::new(r"Total\s+(\d[\d']*)").unwrap();
    static ref PERFORMANCE: Regex = Regex::new(r"(\d+\.?\d*\s*%)").unwrap();
    static ref CELL_NUMBER: Regex = Regex::new(r"\d[\d']*").unwrap();
}

/// Cell keywords that suggest the neighbouring cell holds a quantity.
const QUANTITY_HINTS: [&str; 5] = ["qty", "quant", "units", "shares", "amount"];

pub(crate) fn extract(tables: &[Table], currency: Currency) -> Vec<SecurityRecord> {
    let mut records = Vec::new();
    for table in tables {
        if !table.full_text().contains("ISIN:") {
            continue;
        }
        extract_from_table(table, currency, &mut records);
    }
    records
}

fn extract_from_table(table: &Table, currency: Currency, records: &mut Vec<SecurityRecord>) {
    let mut current: Option<SecurityRecord> = None;

    for row in &table.cells {
        let row_text = Table::row_text(row);
        if let Some(caps) = ISIN_TAGGED.captures(&row_text) {
            if let Some(record) = current.take() {
                seal(record, records);
            }
            current = Some(open_candidate(
                caps.get(1).unwrap().as_str(),
                row,
                &row_text,
                table.page,
                currency,
            ));
        } else if let Some(record) = current.as_mut() {
            if row_text.is_empty() {
                continue;
            }
            fill_from_detail_row(record, &row_text);
        }
    }
    if let Some(record) = current.take() {
        seal(record, records);
    }
}

fn seal(record: SecurityRecord, records: &mut Vec<SecurityRecord>) {
    if record.identifies_security() {
        records.push(record);
    }
}

/// Build a candidate from the row that introduced its identifier.
fn open_candidate(
    isin: &str,
    row: &[String],
    row_text: &str,
    page: u32,
    currency: Currency,
) -> SecurityRecord {
    let mut record = SecurityRecord::new(page, currency);
    record.isin = Some(isin.to_owned());
    record.raw_details.push(row_text.to_owned());

    // Longest cell that is not the identifier tag serves as the name until
    // a corporate-suffix phrase proves more precise.
    record.description = row
        .iter()
        .map(|c| c.trim())
        .filter(|c| c.len() > 10 && !c.contains("ISIN:"))
        .max_by_key(|c| c.len())
        .map(|c| grammar::normalize_ws(c));
    if let Some(name) = security_name_in(row_text) {
        // The suffix pattern can over-reach and swallow the identifier tag.
        if name.len() > 5 && !name.contains(isin) {
            record.description = Some(name);
        }
    }

    record.quantity = quantity_in(row_text)
        .or_else(|| adjacent_quantity(row))
        .or_else(|| {
            row.iter()
                .find_map(|cell| grammar::bare_quantity(cell.trim()))
        });

    // First currency-attached number is the unit price; a later, distinct
    // one is the position value.
    let mut amounts = PRICE.captures_iter(row_text).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| parse_amount(m.as_str()))
    });
    record.price = amounts.next();
    record.value = amounts.last();

    record
}

/// Numbers sitting next to a `qty`/`shares`-style label cell.
fn adjacent_quantity(row: &[String]) -> Option<f64> {
    for (idx, cell) in row.iter().enumerate() {
        let lower = cell.to_lowercase();
        if !QUANTITY_HINTS.iter().any(|h| lower.contains(h)) {
            continue;
        }
        for neighbour in [idx.wrapping_sub(1), idx + 1] {
            if let Some(parsed) = row.get(neighbour).and_then(|c| {
                CELL_NUMBER.is_match(c).then(|| parse_amount(c)).flatten()
            }) {
                return Some(parsed);
            }
        }
    }
    None
}

/// Opportunistically fill still-missing fields from a follow row.
fn fill_from_detail_row(record: &mut SecurityRecord, row_text: &str) {
    record.raw_details.push(row_text.to_owned());

    if record.maturity_date.is_none() {
        record.maturity_date = maturity_in(row_text);
    }
    if record.coupon_rate.is_none() {
        record.coupon_rate = coupon_in(row_text);
    }
    if record.security_type.is_none() {
        if let Some(caps) = TYPE_ROW.captures(row_text) {
            record.security_type = type_for_keyword(caps.get(1).unwrap().as_str());
        }
    }
    if record.price.is_none() {
        record.price = price_labelled_in(row_text);
    }
    if record.value.is_none() {
        record.value = value_labelled_in(row_text);
    }
}

fn type_for_keyword(keyword: &str) -> Option<SecurityType> {
    match keyword {
        "Ordinary Bonds" | "Zero Bonds" | "Structured Bonds" | "Bond Funds" => {
            Some(SecurityType::Bond)
        }
        "Ordinary Stocks" | "Equities" | "Stocks" | "Shares" => Some(SecurityType::Equity),
        "ETF" => Some(SecurityType::Etf),
        _ => None,
    }
}

/// Scan the leading pages for the portfolio summary block.
pub(crate) fn summary_from(tables: &[Table]) -> PortfolioSummary {
    let mut summary = PortfolioSummary::default();
    for table in tables {
        let text = table.full_text();

        if summary.client_number.is_none() {
            if let Some(caps) = CLIENT_NUMBER.captures(&text) {
                summary.client_number = Some(caps.get(1).unwrap().as_str().to_owned());
            }
        }
        if summary.valuation_date.is_none() {
            if let Some(caps) = AS_OF_DATE.captures(&text) {
                summary.valuation_date =
                    chrono::NaiveDate::parse_from_str(caps.get(1).unwrap().as_str(), "%d.%m.%Y")
                        .ok();
            }
        }
        if summary.valuation_currency.is_none() {
            if let Some(caps) = VALUATION_CCY.captures(&text) {
                summary.valuation_currency = Some(caps.get(1).unwrap().as_str().to_owned());
            }
        }
        if summary.total_value.is_none() {
            if let Some(caps) = TOTAL_LABEL.captures(&text) {
                summary.total_value = Some(caps.get(1).unwrap().as_str().to_owned());
            }
        }

        for row in &table.cells {
            let row_text = Table::row_text(row);
            if row_text.contains("Total")
                && (row_text.contains("assets") || row_text.contains("portfolio"))
                && summary.total_value.is_none()
            {
                summary.total_value = row
                    .iter()
                    .find_map(|cell| CELL_NUMBER.find(cell).map(|m| m.as_str().to_owned()));
            }
            if row_text.contains("Performance") && row_text.contains('%') {
                if let Some(caps) = row.iter().find_map(|c| PERFORMANCE.captures(c)) {
                    summary.performance = Some(caps.get(1).unwrap().as_str().trim().to_owned());
                }
            }
        }
    }
    summary.total_value_float = summary.total_value.as_deref().and_then(parse_amount);
    summary
}

/// Asset-allocation categories with the words that disqualify a row. The
/// exclusions keep headline rows ("Total Assets") and cross-category rows
/// ("Bonds funds") from being mistaken for the category itself.
const CATEGORIES: [(&str, &[&str]); 5] = [
    ("Liquidity", &["Assets", "Asset"]),
    ("Bonds", &["funds", "Convertible", "Assets", "Asset"]),
    ("Equities", &["funds", "Assets", "Asset"]),
    ("Structured products", &["Bonds", "Equities", "Assets", "Asset"]),
    ("Other assets", &[]),
];

/// Scan the allocation pages for category rows.
pub(crate) fn allocation_from(tables: &[Table]) -> AssetAllocation {
    let mut allocation = AssetAllocation::default();
    for table in tables {
        for row in &table.cells {
            let row_text = Table::row_text(row);
            for (label, exclusions) in CATEGORIES {
                if !row_text.contains(label) || exclusions.iter().any(|e| row_text.contains(e)) {
                    continue;
                }
                if let Some(entry) = entry_from_row(row) {
                    match label {
                        "Liquidity" => allocation.liquidity = Some(entry),
                        "Bonds" => allocation.bonds = Some(entry),
                        "Equities" => allocation.equities = Some(entry),
                        "Structured products" => allocation.structured_products = Some(entry),
                        _ => allocation.other = Some(entry),
                    }
                }
            }
        }
    }
    allocation
}

/// The first numeric cell after the label column is the value; the first
/// later cell containing a percent sign is the share.
fn entry_from_row(row: &[String]) -> Option<AllocationEntry> {
    for (idx, cell) in row.iter().enumerate().skip(1) {
        let trimmed = cell.trim();
        if trimmed.is_empty() || !CELL_NUMBER.is_match(trimmed) {
            continue;
        }
        let percentage = row[idx + 1..]
            .iter()
            .find(|c| c.contains('%'))
            .map(|c| c.trim().to_owned());
        return Some(AllocationEntry {
            value: trimmed.to_owned(),
            value_float: parse_amount(trimmed),
            percentage,
        });
    }
    None
}
