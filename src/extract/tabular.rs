//! Tabular extraction: one row per security, with column meanings resolved
//! through the registry's header synonyms.
//!
//! A table qualifies once a row matches at least two logical columns by
//! synonym. Column resolution is longest-synonym-wins across columns, so
//! "Position Value" lands on the value column even though "position" alone
//! names a quantity. The generic variant relaxes the header requirement to
//! any row mentioning `ISIN` and falls back to cell-shape heuristics.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::categories::{Currency, SecurityType};
use crate::grammar::{
    self, bare_date_in, bare_quantity, looks_numeric, parse_amount, ISIN_ANY, ISIN_LOOSE,
};
use crate::model::SecurityRecord;
use crate::registry::{Column, FormatSpec};
use crate::tables::Table;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(\d+\.?\d*)\s*%").unwrap();
}

/// Minimum distinct column hits for a row to count as a header.
const MIN_HEADER_HITS: usize = 2;

pub(crate) fn extract(
    spec: &FormatSpec,
    tables: &[Table],
    currency: Currency,
) -> Vec<SecurityRecord> {
    let mut records = Vec::new();
    for table in tables {
        let Some((header_idx, columns)) = find_header(spec, table) else {
            continue;
        };
        for row in &table.cells[header_idx + 1..] {
            if let Some(record) = record_from_row(spec, &columns, row, table.page, currency) {
                records.push(record);
            }
        }
    }
    records
}

/// Locate the first row that resolves at least two logical columns.
fn find_header(spec: &FormatSpec, table: &Table) -> Option<(usize, HashMap<Column, usize>)> {
    for (idx, row) in table.cells.iter().enumerate() {
        let columns = map_columns(spec, row);
        if columns.len() >= MIN_HEADER_HITS {
            return Some((idx, columns));
        }
    }
    None
}

/// Assign each header cell to the logical column whose longest synonym it
/// contains; the first matching cell claims a column.
fn map_columns(spec: &FormatSpec, header: &[String]) -> HashMap<Column, usize> {
    let mut columns = HashMap::new();
    for (idx, cell) in header.iter().enumerate() {
        let lower = cell.trim().to_lowercase();
        if lower.is_empty() {
            continue;
        }
        let mut best: Option<(Column, usize)> = None;
        for (column, synonyms) in spec.synonyms {
            for synonym in *synonyms {
                if lower.contains(synonym)
                    && best.map_or(true, |(_, len)| synonym.len() > len)
                {
                    best = Some((*column, synonym.len()));
                }
            }
        }
        if let Some((column, _)) = best {
            columns.entry(column).or_insert(idx);
        }
    }
    columns
}

fn record_from_row(
    spec: &FormatSpec,
    columns: &HashMap<Column, usize>,
    row: &[String],
    page: u32,
    currency: Currency,
) -> Option<SecurityRecord> {
    let row_text = Table::row_text(row);
    if row_text.is_empty() {
        return None;
    }

    let mut record = SecurityRecord::new(page, currency);
    record.raw_details.push(row_text);

    record.ticker = cell_at(row, index_of(spec, columns, Column::Ticker))
        .filter(|c| is_ticker_like(c))
        .map(str::to_owned);
    record.isin = row
        .iter()
        .find_map(|cell| ISIN_ANY.captures(cell))
        .map(|caps| caps.get(1).unwrap().as_str().to_owned());
    record.description = cell_at(row, index_of(spec, columns, Column::Name))
        .filter(|c| c.len() > 5)
        .map(grammar::normalize_ws);

    record.quantity = numeric_at(row, index_of(spec, columns, Column::Quantity));
    record.price = numeric_at(row, index_of(spec, columns, Column::Price));
    record.value = numeric_at(row, index_of(spec, columns, Column::Value));
    if let Some(cell) = cell_at(row, columns.get(&Column::CurrencyCol).copied()) {
        if let Ok(code) = cell.parse() {
            record.currency = code;
        }
    }
    if let Some(cell) = cell_at(row, columns.get(&Column::Date).copied()) {
        record.maturity_date = bare_date_in(cell);
    }
    if let Some(description) = &record.description {
        record.security_type = inline_type(description);
    }

    let named = record.isin.is_some() || record.description.is_some() || record.ticker.is_some();
    let sized = record.quantity.is_some() || record.value.is_some();
    (named && sized).then_some(record)
}

/// The mapped column index, or the format's declared fallback.
fn index_of(spec: &FormatSpec, columns: &HashMap<Column, usize>, column: Column) -> Option<usize> {
    columns
        .get(&column)
        .copied()
        .or_else(|| spec.fallback_index(column))
}

fn cell_at(row: &[String], idx: Option<usize>) -> Option<&str> {
    let cell = row.get(idx?)?.trim();
    (!cell.is_empty()).then_some(cell)
}

fn numeric_at(row: &[String], idx: Option<usize>) -> Option<f64> {
    cell_at(row, idx)
        .filter(|c| looks_numeric(c))
        .and_then(parse_amount)
}

/// Short all-caps cells are ticker symbols; currency codes and the ISIN tag
/// itself are not.
fn is_ticker_like(cell: &str) -> bool {
    cell.len() <= 5
        && cell.chars().all(|c| c.is_ascii_uppercase())
        && !matches!(cell, "ISIN" | "USD" | "EUR" | "CHF" | "GBP" | "JPY" | "CAD" | "AUD" | "HKD")
}

/// Type hints that brokers encode directly in the description cell. Anything
/// subtler is left for the post-processor's keyword scan.
fn inline_type(description: &str) -> Option<SecurityType> {
    let lower = description.to_lowercase();
    if lower.contains("etf") {
        Some(SecurityType::Etf)
    } else if lower.contains("fund") || lower.contains("index") {
        Some(SecurityType::Fund)
    } else if lower.contains("bond") || lower.contains("treasury") {
        Some(SecurityType::Bond)
    } else if lower.contains("option") {
        Some(SecurityType::Option)
    } else {
        None
    }
}

/// Relaxed variant for unrecognized layouts: any row that tags an ISIN
/// becomes a record, with the remaining cells classified by shape.
pub(crate) fn extract_generic(tables: &[Table], currency: Currency) -> Vec<SecurityRecord> {
    let mut records = Vec::new();
    for table in tables {
        if !table.full_text().to_lowercase().contains("isin") {
            continue;
        }
        for row in &table.cells {
            let row_text = Table::row_text(row);
            let Some(caps) = ISIN_LOOSE.captures(&row_text) else {
                continue;
            };
            let isin = caps.get(1).unwrap().as_str().to_owned();

            let mut record = SecurityRecord::new(table.page, currency);
            record.raw_details.push(row_text);
            record.isin = Some(isin.clone());

            for cell in row {
                let cell = cell.trim();
                if cell.is_empty() || cell.contains(&isin) {
                    continue;
                }
                if record.maturity_date.is_none() {
                    record.maturity_date = bare_date_in(cell);
                }
                if record.coupon_rate.is_none() {
                    if let Some(caps) = PERCENT.captures(cell) {
                        record.coupon_rate = parse_amount(caps.get(1).unwrap().as_str());
                    }
                }
                if record.quantity.is_none() {
                    record.quantity = bare_quantity(cell);
                }
                if record.description.is_none() && cell.len() > 10 {
                    record.description = Some(grammar::normalize_ws(cell));
                }
            }
            records.push(record);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use crate::categories::{Currency, DocumentFormat, SecurityType};
    use crate::extract::tabular::{extract, extract_generic};
    use crate::registry::spec_for;
    use crate::tables::Table;

    fn table(page: u32, rows: &[&[&str]]) -> Table {
        Table {
            page,
            cells: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_tabular_header_mapping() {
        let spec = spec_for(DocumentFormat::InteractiveBrokers);
        let t = table(
            2,
            &[
                &["Open Positions"],
                &["Symbol", "Description", "Quantity", "Price", "Value"],
                &["AAPL", "Apple Inc Common Stock", "100", "150.00", "15,000.00"],
                &["", "", "", "", ""],
                &["MSFT", "Microsoft Corporation", "50", "300.00", "15,000.00"],
            ],
        );
        let records = extract(spec, &[t], Currency::Usd);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ticker.as_deref(), Some("AAPL"));
        assert_eq!(records[0].description.as_deref(), Some("Apple Inc Common Stock"));
        assert_eq!(records[0].quantity, Some(100.0));
        assert_eq!(records[0].price, Some(150.0));
        assert_eq!(records[0].value, Some(15_000.0));
        assert_eq!(records[1].ticker.as_deref(), Some("MSFT"));
    }

    #[test]
    fn test_tabular_alternate_header_synonyms() {
        let spec = spec_for(DocumentFormat::InteractiveBrokers);
        let t = table(
            3,
            &[
                &["Financial Instrument", "Position", "Market Price", "Market Value"],
                &["Tesla Inc", "25", "200.00", "5,000.00"],
            ],
        );
        let records = extract(spec, &[t], Currency::Usd);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description.as_deref(), Some("Tesla Inc"));
        assert_eq!(records[0].quantity, Some(25.0));
        assert_eq!(records[0].price, Some(200.0));
        assert_eq!(records[0].value, Some(5_000.0));
    }

    #[test]
    fn test_position_value_is_not_a_quantity() {
        let spec = spec_for(DocumentFormat::Etrade);
        let t = table(
            1,
            &[
                &["Symbol", "Name", "Shares", "Last Price", "Position Value"],
                &["VTI", "Vanguard Total Market", "10", "220.00", "2,200.00"],
            ],
        );
        let records = extract(spec, &[t], Currency::Usd);
        assert_eq!(records[0].quantity, Some(10.0));
        assert_eq!(records[0].value, Some(2_200.0));
    }

    #[test]
    fn test_vanguard_name_first_layout() {
        let spec = spec_for(DocumentFormat::Vanguard);
        let t = table(
            2,
            &[
                &["Fund Name", "Symbol", "Shares", "Price", "Balance"],
                &["Vanguard 500 Index Fund", "VFIAX", "12.5", "400.00", "5,000.00"],
            ],
        );
        let records = extract(spec, &[t], Currency::Usd);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].description.as_deref(),
            Some("Vanguard 500 Index Fund")
        );
        assert_eq!(records[0].ticker.as_deref(), Some("VFIAX"));
        assert_eq!(records[0].quantity, Some(12.5));
        assert_eq!(records[0].value, Some(5_000.0));
        assert_eq!(records[0].security_type, Some(SecurityType::Fund));
    }

    #[test]
    fn test_tabular_requires_name_and_size() {
        let spec = spec_for(DocumentFormat::Schwab);
        let t = table(
            1,
            &[
                &["Symbol", "Description", "Quantity", "Price", "Market Value"],
                // No name, ticker or identifier: discarded.
                &["", "", "5", "10.00", "50.00"],
                // No quantity or value: discarded.
                &["AAPL", "Apple Inc", "", "150.00", ""],
            ],
        );
        assert!(extract(spec, &[t], Currency::Usd).is_empty());
    }

    #[test]
    fn test_tabular_picks_up_isin_and_currency_cells() {
        let spec = spec_for(DocumentFormat::Schwab);
        let t = table(
            1,
            &[
                &["Symbol", "Description", "Quantity", "Price", "Value", "Currency"],
                &["NESN", "Nestlé SA registered", "10", "90.00", "900.00", "CHF"],
            ],
        );
        let records = extract(spec, &[t], Currency::Usd);
        assert_eq!(records[0].currency, Currency::Chf);

        let t2 = table(
            2,
            &[
                &["Security", "ISIN", "Quantity", "Price", "Position Value"],
                &["Apple common stock", "US0378331005", "100", "150.00", "15,000.00"],
            ],
        );
        let records = extract(spec, &[t2], Currency::Usd);
        assert_eq!(records[0].isin.as_deref(), Some("US0378331005"));
    }

    #[test]
    fn test_generic_extraction_by_shape() {
        let t = table(
            5,
            &[
                &["Holdings with ISIN codes"],
                &["ISIN: XS9876543210", "Structured note on index basket", "250'000", "21.06.2027", "4.25 %"],
                &["no identifier in this row", "123"],
            ],
        );
        let records = extract_generic(&[t], Currency::Eur);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.isin.as_deref(), Some("XS9876543210"));
        assert_eq!(
            record.description.as_deref(),
            Some("Structured note on index basket")
        );
        assert_eq!(record.quantity, Some(250_000.0));
        assert_eq!(
            record.maturity_date,
            chrono::NaiveDate::from_ymd_opt(2027, 6, 21)
        );
        assert_eq!(record.coupon_rate, Some(4.25));
        assert_eq!(record.source_page, 5);
    }

    #[test]
    fn test_generic_ignores_tables_without_isin() {
        let t = table(1, &[&["Totally unrelated", "data"], &["1", "2"]]);
        assert!(extract_generic(&[t], Currency::Usd).is_empty());
    }
}
