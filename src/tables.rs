//! The grid-of-strings abstraction the engine consumes, plus the adapter
//! over the external PDF text extractor.
//!
//! The engine never touches a PDF library directly: anything that can
//! produce page-indexed grids of string cells can drive an extraction. Cells
//! may be empty and rows may have varying lengths; every consumer tolerates
//! both.

use std::path::Path;

use crate::error::ExtractError;

/// One extracted table: a page number (1-based) and a grid of cells.
#[derive(Debug, Clone)]
pub struct Table {
    pub page: u32,
    pub cells: Vec<Vec<String>>,
}

impl Table {
    /// All cells of a row joined into one whitespace-normalized line.
    pub fn row_text(row: &[String]) -> String {
        let joined = row
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        crate::grammar::normalize_ws(&joined)
    }

    /// Every row of the table joined into one string, used for cheap
    /// "does this table mention X" checks.
    pub fn full_text(&self) -> String {
        self.cells
            .iter()
            .map(|row| Self::row_text(row))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which pages of the document to load.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PageRange {
    All,
    /// The first `n` pages.
    First(u32),
}

/// A source of tables for one document.
///
/// The bundled implementation reads PDFs through `pdf-extract`; tests and
/// the text entry point build grids directly. Each call re-reads the source;
/// no file handle outlives it.
pub trait TableSource {
    fn load_tables(&self, path: &Path, pages: PageRange) -> Result<Vec<Table>, ExtractError>;
}

/// Split raw document text into page grids.
///
/// Pages are separated by form feeds when the underlying extractor emits
/// them; otherwise the whole text is one page. Within a page, each line is a
/// row and cells are runs of text separated by two or more spaces or a tab.
pub fn grids_from_text(text: &str) -> Vec<Table> {
    text.split('\u{c}')
        .enumerate()
        .filter(|(_, page_text)| !page_text.trim().is_empty())
        .map(|(idx, page_text)| Table {
            page: idx as u32 + 1,
            cells: page_text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(split_cells)
                .collect(),
        })
        .collect()
}

fn split_cells(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    for piece in line.split('\t') {
        let mut current = String::new();
        let mut spaces = 0usize;
        for c in piece.chars() {
            if c == ' ' {
                spaces += 1;
                if spaces < 2 {
                    current.push(c);
                }
            } else {
                if spaces >= 2 && !current.trim().is_empty() {
                    cells.push(current.trim().to_owned());
                    current = String::new();
                }
                spaces = 0;
                current.push(c);
            }
        }
        if !current.trim().is_empty() {
            cells.push(current.trim().to_owned());
        }
    }
    cells
}

/// Adapter over `pdf-extract`. Stateless: every call re-reads the file.
#[cfg(feature = "pdf")]
#[derive(Debug, Default)]
pub struct PdfTableSource;

#[cfg(feature = "pdf")]
impl TableSource for PdfTableSource {
    fn load_tables(&self, path: &Path, pages: PageRange) -> Result<Vec<Table>, ExtractError> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| ExtractError::Adapter(e.to_string()))?;
        let mut tables = grids_from_text(&text);
        if let PageRange::First(n) = pages {
            tables.retain(|t| t.page <= n);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use crate::tables::{grids_from_text, Table};

    #[test]
    fn test_grids_split_on_form_feed() {
        let text = "Header line\nA  B  C\u{c}Second page  here";
        let tables = grids_from_text(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].page, 1);
        assert_eq!(tables[1].page, 2);
        assert_eq!(tables[0].cells[1], vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cells_split_on_wide_gaps() {
        let tables = grids_from_text("Apple Inc  100  $ 150.00\tUSD");
        assert_eq!(
            tables[0].cells[0],
            vec!["Apple Inc", "100", "$ 150.00", "USD"]
        );
    }

    #[test]
    fn test_row_text_skips_blank_cells() {
        let row = vec!["".to_owned(), "ISIN: US0378331005".to_owned(), " ".to_owned()];
        assert_eq!(Table::row_text(&row), "ISIN: US0378331005");
    }
}
