//! Position import from brokerage CSV exports.
//!
//! Two steps, matching how a user drives it:
//!
//! 1. [`parse_positions`] pulls position rows out of the export text.
//! 2. [`import_positions`] turns the rows the user assigned into holdings,
//!    creating pies on demand, and splits each touched pie equally.
//!
//! Only rows are extracted; quantities and values are carried for display and
//! never feed the allocation.

use std::collections::BTreeMap;

use pie_common::config::ImportConfig;
use pie_common::Error as CommonError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::mutations::{add_item, split_equally};
use crate::tree::{random_color, Holding, Pie, Portfolio};

/// Column headers read from the export.
pub mod columns {
    pub const ACCOUNT_NUMBER: &str = "Account Number";
    pub const ACCOUNT_NAME: &str = "Account Name";
    pub const SYMBOL: &str = "Symbol";
    pub const DESCRIPTION: &str = "Description";
    pub const QUANTITY: &str = "Quantity";
    pub const CURRENT_VALUE: &str = "Current Value";
    pub const GAIN_LOSS: &str = "Total Gain/Loss Dollar";
    pub const GAIN_LOSS_PERCENT: &str = "Total Gain/Loss Percent";
}

/// Column that must be non-empty for a line to count as a position.
const REQUIRED_COLUMN_INDEX: usize = 2;

/// Import failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("could not find a header row containing {0:?}")]
    MissingHeader(Vec<String>),

    #[error("no positions were assigned to a pie")]
    NothingSelected,

    #[error("row {0} does not exist")]
    UnknownRow(usize),

    #[error("pie {0} does not exist")]
    UnknownPie(usize),

    #[error("new pie name must not be blank")]
    BlankPieName,
}

impl From<ImportError> for CommonError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnknownRow(_) | ImportError::UnknownPie(_) => {
                CommonError::NotFound(err.to_string())
            }
            _ => CommonError::InvalidInput(err.to_string()),
        }
    }
}

// ============================================================================
// Row extraction
// ============================================================================

/// One position line of the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    pub account_number: String,
    pub account_name: String,
    pub symbol: String,
    pub description: String,
    pub quantity: String,
    pub current_value: String,
    pub gain_loss: String,
    pub gain_loss_percent: String,
}

impl PositionRow {
    fn from_columns(mut fields: BTreeMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key).unwrap_or_default();
        Self {
            account_number: take(columns::ACCOUNT_NUMBER),
            account_name: take(columns::ACCOUNT_NAME),
            symbol: take(columns::SYMBOL),
            description: take(columns::DESCRIPTION),
            quantity: take(columns::QUANTITY),
            current_value: take(columns::CURRENT_VALUE),
            gain_loss: take(columns::GAIN_LOSS),
            gain_loss_percent: take(columns::GAIN_LOSS_PERCENT),
        }
    }
}

/// Split one CSV line on commas outside double quotes. Quotes are dropped and
/// every field is trimmed.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Extract position rows from an export.
///
/// Lines before the header are ignored. Pending-activity lines and lines
/// shorter than the header are skipped; the footer disclaimer ends the table.
pub fn parse_positions(text: &str, config: &ImportConfig) -> Result<Vec<PositionRow>, ImportError> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();

    let header_index = lines
        .iter()
        .position(|line| config.header_markers.iter().all(|m| line.contains(m.as_str())))
        .ok_or_else(|| ImportError::MissingHeader(config.header_markers.clone()))?;

    let headers = split_csv_line(lines[header_index]);
    let mut rows = Vec::new();

    for line in &lines[header_index + 1..] {
        let values = split_csv_line(line);

        if values[0].contains(config.footer_marker.as_str()) {
            break;
        }

        let required = values.get(REQUIRED_COLUMN_INDEX).map(String::as_str).unwrap_or("");
        if values.len() < headers.len()
            || required.is_empty()
            || required.contains(config.skip_marker.as_str())
        {
            continue;
        }

        let fields: BTreeMap<String, String> = headers.iter().cloned().zip(values).collect();
        let row = PositionRow::from_columns(fields);

        if !row.symbol.is_empty() && row.symbol != columns::SYMBOL {
            rows.push(row);
        }
    }

    debug!(rows = rows.len(), header_line = header_index, "Parsed position export");
    Ok(rows)
}

/// Distinct non-empty account names, in order of first appearance.
pub fn accounts(rows: &[PositionRow]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        if !row.account_name.is_empty() && !seen.contains(&row.account_name) {
            seen.push(row.account_name.clone());
        }
    }
    seen
}

/// Rows belonging to one account.
pub fn rows_for_account<'a>(rows: &'a [PositionRow], account: &str) -> Vec<&'a PositionRow> {
    rows.iter().filter(|row| row.account_name == account).collect()
}

// ============================================================================
// Mapping rows into the tree
// ============================================================================

/// Where an imported row goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PieAssignment {
    /// An existing pie, by index.
    Existing(usize),
    /// A pie created by this import. Rows naming the same new pie share it.
    New(String),
}

/// A row picked by the user and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Index into the row list passed to [`import_positions`].
    pub row: usize,
    pub pie: PieAssignment,
}

/// Result of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    /// Pies that received holdings, in first-touched order.
    pub affected_pies: Vec<usize>,
    /// Pies this import created.
    pub created_pies: Vec<usize>,
}

/// Add the assigned rows as holdings.
///
/// Every assignment is checked before anything changes. New pies enter the
/// top-level group at 0% through the usual add path. Each holding starts at
/// 0%; afterwards every affected pie is split equally across all of its
/// holdings.
pub fn import_positions<R>(
    portfolio: &mut Portfolio,
    rows: &[R],
    assignments: &[Assignment],
) -> Result<ImportReport, ImportError>
where
    R: std::borrow::Borrow<PositionRow>,
{
    if assignments.is_empty() {
        return Err(ImportError::NothingSelected);
    }

    for assignment in assignments {
        if assignment.row >= rows.len() {
            return Err(ImportError::UnknownRow(assignment.row));
        }
        match &assignment.pie {
            PieAssignment::Existing(i) if *i >= portfolio.pies.len() => {
                return Err(ImportError::UnknownPie(*i));
            }
            PieAssignment::New(name) if name.trim().is_empty() => {
                return Err(ImportError::BlankPieName);
            }
            _ => {}
        }
    }

    let mut report = ImportReport::default();
    let mut created: Vec<(String, usize)> = Vec::new();

    for assignment in assignments {
        let pie_index = match &assignment.pie {
            PieAssignment::Existing(i) => *i,
            PieAssignment::New(name) => {
                let name = name.trim();
                match created.iter().find(|(n, _)| n == name) {
                    Some((_, i)) => *i,
                    None => {
                        let i = add_item(&mut portfolio.pies, Pie::empty(name), 0);
                        created.push((name.to_string(), i));
                        report.created_pies.push(i);
                        i
                    }
                }
            }
        };

        let row = rows[assignment.row].borrow();
        portfolio.pies[pie_index].holdings.push(Holding {
            name: row.symbol.clone(),
            description: row.description.clone(),
            target: 0,
            color: random_color(),
            locked: false,
        });

        if !report.affected_pies.contains(&pie_index) {
            report.affected_pies.push(pie_index);
        }
        report.imported += 1;
    }

    for &pie_index in &report.affected_pies {
        split_equally(&mut portfolio.pies[pie_index].holdings);
    }

    info!(
        imported = report.imported,
        affected = report.affected_pies.len(),
        created = report.created_pies.len(),
        "Imported positions"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Brokerage positions as of 01/02/2025

Account Number,Account Name,Symbol,Description,Quantity,Last Price,Current Value,Total Gain/Loss Dollar,Total Gain/Loss Percent
X1234,Individual,FXAIX,FIDELITY 500 INDEX FUND,10.5,$190.00,\"$1,995.00\",+$95.00,+5.00%
X1234,Individual,SPAXX**,HELD IN MONEY MARKET,,,$250.00,,
X1234,Individual,Pending activity,,,,$-20.00,,
Z9876,Roth IRA,VTI,VANGUARD TOTAL STOCK MARKET ETF,3,$250.00,$750.00,+$30.00,+4.17%
Z9876,Roth IRA,,missing symbol,1,$1.00,$1.00,,
short,line

\"The data and information in this spreadsheet is provided to you solely for your use.\"
Y000,Other,SHOULD_NOT_APPEAR,after disclaimer,1,$1,$1,,
";

    #[test]
    fn test_split_csv_line_handles_quotes() {
        assert_eq!(
            split_csv_line(r#"a, "b,c" ,d"#),
            vec!["a".to_string(), "b,c".to_string(), "d".to_string()]
        );
        assert_eq!(split_csv_line(""), vec![String::new()]);
    }

    #[test]
    fn test_parse_positions() {
        let rows = parse_positions(EXPORT, &ImportConfig::default()).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["FXAIX", "SPAXX**", "VTI"]);

        let first = &rows[0];
        assert_eq!(first.account_number, "X1234");
        assert_eq!(first.description, "FIDELITY 500 INDEX FUND");
        assert_eq!(first.current_value, "$1,995.00");
        assert_eq!(first.gain_loss_percent, "+5.00%");
    }

    #[test]
    fn test_disclaimer_ends_the_table() {
        let text = "\
Account Number,Account Name,Symbol,Description
A1,Taxable,VTI,Total market
The data and information in this spreadsheet is provided to you solely for your use.
A1,Taxable,BND,Total bond
";
        let rows = parse_positions(text, &ImportConfig::default()).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["VTI"]);
    }

    #[test]
    fn test_missing_header() {
        let err = parse_positions("a,b,c\n1,2,3", &ImportConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::MissingHeader(_)));
    }

    #[test]
    fn test_accounts_in_first_seen_order() {
        let rows = parse_positions(EXPORT, &ImportConfig::default()).unwrap();
        assert_eq!(accounts(&rows), vec!["Individual", "Roth IRA"]);
        assert_eq!(rows_for_account(&rows, "Roth IRA").len(), 1);
    }

    fn rows(symbols: &[&str]) -> Vec<PositionRow> {
        symbols
            .iter()
            .map(|s| PositionRow {
                symbol: s.to_string(),
                description: format!("{s} fund"),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_import_into_empty_pie_splits_equally() {
        let mut portfolio = Portfolio::new(vec![Pie::empty("Stocks")]);
        portfolio.pies[0].target = 100;
        let rows = rows(&["A", "B", "C"]);
        let assignments: Vec<Assignment> = (0..3)
            .map(|row| Assignment {
                row,
                pie: PieAssignment::Existing(0),
            })
            .collect();

        let report = import_positions(&mut portfolio, &rows, &assignments).unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.affected_pies, vec![0]);

        let holdings = &portfolio.pies[0].holdings;
        let targets: Vec<u8> = holdings.iter().map(|h| h.target).collect();
        assert_eq!(targets, vec![34, 33, 33]);
        assert_eq!(holdings[1].description, "B fund");
    }

    #[test]
    fn test_import_includes_existing_holdings_in_split() {
        let mut portfolio = Portfolio::new(vec![Pie::new("Stocks")]);
        let rows = rows(&["VTI"]);
        let assignments = vec![Assignment {
            row: 0,
            pie: PieAssignment::Existing(0),
        }];

        import_positions(&mut portfolio, &rows, &assignments).unwrap();
        let targets: Vec<u8> = portfolio.pies[0].holdings.iter().map(|h| h.target).collect();
        assert_eq!(targets, vec![50, 50]);
    }

    #[test]
    fn test_import_creates_named_pie_once() {
        let mut portfolio = Portfolio::default();
        let rows = rows(&["BND", "BNDX"]);
        let assignments = vec![
            Assignment {
                row: 0,
                pie: PieAssignment::New("Bonds".into()),
            },
            Assignment {
                row: 1,
                pie: PieAssignment::New(" Bonds ".into()),
            },
        ];

        let report = import_positions(&mut portfolio, &rows, &assignments).unwrap();
        assert_eq!(report.created_pies, vec![0]);
        assert_eq!(portfolio.pies.len(), 1);
        assert_eq!(portfolio.pies[0].name, "Bonds");
        assert_eq!(portfolio.pies[0].target, 100);
        let targets: Vec<u8> = portfolio.pies[0].holdings.iter().map(|h| h.target).collect();
        assert_eq!(targets, vec![50, 50]);
    }

    #[test]
    fn test_import_validates_before_mutating() {
        let mut portfolio = Portfolio::new(vec![Pie::new("Stocks")]);
        let before = portfolio.clone();
        let rows = rows(&["A"]);

        let bad_pie = vec![
            Assignment {
                row: 0,
                pie: PieAssignment::New("Fresh".into()),
            },
            Assignment {
                row: 0,
                pie: PieAssignment::Existing(4),
            },
        ];
        assert_eq!(
            import_positions(&mut portfolio, &rows, &bad_pie),
            Err(ImportError::UnknownPie(4))
        );
        assert_eq!(portfolio, before);

        let bad_row = vec![Assignment {
            row: 9,
            pie: PieAssignment::Existing(0),
        }];
        assert_eq!(
            import_positions(&mut portfolio, &rows, &bad_row),
            Err(ImportError::UnknownRow(9))
        );
        assert_eq!(
            import_positions(&mut portfolio, &rows, &[]),
            Err(ImportError::NothingSelected)
        );
    }

    #[test]
    fn test_import_error_maps_to_common_error() {
        assert!(CommonError::from(ImportError::UnknownPie(1)).is_not_found());
        assert!(matches!(
            CommonError::from(ImportError::NothingSelected),
            CommonError::InvalidInput(_)
        ));
    }
}
