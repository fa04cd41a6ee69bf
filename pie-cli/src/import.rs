//! Import command handlers.
//!
//! `pie import export.csv` lists the position rows with their indices.
//! Adding `--map <row>=<pie>` assigns rows and imports them:
//!
//! ```text
//! pie import export.csv --account "Roth IRA" --map 0=1 --map 2=new:Bonds
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use pie_common::util::truncate_with_ellipsis;
use pie_common::{Config, Error};
use pie_core::import::{accounts, parse_positions, rows_for_account, Assignment, PieAssignment};
use pie_core::{PortfolioSession, PositionRow};

use crate::After;

/// Prefix marking a pie to be created by the import.
const NEW_PIE_PREFIX: &str = "new:";

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Brokerage positions export
    pub csv: std::path::PathBuf,

    /// Only use rows from this account; row indices count within it
    #[arg(long)]
    pub account: Option<String>,

    /// Assign a row: `<row>=<pie index>` or `<row>=new:<pie name>` (repeatable)
    #[arg(long = "map", value_name = "ROW=PIE", value_parser = parse_mapping)]
    pub mappings: Vec<Assignment>,
}

/// Parse one `--map` value.
pub fn parse_mapping(s: &str) -> std::result::Result<Assignment, String> {
    let (row, pie) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <row>=<pie>, got '{s}'"))?;

    let row: usize = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row index '{}'", row.trim()))?;

    let pie = pie.trim();
    let pie = match pie.strip_prefix(NEW_PIE_PREFIX) {
        Some(name) if name.trim().is_empty() => {
            return Err("new pie name must not be blank".into());
        }
        Some(name) => PieAssignment::New(name.trim().to_string()),
        None => PieAssignment::Existing(
            pie.parse()
                .map_err(|_| format!("invalid pie index '{pie}' (use new:<name> for a new pie)"))?,
        ),
    };

    Ok(Assignment { row, pie })
}

fn read_rows(csv: &Path, config: &Config) -> Result<Vec<PositionRow>> {
    let text = fs::read_to_string(csv)
        .with_context(|| format!("Failed to read {}", csv.display()))?;
    let rows = parse_positions(&text, &config.import).map_err(Error::from)?;
    Ok(rows)
}

fn row_line(index: usize, row: &PositionRow) -> String {
    format!(
        "[{index}] {:<10} {:<36} {:>10} {:>14}  {}",
        row.symbol,
        truncate_with_ellipsis(&row.description, 33),
        row.quantity,
        row.current_value,
        row.account_name,
    )
}

pub fn handle_import(
    args: &ImportArgs,
    session: &mut PortfolioSession,
    config: &Config,
    json: bool,
) -> Result<After> {
    let rows = read_rows(&args.csv, config)?;

    let selected: Vec<&PositionRow> = match &args.account {
        Some(account) => {
            let selected = rows_for_account(&rows, account);
            if selected.is_empty() {
                return Err(Error::NotFound(format!("account '{account}'")).into());
            }
            selected
        }
        None => rows.iter().collect(),
    };

    if args.mappings.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&selected)?);
        } else {
            for (i, row) in selected.iter().enumerate() {
                println!("{}", row_line(i, row));
            }
            println!();
            println!("Assign rows with --map <row>=<pie index> or --map <row>=new:<name>");
        }
        return Ok(After::Done);
    }

    let report = session.import(&selected, &args.mappings)?;
    if !json {
        println!(
            "Imported {} positions into {} pies ({} new)",
            report.imported,
            report.affected_pies.len(),
            report.created_pies.len()
        );
        println!();
    }
    Ok(After::SaveAndShow)
}

pub fn handle_accounts(csv: &Path, config: &Config, json: bool) -> Result<After> {
    let rows = read_rows(csv, config)?;
    let names = accounts(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if names.is_empty() {
        println!("No accounts found in {}", csv.display());
    } else {
        for name in &names {
            println!("{name} ({} positions)", rows_for_account(&rows, name).len());
        }
    }
    Ok(After::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping_existing_pie() {
        let assignment = parse_mapping("3=1").unwrap();
        assert_eq!(assignment.row, 3);
        assert_eq!(assignment.pie, PieAssignment::Existing(1));
    }

    #[test]
    fn test_parse_mapping_new_pie() {
        let assignment = parse_mapping(" 0 = new: Fixed income ").unwrap();
        assert_eq!(assignment.row, 0);
        assert_eq!(assignment.pie, PieAssignment::New("Fixed income".into()));
    }

    #[test]
    fn test_parse_mapping_errors() {
        assert!(parse_mapping("3").is_err());
        assert!(parse_mapping("x=1").is_err());
        assert!(parse_mapping("1=bonds").is_err());
        assert!(parse_mapping("1=new:  ").is_err());
    }

    #[test]
    fn test_handle_import_lists_then_imports() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("positions.csv");
        fs::write(
            &csv,
            "Account Number,Account Name,Symbol,Description,Quantity\n\
             A1,Taxable,VTI,Total market,3\n\
             A1,Taxable,BND,Total bond,2\n\
             B2,IRA,VXUS,Total intl,5\n",
        )
        .unwrap();

        let config = Config::default();
        let mut session = PortfolioSession::new(pie_core::Portfolio::default(), 1000.0);
        session.add_pie(Some("Core"));

        let preview = ImportArgs {
            csv: csv.clone(),
            account: Some("Taxable".into()),
            mappings: Vec::new(),
        };
        assert_eq!(handle_import(&preview, &mut session, &config, true).unwrap(), After::Done);
        assert_eq!(session.portfolio().pies[0].holdings.len(), 1);

        let import = ImportArgs {
            mappings: vec![parse_mapping("1=0").unwrap()],
            ..preview
        };
        assert_eq!(
            handle_import(&import, &mut session, &config, true).unwrap(),
            After::SaveAndShow
        );
        let names: Vec<&str> = session.portfolio().pies[0]
            .holdings
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(names, vec!["Cash", "BND"]);

        let unknown = ImportArgs {
            csv,
            account: Some("Brokerage".into()),
            mappings: Vec::new(),
        };
        let err = handle_import(&unknown, &mut session, &config, true).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>().map(Error::exit_code), Some(2));
    }
}
