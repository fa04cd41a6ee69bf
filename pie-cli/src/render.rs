//! Text and JSON output for the portfolio summary.

use anyhow::Result;
use pie_common::util::{format_currency, truncate_with_ellipsis};
use pie_core::{HoldingSummary, PieSummary, PortfolioSummary};

const NAME_WIDTH: usize = 24;
const DESCRIPTION_WIDTH: usize = 32;

fn lock_marker(locked: bool) -> &'static str {
    if locked {
        " [locked]"
    } else {
        ""
    }
}

pub fn pie_line(pie: &PieSummary) -> String {
    format!(
        "[{}] {:<width$} {:>3}% {:>12}{}",
        pie.index,
        truncate_with_ellipsis(&pie.name, NAME_WIDTH),
        pie.target,
        format_currency(pie.amount),
        lock_marker(pie.locked),
        width = NAME_WIDTH + 3,
    )
}

pub fn holding_line(pie_index: usize, holding: &HoldingSummary) -> String {
    let path = format!("{pie_index}-{}", holding.index);
    let mut line = format!(
        "    [{}] {:<width$} {:>3}% {:>12}{}",
        path,
        truncate_with_ellipsis(&holding.name, NAME_WIDTH - 4),
        holding.target,
        format_currency(holding.amount),
        lock_marker(holding.locked),
        width = NAME_WIDTH - 1,
    );
    if !holding.description.is_empty() {
        line.push_str("  ");
        line.push_str(&truncate_with_ellipsis(&holding.description, DESCRIPTION_WIDTH));
    }
    line
}

pub fn print_summary(summary: &PortfolioSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Investment:  {}", format_currency(summary.investment_amount));
    println!(
        "Total:       {}%{}",
        summary.total_target,
        if summary.balanced { "" } else { "  (does not add up to 100%)" }
    );

    if summary.pies.is_empty() {
        println!();
        println!("No pies yet. Add one with: pie add-pie <name>");
        return Ok(());
    }

    for pie in &summary.pies {
        println!();
        println!("{}", pie_line(pie));
        for holding in &pie.holdings {
            println!("{}", holding_line(pie.index, holding));
        }
        if pie.holdings_total != 100 {
            println!("    holdings add up to {}%", pie.holdings_total);
        }
    }
    Ok(())
}
