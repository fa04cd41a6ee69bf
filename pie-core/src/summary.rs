//! Read-only portfolio summary for front ends.
//!
//! Amounts cascade down the tree: a pie's amount is its share of the
//! investment, and a holding's amount is its share of the pie's amount.

use std::fmt;

use serde::Serialize;

use crate::tree::{Portfolio, FULL_ALLOCATION};

/// Currency amount for `target` percent of `parent`.
pub fn share_of(target: u8, parent: f64) -> f64 {
    f64::from(target) / f64::from(FULL_ALLOCATION) * parent
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingSummary {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub target: u8,
    pub locked: bool,
    pub color: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSummary {
    pub index: usize,
    pub name: String,
    pub target: u8,
    pub locked: bool,
    pub color: String,
    pub amount: f64,
    /// Sum of the holdings' targets; 100 unless locks prevent it.
    pub holdings_total: u32,
    pub holdings: Vec<HoldingSummary>,
}

/// Everything a renderer needs, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub investment_amount: f64,
    /// Sum of the pies' targets.
    pub total_target: u32,
    /// Whether `total_target` is exactly 100.
    pub balanced: bool,
    pub pies: Vec<PieSummary>,
}

impl PortfolioSummary {
    pub fn build(portfolio: &Portfolio, investment_amount: f64) -> Self {
        let pies = portfolio
            .pies
            .iter()
            .enumerate()
            .map(|(index, pie)| {
                let amount = share_of(pie.target, investment_amount);
                let holdings = pie
                    .holdings
                    .iter()
                    .enumerate()
                    .map(|(index, holding)| HoldingSummary {
                        index,
                        name: holding.name.clone(),
                        description: holding.description.clone(),
                        target: holding.target,
                        locked: holding.locked,
                        color: holding.color.clone(),
                        amount: share_of(holding.target, amount),
                    })
                    .collect();

                PieSummary {
                    index,
                    name: pie.name.clone(),
                    target: pie.target,
                    locked: pie.locked,
                    color: pie.color.clone(),
                    amount,
                    holdings_total: pie.holdings_total(),
                    holdings,
                }
            })
            .collect();

        let total_target = portfolio.total_target();
        Self {
            investment_amount,
            total_target,
            balanced: total_target == u32::from(FULL_ALLOCATION),
            pies,
        }
    }
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pies, total {}%{}",
            self.pies.len(),
            self.total_target,
            if self.balanced { "" } else { " (unbalanced)" }
        )
    }
}
