//! Portfolio Session.
//!
//! Owns the allocation tree and the investment amount, and exposes every
//! user-level operation by item path. Front ends load a session from a
//! [`SnapshotStore`], apply one or more operations, and save it back.

use pie_common::{Error, Result};
use tracing::{debug, info};

use crate::import::{self, Assignment, ImportReport, PositionRow};
use crate::mutations::{add_item, remove_item};
use crate::rebalance::RebalanceOutcome;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::summary::PortfolioSummary;
use crate::tree::{Holding, ItemPath, Pie, Portfolio, DEFAULT_PIE_NAME};

/// The user's working state.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSession {
    portfolio: Portfolio,
    investment_amount: f64,
}

impl PortfolioSession {
    pub fn new(portfolio: Portfolio, investment_amount: f64) -> Self {
        Self {
            portfolio,
            investment_amount,
        }
    }

    /// Build from a loaded snapshot. `default_amount` fills in a missing or
    /// unusable investment amount.
    pub fn from_snapshot(snapshot: Snapshot, default_amount: f64) -> Self {
        let investment_amount = snapshot
            .investment_amount
            .filter(|amount| amount.is_finite() && *amount >= 0.0)
            .unwrap_or(default_amount);

        Self::new(snapshot.portfolio, investment_amount)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(self.portfolio.clone(), self.investment_amount)
    }

    pub fn load(store: &dyn SnapshotStore, default_amount: f64) -> Result<Self> {
        let session = Self::from_snapshot(store.load()?, default_amount);
        debug!(
            pies = session.portfolio.pies.len(),
            investment = session.investment_amount,
            "Loaded session"
        );
        Ok(session)
    }

    /// Persist the current state, stamping the save time.
    pub fn save(&self, store: &dyn SnapshotStore) -> Result<()> {
        let mut snapshot = self.to_snapshot();
        snapshot.saved_at = Some(chrono::Utc::now());
        store.save(&snapshot)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn investment_amount(&self) -> f64 {
        self.investment_amount
    }

    pub fn summary(&self) -> PortfolioSummary {
        PortfolioSummary::build(&self.portfolio, self.investment_amount)
    }

    // ========================================================================
    // Target edits
    // ========================================================================

    /// Set the target at `path` and rebalance its siblings.
    pub fn set_target(&mut self, path: ItemPath, target: i32) -> Result<RebalanceOutcome> {
        self.portfolio.ensure_exists(path)?;
        let outcome = self.portfolio.group_mut(path)?.rebalance_at(path.index(), target);
        info!(%path, requested = target, ?outcome, "Set target");
        Ok(outcome)
    }

    /// Flip the lock at `path`. Returns the new lock state.
    pub fn toggle_lock(&mut self, path: ItemPath) -> Result<bool> {
        self.portfolio.ensure_exists(path)?;
        let locked = self.portfolio.group_mut(path)?.toggle_lock_at(path.index());
        info!(%path, locked, "Toggled lock");
        Ok(locked)
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Append a pie at 0% holding only the Cash placeholder.
    pub fn add_pie(&mut self, name: Option<&str>) -> ItemPath {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PIE_NAME);
        ItemPath::Pie(add_item(&mut self.portfolio.pies, Pie::new(name), 0))
    }

    /// Append a holding at 0% to the pie at `pie`.
    ///
    /// Without a name or description the holding is labelled after its
    /// position, e.g. `New Holding 3` / `Description 3`.
    pub fn add_holding(
        &mut self,
        pie: usize,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<ItemPath> {
        let holdings = &mut self.portfolio.pie_mut(pie)?.holdings;
        let ordinal = holdings.len() + 1;

        let holding = Holding::new(
            name.map(str::to_string)
                .unwrap_or_else(|| format!("New Holding {ordinal}")),
            description
                .map(str::to_string)
                .unwrap_or_else(|| format!("Description {ordinal}")),
            0,
        );

        Ok(ItemPath::Holding(pie, add_item(holdings, holding, 0)))
    }

    /// Remove the item at `path`, handing its share to the unlocked siblings.
    ///
    /// A pie never ends up without holdings: removing its last one brings the
    /// Cash placeholder back. Removing the last pie leaves an empty portfolio.
    pub fn remove(&mut self, path: ItemPath) -> Result<()> {
        self.portfolio.ensure_exists(path)?;

        match path {
            ItemPath::Pie(i) => {
                let removed = remove_item(&mut self.portfolio.pies, i);
                info!(%path, name = %removed.name, "Removed pie");
            }
            ItemPath::Holding(p, h) => {
                let holdings = &mut self.portfolio.pie_mut(p)?.holdings;
                let removed = remove_item(holdings, h);
                if holdings.is_empty() {
                    holdings.push(Holding::placeholder());
                    debug!(pie = p, "Pie emptied, restored placeholder");
                }
                info!(%path, name = %removed.name, "Removed holding");
            }
        }
        Ok(())
    }

    /// Replace a pie's holdings with the Cash placeholder at 100%.
    pub fn clear_holdings(&mut self, pie: usize) -> Result<()> {
        let pie_ref = self.portfolio.pie_mut(pie)?;
        let cleared = pie_ref.holdings.len();
        pie_ref.holdings = vec![Holding::placeholder()];
        info!(pie, cleared, "Cleared holdings");
        Ok(())
    }

    pub fn rename(&mut self, path: ItemPath, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be blank".into()));
        }
        self.portfolio.item_mut(path)?.set_name(name.to_string());
        debug!(%path, name, "Renamed");
        Ok(())
    }

    /// Set a holding's description. Pies have none.
    pub fn describe(&mut self, path: ItemPath, description: &str) -> Result<()> {
        self.portfolio.holding_mut(path)?.description = description.to_string();
        debug!(%path, "Updated description");
        Ok(())
    }

    pub fn set_investment_amount(&mut self, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::InvalidInput(format!(
                "investment amount must be a non-negative number, got {amount}"
            )));
        }
        self.investment_amount = amount;
        debug!(amount, "Set investment amount");
        Ok(())
    }

    /// Drop every pie. The investment amount stays.
    pub fn start_over(&mut self) {
        let dropped = self.portfolio.pies.len();
        self.portfolio = Portfolio::default();
        info!(dropped, "Started over");
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Add brokerage rows as holdings. See [`import::import_positions`].
    pub fn import<R>(&mut self, rows: &[R], assignments: &[Assignment]) -> Result<ImportReport>
    where
        R: std::borrow::Borrow<PositionRow>,
    {
        Ok(import::import_positions(&mut self.portfolio, rows, assignments)?)
    }
}
