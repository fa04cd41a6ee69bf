//! Allocation Tree.
//!
//! Two levels: the portfolio's pies, and each pie's holdings. Either level is
//! a *sibling group* whose targets should add up to 100.

use std::fmt;
use std::str::FromStr;

use pie_common::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::mutations;
use crate::rebalance::{rebalance, RebalanceOutcome};

/// The whole of a sibling group.
pub const FULL_ALLOCATION: u8 = 100;

/// Name of the placeholder holding every new pie starts with.
pub const PLACEHOLDER_NAME: &str = "Cash";

/// Description of the placeholder holding.
pub const PLACEHOLDER_DESCRIPTION: &str = "Placeholder cash balance";

/// Display color of the placeholder holding.
pub const PLACEHOLDER_COLOR: &str = "#f0f0f0";

/// Name given to pies created without one.
pub const DEFAULT_PIE_NAME: &str = "New Pie";

/// Random `#rrggbb` color for a new pie or holding.
pub fn random_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=0x00ff_ffff);
    format!("#{value:06x}")
}

/// Accepts any JSON number and clamps it into `0..=100`.
///
/// Older snapshots were written by a dynamically typed front end and may
/// carry fractional or out-of-range targets.
fn deserialize_target<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_percent(raw))
}

/// Round half away from zero and clamp into `0..=100`.
pub(crate) fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(FULL_ALLOCATION)) as u8
}

// ============================================================================
// Allocation trait
// ============================================================================

/// What the rebalancer needs from a member of a sibling group.
pub trait Allocation {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn target(&self) -> u8;
    fn set_target(&mut self, target: u8);
    fn is_locked(&self) -> bool;
    fn set_locked(&mut self, locked: bool);
    fn color(&self) -> &str;
}

// ============================================================================
// Holding
// ============================================================================

/// A sub-allocation inside a pie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Percentage of the parent pie (0-100)
    #[serde(default, deserialize_with = "deserialize_target")]
    pub target: u8,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub locked: bool,
}

impl Holding {
    /// Unlocked holding with a random color.
    pub fn new(name: impl Into<String>, description: impl Into<String>, target: u8) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target: target.min(FULL_ALLOCATION),
            color: random_color(),
            locked: false,
        }
    }

    /// The "Cash" holding that keeps a pie from being empty.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_NAME.into(),
            description: PLACEHOLDER_DESCRIPTION.into(),
            target: FULL_ALLOCATION,
            color: PLACEHOLDER_COLOR.into(),
            locked: false,
        }
    }
}

impl Allocation for Holding {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn target(&self) -> u8 {
        self.target
    }

    fn set_target(&mut self, target: u8) {
        self.target = target;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn color(&self) -> &str {
        &self.color
    }
}

// ============================================================================
// Pie
// ============================================================================

/// A top-level allocation category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pie {
    /// Opaque identifier, absent in old snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Percentage of the total investment (0-100)
    #[serde(default, deserialize_with = "deserialize_target")]
    pub target: u8,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub locked: bool,
    /// Display order only
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl Pie {
    /// New pie at 0% holding only the Cash placeholder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            holdings: vec![Holding::placeholder()],
            ..Self::empty(name)
        }
    }

    /// New pie at 0% with no holdings. Only the importer creates these, and
    /// fills them straight away.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            id: Some(format!("pie-{}", uuid::Uuid::new_v4())),
            name: name.into(),
            target: 0,
            color: random_color(),
            locked: false,
            holdings: Vec::new(),
        }
    }

    /// Sum of the holdings' targets.
    pub fn holdings_total(&self) -> u32 {
        total_target(&self.holdings)
    }
}

impl Allocation for Pie {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn target(&self) -> u8 {
        self.target
    }

    fn set_target(&mut self, target: u8) {
        self.target = target;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn color(&self) -> &str {
        &self.color
    }
}

/// Sum of targets over a group.
pub fn total_target<T: Allocation>(group: &[T]) -> u32 {
    group.iter().map(|item| u32::from(item.target())).sum()
}

// ============================================================================
// Item paths
// ============================================================================

/// Address of a pie or a holding. Written `"2"` or `"2-0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemPath {
    Pie(usize),
    Holding(usize, usize),
}

impl ItemPath {
    /// Index of the item inside its sibling group.
    pub fn index(&self) -> usize {
        match *self {
            Self::Pie(i) | Self::Holding(_, i) => i,
        }
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pie(i) => write!(f, "{i}"),
            Self::Holding(p, h) => write!(f, "{p}-{h}"),
        }
    }
}

impl FromStr for ItemPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("invalid item path '{s}'")))
        };

        match s.split_once('-') {
            None => Ok(Self::Pie(parse(s)?)),
            Some((pie, holding)) => Ok(Self::Holding(parse(pie)?, parse(holding)?)),
        }
    }
}

// ============================================================================
// Sibling groups
// ============================================================================

/// Object-safe view of a sibling group, so pies and holdings can be handled
/// through one path-addressed API.
pub trait SiblingGroup {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn item(&self, index: usize) -> Option<&dyn Allocation>;

    fn item_mut(&mut self, index: usize) -> Option<&mut dyn Allocation>;

    fn total_target(&self) -> u32;

    /// See [`crate::rebalance::rebalance`].
    fn rebalance_at(&mut self, index: usize, new_target: i32) -> RebalanceOutcome;

    /// See [`crate::mutations::toggle_lock`].
    fn toggle_lock_at(&mut self, index: usize) -> bool;

    /// See [`crate::mutations::remove_item`]. Returns the freed target.
    fn remove_at(&mut self, index: usize) -> u8;
}

impl<T: Allocation> SiblingGroup for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn item(&self, index: usize) -> Option<&dyn Allocation> {
        self.get(index).map(|item| item as &dyn Allocation)
    }

    fn item_mut(&mut self, index: usize) -> Option<&mut dyn Allocation> {
        self.get_mut(index).map(|item| item as &mut dyn Allocation)
    }

    fn total_target(&self) -> u32 {
        total_target(self)
    }

    fn rebalance_at(&mut self, index: usize, new_target: i32) -> RebalanceOutcome {
        rebalance(self, index, new_target)
    }

    fn toggle_lock_at(&mut self, index: usize) -> bool {
        mutations::toggle_lock(self, index)
    }

    fn remove_at(&mut self, index: usize) -> u8 {
        mutations::remove_item(self, index).target()
    }
}

// ============================================================================
// Portfolio
// ============================================================================

/// The allocation tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    pub pies: Vec<Pie>,
}

impl Portfolio {
    pub fn new(pies: Vec<Pie>) -> Self {
        Self { pies }
    }

    pub fn is_empty(&self) -> bool {
        self.pies.is_empty()
    }

    /// Sum of the pies' targets, shown to the user as the total indicator.
    pub fn total_target(&self) -> u32 {
        total_target(&self.pies)
    }

    pub fn pie(&self, index: usize) -> Result<&Pie> {
        self.pies
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("pie {index}")))
    }

    pub fn pie_mut(&mut self, index: usize) -> Result<&mut Pie> {
        self.pies
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("pie {index}")))
    }

    /// The sibling group `path` lives in. Only the parent pie is checked; the
    /// item itself may be out of range.
    pub fn group(&self, path: ItemPath) -> Result<&dyn SiblingGroup> {
        match path {
            ItemPath::Pie(_) => Ok(&self.pies),
            ItemPath::Holding(p, _) => Ok(&self.pie(p)?.holdings),
        }
    }

    /// Mutable form of [`Portfolio::group`].
    pub fn group_mut(&mut self, path: ItemPath) -> Result<&mut dyn SiblingGroup> {
        match path {
            ItemPath::Pie(_) => Ok(&mut self.pies),
            ItemPath::Holding(p, _) => Ok(&mut self.pie_mut(p)?.holdings),
        }
    }

    /// The item at `path`.
    pub fn item(&self, path: ItemPath) -> Result<&dyn Allocation> {
        self.group(path)?
            .item(path.index())
            .ok_or_else(|| Error::NotFound(format!("item {path}")))
    }

    /// Mutable form of [`Portfolio::item`].
    pub fn item_mut(&mut self, path: ItemPath) -> Result<&mut dyn Allocation> {
        self.group_mut(path)?
            .item_mut(path.index())
            .ok_or_else(|| Error::NotFound(format!("item {path}")))
    }

    /// Fail with `NotFound` unless `path` addresses an existing item.
    pub fn ensure_exists(&self, path: ItemPath) -> Result<()> {
        self.item(path).map(|_| ())
    }

    /// Holding at `path`, for fields only holdings carry.
    pub fn holding_mut(&mut self, path: ItemPath) -> Result<&mut Holding> {
        match path {
            ItemPath::Holding(p, h) => self
                .pie_mut(p)?
                .holdings
                .get_mut(h)
                .ok_or_else(|| Error::NotFound(format!("item {path}"))),
            ItemPath::Pie(_) => Err(Error::InvalidInput(format!(
                "path {path} addresses a pie, not a holding"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Portfolio {
        let mut stocks = Pie::new("Stocks");
        stocks.target = 60;
        stocks.holdings = vec![Holding::new("VTI", "Total market", 70), Holding::new("VXUS", "", 30)];
        let mut bonds = Pie::new("Bonds");
        bonds.target = 40;
        Portfolio::new(vec![stocks, bonds])
    }

    #[test]
    fn test_new_pie_has_cash_placeholder() {
        let pie = Pie::new("Growth");
        assert_eq!(pie.target, 0);
        assert!(!pie.locked);
        assert_eq!(pie.holdings, vec![Holding::placeholder()]);
        assert_eq!(pie.holdings_total(), 100);
        assert!(pie.id.as_deref().unwrap().starts_with("pie-"));
    }

    #[test]
    fn test_random_color_format() {
        for _ in 0..50 {
            let color = random_color();
            assert_eq!(color.len(), 7);
            assert!(color.starts_with('#'));
            assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_item_path_parse_and_display() {
        assert_eq!("3".parse::<ItemPath>().unwrap(), ItemPath::Pie(3));
        assert_eq!("1-4".parse::<ItemPath>().unwrap(), ItemPath::Holding(1, 4));
        assert_eq!(ItemPath::Holding(0, 2).to_string(), "0-2");
        assert!("x".parse::<ItemPath>().is_err());
        assert!("1-".parse::<ItemPath>().is_err());
        assert!("-1".parse::<ItemPath>().is_err());
    }

    #[test]
    fn test_group_addressing() {
        let mut portfolio = sample();
        assert_eq!(portfolio.group(ItemPath::Pie(7)).unwrap().len(), 2);
        assert_eq!(portfolio.group(ItemPath::Holding(0, 9)).unwrap().len(), 2);
        assert_eq!(portfolio.group(ItemPath::Holding(0, 0)).unwrap().total_target(), 100);
        assert!(matches!(
            portfolio.group(ItemPath::Holding(5, 0)),
            Err(e) if e.is_not_found()
        ));

        assert_eq!(portfolio.item(ItemPath::Holding(0, 1)).unwrap().name(), "VXUS");
        assert!(portfolio.item(ItemPath::Pie(2)).is_err());

        portfolio.item_mut(ItemPath::Pie(1)).unwrap().set_locked(true);
        assert!(portfolio.pies[1].locked);
    }

    #[test]
    fn test_holding_mut_rejects_pie_path() {
        let mut portfolio = sample();
        assert!(matches!(
            portfolio.holding_mut(ItemPath::Pie(0)),
            Err(Error::InvalidInput(_))
        ));
        portfolio.holding_mut(ItemPath::Holding(0, 0)).unwrap().description = "US".into();
        assert_eq!(portfolio.pies[0].holdings[0].description, "US");
    }

    #[test]
    fn test_legacy_fields_default() {
        let json = r#"[{"name":"Old","target":55.6,"holdings":[{"name":"X","target":100}]}]"#;
        let portfolio: Portfolio = serde_json::from_str(json).unwrap();
        let pie = &portfolio.pies[0];
        assert!(!pie.locked);
        assert!(pie.id.is_none());
        assert_eq!(pie.target, 56);
        assert!(!pie.holdings[0].locked);
        assert_eq!(pie.holdings[0].description, "");
    }

    #[test]
    fn test_out_of_range_targets_are_clamped_on_load() {
        let json = r#"[{"name":"A","target":-3},{"name":"B","target":250}]"#;
        let portfolio: Portfolio = serde_json::from_str(json).unwrap();
        assert_eq!(portfolio.pies[0].target, 0);
        assert_eq!(portfolio.pies[1].target, 100);
    }
}
