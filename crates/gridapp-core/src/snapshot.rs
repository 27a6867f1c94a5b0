use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an item in shared session state, e.g. a product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Full picture of a session-state topic as last pushed by the hub.
///
/// Every update carries the whole mapping, so a newer snapshot always
/// supersedes an older one completely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSnapshot {
    items: BTreeMap<ItemId, u32>,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: impl Into<ItemId>, quantity: u32) -> Self {
        self.items.insert(item.into(), quantity);
        self
    }

    /// Quantity held for `item`; absent items read as zero.
    pub fn quantity_of(&self, item: &ItemId) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.values().map(|&q| u64::from(q)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds `quantity` to `item`, saturating at `u32::MAX`.
    pub(crate) fn add(&mut self, item: ItemId, quantity: u32) {
        let entry = self.items.entry(item).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }
}

impl FromIterator<(ItemId, u32)> for SessionSnapshot {
    fn from_iter<T: IntoIterator<Item = (ItemId, u32)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
