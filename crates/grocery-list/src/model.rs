use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a grocery item.
///
/// Generated by the store at creation and immutable thereafter. The v4 UUID
/// space makes practical collision probability negligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One entry on the grocery list.
///
/// Two items with identical name and category but different ids are distinct
/// entries; the store never merges or deduplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub id: ItemId,
    pub name: String,
    /// Free-text quantity descriptor ("2 lbs", "a bunch"); not parsed.
    pub quantity: String,
    /// Free-text grouping key.
    pub category: String,
    pub checked: bool,
}

/// Caller-supplied fields for a new item. Blank-field rejection is a caller
/// concern; the store accepts drafts as given.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: String,
    pub category: String,
}

/// Partial update for an existing item. Absent fields keep their current
/// value.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub category: Option<String>,
    pub checked: Option<bool>,
}

/// One category bucket from the grouped projection, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub items: Vec<GroceryItem>,
}
