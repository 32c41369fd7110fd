use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{ItemKey, LocationScope};

pub const UNKNOWN_AREA: &str = "unknown";

/// Hand-written notes about one location scope: where it is, and tags that
/// describe how hard or how special it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotAnnotation {
    pub text: String,
    pub area: String,
    pub tags: Vec<String>,
    pub tag_items: BTreeMap<String, Vec<ItemKey>>,
    pub event: Option<String>,
    pub area_index: usize,
    pub area_count: usize,
}

impl SlotAnnotation {
    pub fn area(&self) -> &str {
        if self.area.is_empty() {
            UNKNOWN_AREA
        } else {
            &self.area
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Position of this slot within its area and the number of positions,
    /// clamped so the index always names a real bucket.
    pub fn area_index(&self) -> (usize, usize) {
        let count = self.area_count.max(1);
        (self.area_index.min(count - 1), count)
    }
}

/// "This many copies go to one of these areas". `amount: None` means any
/// number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSlotAnnotation {
    pub amount: Option<u32>,
    pub areas: Vec<String>,
}

impl PlacementSlotAnnotation {
    /// Areas still in play for this run. An area the key item solver has
    /// explicitly emptied is dropped.
    pub fn allowed_areas<'a>(
        &'a self,
        included_areas: &'a BTreeMap<String, BTreeSet<String>>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.areas
            .iter()
            .filter(move |a| included_areas.get(*a).map_or(true, |s| !s.is_empty()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRestrictionAnnotation {
    pub unique: Option<Vec<PlacementSlotAnnotation>>,
    pub key_areas: Option<String>,
    pub shop: Option<Vec<PlacementSlotAnnotation>>,
    pub drop: Option<Vec<PlacementSlotAnnotation>>,
    pub other_keys: Vec<ItemKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPriorityAnnotation {
    pub keys: Vec<ItemKey>,
    pub priority_by_count: usize,
    pub includes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationData {
    pub slots: BTreeMap<LocationScope, SlotAnnotation>,
    pub item_groups: BTreeMap<String, Vec<ItemKey>>,
    pub norandom_items: BTreeSet<ItemKey>,
    /// Highest priority first.
    pub item_priority: Vec<ItemPriorityAnnotation>,
    pub item_restrict: BTreeMap<ItemKey, PlacementRestrictionAnnotation>,
    pub exclude_tags: BTreeMap<ItemKey, BTreeSet<String>>,
    pub race_mode_items: Vec<ItemKey>,
    pub race_mode_tags: BTreeSet<String>,
    pub areas: BTreeSet<String>,
    pub events: BTreeSet<String>,
    pub area_events: BTreeMap<String, Vec<String>>,
    pub hint_groups: BTreeMap<String, String>,
    pub hint_categories: Vec<String>,
    /// Area name prefixes small enough that any spot in them counts as the
    /// far end of the area.
    pub small_areas: Vec<String>,
}

impl AnnotationData {
    pub fn slot(&self, loc: &LocationScope) -> Option<&SlotAnnotation> {
        self.slots.get(loc)
    }

    pub fn area_of(&self, loc: &LocationScope) -> &str {
        self.slots.get(loc).map_or(UNKNOWN_AREA, SlotAnnotation::area)
    }

    pub fn tags_of(&self, loc: &LocationScope) -> &[String] {
        self.slots
            .get(loc)
            .map(|s| s.tags.as_slice())
            .unwrap_or(&[])
    }

    pub fn group(&self, name: &str) -> &[ItemKey] {
        self.item_groups
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn in_group(&self, name: &str, item: &ItemKey) -> bool {
        self.group(name).contains(item)
    }

    pub fn is_small_area(&self, area: &str) -> bool {
        self.small_areas.iter().any(|prefix| area.starts_with(prefix.as_str()))
    }

    pub fn is_known_location(&self, name: &str) -> bool {
        self.areas.contains(name) || self.events.contains(name)
    }

    pub fn location_description(&self, loc: &LocationScope) -> String {
        match self.slots.get(loc) {
            Some(slot) if !slot.text.is_empty() => format!("{}: {}", slot.area(), slot.text),
            Some(slot) => slot.area().to_string(),
            None => format!("{UNKNOWN_AREA}: {loc}"),
        }
    }
}
