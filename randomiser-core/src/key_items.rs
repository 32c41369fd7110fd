use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::annotations::{AnnotationData, UNKNOWN_AREA};
use crate::catalog::{ItemKey, LocationScope};
use crate::options::RandomizerOptions;
use crate::Result;

/// What the key item solver decided before any item gets moved: which areas
/// each key item may end up in, how late every area is, and which areas take
/// part in this run at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyItemAssignment {
    pub assign: BTreeMap<ItemKey, BTreeSet<String>>,
    /// Key items in placement order.
    pub priority: Vec<ItemKey>,
    /// 0.0 for the first area of the game, 1.0 for the last.
    pub location_lateness: BTreeMap<String, f64>,
    pub included_areas: BTreeMap<String, BTreeSet<String>>,
    pub effective_location: BTreeMap<LocationScope, String>,
    pub required_events: BTreeSet<String>,
    pub restricted_items: BTreeMap<ItemKey, Vec<LocationScope>>,
}

impl KeyItemAssignment {
    pub fn lateness(&self, area: &str) -> f64 {
        self.location_lateness.get(area).copied().unwrap_or(0.0)
    }

    /// Areas the solver says nothing about take part in the run.
    pub fn is_area_included(&self, area: &str) -> bool {
        if area == UNKNOWN_AREA {
            return false;
        }
        self.included_areas.get(area).map_or(true, |s| !s.is_empty())
    }

    pub fn effective_area<'a>(&'a self, loc: &LocationScope, ann: &'a AnnotationData) -> &'a str {
        match self.effective_location.get(loc) {
            Some(area) => area.as_str(),
            None => ann.area_of(loc),
        }
    }
}

/// The seam to the reachability solver. It consumes randomness from the same
/// stream as the rest of the run, so it is handed the run's rng.
pub trait KeyItemSolver {
    fn assign_items(
        &self,
        rng: &mut dyn RngCore,
        options: &RandomizerOptions,
    ) -> Result<KeyItemAssignment>;
}

/// A precomputed assignment, e.g. loaded from `keyitems.json`.
impl KeyItemSolver for KeyItemAssignment {
    fn assign_items(
        &self,
        _rng: &mut dyn RngCore,
        _options: &RandomizerOptions,
    ) -> Result<KeyItemAssignment> {
        Ok(self.clone())
    }
}
