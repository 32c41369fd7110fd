use std::collections::{BTreeMap, BTreeSet};

use crate::annotations::AnnotationData;
use crate::catalog::{ItemKey, LocationData, SlotKey};
use crate::key_items::KeyItemAssignment;
use crate::options::{BooleanOption, NumericOption, RandomizerOptions};

pub const MAX_DIFFICULTY: usize = 6;

/// Shuffle weight of a target with no computed weight.
pub const MISSING_WEIGHT: f64 = 0.001;

/// Splits `[start, end)` into `total` pieces of equal width on a log-2 scale
/// and returns piece `index`. `index == total` yields the piece just past the
/// end.
///
/// # Panics
///
/// When `index > total`, which is a bug in the caller.
pub fn sub_range(range: (f64, f64), index: usize, total: usize) -> (f64, f64) {
    assert!(index <= total && total > 0, "invalid range split {index}/{total}");
    let (start, end) = range;
    let subdivs = (end / start).log2();
    let total = total as f64;
    let index = index as f64;
    (
        start * 2f64.powf(subdivs * index / total),
        start * 2f64.powf(subdivs * (index + 1.0) / total),
    )
}

/// Severity of each difficulty tag under the current options.
pub fn difficulty_tags(options: &RandomizerOptions) -> BTreeMap<&'static str, usize> {
    let mut tags: BTreeMap<&'static str, usize> = [
        ("enemy", 1),
        ("shop", 1),
        ("outoftheway", 2),
        ("hardenemy", 2),
        ("hidden", 3),
        ("reqevent", 3),
        ("ambush", 4),
        ("miniboss", 5),
        ("minibossrespawn", 5),
        ("altboss", 5),
        ("altbossnight", 5),
        ("boss", 6),
        ("deadend", 6),
        ("premium", 6),
    ]
    .into_iter()
    .collect();

    let unfair = options.numeric(NumericOption::UnfairWeight);
    let very_unfair = options.numeric(NumericOption::VeryUnfairWeight);
    tags.insert("unfair", ((MAX_DIFFICULTY - 1) as f64 * unfair).round() as usize);
    tags.insert("veryunfair", (MAX_DIFFICULTY as f64 * very_unfair).round() as usize);

    // At the top end bosses are no longer special enough to single out.
    if options.numeric(NumericOption::KeyItemDifficulty) > 0.9 {
        for tag in ["miniboss", "minibossrespawn", "boss", "deadend"] {
            if let Some(severity) = tags.get_mut(tag) {
                *severity -= 1;
            }
        }
    }
    tags
}

const BOSS_TAGS: [&str; 3] = ["miniboss", "altboss", "boss"];

/// Per target slot weights: one table for key items (how deep into its area
/// a spot is) and one for everything else (how late in the game).
#[derive(Debug, Clone, Default)]
pub struct SlotWeights {
    key_weights: BTreeMap<SlotKey, f64>,
    weights: BTreeMap<SlotKey, f64>,
}

impl SlotWeights {
    pub fn calculate(
        data: &LocationData,
        ann: &AnnotationData,
        assign: &KeyItemAssignment,
        options: &RandomizerOptions,
    ) -> Self {
        let difficulty = difficulty_tags(options);
        let key_max = 2f64.powi(
            (20.0 * options.numeric(NumericOption::KeyItemDifficulty)).round() as i32,
        );
        let general_max = 2f64.powi(
            (15.0 * options.numeric(NumericOption::AllItemDifficulty)).round() as i32,
        );
        let fog = options.get(BooleanOption::Fog);

        let mut out = SlotWeights::default();
        for (loc, slot) in &ann.slots {
            let mut tags: BTreeSet<&str> = slot.tags.iter().map(String::as_str).collect();
            if tags.contains("death") || tags.contains("boring") {
                continue;
            }

            // Bosses guarding a required event get beaten anyway.
            let required = slot
                .event
                .as_ref()
                .is_some_and(|ev| assign.required_events.contains(ev));
            if required && BOSS_TAGS.iter().any(|t| tags.contains(t)) {
                for tag in BOSS_TAGS {
                    tags.remove(tag);
                }
                tags.insert("reqevent");
            }

            let area = assign.effective_area(loc, ann);
            if !assign.is_area_included(area) {
                continue;
            }

            let (mut index, count) = slot.area_index();
            if ann.is_small_area(area) || tags.contains("deadend") {
                index = count - 1;
            }
            let mut key_range = sub_range((1.0, key_max), index, count);

            let mut range = (1.0, general_max);
            if !fog {
                let lateness = assign.lateness(area).clamp(0.0, 1.0);
                range = sub_range(range, (lateness * 20.0) as usize, 20);
            }

            let mut severities: Vec<usize> = tags
                .iter()
                .filter_map(|t| difficulty.get(t).copied())
                .filter(|&s| s != 0)
                .collect();
            severities.sort_unstable_by(|a, b| b.cmp(a));
            for severity in severities {
                key_range = sub_range(key_range, severity, MAX_DIFFICULTY + 1);
                range = sub_range(range, severity, MAX_DIFFICULTY + 1);
            }

            let targets = data.slots_at(loc);
            // Big merchant listings together count about as much as one slot.
            let reduce = if tags.contains("raceshop") {
                targets.len().max(1) as f64
            } else {
                1.0
            };
            for target in targets {
                out.key_weights.insert(*target, key_range.0 / reduce);
                out.weights.insert(*target, range.0);
            }
        }
        out
    }

    pub fn key_weight(&self, slot: &SlotKey) -> f64 {
        self.key_weights.get(slot).copied().unwrap_or(MISSING_WEIGHT)
    }

    pub fn weight(&self, slot: &SlotKey) -> f64 {
        self.weights.get(slot).copied().unwrap_or(MISSING_WEIGHT)
    }
}

/// Item weights from the priority groups. Heavier items are placed before
/// lighter ones, so they pick from the most desirable targets.
#[derive(Debug, Clone, Default)]
pub struct ItemWeights {
    weights: BTreeMap<ItemKey, Vec<f64>>,
}

impl ItemWeights {
    pub fn calculate(ann: &AnnotationData, key_priority: &[ItemKey]) -> Self {
        let groups = ann.item_priority.len();
        let max = 1.2f64.powi(groups as i32 + 1);

        let mut weights = BTreeMap::new();
        for (i, group) in ann.item_priority.iter().enumerate() {
            let range = sub_range((1.0, max), groups - i, groups + 1);
            let mut by_count = vec![range.0];
            for n in 1..group.priority_by_count {
                by_count.push(sub_range(range, n, group.priority_by_count).0);
            }

            let key_items_only = group.includes.as_deref() == Some("keyitems");
            for key in &group.keys {
                if key_items_only && !key_priority.contains(key) {
                    continue;
                }
                weights.entry(*key).or_insert_with(|| by_count.clone());
            }
        }
        ItemWeights { weights }
    }

    pub fn slot_weight(&self, slot: &SlotKey, data: &LocationData) -> f64 {
        let Some(by_count) = self.weights.get(&slot.item) else {
            return 1.0;
        };
        let quantity = data.location(slot).map_or(1, |l| l.quantity.max(1)) as usize;
        by_count[(quantity - 1).min(by_count.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::ItemPriorityAnnotation;
    use crate::testutil::{annotate, catalog, goods, slot};

    #[test]
    fn sub_range_splits_on_log_scale() {
        let (lo, hi) = sub_range((1.0, 16.0), 2, 4);
        assert!((lo - 4.0).abs() < 1e-9);
        assert!((hi - 8.0).abs() < 1e-9);
        let (past, _) = sub_range((1.0, 16.0), 4, 4);
        assert!((past - 16.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic]
    fn sub_range_rejects_index_past_total() {
        sub_range((1.0, 2.0), 3, 2);
    }

    #[test]
    fn top_difficulty_softens_bosses() {
        let low = difficulty_tags(&RandomizerOptions::new(0, 0));
        assert_eq!(low["boss"], 6);
        assert_eq!(low["unfair"], 0);

        let high = difficulty_tags(&RandomizerOptions::new(0, 100));
        assert_eq!(high["boss"], 5);
        assert_eq!(high["deadend"], 5);
        assert_eq!(high["unfair"], 5);
        assert_eq!(high["veryunfair"], 6);
    }

    #[test]
    fn later_and_harder_slots_weigh_more() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
            ("goods:4@event:4", "event:4"),
        ]);
        let ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "end", &[]),
            ("event:3", "end", &["boss"]),
            ("event:4", "end", &["death"]),
        ]);
        let mut assign = KeyItemAssignment::default();
        assign.location_lateness.insert("start".into(), 0.0);
        assign.location_lateness.insert("end".into(), 1.0);

        let weights = SlotWeights::calculate(&data, &ann, &assign, &RandomizerOptions::new(1, 60));
        let early = weights.weight(&slot("goods:1@event:1"));
        let late = weights.weight(&slot("goods:2@event:2"));
        let boss = weights.weight(&slot("goods:3@event:3"));
        assert!(late > early);
        assert!(boss > late);
        assert!(weights.key_weight(&slot("goods:3@event:3")) > weights.key_weight(&slot("goods:2@event:2")));
        assert_eq!(weights.weight(&slot("goods:4@event:4")), MISSING_WEIGHT);
    }

    #[test]
    fn excluded_areas_get_no_weight() {
        let data = catalog(&[("goods:1@event:1", "event:1")]);
        let ann = annotate(&[("event:1", "dlc", &[])]);
        let mut assign = KeyItemAssignment::default();
        assign.included_areas.insert("dlc".into(), BTreeSet::new());

        let weights = SlotWeights::calculate(&data, &ann, &assign, &RandomizerOptions::new(1, 60));
        assert_eq!(weights.key_weight(&slot("goods:1@event:1")), MISSING_WEIGHT);
    }

    #[test]
    fn item_priority_tiers() {
        let mut ann = AnnotationData::default();
        ann.item_priority = vec![
            ItemPriorityAnnotation {
                keys: vec![goods(1)],
                priority_by_count: 3,
                includes: None,
            },
            ItemPriorityAnnotation {
                keys: vec![goods(1), goods(2)],
                priority_by_count: 0,
                includes: None,
            },
            ItemPriorityAnnotation {
                keys: vec![goods(3)],
                priority_by_count: 0,
                includes: Some("keyitems".into()),
            },
        ];
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
            ("goods:9@event:9", "event:9"),
        ]);

        let weights = ItemWeights::calculate(&ann, &[]);
        let first = weights.slot_weight(&slot("goods:1@event:1"), &data);
        let second = weights.slot_weight(&slot("goods:2@event:2"), &data);
        assert!(first > second);
        assert!(second > 1.0);
        // Not a key item this run, so the keyitems-only group skips it.
        assert_eq!(weights.slot_weight(&slot("goods:3@event:3"), &data), 1.0);
        assert_eq!(weights.slot_weight(&slot("goods:9@event:9"), &data), 1.0);

        let with_keys = ItemWeights::calculate(&ann, &[goods(3)]);
        assert!(with_keys.slot_weight(&slot("goods:3@event:3"), &data) > 1.0);
    }
}
