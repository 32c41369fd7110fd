use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::annotations::AnnotationData;
use crate::assign::Assigner;
use crate::catalog::{ItemKey, ItemScope, ItemType, LocationData, LocationScope, ScopeType, SlotKey};
use crate::key_items::{KeyItemAssignment, KeyItemSolver};
use crate::options::{BooleanOption, RandomizerOptions};
use crate::restriction::{RestrictionBuilder, Restrictions};
use crate::shuffle::{choice, shuffle, weighted_shuffle};
use crate::silo::{classify_silos, RandomSilo, SiloPermutation};
use crate::weights::{ItemWeights, SlotWeights};
use crate::{RandomiserError, Result};

// Race mode items get their own stream so they don't disturb key items.
const RACE_SEED_OFFSET: u64 = 10;

/// Everything one run decided.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermutationResult {
    pub silos: BTreeMap<RandomSilo, SiloPermutation>,
    pub item_lateness: BTreeMap<ItemKey, f64>,
    pub key_items: BTreeSet<ItemKey>,
    pub log_order: BTreeMap<SlotKey, String>,
    /// Hint category, then source slot to where it ended up.
    pub hints: BTreeMap<String, BTreeMap<SlotKey, SlotKey>>,
    /// Items placed from nowhere (crow rewards, filler). Whoever writes the
    /// result back has to register them.
    pub locationless_items: BTreeSet<ItemKey>,
    /// Where each key item went.
    pub special_assign: BTreeMap<ItemKey, SlotKey>,
}

impl PermutationResult {
    pub fn silo(&self, silo: RandomSilo) -> Option<&SiloPermutation> {
        self.silos.get(&silo)
    }

    /// Sort key putting slots in rough playthrough order.
    pub fn log_order(&self, slot: &SlotKey) -> String {
        match self.log_order.get(slot) {
            Some(order) => order.clone(),
            None => format!("z{slot}"),
        }
    }

    /// Where `item` was placed in the finite silo, else its vanilla slot.
    pub fn finite_target(&self, item: &ItemKey, data: &LocationData) -> Option<SlotKey> {
        let placed = self.silo(RandomSilo::Finite).and_then(|silo| {
            silo.mapping
                .iter()
                .find(|(_, sources)| sources.iter().any(|s| s.item == *item))
                .map(|(target, _)| *target)
        });
        placed.or_else(|| {
            let scope = data.item(item)?.locations.keys().next()?;
            Some(SlotKey::new(*item, *scope))
        })
    }
}

/// The silo layout of one catalog. Holds no per-run state, so one instance
/// can serve any number of seeds.
pub struct Permutation<'a> {
    data: &'a LocationData,
    ann: &'a AnnotationData,
    silos: BTreeMap<RandomSilo, SiloPermutation>,
}

impl<'a> Permutation<'a> {
    pub fn new(data: &'a LocationData, ann: &'a AnnotationData) -> Self {
        let silos = classify_silos(data, ann);
        for (kind, silo) in &silos {
            debug!(
                silo = %kind,
                sources = silo.sources.len(),
                targets = silo.targets.len(),
                "classified"
            );
        }
        Permutation { data, ann, silos }
    }

    pub fn silos(&self) -> &BTreeMap<RandomSilo, SiloPermutation> {
        &self.silos
    }

    /// Full randomization: key items first, then everything else by weight,
    /// then crow rewards, hints and ring ordering.
    pub fn logic<R: Rng>(
        &self,
        rng: &mut R,
        options: &RandomizerOptions,
        solver: &dyn KeyItemSolver,
    ) -> Result<PermutationResult> {
        let assign = solver.assign_items(rng, options)?;
        let mut result = PermutationResult::default();

        for (key, areas) in &assign.assign {
            let Some(locs) = self.data.item(key) else {
                warn!(item = %key, "key item is not in the catalog");
                continue;
            };
            let lateness = areas.iter().next().map_or(0.0, |a| assign.lateness(a));
            result.item_lateness.insert(*key, lateness);
            let movable = locs.locations.keys().all(|scope| {
                RandomSilo::can_permute_to(scope.scope_type) == Some(RandomSilo::Finite)
            });
            if !movable && !self.ann.norandom_items.contains(key) {
                return Err(RandomiserError::UnusableKeyItem(*key));
            }
        }
        result.key_items.extend(assign.priority.iter().copied());

        let mut silos = self.silos.clone();
        let log_order = self.prune_unused(&mut silos, &assign, options);
        result.log_order = log_order;

        let slot_weights = SlotWeights::calculate(self.data, self.ann, &assign, options);
        let item_weights = ItemWeights::calculate(self.ann, &assign.priority);
        let mut protected = result.key_items.clone();
        protected.extend(self.ann.group("keyitems").iter().copied());
        let assigner = Assigner {
            data: self.data,
            ann: self.ann,
            effective_location: &assign.effective_location,
            protected: &protected,
            limits: options.limits,
        };
        let builder = RestrictionBuilder {
            ann: self.ann,
            assign: &assign,
            race_mode: options.get(BooleanOption::RaceMode),
        };
        let item_weight = |slot: &SlotKey| item_weights.slot_weight(slot, self.data);

        for (kind, silo) in silos.iter_mut() {
            if kind.is_special() {
                continue;
            }
            let mut restrictions = builder.build(silo)?;
            let targets = silo.target_slots(self.data);

            let mut main_items: Vec<SlotKey> = Vec::new();
            for key in &assign.priority {
                main_items.extend(silo.sources.iter().filter(|s| s.item == *key));
            }
            if builder.race_mode {
                let race_items: Vec<SlotKey> = silo
                    .sources
                    .iter()
                    .filter(|s| {
                        self.ann.race_mode_items.contains(&s.item)
                            && !assign.priority.contains(&s.item)
                    })
                    .copied()
                    .collect();
                if !race_items.is_empty() {
                    let mut race_rng =
                        StdRng::seed_from_u64(options.seed.wrapping_add(RACE_SEED_OFFSET));
                    main_items.extend(weighted_shuffle(&mut race_rng, race_items, &item_weight));
                }
            }

            if !main_items.is_empty() {
                let main_locations =
                    weighted_shuffle(rng, targets.clone(), |s| slot_weights.key_weight(s));
                info!(
                    silo = %kind,
                    items = main_items.len(),
                    targets = main_locations.len(),
                    "placing key items"
                );
                assigner.assign_items_to_locations(
                    rng,
                    silo,
                    &mut restrictions,
                    &main_items,
                    &main_locations,
                    true,
                )?;
            }

            let placed = silo.placed_sources();
            let items: Vec<SlotKey> = silo
                .sources
                .iter()
                .filter(|s| !placed.contains(s))
                .copied()
                .collect();
            let items = weighted_shuffle(rng, items, &item_weight);
            let locations = weighted_shuffle(rng, targets, |s| slot_weights.weight(s));
            info!(
                silo = %kind,
                items = items.len(),
                targets = locations.len(),
                "placing items"
            );
            assigner.assign_items_to_locations(
                rng,
                silo,
                &mut restrictions,
                &items,
                &locations,
                false,
            )?;
            report_unsatisfied(&restrictions);
        }

        self.place_crow_rewards(rng, &mut silos, &mut result);
        result
            .locationless_items
            .extend(self.ann.group("fodder").iter().copied());
        result.silos = silos;
        self.fill_hints(&assign, options, &mut result);
        if !options.get(BooleanOption::Fog) {
            order_rings(&mut result);
        }
        Ok(result)
    }

    /// Flat uniform shuffle of every randomized silo, with no weights and no
    /// placement rules.
    pub fn no_logic<R: Rng>(&self, rng: &mut R, options: &RandomizerOptions) -> Result<PermutationResult> {
        let no_effective = BTreeMap::new();
        let no_protected = BTreeSet::new();
        let assigner = Assigner {
            data: self.data,
            ann: self.ann,
            effective_location: &no_effective,
            protected: &no_protected,
            limits: options.limits,
        };

        let mut silos = self.silos.clone();
        for (kind, silo) in silos.iter_mut() {
            if kind.is_special() {
                continue;
            }
            let mut targets = silo.target_slots(self.data);
            shuffle(rng, &mut targets);
            let sources = silo.sources.clone();
            info!(silo = %kind, items = sources.len(), targets = targets.len(), "placing items");
            assigner.assign_items_to_locations(
                rng,
                silo,
                &mut Restrictions::default(),
                &sources,
                &targets,
                false,
            )?;
        }

        Ok(PermutationResult {
            silos,
            ..PermutationResult::default()
        })
    }

    // Drops scopes that take no part in this run, and returns the log order
    // of the rest.
    fn prune_unused(
        &self,
        silos: &mut BTreeMap<RandomSilo, SiloPermutation>,
        assign: &KeyItemAssignment,
        options: &RandomizerOptions,
    ) -> BTreeMap<SlotKey, String> {
        let mut unused_slots = BTreeSet::new();
        let mut unused_locations = BTreeSet::new();
        let mut log_order = BTreeMap::new();
        let dlc1 = options.get(BooleanOption::Dlc1);
        let dlc2 = options.get(BooleanOption::Dlc2);

        for (loc, slots) in &self.data.locations {
            if loc.scope_type == ScopeType::Model {
                continue;
            }
            let area = self.ann.area_of(loc);
            let missing_dlc = self.ann.slot(loc).is_some_and(|s| {
                (s.has_tag("dlc1") && !dlc1) || (s.has_tag("dlc2") && !dlc2)
            });
            if !assign.is_area_included(area) || missing_dlc {
                unused_locations.insert(*loc);
                unused_slots.extend(slots.iter().copied());
                continue;
            }
            let area = assign.effective_area(loc, self.ann);
            let late = (assign.lateness(area) * 9999.0) as i64;
            let order = format!("{late:04},{loc}");
            for slot in slots {
                log_order.insert(*slot, order.clone());
            }
        }

        if !unused_locations.is_empty() {
            debug!(locations = unused_locations.len(), "pruning unused locations");
        }
        for silo in silos.values_mut() {
            silo.sources.retain(|s| !unused_slots.contains(s));
            silo.targets.retain(|l| !unused_locations.contains(l));
            silo.mapping.retain(|target, _| !unused_slots.contains(target));
        }
        log_order
    }

    fn place_crow_rewards<R: Rng>(
        &self,
        rng: &mut R,
        silos: &mut BTreeMap<RandomSilo, SiloPermutation>,
        result: &mut PermutationResult,
    ) {
        let mut rewards: Vec<ItemKey> = self.ann.group("crowrewards").to_vec();
        if rewards.is_empty() {
            return;
        }
        result.locationless_items.extend(rewards.iter().copied());

        let Some(crow) = silos.get_mut(&RandomSilo::Crow) else {
            return;
        };
        let targets: Vec<LocationScope> = crow.targets.clone();
        for target in targets {
            let Some(&item) = choice(rng, &rewards) else {
                warn!(%target, "ran out of crow rewards");
                break;
            };
            // Some rewards are only handed out once.
            if self.ann.in_group("crowrewards_unique", &item) {
                rewards.retain(|r| *r != item);
            }
            let source = SlotKey::new(item, ItemScope::SPECIAL);
            for slot in self.data.slots_at(&target) {
                crow.add_mapping(*slot, source);
            }
        }
    }

    fn fill_hints(
        &self,
        assign: &KeyItemAssignment,
        options: &RandomizerOptions,
        result: &mut PermutationResult,
    ) {
        let mut hint_items: BTreeMap<ItemKey, &str> = BTreeMap::new();
        for key in assign.assign.keys() {
            if self.ann.in_group("keyitems", key) {
                hint_items.insert(*key, "key items");
            }
            if self.ann.in_group("questitems", key) {
                hint_items.insert(*key, "quest items");
            }
        }
        // Fog changes area logic, so every key counts.
        if options.get(BooleanOption::Fog) {
            for key in self.ann.group("keyitems") {
                hint_items.insert(*key, "key items");
            }
        }
        for (group, category) in &self.ann.hint_groups {
            if group == "keyitems" {
                continue;
            }
            for key in self.ann.group(group) {
                hint_items.insert(*key, category.as_str());
            }
        }

        for category in &self.ann.hint_categories {
            result.hints.entry(category.clone()).or_default();
        }
        let Some(finite) = result.silos.get(&RandomSilo::Finite) else {
            return;
        };
        for (target, sources) in &finite.mapping {
            for source in sources {
                if let Some(category) = hint_items.get(&source.item) {
                    result
                        .hints
                        .entry(category.to_string())
                        .or_default()
                        .insert(*source, *target);
                }
                if assign.assign.contains_key(&source.item) {
                    result.special_assign.insert(source.item, *target);
                }
            }
        }
    }
}

// Rings of one family (ids differing only in the last digit) are upgrades of
// each other. Hand out the weaker ones first.
fn order_rings(result: &mut PermutationResult) {
    let Some(finite) = result.silos.get(&RandomSilo::Finite) else {
        return;
    };
    let mut families: BTreeMap<i32, Vec<(SlotKey, SlotKey)>> = BTreeMap::new();
    for (target, sources) in &finite.mapping {
        for source in sources {
            if source.item.item_type == ItemType::Ring {
                families
                    .entry(source.item.id - source.item.id % 10)
                    .or_default()
                    .push((*source, *target));
            }
        }
    }

    let mut moves = Vec::new();
    for pairs in families.into_values() {
        if pairs.len() < 2 {
            continue;
        }
        let mut by_item: Vec<SlotKey> = pairs.iter().map(|p| p.0).collect();
        by_item.sort_by_key(|s| s.item);
        let mut by_order = pairs;
        by_order.sort_by_key(|p| result.log_order(&p.1));
        for (new_source, (old_source, target)) in by_item.into_iter().zip(by_order) {
            moves.push((target, old_source, new_source));
        }
    }

    let Some(finite) = result.silos.get_mut(&RandomSilo::Finite) else {
        return;
    };
    for (target, old_source, new_source) in moves {
        if let Some(sources) = finite.mapping.get_mut(&target) {
            if let Some(i) = sources.iter().position(|s| *s == old_source) {
                sources.remove(i);
            }
            sources.push(new_source);
        }
    }
}

fn report_unsatisfied(restrictions: &Restrictions) {
    for (item, pending) in restrictions.entries() {
        if !pending.is_satisfied() {
            warn!(
                item = %item,
                free = pending.free_amount,
                total = pending.total_amount,
                "placement rule not fully satisfied"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{PlacementRestrictionAnnotation, PlacementSlotAnnotation};
    use crate::testutil::{annotate, catalog, goods, scope, slot};

    fn solver(areas: &[&str]) -> KeyItemAssignment {
        let mut assign = KeyItemAssignment::default();
        for (i, area) in areas.iter().enumerate() {
            assign
                .location_lateness
                .insert(area.to_string(), i as f64 / areas.len().max(1) as f64);
        }
        assign
    }

    fn exactly_two_in(area: &str) -> PlacementRestrictionAnnotation {
        PlacementRestrictionAnnotation {
            unique: Some(vec![PlacementSlotAnnotation {
                amount: Some(2),
                areas: vec![area.to_string()],
            }]),
            ..PlacementRestrictionAnnotation::default()
        }
    }

    #[test]
    fn fixed_rule_fills_area_without_gaps() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:1@event:2", "event:2"),
            ("goods:2@event:3", "event:3"),
        ]);
        let mut ann = annotate(&[
            ("event:1", "x", &[]),
            ("event:2", "x", &[]),
            ("event:3", "x", &[]),
        ]);
        ann.item_restrict.insert(goods(1), exactly_two_in("x"));
        let assign = solver(&["x"]);

        for seed in 0..20 {
            let perm = Permutation::new(&data, &ann);
            let mut rng = StdRng::seed_from_u64(seed);
            let result = perm
                .logic(&mut rng, &RandomizerOptions::new(seed, 50), &assign)
                .unwrap();
            let finite = result.silo(RandomSilo::Finite).unwrap();

            assert_eq!(finite.mapping.len(), 3, "seed {seed}");
            let mut placed: Vec<ItemKey> = finite.mapping.values().flatten().map(|s| s.item).collect();
            placed.sort();
            assert_eq!(placed, vec![goods(1), goods(1), goods(2)], "seed {seed}");
            assert!(finite.mapping.values().all(|v| v.len() == 1));
        }
    }

    #[test]
    fn same_seed_same_result() {
        let entries: Vec<(String, String)> = (1..=12)
            .map(|i| (format!("goods:{i}@event:{i}"), format!("event:{i}")))
            .collect();
        let refs: Vec<(&str, &str)> = entries.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let data = catalog(&refs);
        let areas = ["a", "b", "c"];
        let slot_areas: Vec<(String, &str)> = (1..=12)
            .map(|i| (format!("event:{i}"), areas[i % 3]))
            .collect();
        let ann_entries: Vec<(&str, &str, &[&str])> = slot_areas
            .iter()
            .map(|(l, a)| (l.as_str(), *a, &[][..]))
            .collect();
        let ann = annotate(&ann_entries);
        let assign = solver(&areas);
        let perm = Permutation::new(&data, &ann);
        let options = RandomizerOptions::new(77, 40);

        let first = perm.logic(&mut StdRng::seed_from_u64(77), &options, &assign).unwrap();
        let second = perm.logic(&mut StdRng::seed_from_u64(77), &options, &assign).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.silo(RandomSilo::Finite).unwrap().placed_sources().len(), 12);
    }

    #[test]
    fn key_items_go_to_their_areas() {
        let data = catalog(&[
            ("goods:500@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
            ("goods:4@event:4", "event:4"),
        ]);
        let ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "start", &[]),
            ("event:3", "vault", &[]),
            ("event:4", "vault", &[]),
        ]);
        let mut assign = solver(&["start", "vault"]);
        let key = goods(500);
        assign.assign.insert(key, BTreeSet::from(["vault".to_string()]));
        assign.priority.push(key);

        for seed in 0..10 {
            let perm = Permutation::new(&data, &ann);
            let result = perm
                .logic(&mut StdRng::seed_from_u64(seed), &RandomizerOptions::new(seed, 30), &assign)
                .unwrap();
            let target = result.special_assign[&key];
            assert!(
                target == slot("goods:3@event:3") || target == slot("goods:4@event:4"),
                "seed {seed} put it at {target}"
            );
            assert!(result.key_items.contains(&key));
            assert_eq!(result.item_lateness[&key], 0.5);
            assert_eq!(result.finite_target(&key, &data), Some(target));
        }
    }

    #[test]
    fn race_items_only_land_on_race_spots() {
        let data = catalog(&[
            ("goods:7@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
            ("goods:4@event:4", "event:4"),
        ]);
        let mut ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "start", &[]),
            ("event:3", "keep", &["race"]),
            ("event:4", "keep", &[]),
        ]);
        ann.race_mode_items = vec![goods(7)];
        ann.race_mode_tags = BTreeSet::from(["race".to_string()]);
        let assign = solver(&["start", "keep"]);
        let perm = Permutation::new(&data, &ann);

        for seed in 0..10 {
            let mut options = RandomizerOptions::new(seed, 50);
            options.set(BooleanOption::RaceMode, true);
            let first = perm.logic(&mut StdRng::seed_from_u64(seed), &options, &assign).unwrap();
            let second = perm.logic(&mut StdRng::seed_from_u64(seed), &options, &assign).unwrap();
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );

            let race = slot("goods:7@event:1");
            let finite = first.silo(RandomSilo::Finite).unwrap();
            let spots: Vec<SlotKey> = finite
                .mapping
                .iter()
                .filter(|(_, sources)| sources.contains(&race))
                .map(|(target, _)| *target)
                .collect();
            assert_eq!(spots, vec![slot("goods:3@event:3")], "seed {seed}");
            assert_eq!(finite.placed_sources().len(), 4);
        }
    }

    #[test]
    fn key_item_in_drop_table_is_unusable() {
        let data = catalog(&[("goods:500@model:1", "model:1"), ("goods:2@event:2", "event:2")]);
        let ann = annotate(&[("event:2", "start", &[])]);
        let mut assign = solver(&["start"]);
        assign
            .assign
            .insert(goods(500), BTreeSet::from(["start".to_string()]));

        let perm = Permutation::new(&data, &ann);
        let err = perm
            .logic(&mut StdRng::seed_from_u64(1), &RandomizerOptions::new(1, 0), &assign)
            .unwrap_err();
        assert!(matches!(err, RandomiserError::UnusableKeyItem(k) if k == goods(500)));
    }

    #[test]
    fn unused_areas_are_pruned() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
        ]);
        let ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "start", &["dlc1"]),
            ("event:3", "cut", &[]),
        ]);
        let mut assign = solver(&["start"]);
        assign.included_areas.insert("cut".into(), BTreeSet::new());

        let perm = Permutation::new(&data, &ann);
        let result = perm
            .logic(&mut StdRng::seed_from_u64(3), &RandomizerOptions::new(3, 0), &assign)
            .unwrap();
        let finite = result.silo(RandomSilo::Finite).unwrap();
        assert_eq!(finite.sources, vec![slot("goods:1@event:1")]);
        assert_eq!(finite.targets, vec![scope("event:1")]);
        assert_eq!(result.log_order(&slot("goods:1@event:1")), "0000,event:1");
        assert_eq!(result.log_order(&slot("goods:3@event:3")), "zgoods:3@event:3");
    }

    #[test]
    fn dlc_scopes_need_their_option() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
        ]);
        let ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "ringed", &["dlc2"]),
            ("event:3", "painted", &["dlc1"]),
        ]);
        let assign = solver(&["start", "painted", "ringed"]);
        let perm = Permutation::new(&data, &ann);

        let mut options = RandomizerOptions::new(4, 0);
        options.set(BooleanOption::Dlc2, true);
        let result = perm.logic(&mut StdRng::seed_from_u64(4), &options, &assign).unwrap();
        let finite = result.silo(RandomSilo::Finite).unwrap();
        assert_eq!(finite.targets, vec![scope("event:1"), scope("event:2")]);

        options.set(BooleanOption::Dlc1, true);
        let result = perm.logic(&mut StdRng::seed_from_u64(4), &options, &assign).unwrap();
        assert_eq!(result.silo(RandomSilo::Finite).unwrap().targets.len(), 3);
    }

    #[test]
    fn crow_targets_get_rewards_and_hints_are_filled() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@event:3", "event:3"),
        ]);
        let mut ann = annotate(&[
            ("event:1", "start", &[]),
            ("event:2", "start", &[]),
            ("event:3", "start", &["crow"]),
        ]);
        ann.item_groups.insert("crowrewards".into(), vec![goods(1003), goods(1004)]);
        ann.item_groups.insert("crowrewards_unique".into(), vec![goods(1003)]);
        ann.item_groups.insert("questitems".into(), vec![goods(2)]);
        ann.hint_categories = vec!["quest items".into(), "key items".into()];
        let mut assign = solver(&["start"]);
        assign
            .assign
            .insert(goods(2), BTreeSet::from(["start".to_string()]));

        let perm = Permutation::new(&data, &ann);
        let result = perm
            .logic(&mut StdRng::seed_from_u64(9), &RandomizerOptions::new(9, 0), &assign)
            .unwrap();

        let crow = result.silo(RandomSilo::Crow).unwrap();
        let reward = crow.mapping[&slot("goods:3@event:3")][0];
        assert_eq!(reward.scope, ItemScope::SPECIAL);
        assert!(result.locationless_items.contains(&reward.item));

        let quest = &result.hints["quest items"];
        assert_eq!(quest.len(), 1);
        assert!(result.hints["key items"].is_empty());
        let (source, target) = quest.iter().next().unwrap();
        assert_eq!(*source, slot("goods:2@event:2"));
        assert_eq!(result.special_assign[&goods(2)], *target);
    }

    #[test]
    fn rings_are_ordered_by_progression() {
        let data = catalog(&[
            ("ring:100@event:1", "event:1"),
            ("ring:101@event:2", "event:2"),
            ("ring:102@event:3", "event:3"),
        ]);
        let ann = annotate(&[
            ("event:1", "a", &[]),
            ("event:2", "b", &[]),
            ("event:3", "c", &[]),
        ]);
        let assign = solver(&["a", "b", "c"]);

        for seed in 0..10 {
            let perm = Permutation::new(&data, &ann);
            let result = perm
                .logic(&mut StdRng::seed_from_u64(seed), &RandomizerOptions::new(seed, 50), &assign)
                .unwrap();
            let finite = result.silo(RandomSilo::Finite).unwrap();
            let order: Vec<i32> = ["ring:100@event:1", "ring:101@event:2", "ring:102@event:3"]
                .iter()
                .map(|t| finite.mapping[&slot(t)][0].item.id)
                .collect();
            assert_eq!(order, vec![100, 101, 102], "seed {seed}");
        }
    }

    #[test]
    fn no_logic_keeps_everything_placed() {
        let data = catalog(&[
            ("goods:1@event:1", "event:1"),
            ("goods:2@event:2", "event:2"),
            ("goods:3@shop_infinite:3", "shop_infinite:3"),
        ]);
        let ann = annotate(&[
            ("event:1", "a", &[]),
            ("event:2", "b", &[]),
            ("shop_infinite:3", "b", &["norandom"]),
        ]);
        let perm = Permutation::new(&data, &ann);
        let result = perm
            .no_logic(&mut StdRng::seed_from_u64(5), &RandomizerOptions::new(5, 0))
            .unwrap();
        assert_eq!(result.silo(RandomSilo::Finite).unwrap().placed_sources().len(), 2);
        let fixed = slot("goods:3@shop_infinite:3");
        assert_eq!(result.silo(RandomSilo::Unchanged).unwrap().mapping[&fixed], vec![fixed]);
        assert!(result.log_order.is_empty());
    }
}
