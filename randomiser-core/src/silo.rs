use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

use crate::annotations::AnnotationData;
use crate::catalog::{ItemKey, LocationData, LocationScope, ScopeType, SlotKey};

/// Independent randomization pools. Items only ever move between slots of
/// the same silo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RandomSilo {
    /// One-time pickups: events, materials, entities, specials.
    Finite,
    /// Repeatable enemy drops.
    Infinite,
    /// Shop listings with both a finite and an infinite stock.
    Mixed,
    /// Not randomized, every slot maps to itself.
    #[serde(rename = "SELF")]
    Unchanged,
    Remove,
    /// Filled with rewards drawn from the `crowrewards` group.
    Crow,
    InfiniteShop,
    /// Infinite gear, shared by shops and drops.
    InfiniteGear,
    /// Drops that always happen.
    InfiniteCertain,
}

impl RandomSilo {
    pub const ALL: [RandomSilo; 9] = [
        RandomSilo::Finite,
        RandomSilo::Infinite,
        RandomSilo::Mixed,
        RandomSilo::Unchanged,
        RandomSilo::Remove,
        RandomSilo::Crow,
        RandomSilo::InfiniteShop,
        RandomSilo::InfiniteGear,
        RandomSilo::InfiniteCertain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RandomSilo::Finite => "FINITE",
            RandomSilo::Infinite => "INFINITE",
            RandomSilo::Mixed => "MIXED",
            RandomSilo::Unchanged => "SELF",
            RandomSilo::Remove => "REMOVE",
            RandomSilo::Crow => "CROW",
            RandomSilo::InfiniteShop => "INFINITE_SHOP",
            RandomSilo::InfiniteGear => "INFINITE_GEAR",
            RandomSilo::InfiniteCertain => "INFINITE_CERTAIN",
        }
    }

    /// Silos filled outside the assignment engine.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            RandomSilo::Unchanged | RandomSilo::Remove | RandomSilo::Crow
        )
    }

    /// The silo a slot of this scope type naturally belongs to.
    pub fn can_permute_to(scope_type: ScopeType) -> Option<RandomSilo> {
        match scope_type {
            ScopeType::Event | ScopeType::Material | ScopeType::Entity | ScopeType::Special => {
                Some(RandomSilo::Finite)
            }
            ScopeType::ShopInfinite => Some(RandomSilo::InfiniteShop),
            ScopeType::Model => Some(RandomSilo::Infinite),
            ScopeType::ShopInfiniteEvent => Some(RandomSilo::Mixed),
            ScopeType::Asset => None,
        }
    }

    fn gear_variant(self) -> Option<RandomSilo> {
        match self {
            RandomSilo::Infinite | RandomSilo::InfiniteShop => Some(RandomSilo::InfiniteGear),
            _ => None,
        }
    }
}

impl fmt::Display for RandomSilo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiloPermutation {
    pub silo: RandomSilo,
    pub sources: Vec<SlotKey>,
    pub targets: Vec<LocationScope>,
    /// Slots at a target scope that belong to another silo.
    #[serde(skip)]
    pub exclude_targets: BTreeSet<SlotKey>,
    /// Target slot to every source placed there, in placement order.
    pub mapping: BTreeMap<SlotKey, Vec<SlotKey>>,
}

impl SiloPermutation {
    pub fn new(silo: RandomSilo) -> Self {
        SiloPermutation {
            silo,
            sources: Vec::new(),
            targets: Vec::new(),
            exclude_targets: BTreeSet::new(),
            mapping: BTreeMap::new(),
        }
    }

    /// Every slot this silo may place into, in target order.
    pub fn target_slots(&self, data: &LocationData) -> Vec<SlotKey> {
        self.targets
            .iter()
            .flat_map(|loc| data.slots_at(loc).iter().copied())
            .filter(|slot| !self.exclude_targets.contains(slot))
            .collect()
    }

    pub fn add_mapping(&mut self, target: SlotKey, source: SlotKey) {
        self.mapping.entry(target).or_default().push(source);
    }

    pub fn occupants(&self, target: &SlotKey) -> &[SlotKey] {
        self.mapping.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_occupied(&self, target: &SlotKey) -> bool {
        !self.occupants(target).is_empty()
    }

    pub fn remove_occupant(&mut self, target: &SlotKey, index: usize) -> Option<SlotKey> {
        let sources = self.mapping.get_mut(target)?;
        if index >= sources.len() {
            return None;
        }
        let victim = sources.remove(index);
        if sources.is_empty() {
            self.mapping.remove(target);
        }
        Some(victim)
    }

    /// Sources already bound to some target.
    pub fn placed_sources(&self) -> BTreeSet<SlotKey> {
        self.mapping.values().flatten().copied().collect()
    }
}

fn empty_silos() -> BTreeMap<RandomSilo, SiloPermutation> {
    RandomSilo::ALL
        .iter()
        .map(|&silo| (silo, SiloPermutation::new(silo)))
        .collect()
}

// Which items at a scope stay where they are.
enum Norandom<'a> {
    None,
    All,
    Items(Vec<&'a ItemKey>),
}

impl Norandom<'_> {
    fn contains(&self, item: &ItemKey) -> bool {
        match self {
            Norandom::None => false,
            Norandom::All => true,
            Norandom::Items(items) => items.contains(&item),
        }
    }
}

/// Sorts every catalog slot into exactly one silo. Runs once per catalog;
/// the result is only ever pruned afterwards, never extended.
pub fn classify_silos(
    data: &LocationData,
    ann: &AnnotationData,
) -> BTreeMap<RandomSilo, SiloPermutation> {
    let mut silos = empty_silos();
    let remove_items = ann.group("remove");
    let norandom_shop = ann.group("norandomshop");
    let norandom_drop = ann.group("norandomdrop");

    for (loc, slots) in &data.locations {
        let mut norandom = Norandom::None;
        let mut crow = false;
        let mut remove_scope = false;

        match ann.slot(loc) {
            Some(slot_ann) => {
                let mut items = Vec::new();
                if slot_ann.has_tag("norandom") {
                    norandom = Norandom::All;
                }
                if let Some(tagged) = slot_ann.tag_items.get("norandom") {
                    items.extend(tagged.iter());
                }
                if slot_ann.has_tag("shop") {
                    items.extend(norandom_shop.iter());
                }
                if !matches!(norandom, Norandom::All) && !items.is_empty() {
                    norandom = Norandom::Items(items);
                }
                crow = slot_ann.has_tag("crow");
                remove_scope = slot_ann.has_tag("remove");
            }
            None if loc.scope_type == ScopeType::Model => {
                // Some drop tables are used by other mods for convenience items.
                if !norandom_drop.is_empty() {
                    norandom = Norandom::Items(norandom_drop.iter().collect());
                }
            }
            None => norandom = Norandom::All,
        }

        let mut source_silos = BTreeSet::new();
        let mut norandom_slots = Vec::new();
        for slot in slots {
            let Some(location) = data.location(slot) else {
                warn!(%slot, "slot has no catalog data, leaving it out of every silo");
                continue;
            };
            let Some(natural) = RandomSilo::can_permute_to(location.scope.scope_type) else {
                continue;
            };
            let item = slot.item;

            if remove_scope {
                add_self_mapping(&mut silos, RandomSilo::Remove, *slot);
                if let Some(finite) = silos.get_mut(&RandomSilo::Finite) {
                    finite.exclude_targets.insert(*slot);
                }
            } else if remove_items.contains(&item) {
                // The item goes away but the spot is still usable.
                add_self_mapping(&mut silos, RandomSilo::Remove, *slot);
                source_silos.insert(natural);
            } else if norandom.contains(&item) || ann.norandom_items.contains(&item) {
                add_self_mapping(&mut silos, RandomSilo::Unchanged, *slot);
                norandom_slots.push(*slot);
            } else if crow {
                source_silos.insert(RandomSilo::Crow);
            } else {
                let mut silo = natural;
                if item.is_gear() {
                    if let Some(gear) = silo.gear_variant() {
                        silo = gear;
                    }
                }
                if location.scope.scope_type == ScopeType::Model && location.is_certain() {
                    silo = RandomSilo::InfiniteCertain;
                }
                if let Some(perm) = silos.get_mut(&silo) {
                    perm.sources.push(*slot);
                }
                source_silos.insert(silo);
            }
        }

        // Special scopes are made up by the engine and can't receive anything.
        if source_silos.is_empty() || loc.scope_type == ScopeType::Special {
            continue;
        }
        for silo in source_silos {
            if let Some(perm) = silos.get_mut(&silo) {
                perm.targets.push(*loc);
                perm.exclude_targets.extend(norandom_slots.iter().copied());
            }
        }
    }

    silos
}

fn add_self_mapping(
    silos: &mut BTreeMap<RandomSilo, SiloPermutation>,
    silo: RandomSilo,
    slot: SlotKey,
) {
    if let Some(perm) = silos.get_mut(&silo) {
        perm.add_mapping(slot, slot);
    }
}
