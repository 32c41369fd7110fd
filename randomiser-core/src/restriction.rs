use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::annotations::{AnnotationData, PlacementSlotAnnotation};
use crate::catalog::{ItemKey, LocationScope};
use crate::key_items::KeyItemAssignment;
use crate::partition::{PartitionTree, PendingItemSlot, SlotAmount};
use crate::silo::{RandomSilo, SiloPermutation};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Every applicable slot group is charged on each placement.
    Flat,
    Partitioned(PartitionTree),
}

/// Where one item (or a family of items sharing a rule) may still go this
/// run.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub slots: Vec<PendingItemSlot>,
    pub placement: Placement,
    pub exclude_tags: BTreeSet<String>,
    /// When set, a target needs at least one of these tags.
    pub require_tags: Option<BTreeSet<String>>,
    pub restricted_locs: Option<Vec<LocationScope>>,
    pub total_amount: u32,
    pub free_amount: u32,
}

impl PendingItem {
    pub fn new(slots: Vec<PendingItemSlot>) -> Self {
        PendingItem {
            slots,
            placement: Placement::Flat,
            exclude_tags: BTreeSet::new(),
            require_tags: None,
            restricted_locs: None,
            total_amount: 0,
            free_amount: 0,
        }
    }

    /// No location limits, only tag rules added later.
    pub fn unrestricted() -> Self {
        PendingItem::new(vec![PendingItemSlot::unbounded(None)])
    }

    fn direct_area_placement(areas: BTreeSet<String>) -> Self {
        PendingItem::new(vec![PendingItemSlot::unbounded(Some(areas))])
    }

    pub fn is_satisfied(&self) -> bool {
        match &self.placement {
            Placement::Flat => true,
            Placement::Partitioned(tree) => tree.is_satisfied(&self.slots),
        }
    }

    /// Checks whether one more copy may go to a target with these tags in
    /// `effective_loc`, and charges the counters if so.
    pub fn try_place_item_in_location(
        &mut self,
        tags: &[String],
        effective_loc: &str,
        event: Option<&str>,
        quantity: u32,
    ) -> bool {
        if tags.iter().any(|t| self.exclude_tags.contains(t)) {
            return false;
        }
        if let Some(required) = &self.require_tags {
            if !tags.iter().any(|t| required.contains(t)) {
                return false;
            }
        }
        if self.free_amount == 0 {
            return false;
        }

        match &self.placement {
            Placement::Flat => {
                // An event takes precedence over the area it is in.
                let lookup = event.unwrap_or(effective_loc);
                let applicable: Vec<usize> = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| {
                        slot.amount.has_room(quantity)
                            && !slot.amount.is_exhausted()
                            && slot.allows(lookup)
                            && slot
                                .additional_exclude_tag
                                .as_ref()
                                .map_or(true, |tag| !tags.contains(tag))
                    })
                    .map(|(i, _)| i)
                    .collect();
                if applicable.is_empty() {
                    return false;
                }
                for i in applicable {
                    self.slots[i].amount.take(quantity);
                }
            }
            Placement::Partitioned(tree) => {
                if !tree.all_areas().contains(effective_loc) {
                    return false;
                }
                let idx = tree.find(effective_loc);
                if !tree.try_place(idx, &mut self.slots, self.free_amount, quantity) {
                    return false;
                }
            }
        }
        self.free_amount -= 1;
        true
    }
}

/// Every restriction of one silo. Items named together by a rule point at
/// the same entry, so they draw from the same counters.
#[derive(Debug, Clone, Default)]
pub struct Restrictions {
    items: Vec<PendingItem>,
    index: HashMap<ItemKey, usize>,
}

impl Restrictions {
    pub fn contains(&self, item: &ItemKey) -> bool {
        self.index.contains_key(item)
    }

    pub fn get(&self, item: &ItemKey) -> Option<&PendingItem> {
        self.index.get(item).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, item: &ItemKey) -> Option<&mut PendingItem> {
        let i = *self.index.get(item)?;
        Some(&mut self.items[i])
    }

    pub fn insert(&mut self, item: ItemKey, pending: PendingItem) -> usize {
        self.items.push(pending);
        let id = self.items.len() - 1;
        self.index.insert(item, id);
        id
    }

    /// Points `item` at an existing entry. An item that already has its own
    /// restriction keeps it.
    pub fn share(&mut self, item: ItemKey, id: usize) -> bool {
        if self.index.contains_key(&item) {
            return false;
        }
        self.index.insert(item, id);
        true
    }

    /// The restriction for `item`, created without limits if missing.
    pub fn ensure(&mut self, item: ItemKey) -> &mut PendingItem {
        let id = match self.index.get(&item) {
            Some(&id) => id,
            None => self.insert(item, PendingItem::unrestricted()),
        };
        &mut self.items[id]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items with their restriction, sorted by item.
    pub fn entries(&self) -> Vec<(ItemKey, &PendingItem)> {
        let mut entries: Vec<(ItemKey, &PendingItem)> = self
            .index
            .iter()
            .map(|(item, &id)| (*item, &self.items[id]))
            .collect();
        entries.sort_by_key(|(item, _)| *item);
        entries
    }
}

pub struct RestrictionBuilder<'a> {
    pub ann: &'a AnnotationData,
    pub assign: &'a KeyItemAssignment,
    pub race_mode: bool,
}

impl<'a> RestrictionBuilder<'a> {
    pub fn build(&self, silo: &SiloPermutation) -> Result<Restrictions> {
        let mut restrictions = Restrictions::default();
        let kind = silo.silo;

        // The key item solver already took placement rules into account.
        if kind == RandomSilo::Finite {
            for (item, areas) in &self.assign.assign {
                restrictions.insert(*item, PendingItem::direct_area_placement(areas.clone()));
            }
        }

        for (key, rule) in &self.ann.item_restrict {
            if restrictions.contains(key) {
                continue;
            }

            let mut pending = None;
            if kind == RandomSilo::Finite {
                if let Some(unique) = &rule.unique {
                    let mut item = PendingItem::new(self.slots_from_placement(unique, None));
                    if let Some(tree) = PartitionTree::build(&item.slots)? {
                        debug!(item = %key, "partitions:\n{}", tree.describe(&item.slots));
                        item.placement = Placement::Partitioned(tree);
                    }
                    pending = Some(item);
                } else if let Some(key_areas) = &rule.key_areas {
                    let mut areas = BTreeSet::new();
                    for area in key_areas.split_whitespace() {
                        areas.insert(area.to_string());
                        if let Some(events) = self.ann.area_events.get(area) {
                            areas.extend(events.iter().cloned());
                        }
                    }
                    pending = Some(PendingItem::direct_area_placement(areas));
                }
            }
            if matches!(kind, RandomSilo::Infinite | RandomSilo::InfiniteShop)
                && (rule.shop.is_some() || rule.drop.is_some())
            {
                let mut slots = Vec::new();
                if let Some(shop) = &rule.shop {
                    slots.extend(self.slots_from_placement(shop, Some("noshop")));
                }
                if let Some(drop) = &rule.drop {
                    slots.extend(self.slots_from_placement(drop, Some("shop")));
                }
                pending = Some(PendingItem::new(slots));
            }

            if let Some(pending) = pending {
                let id = restrictions.insert(*key, pending);
                for other in &rule.other_keys {
                    if restrictions.share(*other, id) {
                        debug!(item = %key, other = %other, "sharing placement rule");
                    } else {
                        debug!(item = %key, other = %other, "not sharing, item has its own rule");
                    }
                }
            }
        }

        for (item, tags) in &self.ann.exclude_tags {
            restrictions.ensure(*item).exclude_tags = tags.clone();
        }
        if self.race_mode {
            for item in &self.ann.race_mode_items {
                restrictions.ensure(*item).require_tags = Some(self.ann.race_mode_tags.clone());
            }
        }
        for (item, locs) in &self.assign.restricted_items {
            restrictions.ensure(*item).restricted_locs = Some(locs.clone());
        }

        for source in &silo.sources {
            if let Some(pending) = restrictions.get_mut(&source.item) {
                pending.total_amount += 1;
                pending.free_amount += 1;
            }
        }
        Ok(restrictions)
    }

    fn slots_from_placement(
        &self,
        slots: &[PlacementSlotAnnotation],
        exclude_tag: Option<&str>,
    ) -> Vec<PendingItemSlot> {
        slots
            .iter()
            .map(|slot| {
                // Anything not named in the annotations could never match a target.
                let locs: BTreeSet<String> = slot
                    .allowed_areas(&self.assign.included_areas)
                    .filter(|a| self.ann.is_known_location(a))
                    .map(str::to_string)
                    .collect();
                PendingItemSlot {
                    allowed_locations: Some(locs),
                    additional_exclude_tag: exclude_tag.map(str::to_string),
                    amount: slot.amount.map_or(SlotAmount::Unbounded, SlotAmount::fixed),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::PlacementRestrictionAnnotation;
    use crate::testutil::{goods, slot};

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn finite_with(sources: &[&str]) -> SiloPermutation {
        let mut silo = SiloPermutation::new(RandomSilo::Finite);
        silo.sources = sources.iter().map(|s| slot(s)).collect();
        silo
    }

    fn two_in_castle() -> PlacementRestrictionAnnotation {
        PlacementRestrictionAnnotation {
            unique: Some(vec![PlacementSlotAnnotation {
                amount: Some(2),
                areas: vec!["castle".into()],
            }]),
            ..PlacementRestrictionAnnotation::default()
        }
    }

    #[test]
    fn tag_rules_come_first() {
        let mut pending = PendingItem::unrestricted();
        pending.free_amount = 3;
        pending.exclude_tags.insert("missable".into());
        assert!(!pending.try_place_item_in_location(&tags(&["missable"]), "castle", None, 1));

        pending.require_tags = Some(BTreeSet::from(["race".to_string()]));
        assert!(!pending.try_place_item_in_location(&tags(&["boss"]), "castle", None, 1));
        assert!(pending.try_place_item_in_location(&tags(&["race"]), "castle", None, 1));
        assert_eq!(pending.free_amount, 2);
    }

    #[test]
    fn flat_groups_prefer_events_and_honour_exclude_tag() {
        let mut pending = PendingItem::new(vec![PendingItemSlot {
            allowed_locations: Some(BTreeSet::from(["boss_dead".to_string()])),
            additional_exclude_tag: Some("shop".into()),
            amount: SlotAmount::fixed(1),
        }]);
        pending.free_amount = 2;

        assert!(!pending.try_place_item_in_location(&[], "boss_dead", Some("other_event"), 1));
        assert!(!pending.try_place_item_in_location(&tags(&["shop"]), "castle", Some("boss_dead"), 1));
        assert!(pending.try_place_item_in_location(&[], "castle", Some("boss_dead"), 1));
        // The single copy is used up.
        assert!(!pending.try_place_item_in_location(&[], "castle", Some("boss_dead"), 1));
        assert_eq!(pending.slots[0].amount.remaining(), Some(0));
    }

    #[test]
    fn builder_counts_sources_and_partitions_unique_rules() {
        let mut ann = AnnotationData::default();
        ann.areas.insert("castle".into());
        let mut rule = two_in_castle();
        rule.other_keys = vec![goods(2)];
        ann.item_restrict.insert(goods(1), rule);
        ann.exclude_tags
            .insert(goods(3), BTreeSet::from(["boss".to_string()]));
        let assign = KeyItemAssignment::default();

        let builder = RestrictionBuilder {
            ann: &ann,
            assign: &assign,
            race_mode: false,
        };
        let silo = finite_with(&["goods:1@event:1", "goods:1@event:2", "goods:2@event:3", "goods:9@event:4"]);
        let restrictions = builder.build(&silo).unwrap();

        let shared = restrictions.get(&goods(1)).unwrap();
        assert!(matches!(shared.placement, Placement::Partitioned(_)));
        assert_eq!(shared.total_amount, 3);
        assert_eq!(restrictions.get(&goods(2)), Some(shared));
        assert_eq!(restrictions.get(&goods(3)).unwrap().total_amount, 0);
        assert!(!restrictions.contains(&goods(9)));
        assert_eq!(restrictions.len(), 2);
    }

    #[test]
    fn key_item_areas_win_over_rules() {
        let mut ann = AnnotationData::default();
        ann.areas.insert("castle".into());
        ann.item_restrict.insert(goods(1), two_in_castle());
        let mut assign = KeyItemAssignment::default();
        assign
            .assign
            .insert(goods(1), BTreeSet::from(["tower".to_string()]));

        let builder = RestrictionBuilder {
            ann: &ann,
            assign: &assign,
            race_mode: false,
        };
        let restrictions = builder.build(&finite_with(&["goods:1@event:1"])).unwrap();
        let pending = restrictions.get(&goods(1)).unwrap();
        assert_eq!(pending.placement, Placement::Flat);
        assert!(pending.slots[0].allows("tower"));
        assert!(!pending.slots[0].allows("castle"));
    }

    #[test]
    fn shared_rule_leaves_key_item_areas_alone() {
        let mut ann = AnnotationData::default();
        ann.areas.insert("castle".into());
        let mut rule = two_in_castle();
        rule.other_keys = vec![goods(2)];
        ann.item_restrict.insert(goods(1), rule);
        let mut assign = KeyItemAssignment::default();
        assign
            .assign
            .insert(goods(2), BTreeSet::from(["tower".to_string()]));

        let builder = RestrictionBuilder {
            ann: &ann,
            assign: &assign,
            race_mode: false,
        };
        let restrictions = builder
            .build(&finite_with(&["goods:1@event:1", "goods:2@event:2"]))
            .unwrap();

        let key = restrictions.get(&goods(2)).unwrap();
        assert_eq!(key.placement, Placement::Flat);
        assert!(key.slots[0].allows("tower"));
        assert!(!key.slots[0].allows("castle"));
        assert_eq!(key.total_amount, 1);

        let ruled = restrictions.get(&goods(1)).unwrap();
        assert!(matches!(ruled.placement, Placement::Partitioned(_)));
        assert_eq!(ruled.total_amount, 1);
        assert_eq!(restrictions.len(), 2);
    }

    #[test]
    fn shop_rules_only_apply_to_infinite_silos() {
        let mut ann = AnnotationData::default();
        ann.areas.insert("castle".into());
        ann.item_restrict.insert(
            goods(5),
            PlacementRestrictionAnnotation {
                shop: Some(vec![PlacementSlotAnnotation {
                    amount: None,
                    areas: vec!["castle".into(), "nowhere".into()],
                }]),
                ..PlacementRestrictionAnnotation::default()
            },
        );
        ann.race_mode_items = vec![goods(5)];
        ann.race_mode_tags = BTreeSet::from(["race".to_string()]);
        let assign = KeyItemAssignment::default();
        let builder = RestrictionBuilder {
            ann: &ann,
            assign: &assign,
            race_mode: false,
        };

        assert!(builder.build(&finite_with(&["goods:5@event:1"])).unwrap().is_empty());

        let mut shop = SiloPermutation::new(RandomSilo::InfiniteShop);
        shop.sources = vec![slot("goods:5@shop_infinite:1")];
        let restrictions = builder.build(&shop).unwrap();
        let pending = restrictions.get(&goods(5)).unwrap();
        assert_eq!(pending.slots[0].additional_exclude_tag.as_deref(), Some("noshop"));
        assert!(pending.slots[0].allows("castle"));
        assert!(!pending.slots[0].allows("nowhere"));
        assert!(pending.require_tags.is_none());

        let racing = RestrictionBuilder {
            race_mode: true,
            ..builder
        };
        let restrictions = racing.build(&shop).unwrap();
        assert!(restrictions.get(&goods(5)).unwrap().require_tags.is_some());
    }
}
