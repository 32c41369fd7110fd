use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::annotations::AnnotationData;
use crate::catalog::{ItemKey, ItemScope, LocationData, LocationScope, ScopeType, SlotKey};
use crate::options::AssignmentLimits;
use crate::restriction::Restrictions;
use crate::shuffle::choice;
use crate::silo::{RandomSilo, SiloPermutation};
use crate::{RandomiserError, Result};

/// Sources waiting for a target that suits them.
#[derive(Debug, Default)]
pub struct RestrictedItemQueue {
    queue: VecDeque<SlotKey>,
}

impl RestrictedItemQueue {
    pub fn enqueue(&mut self, slot: SlotKey) {
        self.queue.push_back(slot);
    }

    /// Removes and returns the first source `accept` takes. Each distinct
    /// item is only offered once, since its copies would be judged the same.
    pub fn dequeue<F>(&mut self, mut accept: F) -> Result<Option<SlotKey>>
    where
        F: FnMut(&SlotKey) -> Result<bool>,
    {
        let mut tried: HashSet<ItemKey> = HashSet::new();
        for i in 0..self.queue.len() {
            let slot = self.queue[i];
            if !tried.insert(slot.item) {
                continue;
            }
            if accept(&slot)? {
                self.queue.remove(i);
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = SlotKey> + '_ {
        self.queue.drain(..)
    }
}

/// Binds the sources of one silo to its targets.
pub struct Assigner<'a> {
    pub data: &'a LocationData,
    pub ann: &'a AnnotationData,
    pub effective_location: &'a BTreeMap<LocationScope, String>,
    /// Items never evicted once placed.
    pub protected: &'a BTreeSet<ItemKey>,
    pub limits: AssignmentLimits,
}

impl<'a> Assigner<'a> {
    /// Whether `source` may go to `target`. Charges the source's
    /// restriction when it says yes.
    pub fn try_use(
        &self,
        target: &SlotKey,
        source: &SlotKey,
        restrictions: &mut Restrictions,
    ) -> Result<bool> {
        let item = source.item;
        let target_loc = self
            .data
            .location(target)
            .ok_or(RandomiserError::MissingCatalogData(*target))?;
        let loc = target_loc.loc_scope;
        let unique = self
            .data
            .is_unique(&item)
            .ok_or(RandomiserError::MissingCatalogData(*source))?;

        if target.scope.scope_type == ScopeType::Material && !unique {
            return Ok(false);
        }

        let slot_ann = self.ann.slot(&loc);
        let premium = slot_ann.is_some_and(|s| s.has_tag("premium"));
        if let Some(slot_ann) = slot_ann {
            if premium && !unique {
                return Ok(false);
            }
            if slot_ann.has_tag("restrict") {
                let mut groups = slot_ann
                    .tags
                    .iter()
                    .filter(|t| t.as_str() != "restrict" && self.ann.item_groups.contains_key(*t))
                    .peekable();
                if groups.peek().is_some() && !groups.any(|g| self.ann.in_group(g, &item)) {
                    return Ok(false);
                }
            }
        }

        let Some(pending) = restrictions.get_mut(&item) else {
            return Ok(true);
        };
        if pending
            .restricted_locs
            .as_ref()
            .is_some_and(|locs| locs.contains(&loc))
        {
            return Ok(false);
        }

        let source_loc = self
            .data
            .location(source)
            .ok_or(RandomiserError::MissingCatalogData(*source))?;
        let quantity = source_loc.min_quantity();
        // Premium stock is sold once.
        if premium && quantity > 1 {
            return Ok(false);
        }

        let area = match self.effective_location.get(&loc) {
            Some(area) => area.as_str(),
            None => self.ann.area_of(&loc),
        };
        let event = slot_ann.and_then(|s| s.event.as_deref());
        let placed =
            pending.try_place_item_in_location(self.ann.tags_of(&loc), area, event, quantity);
        if placed {
            debug!(item = %item, %target, area, free = pending.free_amount, "restricted placement");
        }
        Ok(placed)
    }

    /// Whether another source fits in `target` without exceeding any of its
    /// records' `max_slots`.
    pub fn available_slot(&self, silo: &SiloPermutation, target: &SlotKey) -> bool {
        let Some(loc) = self.data.location(target) else {
            return false;
        };
        let existing = silo.occupants(target).len();
        loc.keys.iter().all(|k| existing < k.max_slots as usize)
    }

    fn try_pending(
        &self,
        target: &SlotKey,
        queue: &mut RestrictedItemQueue,
        restrictions: &mut Restrictions,
    ) -> Result<Option<SlotKey>> {
        queue.dequeue(|source| self.try_use(target, source, restrictions))
    }

    fn evictable(
        &self,
        silo: &SiloPermutation,
        target: &SlotKey,
        restrictions: &Restrictions,
    ) -> Option<usize> {
        silo.occupants(target)
            .iter()
            .position(|s| !self.protected.contains(&s.item) && !restrictions.contains(&s.item))
    }

    /// Places `items` into `locations`, both already in preference order.
    ///
    /// With `partial` set only the given items need a home (the key item
    /// pass), and failing to place any of them is an error for the seed.
    pub fn assign_items_to_locations<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        silo: &mut SiloPermutation,
        restrictions: &mut Restrictions,
        items: &[SlotKey],
        locations: &[SlotKey],
        partial: bool,
    ) -> Result<()> {
        let mut queue = RestrictedItemQueue::default();
        let mut from = 0;
        let mut pushed: Vec<SlotKey> = Vec::new();
        if partial {
            for source in items {
                queue.enqueue(*source);
            }
            from = items.len();
        }

        // Walk the targets, taking the next source that fits.
        for target in locations {
            if silo.is_occupied(target) {
                continue;
            }
            if let Some(source) = self.try_pending(target, &mut queue, restrictions)? {
                silo.add_mapping(*target, source);
                continue;
            }
            let mut placed = false;
            while from < items.len() {
                let source = items[from];
                from += 1;
                if self.try_use(target, &source, restrictions)? {
                    silo.add_mapping(*target, source);
                    placed = true;
                    break;
                }
                queue.enqueue(source);
            }
            if !placed && !partial && from == items.len() {
                pushed.push(*target);
            }
        }

        // Restricted leftovers get a few more passes, evicting ordinary items
        // where needed.
        let mut other_items: Vec<SlotKey> = Vec::new();
        for source in &items[from..] {
            if restrictions.contains(&source.item) {
                queue.enqueue(*source);
            } else {
                other_items.push(*source);
            }
        }
        let mut passes = 0;
        while !queue.is_empty() && passes < self.limits.restricted_passes {
            passes += 1;
            for target in locations {
                if queue.is_empty() {
                    break;
                }
                let victim = if self.available_slot(silo, target) {
                    None
                } else {
                    match self.evictable(silo, target, restrictions) {
                        Some(index) => Some(index),
                        None => continue,
                    }
                };
                let Some(source) = self.try_pending(target, &mut queue, restrictions)? else {
                    continue;
                };
                if let Some(index) = victim {
                    if let Some(evicted) = silo.remove_occupant(target, index) {
                        debug!(%evicted, %source, %target, "evicting for restricted item");
                        other_items.push(evicted);
                    }
                }
                silo.add_mapping(*target, source);
            }
        }
        if !queue.is_empty() {
            debug!(silo = %silo.silo, left = queue.len(), "restricted items left unsatisfied");
        }
        other_items.extend(queue.drain());

        if partial && !other_items.is_empty() {
            for source in &other_items {
                debug!(%source, "could not place key item");
            }
            return Err(RandomiserError::KeyItemPlacement);
        }

        // Whatever is left goes to the empty targets first, then anywhere
        // with room.
        let mut pushed: VecDeque<SlotKey> = pushed.into();
        for source in &other_items {
            let mut attempts = 0;
            loop {
                if let Some(target) = pushed.pop_front() {
                    if self.available_slot(silo, &target) {
                        silo.add_mapping(target, *source);
                        break;
                    }
                    continue;
                }
                if locations.is_empty() || attempts >= self.limits.fallback_attempts {
                    return Err(RandomiserError::SiloCapacity {
                        silo: silo.silo,
                        items: items.len(),
                        locations: locations.len(),
                    });
                }
                attempts += 1;
                let target = locations[rng.gen_range(0..locations.len())];
                if self.available_slot(silo, &target) {
                    silo.add_mapping(target, *source);
                    break;
                }
            }
        }

        if !partial && silo.silo == RandomSilo::Finite {
            let fodder = self.ann.group("fodder");
            for target in pushed {
                if silo.is_occupied(&target) {
                    continue;
                }
                match choice(rng, fodder) {
                    Some(item) => {
                        debug!(%target, item = %item, "filling empty target");
                        silo.add_mapping(target, SlotKey::new(*item, ItemScope::SPECIAL));
                    }
                    None => warn!(%target, "no fodder items to fill empty target"),
                }
            }
        }
        Ok(())
    }
}
