use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{RandomiserError, Result};

const MAX_SLOT_GROUPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAmount {
    Unbounded,
    Fixed { expected: u32, remaining: u32 },
}

impl SlotAmount {
    pub fn fixed(amount: u32) -> Self {
        SlotAmount::Fixed {
            expected: amount,
            remaining: amount,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            SlotAmount::Unbounded => None,
            SlotAmount::Fixed { remaining, .. } => Some(*remaining),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, SlotAmount::Fixed { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    pub fn has_room(&self, quantity: u32) -> bool {
        self.remaining().map_or(true, |r| r >= quantity)
    }

    /// Charges `quantity` against the counter. Refuses rather than going
    /// below zero.
    pub fn take(&mut self, quantity: u32) -> bool {
        match self {
            SlotAmount::Unbounded => true,
            SlotAmount::Fixed { remaining, .. } => match remaining.checked_sub(quantity) {
                Some(left) => {
                    *remaining = left;
                    true
                }
                None => false,
            },
        }
    }
}

impl fmt::Display for SlotAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAmount::Unbounded => f.write_str("*"),
            SlotAmount::Fixed {
                expected,
                remaining,
            } if expected == remaining => write!(f, "{remaining}"),
            SlotAmount::Fixed {
                expected,
                remaining,
            } => write!(f, "{remaining}/{expected}"),
        }
    }
}

/// A group of places one item may go, with an optional cap on how many
/// copies it takes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItemSlot {
    /// Areas or events. `None` means anywhere.
    pub allowed_locations: Option<BTreeSet<String>>,
    /// Targets carrying this tag are not part of the group.
    pub additional_exclude_tag: Option<String>,
    pub amount: SlotAmount,
}

impl PendingItemSlot {
    pub fn unbounded(allowed_locations: Option<BTreeSet<String>>) -> Self {
        PendingItemSlot {
            allowed_locations,
            additional_exclude_tag: None,
            amount: SlotAmount::Unbounded,
        }
    }

    pub fn allows(&self, location: &str) -> bool {
        self.allowed_locations
            .as_ref()
            .map_or(true, |locs| locs.contains(location))
    }
}

impl fmt::Display for PendingItemSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locs = self
            .allowed_locations
            .as_ref()
            .map(|l| l.iter().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        write!(f, "[{} in [{}]]", self.amount, locs)
    }
}

/// Areas admitted by exactly the same set of fixed slot groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Slot membership as a bit string, first group first.
    pub key: String,
    /// Indices of the fixed slot groups covering these areas.
    pub slots: Vec<usize>,
    pub areas: BTreeSet<String>,
    /// Partitions covered by a strict superset of our slot groups.
    pub more_restrictive: Vec<usize>,
    /// Other roots, competing for the same copies.
    pub alternates: Vec<usize>,
}

/// Feasibility DAG over one item's slot groups. Index 0 is a synthetic root
/// standing for every area no fixed group covers.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionTree {
    partitions: Vec<Partition>,
    all_areas: BTreeSet<String>,
}

impl PartitionTree {
    /// Returns `None` when no slot group has a fixed amount, in which case
    /// there is nothing to partition.
    pub fn build(slots: &[PendingItemSlot]) -> Result<Option<PartitionTree>> {
        if slots.iter().all(|s| !s.amount.is_fixed()) {
            return Ok(None);
        }
        if slots.len() > MAX_SLOT_GROUPS {
            return Err(RandomiserError::Config(format!(
                "{} slot groups in one placement rule, at most {MAX_SLOT_GROUPS} are supported",
                slots.len()
            )));
        }

        let mut all_areas = BTreeSet::new();
        let mut area_masks: BTreeMap<&str, u64> = BTreeMap::new();
        for (i, slot) in slots.iter().enumerate() {
            let Some(locs) = &slot.allowed_locations else {
                continue;
            };
            all_areas.extend(locs.iter().cloned());
            if !slot.amount.is_fixed() {
                continue;
            }
            for loc in locs {
                *area_masks.entry(loc.as_str()).or_default() |= 1 << i;
            }
        }

        let mut mask_areas: BTreeMap<u64, BTreeSet<String>> = BTreeMap::new();
        for (area, mask) in area_masks {
            mask_areas.entry(mask).or_default().insert(area.to_string());
        }

        let masks: Vec<u64> = mask_areas.keys().copied().collect();
        let mut partitions = vec![Partition {
            key: String::new(),
            slots: Vec::new(),
            areas: BTreeSet::new(),
            more_restrictive: Vec::new(),
            alternates: Vec::new(),
        }];
        for (mask, areas) in mask_areas {
            partitions.push(Partition {
                key: mask_key(mask, slots.len()),
                slots: (0..slots.len()).filter(|i| mask & (1 << i) != 0).collect(),
                areas,
                more_restrictive: Vec::new(),
                alternates: Vec::new(),
            });
        }

        // u -> v when v needs every group u does and more.
        let mut has_parent = vec![false; partitions.len()];
        for (ui, &u) in masks.iter().enumerate() {
            for (vi, &v) in masks.iter().enumerate() {
                if u != v && u & v == u {
                    partitions[ui + 1].more_restrictive.push(vi + 1);
                    has_parent[vi + 1] = true;
                }
            }
        }

        let roots: Vec<usize> = (1..partitions.len()).filter(|&i| !has_parent[i]).collect();
        for &root in &roots {
            partitions[root].alternates = roots.iter().copied().filter(|&r| r != root).collect();
        }
        partitions[0].more_restrictive = roots;

        Ok(Some(PartitionTree {
            partitions,
            all_areas,
        }))
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn all_areas(&self) -> &BTreeSet<String> {
        &self.all_areas
    }

    /// The partition holding `area`, or the root when no fixed group
    /// covers it.
    pub fn find(&self, area: &str) -> usize {
        self.partitions
            .iter()
            .position(|p| p.areas.contains(area))
            .unwrap_or(0)
    }

    fn open_slots<'s>(
        &'s self,
        idx: usize,
        slots: &'s [PendingItemSlot],
    ) -> impl Iterator<Item = usize> + 's {
        self.partitions[idx]
            .slots
            .iter()
            .copied()
            .filter(move |&s| slots[s].amount.remaining().is_some_and(|r| r > 0))
    }

    /// Largest amount still owed to one of this partition's groups, leaving
    /// out groups already counted.
    pub fn count_slots(
        &self,
        idx: usize,
        slots: &[PendingItemSlot],
        taken: &BTreeSet<usize>,
    ) -> u32 {
        self.open_slots(idx, slots)
            .filter(|s| !taken.contains(s))
            .filter_map(|s| slots[s].amount.remaining())
            .max()
            .unwrap_or(0)
    }

    /// Copies that must stay free for this partition and the ones directly
    /// below it. Every group looked at is added to `taken`.
    pub fn count_more_restrictive(
        &self,
        idx: usize,
        slots: &[PendingItemSlot],
        taken: &mut BTreeSet<usize>,
    ) -> u32 {
        let family: Vec<usize> = std::iter::once(idx)
            .chain(self.partitions[idx].more_restrictive.iter().copied())
            .collect();
        let reserved = family
            .iter()
            .map(|&p| self.count_slots(p, slots, taken))
            .max()
            .unwrap_or(0);
        for &p in &family {
            let open: Vec<usize> = self.open_slots(p, slots).collect();
            taken.extend(open);
        }
        reserved
    }

    /// Places one copy in partition `idx` if that still leaves enough copies
    /// for the partitions that can only be served by fewer areas.
    pub fn try_place(
        &self,
        idx: usize,
        slots: &mut [PendingItemSlot],
        remaining: u32,
        quantity: u32,
    ) -> bool {
        let partition = &self.partitions[idx];
        let mut taken: BTreeSet<usize> = self.open_slots(idx, slots).collect();
        let reserved = if idx == 0 {
            // Outside every fixed group: each root is owed its own copies.
            partition
                .more_restrictive
                .iter()
                .map(|&root| self.count_more_restrictive(root, slots, &mut taken))
                .sum()
        } else {
            let below = self.count_more_restrictive(idx, slots, &mut taken);
            let exclusive: u32 = partition
                .alternates
                .iter()
                .map(|&alt| self.count_more_restrictive(alt, slots, &mut taken))
                .sum();
            below.max(exclusive)
        };

        if remaining <= reserved {
            return false;
        }
        if !partition.slots.iter().all(|&s| slots[s].amount.has_room(quantity)) {
            return false;
        }
        for &s in &partition.slots {
            slots[s].amount.take(quantity);
        }
        true
    }

    pub fn is_satisfied(&self, slots: &[PendingItemSlot]) -> bool {
        self.partitions
            .iter()
            .all(|p| self.open_slots_of(p, slots) == 0)
    }

    fn open_slots_of(&self, partition: &Partition, slots: &[PendingItemSlot]) -> usize {
        partition
            .slots
            .iter()
            .filter(|&&s| slots[s].amount.remaining().is_some_and(|r| r > 0))
            .count()
    }

    /// One line per partition, for debug output.
    pub fn describe(&self, slots: &[PendingItemSlot]) -> String {
        let mut out = String::new();
        for p in &self.partitions {
            let amounts: Vec<String> = p.slots.iter().map(|&s| slots[s].amount.to_string()).collect();
            let children: Vec<&str> = p
                .more_restrictive
                .iter()
                .map(|&c| self.partitions[c].key.as_str())
                .collect();
            let areas = if p.areas.is_empty() {
                &self.all_areas
            } else {
                &p.areas
            };
            out.push_str(&format!(
                "[{}]({}) -> [{}]: {}\n",
                p.key,
                amounts.join(","),
                children.join(","),
                areas.iter().cloned().collect::<Vec<_>>().join(",")
            ));
        }
        out
    }
}

fn mask_key(mask: u64, len: usize) -> String {
    (0..len)
        .map(|i| if mask & (1 << i) != 0 { '1' } else { '0' })
        .collect()
}
