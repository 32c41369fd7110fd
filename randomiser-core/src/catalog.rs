use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{RandomiserError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemType {
    Weapon,
    Armor,
    Ring,
    Goods,
    Gem,
    Custom,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Weapon => "weapon",
            ItemType::Armor => "armor",
            ItemType::Ring => "ring",
            ItemType::Goods => "goods",
            ItemType::Gem => "gem",
            ItemType::Custom => "custom",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "weapon" => Some(ItemType::Weapon),
            "armor" => Some(ItemType::Armor),
            "ring" => Some(ItemType::Ring),
            "goods" => Some(ItemType::Goods),
            "gem" => Some(ItemType::Gem),
            "custom" => Some(ItemType::Custom),
            _ => None,
        }
    }
}

/// Where a placement lives in the game data. Decides the silo a slot
/// naturally belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeType {
    Event,
    Entity,
    Material,
    Special,
    ShopInfinite,
    Model,
    ShopInfiniteEvent,
    Asset,
}

impl ScopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::Event => "event",
            ScopeType::Entity => "entity",
            ScopeType::Material => "material",
            ScopeType::Special => "special",
            ScopeType::ShopInfinite => "shop_infinite",
            ScopeType::Model => "model",
            ScopeType::ShopInfiniteEvent => "shop_infinite_event",
            ScopeType::Asset => "asset",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(ScopeType::Event),
            "entity" => Some(ScopeType::Entity),
            "material" => Some(ScopeType::Material),
            "special" => Some(ScopeType::Special),
            "shop_infinite" => Some(ScopeType::ShopInfinite),
            "model" => Some(ScopeType::Model),
            "shop_infinite_event" => Some(ScopeType::ShopInfiniteEvent),
            "asset" => Some(ScopeType::Asset),
            _ => None,
        }
    }
}

// Weapon ids from here on are ammunition, which is not gear.
const AMMO_ID_START: i32 = 50_000_000;

fn split_pair<'s>(kind: &str, text: &'s str) -> Result<(&'s str, i32)> {
    let (head, tail) = text
        .split_once(':')
        .ok_or_else(|| RandomiserError::Config(format!("invalid {kind} '{text}'")))?;
    let id = tail
        .trim()
        .parse::<i32>()
        .map_err(|_| RandomiserError::Config(format!("invalid {kind} id in '{text}'")))?;
    Ok((head.trim(), id))
}

/// A kind of item, independent of where it is placed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemKey {
    pub item_type: ItemType,
    pub id: i32,
}

impl ItemKey {
    pub const fn new(item_type: ItemType, id: i32) -> Self {
        ItemKey { item_type, id }
    }

    pub fn is_gear(&self) -> bool {
        match self.item_type {
            ItemType::Armor => true,
            ItemType::Weapon => self.id < AMMO_ID_START,
            _ => false,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_type.as_str(), self.id)
    }
}

impl FromStr for ItemKey {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        let (head, id) = split_pair("item key", s)?;
        let item_type = ItemType::parse(head)
            .ok_or_else(|| RandomiserError::Config(format!("unknown item type '{head}'")))?;
        Ok(ItemKey { item_type, id })
    }
}

impl TryFrom<String> for ItemKey {
    type Error = RandomiserError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ItemKey> for String {
    fn from(key: ItemKey) -> String {
        key.to_string()
    }
}

/// The vanilla origin of one slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemScope {
    pub scope_type: ScopeType,
    pub id: i32,
}

impl ItemScope {
    /// Scope for sources the engine makes up itself (crow rewards, filler).
    pub const SPECIAL: ItemScope = ItemScope {
        scope_type: ScopeType::Special,
        id: -1,
    };

    pub const fn new(scope_type: ScopeType, id: i32) -> Self {
        ItemScope { scope_type, id }
    }
}

impl fmt::Display for ItemScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope_type.as_str(), self.id)
    }
}

impl FromStr for ItemScope {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        let (head, id) = split_pair("item scope", s)?;
        let scope_type = ScopeType::parse(head)
            .ok_or_else(|| RandomiserError::Config(format!("unknown scope type '{head}'")))?;
        Ok(ItemScope { scope_type, id })
    }
}

impl TryFrom<String> for ItemScope {
    type Error = RandomiserError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ItemScope> for String {
    fn from(scope: ItemScope) -> String {
        scope.to_string()
    }
}

/// A logical place in the game grouping one or more slots, e.g. one shop
/// listing or one scripted reward.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationScope {
    pub scope_type: ScopeType,
    pub id: i32,
}

impl LocationScope {
    pub const fn new(scope_type: ScopeType, id: i32) -> Self {
        LocationScope { scope_type, id }
    }
}

impl From<ItemScope> for LocationScope {
    fn from(scope: ItemScope) -> Self {
        LocationScope {
            scope_type: scope.scope_type,
            id: scope.id,
        }
    }
}

impl fmt::Display for LocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope_type.as_str(), self.id)
    }
}

impl FromStr for LocationScope {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        let scope: ItemScope = s.parse()?;
        Ok(scope.into())
    }
}

impl TryFrom<String> for LocationScope {
    type Error = RandomiserError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LocationScope> for String {
    fn from(scope: LocationScope) -> String {
        scope.to_string()
    }
}

/// The atomic unit of assignment: an item at its vanilla scope. Used both as
/// a source (the item is harvested from here) and as a target (something
/// else gets placed here).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotKey {
    pub item: ItemKey,
    pub scope: ItemScope,
}

impl SlotKey {
    pub const fn new(item: ItemKey, scope: ItemScope) -> Self {
        SlotKey { item, scope }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item, self.scope)
    }
}

impl FromStr for SlotKey {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        let (item, scope) = s
            .split_once('@')
            .ok_or_else(|| RandomiserError::Config(format!("invalid slot key '{s}'")))?;
        Ok(SlotKey {
            item: item.parse()?,
            scope: scope.parse()?,
        })
    }
}

impl TryFrom<String> for SlotKey {
    type Error = RandomiserError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SlotKey> for String {
    fn from(key: SlotKey) -> String {
        key.to_string()
    }
}

fn default_quantity() -> i32 {
    1
}

fn default_max_slots() -> u32 {
    1
}

fn default_chance() -> f32 {
    1.0
}

/// One physical record behind a slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationKey {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default = "default_max_slots")]
    pub max_slots: u32,
    #[serde(default = "default_chance")]
    pub chance: f32,
}

impl Default for LocationKey {
    fn default() -> Self {
        LocationKey {
            quantity: default_quantity(),
            max_slots: default_max_slots(),
            chance: default_chance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemLocation {
    pub scope: ItemScope,
    pub loc_scope: LocationScope,
    pub quantity: i32,
    pub keys: Vec<LocationKey>,
}

impl ItemLocation {
    /// Smallest positive quantity any record hands out, or 1.
    pub fn min_quantity(&self) -> u32 {
        self.keys
            .iter()
            .map(|k| k.quantity)
            .filter(|&q| q > 0)
            .min()
            .map_or(1, |q| q as u32)
    }

    pub fn is_certain(&self) -> bool {
        self.keys.iter().all(|k| k.chance >= 0.99)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemLocations {
    pub unique: bool,
    pub locations: BTreeMap<ItemScope, ItemLocation>,
}

/// A catalog row as it comes from the location loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    pub item: ItemKey,
    #[serde(default)]
    pub unique: bool,
    pub scope: ItemScope,
    #[serde(default)]
    pub location: Option<LocationScope>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub keys: Vec<LocationKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub slots: Vec<SlotRecord>,
    #[serde(default)]
    pub item_names: BTreeMap<ItemKey, String>,
}

/// Read-only slot catalog shared by every randomization run.
#[derive(Debug, Clone, Default)]
pub struct LocationData {
    pub data: BTreeMap<ItemKey, ItemLocations>,
    pub locations: BTreeMap<LocationScope, Vec<SlotKey>>,
    pub names: BTreeMap<ItemKey, String>,
}

impl LocationData {
    pub fn from_catalog(catalog: CatalogFile) -> Result<Self> {
        let mut data: BTreeMap<ItemKey, ItemLocations> = BTreeMap::new();
        let mut locations: BTreeMap<LocationScope, Vec<SlotKey>> = BTreeMap::new();

        for record in catalog.slots {
            let loc_scope = record
                .location
                .unwrap_or_else(|| LocationScope::from(record.scope));
            let keys = if record.keys.is_empty() {
                vec![LocationKey {
                    quantity: record.quantity,
                    ..LocationKey::default()
                }]
            } else {
                record.keys
            };

            let entry = data.entry(record.item).or_insert_with(|| ItemLocations {
                unique: record.unique,
                locations: BTreeMap::new(),
            });
            if entry.locations.contains_key(&record.scope) {
                return Err(RandomiserError::Config(format!(
                    "duplicate slot {} in catalog",
                    SlotKey::new(record.item, record.scope)
                )));
            }
            entry.locations.insert(
                record.scope,
                ItemLocation {
                    scope: record.scope,
                    loc_scope,
                    quantity: record.quantity,
                    keys,
                },
            );

            locations
                .entry(loc_scope)
                .or_default()
                .push(SlotKey::new(record.item, record.scope));
        }

        Ok(LocationData {
            data,
            locations,
            names: catalog.item_names,
        })
    }

    pub fn location(&self, slot: &SlotKey) -> Option<&ItemLocation> {
        self.data.get(&slot.item)?.locations.get(&slot.scope)
    }

    pub fn item(&self, item: &ItemKey) -> Option<&ItemLocations> {
        self.data.get(item)
    }

    /// All slots placed at a location scope, in catalog order.
    pub fn slots_at(&self, loc: &LocationScope) -> &[SlotKey] {
        self.locations.get(loc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_unique(&self, item: &ItemKey) -> Option<bool> {
        self.data.get(item).map(|l| l.unique)
    }

    pub fn name(&self, item: &ItemKey) -> String {
        match self.names.get(item) {
            Some(name) => name.clone(),
            None => item.to_string(),
        }
    }
}
