use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOption {
    /// Area order is scrambled by another randomiser, so lateness means little.
    Fog,
    Dlc1,
    Dlc2,
    RaceMode,
    NoLogic,
}

impl BooleanOption {
    pub fn as_str(self) -> &'static str {
        match self {
            BooleanOption::Fog => "fog",
            BooleanOption::Dlc1 => "dlc1",
            BooleanOption::Dlc2 => "dlc2",
            BooleanOption::RaceMode => "racemode",
            BooleanOption::NoLogic => "nologic",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericOption {
    UnfairWeight,
    VeryUnfairWeight,
    KeyItemDifficulty,
    AllItemDifficulty,
}

/// Safety limits for the assignment engine. Neither is derived from the
/// problem; they only bound the work done on malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLimits {
    pub restricted_passes: usize,
    pub fallback_attempts: usize,
}

impl Default for AssignmentLimits {
    fn default() -> Self {
        AssignmentLimits {
            restricted_passes: 5,
            fallback_attempts: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomizerOptions {
    pub seed: u64,
    difficulty: u32,
    booleans: BTreeSet<BooleanOption>,
    strings: BTreeMap<String, String>,
    numeric: BTreeMap<NumericOption, f64>,
    pub limits: AssignmentLimits,
}

impl Default for RandomizerOptions {
    fn default() -> Self {
        RandomizerOptions::new(0, 0)
    }
}

impl RandomizerOptions {
    pub fn new(seed: u64, difficulty: u32) -> Self {
        let mut options = RandomizerOptions {
            seed,
            difficulty: 0,
            booleans: BTreeSet::new(),
            strings: BTreeMap::new(),
            numeric: BTreeMap::new(),
            limits: AssignmentLimits::default(),
        };
        options.set_difficulty(difficulty);
        options
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Sets the 0-100 bias knob and rederives every numeric option from it.
    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty.min(100);
        let d = self.difficulty;

        self.numeric
            .insert(NumericOption::UnfairWeight, from_range(d, 40, 80));
        self.numeric
            .insert(NumericOption::VeryUnfairWeight, from_range(d, 70, 100));
        self.numeric
            .insert(NumericOption::KeyItemDifficulty, from_range(d, 30, 100));
        self.numeric
            .insert(NumericOption::AllItemDifficulty, from_range(d, 0, 100));
    }

    pub fn get(&self, option: BooleanOption) -> bool {
        self.booleans.contains(&option)
    }

    pub fn set(&mut self, option: BooleanOption, value: bool) {
        if value {
            self.booleans.insert(option);
        } else {
            self.booleans.remove(&option);
        }
    }

    pub fn numeric(&self, option: NumericOption) -> f64 {
        self.numeric.get(&option).copied().unwrap_or(0.0)
    }

    pub fn set_string(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(v) => {
                self.strings.insert(name.to_string(), v);
            }
            None => {
                self.strings.remove(name);
            }
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    pub fn string_as_int(&self, name: &str, min: i64, max: i64) -> Option<i64> {
        let value: i64 = self.strings.get(name)?.parse().ok()?;
        (min..=max).contains(&value).then_some(value)
    }

    pub fn config_string(&self, include_seed: bool) -> String {
        let mut words: BTreeSet<String> = self
            .booleans
            .iter()
            .map(|b| b.as_str().to_string())
            .collect();
        words.extend(self.strings.iter().map(|(k, v)| format!("{k}:{v}")));

        let mut out = words.into_iter().collect::<Vec<_>>().join(" ");
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("bias:{}", self.difficulty));
        if include_seed {
            out.push_str(&format!(" seed:{}", self.seed));
        }
        out
    }

    /// Short stable fingerprint of the logic-relevant options, for telling
    /// apart runs in a log.
    pub fn config_hash(&self) -> String {
        format!("{:05}", java_string_hash(&self.config_string(false)) % 99999)
    }
}

impl fmt::Display for RandomizerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config_string(true))
    }
}

fn from_range(value: u32, start: u32, end: u32) -> f64 {
    if value < start {
        return 0.0;
    }
    if value >= end {
        return 1.0;
    }
    f64::from(value - start) / f64::from(end - start)
}

fn java_string_hash(s: &str) -> u32 {
    s.encode_utf16()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(u32::from(c)))
}
