use rand::{rngs::StdRng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod annotations;
pub mod assign;
pub mod catalog;
pub mod key_items;
pub mod options;
pub mod partition;
pub mod permutation;
pub mod restriction;
pub mod shuffle;
pub mod silo;
pub mod spoiler;
pub mod weights;

use annotations::AnnotationData;
use catalog::{CatalogFile, ItemKey, LocationData, SlotKey};
use key_items::{KeyItemAssignment, KeyItemSolver};
use options::{AssignmentLimits, BooleanOption, RandomizerOptions};
use permutation::{Permutation, PermutationResult};
use silo::RandomSilo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomiserSettings {
    pub seed: u64,
    /// 0-100. Higher pushes important items later and into harder spots.
    pub difficulty: u32,
    pub fog: bool,
    pub dlc1: bool,
    pub dlc2: bool,
    pub race_mode: bool,
    pub no_logic: bool,
    pub restricted_passes: usize,
    pub fallback_attempts: usize,
    pub debug: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl RandomiserSettings {
    pub fn options(&self) -> RandomizerOptions {
        let mut options = RandomizerOptions::new(self.seed, self.difficulty);
        options.set(BooleanOption::Fog, self.fog);
        options.set(BooleanOption::Dlc1, self.dlc1);
        options.set(BooleanOption::Dlc2, self.dlc2);
        options.set(BooleanOption::RaceMode, self.race_mode);
        options.set(BooleanOption::NoLogic, self.no_logic);
        options.limits = AssignmentLimits {
            restricted_passes: self.restricted_passes,
            fallback_attempts: self.fallback_attempts,
        };
        options
    }
}

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("Could not place all key items... giving up now. This can happen on some seeds or with some options.")]
    KeyItemPlacement,
    #[error("Couldn't find space in {silo} silo for {items} items and {locations} locations")]
    SiloCapacity {
        silo: RandomSilo,
        items: usize,
        locations: usize,
    },
    #[error("no catalog data for slot {0}")]
    MissingCatalogData(SlotKey),
    #[error("key item {0} was moved to a location it can't be randomized from")]
    UnusableKeyItem(ItemKey),
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

fn join_candidate(base: &Path, candidate: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in candidate.split(['/', '\\']) {
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

fn find_first_existing(base: &Path, candidates: &[&str]) -> Option<PathBuf> {
    for candidate in candidates {
        let path = join_candidate(base, candidate);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        RandomiserError::Config(format!("could not parse {}: {e}", path.display()))
    })
}

/// One randomization of an already loaded catalog.
pub fn randomise(
    data: &LocationData,
    ann: &AnnotationData,
    options: &RandomizerOptions,
    solver: &dyn KeyItemSolver,
) -> Result<PermutationResult> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let permutation = Permutation::new(data, ann);
    if options.get(BooleanOption::NoLogic) {
        permutation.no_logic(&mut rng, options)
    } else {
        permutation.logic(&mut rng, options, solver)
    }
}

pub fn run(settings: RandomiserSettings) -> Result<()> {
    if !settings.input_path.exists() {
        return Err(RandomiserError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }

    if !settings.output_path.exists() {
        fs::create_dir_all(&settings.output_path)?;
    }

    // One subfolder per seed so runs don't overwrite each other.
    let out_root = settings
        .output_path
        .join(format!("ItemRandomiser_{}", settings.seed));
    if !out_root.exists() {
        fs::create_dir_all(&out_root)?;
    }

    let catalog_src = find_first_existing(
        &settings.input_path,
        &["catalog.json", "data/catalog.json"],
    )
    .ok_or_else(|| {
        RandomiserError::Config("Could not find catalog.json under input path".to_string())
    })?;
    let annotations_src = find_first_existing(
        &settings.input_path,
        &["annotations.json", "data/annotations.json"],
    )
    .ok_or_else(|| {
        RandomiserError::Config("Could not find annotations.json under input path".to_string())
    })?;
    // Without a solver result every area counts as included and unranked.
    let key_items_src = find_first_existing(
        &settings.input_path,
        &["keyitems.json", "data/keyitems.json"],
    );

    let catalog: CatalogFile = read_json(&catalog_src)?;
    let data = LocationData::from_catalog(catalog)?;
    let ann: AnnotationData = read_json(&annotations_src)?;
    let assign: KeyItemAssignment = match &key_items_src {
        Some(path) => read_json(path)?,
        None => KeyItemAssignment::default(),
    };
    debug!(
        catalog = %catalog_src.display(),
        annotations = %annotations_src.display(),
        slots = data.locations.values().map(Vec::len).sum::<usize>(),
        "loaded inputs"
    );

    let options = settings.options();
    info!(%options, hash = %options.config_hash(), "randomising");
    let result = randomise(&data, &ann, &options, &assign)?;

    let permutation_path = out_root.join("permutation.json");
    fs::write(&permutation_path, serde_json::to_string_pretty(&result)?)?;
    info!(path = %permutation_path.display(), "wrote permutation");

    if settings.debug {
        let log = spoiler::format_spoiler_log(&result, &data, &ann, &options);
        let log_path = out_root.join("spoiler_log.txt");
        fs::write(log_path, log)?;
    }

    Ok(())
}
