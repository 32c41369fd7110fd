use crate::annotations::AnnotationData;
use crate::catalog::{ItemScope, LocationData, SlotKey};
use crate::options::RandomizerOptions;
use crate::permutation::PermutationResult;
use crate::silo::RandomSilo;

fn describe_source(source: &SlotKey, data: &LocationData) -> String {
    let name = data.name(&source.item);
    let quantity = data.location(source).map_or(1, |l| l.quantity);
    let mut out = if quantity > 1 {
        format!("{name} {quantity}x")
    } else {
        name
    };
    if source.scope != ItemScope::SPECIAL {
        out.push_str(&format!(" (from {})", source.scope));
    }
    out
}

/// Human-readable listing of a run: options, then every randomized silo in
/// rough playthrough order, then hints.
pub fn format_spoiler_log(
    result: &PermutationResult,
    data: &LocationData,
    ann: &AnnotationData,
    options: &RandomizerOptions,
) -> String {
    let mut log = format!("Item randomiser seed: {}\n", options.seed);
    log.push_str(&format!(
        "options: {} (hash {})\n",
        options,
        options.config_hash()
    ));

    for (kind, silo) in &result.silos {
        if matches!(kind, RandomSilo::Unchanged | RandomSilo::Remove) || silo.mapping.is_empty() {
            continue;
        }
        log.push_str(&format!(
            "\n-- {} ({} sources, {} targets) --\n",
            kind,
            silo.sources.len(),
            silo.mapping.len()
        ));

        let mut entries: Vec<(String, &SlotKey, &Vec<SlotKey>)> = silo
            .mapping
            .iter()
            .map(|(target, sources)| (result.log_order(target), target, sources))
            .collect();
        entries.sort();
        for (_, target, sources) in entries {
            let loc = data
                .location(target)
                .map(|l| ann.location_description(&l.loc_scope))
                .unwrap_or_else(|| target.to_string());
            let placed: Vec<String> = sources.iter().map(|s| describe_source(s, data)).collect();
            log.push_str(&format!(
                "{}: {} (replaces {})\n",
                loc,
                placed.join(", "),
                data.name(&target.item)
            ));
        }
    }

    let hints: Vec<_> = result.hints.iter().filter(|(_, h)| !h.is_empty()).collect();
    if !hints.is_empty() {
        log.push_str("\n-- hints --\n");
        for (category, entries) in hints {
            log.push_str(&format!("{category}:\n"));
            for (source, target) in entries {
                let loc = data
                    .location(target)
                    .map(|l| ann.location_description(&l.loc_scope))
                    .unwrap_or_else(|| target.to_string());
                log.push_str(&format!("  {} -> {}\n", data.name(&source.item), loc));
            }
        }
    }
    log
}
