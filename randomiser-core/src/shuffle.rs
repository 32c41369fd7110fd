use rand::seq::SliceRandom;
use rand::Rng;

// Zero and negative weights still take part, just almost always last.
const MIN_WEIGHT: f64 = 1e-9;

/// Random order in which heavier elements tend to come first.
///
/// Each element draws an exponential key with rate `weight` and the keys are
/// sorted ascending, which is the same as repeatedly drawing without
/// replacement with probability proportional to weight. Equal weights give a
/// uniform shuffle.
pub fn weighted_shuffle<T, R, F>(rng: &mut R, items: impl IntoIterator<Item = T>, mut weight: F) -> Vec<T>
where
    R: Rng + ?Sized,
    F: FnMut(&T) -> f64,
{
    let mut keyed: Vec<(f64, T)> = items
        .into_iter()
        .map(|item| {
            let w = weight(&item);
            let w = if w.is_finite() && w > MIN_WEIGHT { w } else { MIN_WEIGHT };
            // gen() is in [0, 1); flip it so ln never sees zero.
            let u: f64 = 1.0 - rng.gen::<f64>();
            (-u.ln() / w, item)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, item)| item).collect()
}

pub fn shuffle<T, R: Rng + ?Sized>(rng: &mut R, items: &mut [T]) {
    items.shuffle(rng);
}

pub fn choice<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    items.choose(rng)
}
