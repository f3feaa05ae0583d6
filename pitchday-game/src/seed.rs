//! Deterministic seeded picks driving every content decision.
//! Same seed string, same output, forever — no process state involved.

use std::collections::HashSet;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over the seed bytes. Adjacent seeds ("x:a" vs "x:b") avalanche
/// into uncorrelated low bits, which is what the pick helpers rely on.
#[must_use]
pub fn hash_seed(seed: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for b in seed.as_bytes() {
        hash = (hash ^ u32::from(*b)).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Second multiplicative mix keyed by an index, so multiple picks sharing
/// one hash do not collapse to identical values.
#[must_use]
pub fn mix(hash: u32, index: u32) -> u32 {
    let mut x = hash ^ index.wrapping_mul(0x9e37_79b1);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85eb_ca6b);
    x ^= x >> 13;
    x = x.wrapping_mul(0xc2b2_ae35);
    x ^ (x >> 16)
}

/// Uniform-ish pick over `[lo, hi]` inclusive. Swapped bounds are
/// normalized, and a zero span returns `lo` without dividing.
#[must_use]
pub fn pick_in_range(seed: &str, lo: i64, hi: i64) -> i64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let span = (i128::from(hi) - i128::from(lo) + 1) as u128;
    if span <= 1 {
        return lo;
    }
    let offset = u128::from(mix(hash_seed(seed), 0)) % span;
    // offset < span, so lo + offset never exceeds hi.
    lo + offset as i64
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Deterministically select `count` entries from `pool`, skipping anything
/// whose normalized form appears in `avoid` or was already picked. Attempts
/// are capped; exhaustion falls back to unused entries in pool order and
/// finally to repeats rather than looping forever.
#[must_use]
pub fn pick_distinct_from_pool(
    seed: &str,
    count: usize,
    pool: &[&str],
    avoid: &HashSet<String>,
) -> Vec<String> {
    if pool.is_empty() || count == 0 {
        return Vec::new();
    }

    let hash = hash_seed(seed);
    let mut picked = Vec::with_capacity(count);
    let mut used: HashSet<String> = avoid.iter().map(|v| normalize(v)).collect();

    let max_attempts = pool.len().saturating_mul(4).max(count);
    let mut attempt: u32 = 0;
    while picked.len() < count && (attempt as usize) < max_attempts {
        let idx = mix(hash, attempt) as usize % pool.len();
        attempt += 1;
        let candidate = pool[idx];
        let key = normalize(candidate);
        if used.insert(key) {
            picked.push(candidate.to_string());
        }
    }

    // Pool nearly exhausted: take any unused entries in pool order.
    if picked.len() < count {
        for candidate in pool {
            if picked.len() >= count {
                break;
            }
            let key = normalize(candidate);
            if used.insert(key) {
                picked.push((*candidate).to_string());
            }
        }
    }

    // Fully exhausted: repeat deterministically rather than fail.
    if picked.len() < count {
        log::warn!(
            "descriptor pool exhausted for seed {seed}; repeating entries to reach {count}"
        );
        let mut index: u32 = 0;
        while picked.len() < count {
            let idx = mix(hash, 0x8000_0000 | index) as usize % pool.len();
            picked.push(pool[idx].to_string());
            index += 1;
        }
    }

    picked
}
