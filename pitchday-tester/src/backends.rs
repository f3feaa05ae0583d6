//! Mock text-generation backends for exercising the kernel offline.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pitchday_game::TextGenBackend;
use pitchday_game::seed::{hash_seed, mix};

const TITLES: [&str; 8] = [
    "Ledger Birdhouse",
    "Copper Kettle Club",
    "Morning Circuit",
    "Patent Porch",
    "Walnut Dispatch",
    "Harbor Ticket",
    "Garnet Standard",
    "Paper Lantern Co",
];

const PITCHES: [&str; 4] = [
    "It solves a chore nobody enjoys. Customers renew without being asked.",
    "The unit cost is boring and predictable. That is the whole point.",
    "Every block has one buyer already. We just have to find the second.",
    "It ships flat and assembles in a minute. Returns are almost zero.",
];

/// Deterministic well-formed replies keyed off the prompt text, so whole
/// scenario runs are reproducible without a live backend.
pub struct ScriptedBackend {
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hash = hash_seed(prompt);
        if prompt.contains("units_sold") {
            let units = 1_000 + i64::from(mix(hash, 7) % 40_000);
            return Ok(format!(
                r#"{{"units_sold": {units}, "narrative": "Stock moved faster than the founders planned for."}}"#
            ));
        }
        let title = TITLES[mix(hash, 1) as usize % TITLES.len()];
        let pitch = PITCHES[mix(hash, 2) as usize % PITCHES.len()];
        Ok(format!(
            r#"{{"title": "{title}", "pitch": "{pitch}", "category": "services", "notes": "margins depend on one supplier", "risk": "medium", "demand": "steady"}}"#
        ))
    }
}

/// Hostile replies: broken JSON, wild numbers, label-riddled text.
pub struct GarbageBackend;

#[async_trait]
impl TextGenBackend for GarbageBackend {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let hash = hash_seed(prompt);
        let reply = match mix(hash, 1) % 4 {
            0 => r#"{"units_sold": -5, "title": 42, "pitch": null}"#,
            1 => r#"{"units_sold": 1e9, "narrative": "We made $9,000,000 and grew 400%."}"#,
            2 => "Hook: buy now!\n- bullet one\n- bullet two\nno json here at all",
            _ => r#"{"units_sold": NaN, "title": "", "pitch": ""}"#,
        };
        Ok(reply.to_string())
    }
}

/// Always unreachable, forcing the full fallback path.
pub struct OfflineBackend;

#[async_trait]
impl TextGenBackend for OfflineBackend {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        Err(anyhow!("backend offline"))
    }
}
