//! Content generation against an external text backend, with defensive
//! parsing and a deterministic fallback on any failure.
//!
//! The functions here never propagate a hard failure: a dead backend or an
//! unparseable reply degrades to seed-derived placeholder content, tagged so
//! callers and tests can still tell the two apart. The player-facing game
//! must never dead-end because an upstream generator misbehaved.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::constants::{UNITS_SOLD_MAX, UNITS_SOLD_MIN};
use crate::keys::slot_seed;
use crate::numbers;
use crate::sanitize;
use crate::seed::{hash_seed, mix, pick_in_range};
use crate::state::{DemandProfile, HiddenTruth, PitchItem, RiskLevel};

/// One completion round-trip to the text-generation backend. Retries and
/// timeouts are the implementor's concern; the kernel issues exactly one
/// call per logical unit of work and never retries.
#[async_trait]
pub trait TextGenBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable or refuses the
    /// request. Callers absorb this into fallback content.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Why generated content fell back to the deterministic placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The backend call itself failed.
    BackendError,
    /// The reply contained nothing either parse stage could use.
    UnparseableReply,
}

/// Provenance tag distinguishing genuine model content from fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenSource {
    Model,
    Fallback(FallbackReason),
}

/// A generation result that never failed outright.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub source: GenSource,
}

impl<T> Generated<T> {
    const fn model(value: T) -> Self {
        Self {
            value,
            source: GenSource::Model,
        }
    }

    const fn fallback(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            source: GenSource::Fallback(reason),
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.source, GenSource::Fallback(_))
    }
}

/// Quirky descriptor pool items are generated around. Pairs are drawn
/// deterministically per item and never repeat within a slate.
pub const DESCRIPTOR_POOL: [&str; 24] = [
    "neon armadillo",
    "quarterly taxes",
    "artisanal concrete",
    "midnight kombucha",
    "foldable canoe",
    "suburban falconry",
    "heirloom spreadsheets",
    "glow-in-the-dark mulch",
    "velvet toolbox",
    "carpool karaoke rig",
    "solar umbrella",
    "mail-order fog",
    "antique routers",
    "competitive napping",
    "biodegradable glitter",
    "parallel parking",
    "haunted thermostat",
    "gourmet ice",
    "modular treehouse",
    "silent doorbell",
    "inflatable office",
    "left-handed scissors",
    "municipal llamas",
    "retro weather balloons",
];

pub const CATEGORY_POOL: [&str; 8] = [
    "gadgets",
    "food-and-drink",
    "home-and-garden",
    "services",
    "wellness",
    "transport",
    "software",
    "novelty",
];

// Word-pair table for deterministic fallback names.
const FALLBACK_FIRST: [&str; 16] = [
    "Nimbus", "Quartz", "Ember", "Vector", "Juniper", "Cobalt", "Drift", "Larkspur", "Onyx",
    "Tundra", "Pylon", "Mica", "Harbor", "Zephyr", "Bramble", "Sable",
];
const FALLBACK_SECOND: [&str; 16] = [
    "Labs", "Forge", "Works", "Loop", "Supply", "Union", "Depot", "Collective", "Co", "Yard",
    "Outfit", "Foundry", "Exchange", "Parlor", "Mill", "Syndicate",
];

const FALLBACK_PITCH: &str =
    "A sensible product with a straightforward plan. Early customers keep coming back.";
const FALLBACK_NOTES: &str = "Nothing unusual on file.";
const FALLBACK_REVISION: &str = "The pitch stands as written. No revision was available.";
const FALLBACK_NARRATIVE: &str =
    "Launch week was quiet but word of mouth carried it. The founders call it a solid start.";

/// Inputs for generating one slate item. Economic numbers are pre-selected
/// by the orchestrator from the seed; the backend only frames them.
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub seed: String,
    pub descriptors: [String; 2],
}

/// Text-and-truth output for one item; numbers are attached elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContent {
    pub title: String,
    pub pitch: String,
    pub category: String,
    pub truth: HiddenTruth,
}

/// Structured output of a simulated launch.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeContent {
    pub units_sold: i64,
    pub narrative: String,
}

/// Deterministic placeholder name from two word lists indexed by
/// independent mixes of the seed hash. Always non-empty.
#[must_use]
pub fn fallback_title(seed: &str) -> String {
    let hash = hash_seed(seed);
    let first = FALLBACK_FIRST[mix(hash, 1) as usize % FALLBACK_FIRST.len()];
    let second = FALLBACK_SECOND[mix(hash, 2) as usize % FALLBACK_SECOND.len()];
    format!("{first} {second}")
}

fn fallback_category(seed: &str) -> String {
    let hash = hash_seed(seed);
    CATEGORY_POOL[mix(hash, 3) as usize % CATEGORY_POOL.len()].to_string()
}

fn fallback_item(request: &ItemRequest) -> ItemContent {
    ItemContent {
        title: fallback_title(&request.seed),
        pitch: FALLBACK_PITCH.to_string(),
        category: fallback_category(&request.seed),
        // Lowest-risk defaults: the economics must stay playable.
        truth: HiddenTruth {
            notes: FALLBACK_NOTES.to_string(),
            risk: RiskLevel::Low,
            demand: DemandProfile::Steady,
        },
    }
}

fn fallback_units(seed: &str) -> i64 {
    pick_in_range(&slot_seed(seed, "units"), 500, 50_000)
}

// ---------------------------------------------------------------------------
// Reply parsing: strict JSON, then field-level regex extraction.
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawItemReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    pitch: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    risk: Option<String>,
    #[serde(default)]
    demand: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutcomeReply {
    #[serde(default)]
    units_sold: Option<serde_json::Value>,
    #[serde(default)]
    narrative: Option<String>,
}

fn json_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn field_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""([A-Za-z_]+)"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|(-?\d+(?:\.\d+)?))"#).unwrap()
    })
}

/// Second-chance extraction of `"field": value` pairs from a reply that
/// failed strict parsing.
fn extract_fields(raw: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for caps in field_pair_re().captures_iter(raw) {
        let key = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().replace("\\\"", "\"").replace("\\n", "\n"))
            .unwrap_or_default();
        fields.entry(key).or_insert(value);
    }
    fields
}

fn parse_item_reply(raw: &str) -> Option<RawItemReply> {
    if let Some(slice) = json_slice(raw)
        && let Ok(reply) = serde_json::from_str::<RawItemReply>(slice)
    {
        return Some(reply);
    }
    let mut fields = extract_fields(raw);
    if fields.is_empty() {
        return None;
    }
    Some(RawItemReply {
        title: fields.remove("title"),
        pitch: fields.remove("pitch"),
        category: fields.remove("category"),
        notes: fields.remove("notes"),
        risk: fields.remove("risk"),
        demand: fields.remove("demand"),
    })
}

fn parse_outcome_reply(raw: &str) -> Option<RawOutcomeReply> {
    if let Some(slice) = json_slice(raw)
        && let Ok(reply) = serde_json::from_str::<RawOutcomeReply>(slice)
    {
        return Some(reply);
    }
    let mut fields = extract_fields(raw);
    if fields.is_empty() {
        return None;
    }
    Some(RawOutcomeReply {
        units_sold: fields
            .remove("units_sold")
            .map(serde_json::Value::String),
        narrative: fields.remove("narrative"),
    })
}

fn units_from_value(value: Option<&serde_json::Value>) -> Option<f64> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Prompts. Exact wording is deliberately unremarkable.
// ---------------------------------------------------------------------------

fn item_prompt(request: &ItemRequest) -> String {
    format!(
        "Invent a startup pitch that combines \"{}\" and \"{}\". Reply with one JSON object \
         with string fields: title, pitch (two sentences), category, notes, risk \
         (low|medium|high), demand (niche|steady|viral).",
        request.descriptors[0], request.descriptors[1]
    )
}

fn revision_prompt(item: &PitchItem, truth: &HiddenTruth, suggestion: &str) -> String {
    format!(
        "Rewrite this pitch in two sentences, applying the investor note. Pitch: {} \
         Private context: {} Investor note: {suggestion}",
        item.pitch, truth.notes
    )
}

fn outcome_prompt(item: &PitchItem, truth: &HiddenTruth, final_text: &str) -> String {
    format!(
        "A product launched with this pitch: {final_text} Category: {}. Private risk: {:?}, \
         demand: {:?}. Reply with one JSON object: units_sold (integer), narrative (short \
         launch story with no numbers).",
        item.category, truth.risk, truth.demand
    )
}

// ---------------------------------------------------------------------------
// Generation entry points.
// ---------------------------------------------------------------------------

/// Generate one slate item's text and hidden truth. Never fails; any
/// backend or parse problem degrades to seed-derived placeholder content.
pub async fn generate_item(
    backend: &dyn TextGenBackend,
    request: &ItemRequest,
) -> Generated<ItemContent> {
    let reply = match backend.complete(&item_prompt(request)).await {
        Ok(reply) => reply,
        Err(err) => {
            log::warn!("item generation backend failed for {}: {err:#}", request.seed);
            return Generated::fallback(fallback_item(request), FallbackReason::BackendError);
        }
    };
    let Some(raw) = parse_item_reply(&reply) else {
        log::warn!("item reply unparseable for {}", request.seed);
        return Generated::fallback(fallback_item(request), FallbackReason::UnparseableReply);
    };

    // Field-level fallbacks keep partial success partial.
    let title = raw
        .title
        .as_deref()
        .and_then(|t| sanitize::sanitize_title(t, &request.descriptors))
        .unwrap_or_else(|| fallback_title(&request.seed));
    let pitch = raw
        .pitch
        .as_deref()
        .map(sanitize::clean_pitch)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| FALLBACK_PITCH.to_string());
    let category = raw
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| fallback_category(&request.seed));
    let truth = HiddenTruth {
        notes: raw
            .notes
            .map(|n| sanitize::collapse_whitespace(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_NOTES.to_string()),
        risk: raw
            .risk
            .as_deref()
            .and_then(|r| RiskLevel::from_str(r).ok())
            .unwrap_or_default(),
        demand: raw
            .demand
            .as_deref()
            .and_then(|d| DemandProfile::from_str(d).ok())
            .unwrap_or_default(),
    };

    Generated::model(ItemContent {
        title,
        pitch,
        category,
        truth,
    })
}

/// Rewrite a pitch around the player's suggestion. Output is always
/// pitch-shaped: two sentences, no labels, no bullets.
pub async fn generate_revision(
    backend: &dyn TextGenBackend,
    seed: &str,
    item: &PitchItem,
    truth: &HiddenTruth,
    suggestion: &str,
) -> Generated<String> {
    let reply = match backend
        .complete(&revision_prompt(item, truth, suggestion))
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            log::warn!("revision backend failed for {seed}: {err:#}");
            return Generated::fallback(fallback_revision(item), FallbackReason::BackendError);
        }
    };
    // Revisions come back as free text; JSON replies still pass through
    // the same pitch cleanup. A structured reply without a pitch field is
    // unusable, not free text to echo.
    let text = match parse_item_reply(&reply) {
        Some(raw) => match raw.pitch {
            Some(pitch) => pitch,
            None => {
                return Generated::fallback(
                    fallback_revision(item),
                    FallbackReason::UnparseableReply,
                );
            }
        },
        None => reply,
    };
    let cleaned = sanitize::clean_pitch(&text);
    if cleaned.is_empty() {
        return Generated::fallback(fallback_revision(item), FallbackReason::UnparseableReply);
    }
    Generated::model(cleaned)
}

fn fallback_revision(item: &PitchItem) -> String {
    let existing = sanitize::clean_pitch(&item.pitch);
    if existing.is_empty() {
        FALLBACK_REVISION.to_string()
    } else {
        existing
    }
}

/// Simulate a launch: structured units plus a numbers-free narrative.
/// `units_sold` is clamped into configured bounds regardless of what the
/// backend returned.
pub async fn generate_outcome(
    backend: &dyn TextGenBackend,
    seed: &str,
    item: &PitchItem,
    truth: &HiddenTruth,
    final_text: &str,
) -> Generated<OutcomeContent> {
    let fallback = OutcomeContent {
        units_sold: fallback_units(seed),
        narrative: FALLBACK_NARRATIVE.to_string(),
    };
    let reply = match backend
        .complete(&outcome_prompt(item, truth, final_text))
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            log::warn!("outcome backend failed for {seed}: {err:#}");
            return Generated::fallback(fallback, FallbackReason::BackendError);
        }
    };
    let Some(raw) = parse_outcome_reply(&reply) else {
        log::warn!("outcome reply unparseable for {seed}");
        return Generated::fallback(fallback, FallbackReason::UnparseableReply);
    };

    let units_sold = units_from_value(raw.units_sold.as_ref())
        .map_or_else(
            || fallback_units(seed),
            |units| numbers::clamp_to_bounds(units, UNITS_SOLD_MIN, UNITS_SOLD_MAX),
        );
    let narrative = raw
        .narrative
        .as_deref()
        .map(|n| {
            sanitize::strip_numeric_claims(&sanitize::collapse_whitespace(
                &sanitize::strip_bullets(&sanitize::strip_label_lines(n)),
            ))
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_NARRATIVE.to_string());

    Generated::model(OutcomeContent {
        units_sold,
        narrative,
    })
}
