//! Slate, item, and bankroll state shared across the game flows.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    ITEM_IDS, SLATE_ITEM_COUNT, SLATE_VERSION, UNIT_PRICE_MAX_USD, UNIT_PRICE_MIN_USD,
    VALUATION_MAX_USD, VALUATION_MIN_USD,
};
use crate::numbers;

/// How a slate is keyed: shared per calendar day, or a fresh throwaway
/// identity on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Idempotent per calendar key; every player sees the same slate.
    Daily,
    /// Debug/random mode; a new identity (and slate) per call.
    Random,
}

impl GameMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "random" => Ok(Self::Random),
            _ => Err(()),
        }
    }
}

/// Hidden risk profile steering follow-on text, never shown directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl FromStr for RiskLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "mid" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

/// Hidden demand shape steering simulated sales narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DemandProfile {
    Niche,
    #[default]
    Steady,
    Viral,
}

impl FromStr for DemandProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "niche" => Ok(Self::Niche),
            "steady" => Ok(Self::Steady),
            "viral" => Ok(Self::Viral),
            _ => Err(()),
        }
    }
}

/// Per-item data the player never sees; consumed only when generating
/// follow-on text such as revisions and outcome narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HiddenTruth {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub risk: RiskLevel,
    #[serde(default)]
    pub demand: DemandProfile,
}

/// A single generated pitch. Numeric fields are clamped at construction;
/// nothing downstream assumes the generation backend honored its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchItem {
    pub id: String,
    pub title: String,
    pub pitch: String,
    pub valuation_usd: i64,
    pub unit_price_usd: i64,
    pub category: String,
    /// Mandatory descriptor pair the pitch was generated around.
    pub descriptors: [String; 2],
    /// Best-effort backfill slot; the only field mutable after caching.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PitchItem {
    /// Build an item, forcing the economic fields into configured bounds.
    #[must_use]
    pub fn new(
        id: &str,
        title: String,
        pitch: String,
        valuation_usd: i64,
        unit_price_usd: i64,
        category: String,
        descriptors: [String; 2],
    ) -> Self {
        Self {
            id: id.to_string(),
            title,
            pitch,
            valuation_usd: numbers::clamp_to_bounds(
                numbers::i64_to_f64(valuation_usd),
                VALUATION_MIN_USD,
                VALUATION_MAX_USD,
            ),
            unit_price_usd: numbers::clamp_to_bounds(
                numbers::i64_to_f64(unit_price_usd),
                UNIT_PRICE_MIN_USD,
                UNIT_PRICE_MAX_USD,
            ),
            category,
            descriptors,
            image_url: None,
        }
    }

    /// Whether the economic fields sit inside configured bounds.
    #[must_use]
    pub const fn economics_in_bounds(&self) -> bool {
        self.valuation_usd >= VALUATION_MIN_USD
            && self.valuation_usd <= VALUATION_MAX_USD
            && self.unit_price_usd >= UNIT_PRICE_MIN_USD
            && self.unit_price_usd <= UNIT_PRICE_MAX_USD
    }
}

/// Items stored inline; a slate always holds exactly `SLATE_ITEM_COUNT`.
pub type SlateItems = SmallVec<[PitchItem; SLATE_ITEM_COUNT]>;

/// The persisted once-per-key game record: items plus hidden truths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slate {
    pub version: u32,
    pub mode: GameMode,
    #[serde(default)]
    pub date_key: Option<String>,
    pub game_id: String,
    pub items: SlateItems,
    #[serde(default)]
    pub hidden: HashMap<String, HiddenTruth>,
}

impl Slate {
    /// A cached slate is usable only when it carries the current schema
    /// version and exactly the fixed item id set, each id once.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        if self.version != SLATE_VERSION || self.items.len() != SLATE_ITEM_COUNT {
            return false;
        }
        ITEM_IDS
            .iter()
            .all(|id| self.items.iter().filter(|item| item.id == *id).count() == 1)
    }

    #[must_use]
    pub fn find_item(&self, item_id: &str) -> Option<&PitchItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn find_item_mut(&mut self, item_id: &str) -> Option<&mut PitchItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Hidden truth for an item, or defaults when the record predates it.
    #[must_use]
    pub fn truth_for(&self, item_id: &str) -> HiddenTruth {
        self.hidden.get(item_id).cloned().unwrap_or_default()
    }
}

/// Client-held bankroll for the random game's economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BankrollState {
    pub bankroll_usd: i64,
    #[serde(default)]
    pub last_seen_date_key: Option<String>,
}
