//! Slate lifecycle: read-through cache, one-shot generation, revision and
//! outcome simulation.
//!
//! Per (mode, key) the flow is Uncached -> Generating -> Cached. A per-key
//! single-flight guard covers the whole read-generate-write window, so
//! concurrent first-time starts cannot both pay the generation cost.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::GameError;
use crate::cache::CacheStore;
use crate::constants::{
    DAILY_SLATE_TTL_SECS, ITEM_IDS, OWNERSHIP_CAP_FRACTION, RANDOM_SLATE_TTL_SECS, SLATE_VERSION,
    SUGGESTION_MAX_CHARS,
};
use crate::economy;
use crate::generate::{self, DESCRIPTOR_POOL, ItemRequest, TextGenBackend};
use crate::keys;
use crate::numbers;
use crate::sanitize;
use crate::state::{GameMode, PitchItem, Slate, SlateItems};

/// Public view of a started game: the slate without its hidden truths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub mode: GameMode,
    pub date_key: Option<String>,
    pub game_id: String,
    pub items: Vec<PitchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviseResponse {
    pub revised_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub units_sold: i64,
    pub gross_revenue_usd: i64,
    pub ownership_share: f64,
    pub payout_usd: i64,
    pub narrative: String,
}

const fn ttl_for(mode: GameMode) -> Duration {
    match mode {
        GameMode::Daily => Duration::from_secs(DAILY_SLATE_TTL_SECS),
        GameMode::Random => Duration::from_secs(RANDOM_SLATE_TTL_SECS),
    }
}

fn store_err(err: anyhow::Error) -> GameError {
    GameError::Store(err.to_string())
}

/// Game services owning the generation backend and the cache seam.
/// Handlers are short-lived and may run concurrently; the only shared
/// mutable state is the in-flight key guard.
pub struct GameServices<B: TextGenBackend> {
    backend: B,
    cache: Arc<dyn CacheStore>,
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<B: TextGenBackend> GameServices<B> {
    pub fn new(backend: B, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            backend,
            cache,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or resume) a game. Daily mode is idempotent per date key;
    /// random mode mints a fresh identity and slate on every call.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when daily mode lacks a date key; `Store` when the
    /// cache cannot be read or the freshly generated slate cannot be
    /// written.
    pub async fn start_slate(
        &self,
        mode: GameMode,
        date_key: Option<&str>,
    ) -> Result<StartResponse, GameError> {
        // Fail fast on validation before any backend or store work.
        let (game_id, base_seed) = match mode {
            GameMode::Daily => {
                let base = keys::daily_base_seed(date_key)?;
                (format!("daily-{base}"), base)
            }
            GameMode::Random => {
                let id = random_game_id();
                (id.clone(), id)
            }
        };
        let key = keys::slate_key(mode, &game_id, date_key)?;

        let guard = self.inflight_guard(&key);
        let locked = guard.lock().await;

        if let Some(blob) = self.cache.get(&key).await.map_err(store_err)? {
            match serde_json::from_str::<Slate>(&blob) {
                Ok(slate) if slate.is_well_formed() => {
                    drop(locked);
                    self.release_guard(&key, &guard);
                    return Ok(respond(&slate));
                }
                _ => log::warn!("cached slate under {key} is malformed; regenerating"),
            }
        }

        let slate = self.generate_slate(mode, date_key, game_id, &base_seed).await;
        let write = self.write_slate(&key, &slate, Some(ttl_for(mode))).await;
        drop(locked);
        self.release_guard(&key, &guard);
        // The caller just paid for generation; a failed write is surfaced,
        // never silently dropped.
        write?;
        Ok(respond(&slate))
    }

    /// Rewrite one item's pitch around a player suggestion.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for blank or oversize suggestions, `NotFound` when
    /// the slate or item is missing or expired, `Store` on cache failure.
    pub async fn revise_item(
        &self,
        mode: GameMode,
        game_id: &str,
        date_key: Option<&str>,
        item_id: &str,
        suggestion: &str,
    ) -> Result<ReviseResponse, GameError> {
        let suggestion = suggestion.trim();
        if suggestion.is_empty() {
            return Err(GameError::InvalidArgument(
                "suggestion must not be empty".to_string(),
            ));
        }
        if suggestion.chars().count() > SUGGESTION_MAX_CHARS {
            return Err(GameError::InvalidArgument(format!(
                "suggestion exceeds {SUGGESTION_MAX_CHARS} characters"
            )));
        }

        let (slate, _) = self.load_slate(mode, game_id, date_key).await?;
        let item = slate
            .find_item(item_id)
            .ok_or_else(|| GameError::NotFound(format!("item {item_id} not in slate")))?;
        let truth = slate.truth_for(item_id);

        let seed = keys::slot_seed(&slate.game_id, &format!("{item_id}:revise"));
        let revised =
            generate::generate_revision(&self.backend, &seed, item, &truth, suggestion).await;
        Ok(ReviseResponse {
            revised_text: revised.value,
        })
    }

    /// Simulate a launch for one item with the player's final pitch text
    /// and investment.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for non-positive or sub-minimum investments,
    /// `NotFound` for missing slate/item, `Store` on cache failure.
    pub async fn simulate_outcome(
        &self,
        mode: GameMode,
        game_id: &str,
        date_key: Option<&str>,
        item_id: &str,
        final_text: &str,
        invested_usd: f64,
    ) -> Result<SimulateResponse, GameError> {
        if !invested_usd.is_finite() || invested_usd <= 0.0 {
            return Err(GameError::InvalidArgument(
                "investment must be a positive amount".to_string(),
            ));
        }

        let (slate, _) = self.load_slate(mode, game_id, date_key).await?;
        let item = slate
            .find_item(item_id)
            .ok_or_else(|| GameError::NotFound(format!("item {item_id} not in slate")))?;
        let truth = slate.truth_for(item_id);

        let valuation = numbers::i64_to_f64(item.valuation_usd);
        let max_investable =
            economy::max_investable(valuation, OWNERSHIP_CAP_FRACTION, invested_usd);
        let invested = economy::clamp_investment(invested_usd, max_investable);
        if invested <= 0 {
            return Err(GameError::InvalidArgument(
                "investment is below the minimum after clamping".to_string(),
            ));
        }

        let final_text = sanitize::clean_pitch(final_text);
        let seed = keys::slot_seed(&slate.game_id, &format!("{item_id}:outcome"));
        let outcome =
            generate::generate_outcome(&self.backend, &seed, item, &truth, &final_text).await;

        let share = economy::ownership_share(
            numbers::i64_to_f64(invested),
            valuation,
            OWNERSHIP_CAP_FRACTION,
        );
        let gross = economy::gross_revenue(outcome.value.units_sold, item.unit_price_usd);
        let payout = economy::payout(gross, share);

        Ok(SimulateResponse {
            units_sold: outcome.value.units_sold,
            gross_revenue_usd: gross,
            ownership_share: share,
            payout_usd: payout,
            narrative: outcome.value.narrative,
        })
    }

    /// Best-effort image backfill: attach a URL to an item that has none
    /// and rewrite the cached record. Core content is never regenerated.
    /// Returns whether the record changed; a failed rewrite only logs.
    ///
    /// # Errors
    ///
    /// `NotFound` when the slate or item is missing.
    pub async fn backfill_image(
        &self,
        mode: GameMode,
        game_id: &str,
        date_key: Option<&str>,
        item_id: &str,
        image_url: &str,
    ) -> Result<bool, GameError> {
        let (mut slate, key) = self.load_slate(mode, game_id, date_key).await?;
        let item = slate
            .find_item_mut(item_id)
            .ok_or_else(|| GameError::NotFound(format!("item {item_id} not in slate")))?;
        if item.image_url.is_some() {
            return Ok(false);
        }
        item.image_url = Some(image_url.to_string());
        if let Err(err) = self.write_slate(&key, &slate, Some(ttl_for(mode))).await {
            log::warn!("image backfill write failed for {key}: {err}");
            return Ok(false);
        }
        Ok(true)
    }

    async fn load_slate(
        &self,
        mode: GameMode,
        game_id: &str,
        date_key: Option<&str>,
    ) -> Result<(Slate, String), GameError> {
        let key = keys::slate_key(mode, game_id, date_key)?;
        let blob = self
            .cache
            .get(&key)
            .await
            .map_err(store_err)?
            .ok_or_else(|| GameError::NotFound(format!("no slate under {key}")))?;
        let slate = serde_json::from_str::<Slate>(&blob)
            .ok()
            .filter(Slate::is_well_formed)
            .ok_or_else(|| GameError::NotFound(format!("slate under {key} is unusable")))?;
        Ok((slate, key))
    }

    async fn write_slate(
        &self,
        key: &str,
        slate: &Slate,
        ttl: Option<Duration>,
    ) -> Result<(), GameError> {
        let blob = serde_json::to_string(slate).map_err(|err| GameError::Store(err.to_string()))?;
        self.cache.set(key, &blob, ttl).await.map_err(store_err)
    }

    async fn generate_slate(
        &self,
        mode: GameMode,
        date_key: Option<&str>,
        game_id: String,
        base_seed: &str,
    ) -> Slate {
        let mut items = SlateItems::new();
        let mut hidden = HashMap::new();
        let mut used_descriptors: HashSet<String> = HashSet::new();

        for item_id in ITEM_IDS {
            let item_seed = keys::slot_seed(base_seed, item_id);
            let picked = crate::seed::pick_distinct_from_pool(
                &keys::slot_seed(&item_seed, "descriptors"),
                2,
                &DESCRIPTOR_POOL,
                &used_descriptors,
            );
            for choice in &picked {
                used_descriptors.insert(choice.trim().to_lowercase());
            }
            let descriptors = [
                picked.first().cloned().unwrap_or_default(),
                picked.get(1).cloned().unwrap_or_default(),
            ];

            // Economic numbers are server-picked; generated text only
            // frames them.
            let valuation =
                crate::seed::pick_in_range(&keys::slot_seed(&item_seed, "valuation"), 250, 5_000)
                    * 1_000;
            let unit_price =
                crate::seed::pick_in_range(&keys::slot_seed(&item_seed, "unit-price"), 5, 500);

            let request = ItemRequest {
                seed: item_seed,
                descriptors: descriptors.clone(),
            };
            // One failed item degrades alone; the others still generate.
            let content = generate::generate_item(&self.backend, &request).await;
            let generate::ItemContent {
                title,
                pitch,
                category,
                truth,
            } = content.value;
            items.push(PitchItem::new(
                item_id, title, pitch, valuation, unit_price, category, descriptors,
            ));
            hidden.insert(item_id.to_string(), truth);
        }

        Slate {
            version: SLATE_VERSION,
            mode,
            date_key: date_key.map(|key| key.trim().to_string()),
            game_id,
            items,
            hidden,
        }
    }

    fn inflight_guard(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release_guard(&self, key: &str, guard: &Arc<AsyncMutex<()>>) {
        let mut map = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Two strong refs: the map's and ours. Nobody else is waiting.
        if Arc::strong_count(guard) <= 2 {
            map.remove(key);
        }
    }
}

fn respond(slate: &Slate) -> StartResponse {
    StartResponse {
        mode: slate.mode,
        date_key: slate.date_key.clone(),
        game_id: slate.game_id.clone(),
        items: slate.items.iter().cloned().collect(),
    }
}

fn random_game_id() -> String {
    let mut rng = SmallRng::from_entropy();
    format!("r-{:016x}", rng.r#gen::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenBackend for CountingBackend {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"title": "Quiet Harbor", "pitch": "It works. People like it.", "category": "gadgets", "notes": "n", "risk": "low", "demand": "steady"}"#.to_string())
        }
    }

    fn services() -> GameServices<CountingBackend> {
        GameServices::new(CountingBackend::new(), Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn daily_start_requires_date_key() {
        let services = services();
        let err = services.start_slate(GameMode::Daily, None).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidArgument(_)));
        // Fail-fast: no backend call was wasted.
        assert_eq!(services.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_start_is_served_from_cache() {
        let services = services();
        let first = services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        let calls_after_first = services.backend.calls.load(Ordering::SeqCst);
        let second = services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(services.backend.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn random_starts_mint_fresh_identities() {
        let services = services();
        let first = services.start_slate(GameMode::Random, None).await.unwrap();
        let second = services.start_slate(GameMode::Random, None).await.unwrap();
        assert_ne!(first.game_id, second.game_id);
        assert!(first.game_id.starts_with("r-"));
    }

    #[tokio::test]
    async fn descriptors_do_not_repeat_within_a_slate() {
        let services = services();
        let response = services
            .start_slate(GameMode::Daily, Some("2025-03-03"))
            .await
            .unwrap();
        let mut seen = HashSet::new();
        for item in &response.items {
            for descriptor in &item.descriptors {
                assert!(
                    seen.insert(descriptor.trim().to_lowercase()),
                    "descriptor {descriptor} repeated"
                );
            }
        }
    }

    #[tokio::test]
    async fn revise_validates_before_any_backend_work() {
        let services = services();
        services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        let calls = services.backend.calls.load(Ordering::SeqCst);

        let oversize = "x".repeat(SUGGESTION_MAX_CHARS + 1);
        let err = services
            .revise_item(GameMode::Daily, "ignored", Some("2025-01-01"), "pitch-a", &oversize)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidArgument(_)));
        assert_eq!(services.backend.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn unknown_items_and_slates_are_not_found() {
        let services = services();
        services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();

        let err = services
            .revise_item(GameMode::Daily, "x", Some("2025-01-01"), "pitch-z", "tighten it")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));

        let err = services
            .simulate_outcome(GameMode::Daily, "x", Some("2025-02-02"), "pitch-a", "p", 100.0)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn non_positive_investment_is_rejected() {
        let services = services();
        for bad in [0.0, -25.0, f64::NAN] {
            let err = services
                .simulate_outcome(GameMode::Daily, "x", Some("2025-01-01"), "pitch-a", "p", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, GameError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn image_backfill_sets_only_missing_urls() {
        let services = services();
        let response = services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        let game_id = response.game_id;

        let changed = services
            .backfill_image(
                GameMode::Daily,
                &game_id,
                Some("2025-01-01"),
                "pitch-a",
                "https://img.example/a.png",
            )
            .await
            .unwrap();
        assert!(changed);

        let again = services
            .backfill_image(
                GameMode::Daily,
                &game_id,
                Some("2025-01-01"),
                "pitch-a",
                "https://img.example/other.png",
            )
            .await
            .unwrap();
        assert!(!again);

        let response = services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        let item = response.items.iter().find(|i| i.id == "pitch-a").unwrap();
        assert_eq!(item.image_url.as_deref(), Some("https://img.example/a.png"));
    }

    #[tokio::test]
    async fn inflight_guards_are_released() {
        let services = services();
        services
            .start_slate(GameMode::Daily, Some("2025-01-01"))
            .await
            .unwrap();
        assert!(services.inflight.lock().unwrap().is_empty());
    }
}
