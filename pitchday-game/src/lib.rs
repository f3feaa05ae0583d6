//! Pitchday Game Kernel
//!
//! Platform-agnostic server-side logic for the Pitchday daily games: a
//! deterministic generation-and-caching kernel that turns a day key or a
//! random id into reproducible content, orchestrates one round-trip to a
//! text-generation backend per unit of work, defensively sanitizes the
//! replies, caches the resulting slate once per key, and runs the
//! investment economics. Rendering, gestures, configuration loading, and
//! image synthesis live with the embedding application.

use thiserror::Error;

pub mod cache;
pub mod constants;
pub mod economy;
pub mod generate;
pub mod keys;
pub mod numbers;
pub mod sanitize;
pub mod seed;
pub mod slate;
pub mod state;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheStore, MemoryCache};
pub use generate::{
    FallbackReason, GenSource, Generated, ItemContent, ItemRequest, OutcomeContent,
    TextGenBackend, fallback_title,
};
pub use keys::{daily_base_seed, slate_key, slot_seed};
pub use slate::{GameServices, ReviseResponse, SimulateResponse, StartResponse};
pub use state::{
    BankrollState, DemandProfile, GameMode, HiddenTruth, PitchItem, RiskLevel, Slate, SlateItems,
};

/// Errors surfaced to calling handlers. Upstream generation failure is
/// deliberately absent: it is always absorbed into fallback content (see
/// [`generate::GenSource`]), never propagated.
#[derive(Debug, Error)]
pub enum GameError {
    /// A required field was missing or malformed; checked before any
    /// generation or store work begins.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The referenced slate or item does not exist (expired or mistyped).
    #[error("not found: {0}")]
    NotFound(String),
    /// The cache backend failed mid-request; unrecoverable here.
    #[error("store failure: {0}")]
    Store(String),
}
