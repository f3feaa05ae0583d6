//! Tunable constants shared across slate generation and economics.

/// Schema version written into every cached slate. Cached blobs with a
/// different version are regenerated on read.
pub const SLATE_VERSION: u32 = 2;

/// Bumping this regenerates all daily content without waiting for the
/// natural date rollover, since it is folded into every daily cache key.
pub const SEED_VERSION: u32 = 3;

/// Every slate carries exactly this many items.
pub const SLATE_ITEM_COUNT: usize = 3;

/// Fixed item id set; slates never use ids outside this list.
pub const ITEM_IDS: [&str; SLATE_ITEM_COUNT] = ["pitch-a", "pitch-b", "pitch-c"];

/// Daily slates are shared by every player that day and linger for replays.
pub const DAILY_SLATE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// Random slates are throwaway debug sessions.
pub const RANDOM_SLATE_TTL_SECS: u64 = 24 * 60 * 60;

pub const VALUATION_MIN_USD: i64 = 250_000;
pub const VALUATION_MAX_USD: i64 = 5_000_000;
pub const UNIT_PRICE_MIN_USD: i64 = 5;
pub const UNIT_PRICE_MAX_USD: i64 = 500;
pub const UNITS_SOLD_MIN: i64 = 1;
pub const UNITS_SOLD_MAX: i64 = 1_000_000;

/// Upper bound on the revenue share any single investment can earn.
pub const OWNERSHIP_CAP_FRACTION: f64 = 0.25;

/// Bankroll minimum re-applied on the first view of a new day.
pub const DAILY_BANKROLL_FLOOR_USD: i64 = 10_000;

/// Player revision suggestions longer than this are rejected up front.
pub const SUGGESTION_MAX_CHARS: usize = 280;

/// Pitch-shaped text is truncated to this many sentences.
pub const PITCH_MAX_SENTENCES: usize = 2;

/// Descriptor tokens shorter than this survive title filtering, so glue
/// words do not destroy otherwise valid titles.
pub const TITLE_FILTER_MIN_TOKEN_LEN: usize = 3;
