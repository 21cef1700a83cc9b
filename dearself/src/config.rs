//! Application configuration constants
//!
//! Central location for storage keys, limits and validation boundaries used
//! throughout the application, plus the environment-driven relay settings.

// ===== Storage Keys =====

/// Preferences record
pub const PREFS_KEY: &str = "dearself.userprefs.v1";
/// Today's affirmation card
pub const TODAY_KEY: &str = "dearself.today";
/// Journal entries
pub const ENTRIES_KEY: &str = "dearself.entries";
/// Favorited affirmations
pub const FAVORITES_KEY: &str = "dearself.favorites";
/// Affirmation usage cycle (used ids, notified thresholds)
pub const USAGE_KEY: &str = "dearself.usage";
/// Page size of the past-entries view
pub const PAST_ENTRIES_PAGE_SIZE_KEY: &str = "pastEntries.pageSize";
/// Page size of the favorites view
pub const FAVORITES_PAGE_SIZE_KEY: &str = "favorites.pageSize";

// ===== Undo Window =====

/// Default undo window for optimistic deletes in milliseconds
pub const DEFAULT_UNDO_MS: u64 = 4_000;

/// Minimum undo window. Shorter windows leave no time to react.
pub const MIN_UNDO_MS: u64 = 1_000;

/// Maximum undo window (1 minute)
pub const MAX_UNDO_MS: u64 = 60_000;

// ===== Listing =====

/// Page sizes offered by the list views
pub const PAGE_SIZE_OPTIONS: &[usize] = &[12, 24, 50, 75, 100];

/// Page size used when nothing valid is stored
pub const DEFAULT_PAGE_SIZE: usize = 12;

// ===== Affirmations =====

/// Remaining-item counts that trigger a low-inventory warning
pub const LOW_INVENTORY_THRESHOLDS: &[usize] = &[10, 1, 0];

/// Category given to favorites that arrive without one
pub const DEFAULT_CATEGORY: &str = "Daily";

// ===== Streak =====

/// Streak length at which the badge becomes visible
pub const MIN_VISIBLE_STREAK: u32 = 2;

// ===== Paper & Export =====

/// Paper shown when the user never picked one
pub const DEFAULT_PAPER_KEY: &str = "romantic2";

/// Base path for paper images
pub const DEFAULT_IMAGE_BASE: &str = "/images";

/// Export canvas size (4:5 portrait)
pub const EXPORT_CANVAS_WIDTH: u32 = 1080;
pub const EXPORT_CANVAS_HEIGHT: u32 = 1350;

// ===== Entry Style Baseline =====

pub const DEFAULT_FONT_FAMILY: &str = "Merriweather";
pub const DEFAULT_FONT_COLOR: &str = "#2B2B2B";
pub const DEFAULT_FONT_SIZE: u32 = 20;

/// Font sizes outside this range are clamped
pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 96;

// ===== Usage Relay =====

/// Default EmailJS-compatible send endpoint
pub const DEFAULT_RELAY_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Relay settings, read from the environment.
///
/// The relay is only enabled when a service id, both templates, a public key
/// and a recipient are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub url: String,
    pub service_id: String,
    /// Template for the "10 left" warning
    pub template_low: String,
    /// Template for the "1 left" and "none left" warnings
    pub template_last: String,
    pub public_key: String,
    pub recipient: String,
}

impl RelayConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Some(Self {
            url: get("DEARSELF_RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            service_id: get("DEARSELF_RELAY_SERVICE_ID")?,
            template_low: get("DEARSELF_RELAY_TEMPLATE_LOW")?,
            template_last: get("DEARSELF_RELAY_TEMPLATE_LAST")?,
            public_key: get("DEARSELF_RELAY_PUBLIC_KEY")?,
            recipient: get("DEARSELF_RELAY_RECIPIENT")?,
        })
    }

    /// Template to use for a remaining count, if the count is a threshold
    pub fn template_for(&self, remaining: usize) -> Option<&str> {
        match remaining {
            10 => Some(self.template_low.as_str()),
            1 | 0 => Some(self.template_last.as_str()),
            _ => None,
        }
    }
}
