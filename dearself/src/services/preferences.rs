//! Preferences service
//!
//! One preferences record per device, stored as a JSON patch over a
//! complete default record. Every load deep-merges the stored document onto
//! the defaults, migrates legacy values and repairs invariants, so callers
//! always get a fully populated [`Preferences`].

use crate::config::{
    DEFAULT_FONT_COLOR, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_PAPER_KEY, DEFAULT_UNDO_MS,
    MAX_FONT_SIZE, MAX_UNDO_MS, MIN_FONT_SIZE, MIN_UNDO_MS, PREFS_KEY,
};
use crate::error::{AppError, Result};
use crate::storage::{LocalStore, StoreChange};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Navigation tabs. `navOrder` is always a permutation of [`NavTab::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavTab {
    Today,
    Past,
    Favorites,
    Settings,
}

impl NavTab {
    pub const ALL: [NavTab; 4] = [NavTab::Today, NavTab::Past, NavTab::Favorites, NavTab::Settings];

    pub fn as_str(self) -> &'static str {
        match self {
            NavTab::Today => "today",
            NavTab::Past => "past",
            NavTab::Favorites => "favorites",
            NavTab::Settings => "settings",
        }
    }
}

impl fmt::Display for NavTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavTab {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NavTab::ALL
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown tab '{}'", s))
    }
}

/// Direction for a nav reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMove {
    Up,
    Down,
}

/// Which tabs are shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavVisibility {
    pub today: bool,
    pub past: bool,
    pub favorites: bool,
    pub settings: bool,
}

impl Default for NavVisibility {
    fn default() -> Self {
        Self {
            today: true,
            past: true,
            favorites: true,
            settings: true,
        }
    }
}

/// The user's default style for new journal entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryStyleDefaults {
    pub font_family: String,
    pub font_color: String,
    pub font_size: u32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for EntryStyleDefaults {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_color: DEFAULT_FONT_COLOR.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
        }
    }
}

/// Device preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    // Branding & look
    pub brand_theme: String,
    pub header_font: String,
    pub site_bg: String,
    pub bg_texture: String,
    pub site_width: String,
    pub card_density: String,
    pub motion: String,
    #[serde(rename = "compactUI")]
    pub compact_ui: bool,

    // Navigation
    pub landing_page: NavTab,
    pub nav_visible: NavVisibility,
    pub nav_order: Vec<NavTab>,

    // Daily card
    pub card_order: String,
    pub show_category_chip: bool,
    pub confirm_regenerate: bool,
    pub heart_style: String,

    // Favorites
    pub fav_layout: String,
    pub fav_sort: String,
    pub fav_show_tags: bool,

    // Past entries
    pub date_format: String,
    pub week_start: u8,
    pub past_default_range: String,

    // Locale & behavior
    pub time_zone: String,
    pub undo_ms: u64,
    pub selected_paper_key: String,
    pub entry_style: EntryStyleDefaults,
}

fn default_time_zone() -> String {
    std::env::var("TZ")
        .ok()
        .filter(|tz| !tz.trim().is_empty())
        .unwrap_or_else(|| "America/Chicago".to_string())
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            brand_theme: "sage".to_string(),
            header_font: "merriweather".to_string(),
            site_bg: "#FAF9F6".to_string(),
            bg_texture: "none".to_string(),
            site_width: "950px".to_string(),
            card_density: "cozy".to_string(),
            motion: "low".to_string(),
            compact_ui: false,
            landing_page: NavTab::Today,
            nav_visible: NavVisibility::default(),
            nav_order: NavTab::ALL.to_vec(),
            card_order: "affirmation-first".to_string(),
            show_category_chip: true,
            confirm_regenerate: false,
            heart_style: "emoji".to_string(),
            fav_layout: "grid".to_string(),
            fav_sort: "newest".to_string(),
            fav_show_tags: true,
            date_format: "long".to_string(),
            week_start: 0,
            past_default_range: "all".to_string(),
            time_zone: default_time_zone(),
            undo_ms: DEFAULT_UNDO_MS,
            selected_paper_key: DEFAULT_PAPER_KEY.to_string(),
            entry_style: EntryStyleDefaults::default(),
        }
    }
}

impl Preferences {
    /// Undo window for optimistic deletes
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_ms)
    }

    /// Repair values a patch or an older version may have left out of range
    fn normalized(mut self) -> Self {
        self.nav_order = repair_nav_order(&self.nav_order);
        self.undo_ms = self.undo_ms.clamp(MIN_UNDO_MS, MAX_UNDO_MS);
        if self.selected_paper_key.trim().is_empty() {
            self.selected_paper_key = DEFAULT_PAPER_KEY.to_string();
        }
        if self.week_start > 1 {
            self.week_start = 0;
        }
        self.header_font = migrate_header_font(&self.header_font).to_string();
        self.entry_style.font_size = self.entry_style.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self
    }
}

/// Map the old two-valued header font onto the current font ids
fn migrate_header_font(font: &str) -> &str {
    match font {
        "serif" => "merriweather",
        "sans" => "inter",
        other => other,
    }
}

/// Keep known tabs in their stored order, drop duplicates, append the rest
fn repair_nav_order(order: &[NavTab]) -> Vec<NavTab> {
    let mut repaired: Vec<NavTab> = Vec::with_capacity(NavTab::ALL.len());
    for tab in order.iter().copied().chain(NavTab::ALL) {
        if !repaired.contains(&tab) {
            repaired.push(tab);
        }
    }
    repaired
}

/// Deep merge: objects merge key by key, anything else replaces
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                merge_json(target_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, patch) => {
            *target = patch;
        }
    }
}

/// Value-level cleanup that must happen before typed deserialization
fn prepare(value: &mut Value) {
    if let Some(font) = value.get_mut("headerFont") {
        if let Some(migrated) = font.as_str().map(|f| migrate_header_font(f).to_string()) {
            *font = Value::String(migrated);
        }
    }

    // Unknown tab names would otherwise reject the whole record.
    if let Some(Value::Array(order)) = value.get_mut("navOrder") {
        order.retain(|tab| tab.as_str().is_some_and(|t| t.parse::<NavTab>().is_ok()));
        for tab in order.iter_mut() {
            if let Some(parsed) = tab.as_str().and_then(|t| t.parse::<NavTab>().ok()) {
                *tab = Value::String(parsed.as_str().to_string());
            }
        }
    }
}

fn defaults_value() -> Value {
    serde_json::to_value(Preferences::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Resolve a stored document into complete preferences.
///
/// Fields whose stored value does not fit the schema keep their default;
/// the rest of the document still applies.
fn resolve(stored: Value) -> Preferences {
    let Value::Object(stored) = stored else {
        tracing::warn!("Stored preferences are not an object, using defaults");
        return Preferences::default();
    };

    let mut merged = defaults_value();
    merge_json(&mut merged, Value::Object(stored.clone()));
    prepare(&mut merged);

    if let Ok(prefs) = serde_json::from_value::<Preferences>(merged) {
        return prefs.normalized();
    }

    let mut accepted = defaults_value();
    for (key, value) in stored {
        let mut candidate = accepted.clone();
        merge_json(&mut candidate, Value::Object(Map::from_iter([(key.clone(), value)])));
        prepare(&mut candidate);

        if serde_json::from_value::<Preferences>(candidate.clone()).is_ok() {
            accepted = candidate;
        } else {
            tracing::warn!("Ignoring invalid stored preference field: {}", key);
        }
    }

    serde_json::from_value::<Preferences>(accepted)
        .map(Preferences::normalized)
        .unwrap_or_default()
}

/// Visual host the preferences are applied to (a document body, a
/// terminal theme, a recorded stylesheet...)
pub trait ThemeHost {
    /// Replace any class starting with `prefix` by `prefix` + `value`
    fn set_class(&mut self, prefix: &str, value: &str);
    /// Set a CSS custom property such as `--site-bg`
    fn set_property(&mut self, name: &str, value: &str);
    /// Set a `data-*` attribute
    fn set_attribute(&mut self, name: &str, value: &str);
}

/// A [`ThemeHost`] that records what was applied and renders it as CSS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssHost {
    classes: BTreeMap<String, String>,
    properties: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
}

impl CssHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.values().cloned().collect()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `class="..." data-x="..."` for the body element
    pub fn body_attributes(&self) -> String {
        let mut out = format!("class=\"{}\"", self.classes().join(" "));
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, value));
        }
        out
    }

    /// Custom properties as a `body { ... }` rule
    pub fn to_css(&self) -> String {
        let mut out = String::from("body {\n");
        for (name, value) in &self.properties {
            out.push_str(&format!("  {}: {};\n", name, value));
        }
        out.push('}');
        out
    }
}

impl ThemeHost for CssHost {
    fn set_class(&mut self, prefix: &str, value: &str) {
        self.classes
            .insert(prefix.to_string(), format!("{}{}", prefix, value));
    }

    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }
}

/// Push theme, font, texture and layout choices onto a host
pub fn apply_to_host(prefs: &Preferences, host: &mut impl ThemeHost) {
    let defaults = Preferences::default();
    let or_default = |value: &str, fallback: &str| -> String {
        if value.trim().is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };

    host.set_class("theme-", &or_default(&prefs.brand_theme, &defaults.brand_theme));
    host.set_class(
        "header-",
        migrate_header_font(&or_default(&prefs.header_font, &defaults.header_font)),
    );

    if !prefs.site_bg.is_empty() {
        host.set_property("--site-bg", &prefs.site_bg);
    }
    if !prefs.site_width.is_empty() {
        host.set_property("--site-width", &prefs.site_width);
    }

    host.set_attribute(
        "data-card-density",
        &or_default(&prefs.card_density, &defaults.card_density),
    );
    host.set_attribute("data-motion", &or_default(&prefs.motion, &defaults.motion));
    host.set_attribute(
        "data-bg-texture",
        &or_default(&prefs.bg_texture, &defaults.bg_texture),
    );
    host.set_attribute(
        "data-heart-style",
        &or_default(&prefs.heart_style, &defaults.heart_style),
    );
}

/// Service for loading and saving preferences
#[derive(Clone)]
pub struct PreferencesService {
    store: LocalStore,
}

impl PreferencesService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Load preferences, filling anything missing from the defaults
    pub async fn load(&self) -> Preferences {
        let stored = self.store.read(PREFS_KEY, Value::Object(Map::new())).await;
        resolve(stored)
    }

    /// Deep-merge a JSON patch into the current preferences and persist.
    ///
    /// Fails without writing when the merged record does not fit the schema.
    pub async fn save(&self, patch: Value) -> Result<Preferences> {
        if !patch.is_object() {
            return Err(AppError::InvalidPreferences(
                "patch must be a JSON object".to_string(),
            ));
        }

        let _guard = self.store.lock_key(PREFS_KEY).await;
        let mut next = serde_json::to_value(self.load().await)?;
        merge_json(&mut next, patch);
        prepare(&mut next);

        let prefs = serde_json::from_value::<Preferences>(next)
            .map_err(|e| AppError::InvalidPreferences(e.to_string()))?
            .normalized();

        self.persist(&prefs).await;
        Ok(prefs)
    }

    /// Apply a typed change to the current preferences and persist
    pub async fn update(&self, change: impl FnOnce(&mut Preferences)) -> Preferences {
        let _guard = self.store.lock_key(PREFS_KEY).await;
        let mut prefs = self.load().await;
        change(&mut prefs);
        let prefs = prefs.normalized();
        self.persist(&prefs).await;
        prefs
    }

    /// Swap a tab with its neighbour. Moves past either end change nothing.
    pub async fn move_nav(&self, tab: NavTab, direction: NavMove) -> Preferences {
        let _guard = self.store.lock_key(PREFS_KEY).await;
        let mut prefs = self.load().await;

        let Some(index) = prefs.nav_order.iter().position(|t| *t == tab) else {
            return prefs;
        };
        let target = match direction {
            NavMove::Up => index.checked_sub(1),
            NavMove::Down => Some(index + 1).filter(|i| *i < prefs.nav_order.len()),
        };
        let Some(target) = target else {
            tracing::debug!("Ignoring nav move of {} past the end", tab);
            return prefs;
        };

        prefs.nav_order.swap(index, target);
        self.persist(&prefs).await;
        prefs
    }

    /// Current undo window
    pub async fn undo_window(&self) -> Duration {
        self.load().await.undo_window()
    }

    /// Watch for preference changes from this process or a bridge
    pub fn watch(&self) -> PreferencesWatcher {
        PreferencesWatcher {
            service: self.clone(),
            changes: self.store.subscribe(),
        }
    }

    async fn persist(&self, prefs: &Preferences) {
        self.store.write(PREFS_KEY, prefs).await;
        tracing::info!("Preferences saved");
    }
}

/// Yields fresh preferences each time the preferences key changes
pub struct PreferencesWatcher {
    service: PreferencesService,
    changes: broadcast::Receiver<StoreChange>,
}

impl PreferencesWatcher {
    /// Wait for the next change to the preferences key.
    ///
    /// The watcher holds a store handle, which keeps the change channel
    /// open, so this keeps waiting while other keys change. `None` is only
    /// returned if the channel closes.
    pub async fn changed(&mut self) -> Option<Preferences> {
        loop {
            match self.changes.recv().await {
                Ok(change) if change.is_for(PREFS_KEY) => {
                    tracing::debug!("Preferences changed ({:?})", change.origin);
                    return Some(self.service.load().await);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    // Missed notifications may have included ours; reload.
                    tracing::debug!("Preferences watcher lagged by {}", missed);
                    return Some(self.service.load().await);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
