//! Journal entries service
//!
//! Entries live as one JSON array under the entries key. Identity (id and
//! timestamp) is fixed at creation; content and style change through
//! partial updates. Reads are lenient: a malformed record is skipped instead
//! of hiding the whole journal.

use crate::config::{
    DEFAULT_FONT_COLOR, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_PAPER_KEY, ENTRIES_KEY,
    MAX_FONT_SIZE, MIN_FONT_SIZE,
};
use crate::services::papers::PaperCatalog;
use crate::services::preferences::{Preferences, PreferencesService};
use crate::storage::LocalStore;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ID_SUFFIX_LEN: usize = 5;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Visual style of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStyle {
    pub theme_key: String,
    pub image_src: String,
    pub font_family: String,
    pub font_color: String,
    pub date_color: String,
    pub font_size: u32,
    pub bold: bool,
    pub italic: bool,
}

impl EntryStyle {
    /// Style used when neither the caller nor the preferences say otherwise
    pub fn system_default(papers: &PaperCatalog) -> Self {
        Self {
            theme_key: DEFAULT_PAPER_KEY.to_string(),
            image_src: papers.resolve(DEFAULT_PAPER_KEY),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_color: DEFAULT_FONT_COLOR.to_string(),
            date_color: DEFAULT_FONT_COLOR.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
        }
    }

    /// The user's default style for new entries
    pub fn from_preferences(prefs: &Preferences, papers: &PaperCatalog) -> Self {
        let defaults = &prefs.entry_style;
        let theme_key = non_empty(&prefs.selected_paper_key).unwrap_or(DEFAULT_PAPER_KEY);
        Self {
            theme_key: theme_key.to_string(),
            image_src: papers.resolve(theme_key),
            font_family: non_empty(&defaults.font_family)
                .unwrap_or(DEFAULT_FONT_FAMILY)
                .to_string(),
            font_color: non_empty(&defaults.font_color)
                .unwrap_or(DEFAULT_FONT_COLOR)
                .to_string(),
            date_color: non_empty(&defaults.font_color)
                .unwrap_or(DEFAULT_FONT_COLOR)
                .to_string(),
            font_size: defaults.font_size,
            bold: defaults.bold,
            italic: defaults.italic,
        }
    }

    /// Overlay a patch. A new theme without an explicit image re-resolves
    /// the image; a new font color without an explicit date color carries
    /// over to the date.
    pub fn apply(&mut self, patch: &StylePatch, papers: &PaperCatalog) {
        if let Some(theme) = patch.theme_key.as_deref().and_then(non_empty) {
            if theme != self.theme_key && patch.image_src.is_none() {
                self.image_src = papers.resolve(theme);
            }
            self.theme_key = theme.to_string();
        }
        if let Some(src) = patch.image_src.as_deref().and_then(non_empty) {
            self.image_src = src.to_string();
        }
        if let Some(family) = patch.font_family.as_deref().and_then(non_empty) {
            self.font_family = family.to_string();
        }
        if let Some(color) = patch.font_color.as_deref().and_then(non_empty) {
            self.font_color = color.to_string();
            if patch.date_color.is_none() {
                self.date_color = color.to_string();
            }
        }
        if let Some(color) = patch.date_color.as_deref().and_then(non_empty) {
            self.date_color = color.to_string();
        }
        if let Some(size) = patch.font_size {
            self.font_size = size;
        }
        if let Some(bold) = patch.bold {
            self.bold = bold;
        }
        if let Some(italic) = patch.italic {
            self.italic = italic;
        }
        self.font_size = self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Partial style; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    pub theme_key: Option<String>,
    pub image_src: Option<String>,
    pub font_family: Option<String>,
    pub font_color: Option<String>,
    pub date_color: Option<String>,
    pub font_size: Option<u32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

/// Partial entry update
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntryPatch {
    pub content: Option<String>,
    pub style: Option<StylePatch>,
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub style: EntryStyle,
}

impl Entry {
    /// Calendar day the entry was written on, in local time
    pub fn local_day(&self) -> NaiveDate {
        self.timestamp.with_timezone(&Local).date_naive()
    }
}

/// Stored shape, tolerant of records written by older versions
#[derive(Deserialize)]
struct StoredEntry {
    id: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    style: Value,
}

/// `<unix-millis>-<5 base36 chars>`
fn generate_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix)
}

/// Service for managing journal entries
#[derive(Clone)]
pub struct EntriesService {
    store: LocalStore,
    preferences: PreferencesService,
    papers: PaperCatalog,
}

impl EntriesService {
    pub fn new(store: LocalStore, preferences: PreferencesService, papers: PaperCatalog) -> Self {
        Self {
            store,
            preferences,
            papers,
        }
    }

    /// All entries in stored order
    pub async fn list(&self) -> Vec<Entry> {
        let raw: Vec<Value> = self.store.read(ENTRIES_KEY, Vec::new()).await;
        let baseline = EntryStyle::system_default(&self.papers);

        raw.into_iter()
            .filter_map(|record| match serde_json::from_value::<StoredEntry>(record) {
                Ok(stored) => Some(self.repair(stored, &baseline)),
                Err(e) => {
                    tracing::warn!("Skipping malformed journal entry: {}", e);
                    None
                }
            })
            .collect()
    }

    fn repair(&self, stored: StoredEntry, baseline: &EntryStyle) -> Entry {
        let patch: StylePatch = serde_json::from_value(stored.style).unwrap_or_default();

        let mut style = baseline.clone();
        let theme = patch
            .theme_key
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(DEFAULT_PAPER_KEY);
        // Records without an image path get one from their theme.
        style.image_src = self.papers.resolve(theme);
        style.apply(&patch, &self.papers);

        Entry {
            id: stored.id,
            timestamp: stored.timestamp,
            content: stored.content,
            style,
        }
    }

    pub async fn get(&self, id: &str) -> Option<Entry> {
        self.list().await.into_iter().find(|e| e.id == id)
    }

    /// Create an entry. Style precedence: `style` argument, then the user's
    /// default style, then the system default.
    pub async fn add(&self, content: String, style: StylePatch) -> Entry {
        self.add_at(content, style, Utc::now()).await
    }

    /// [`add`](Self::add) with an explicit creation instant
    pub async fn add_at(&self, content: String, style: StylePatch, timestamp: DateTime<Utc>) -> Entry {
        let prefs = self.preferences.load().await;
        let mut resolved = EntryStyle::from_preferences(&prefs, &self.papers);
        resolved.apply(&style, &self.papers);

        let entry = Entry {
            id: generate_id(timestamp),
            timestamp,
            content,
            style: resolved,
        };

        let _guard = self.store.lock_key(ENTRIES_KEY).await;
        let mut entries = self.list().await;
        entries.push(entry.clone());
        self.persist(&entries).await;

        tracing::info!("Journal entry created: {}", entry.id);
        entry
    }

    /// Merge a patch into an entry. Returns `None` when the id is unknown.
    pub async fn update(&self, id: &str, patch: EntryPatch) -> Option<Entry> {
        let _guard = self.store.lock_key(ENTRIES_KEY).await;
        let mut entries = self.list().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            tracing::debug!("Update for unknown entry {}", id);
            return None;
        };

        if let Some(content) = patch.content {
            entry.content = content;
        }
        if let Some(style) = &patch.style {
            entry.style.apply(style, &self.papers);
        }
        let updated = entry.clone();

        self.persist(&entries).await;
        tracing::debug!("Journal entry updated: {}", id);
        Some(updated)
    }

    /// Remove an entry. Unknown ids change nothing.
    pub async fn remove(&self, id: &str) {
        let _guard = self.store.lock_key(ENTRIES_KEY).await;
        let mut entries = self.list().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);

        if entries.len() == before {
            tracing::debug!("Remove for unknown entry {}", id);
            return;
        }

        self.persist(&entries).await;
        tracing::info!("Journal entry deleted: {}", id);
    }

    /// Entries matching a query
    pub async fn query(&self, query: &EntryQuery) -> Vec<Entry> {
        query.apply(self.list().await)
    }

    async fn persist(&self, entries: &[Entry]) {
        self.store.write(ENTRIES_KEY, entries).await;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntrySort {
    #[default]
    Newest,
    Oldest,
    ThemeAZ,
    ThemeZA,
}

impl std::str::FromStr for EntrySort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "theme-az" | "themeaz" => Ok(Self::ThemeAZ),
            "theme-za" | "themeza" => Ok(Self::ThemeZA),
            other => Err(format!("Unknown sort '{}'", other)),
        }
    }
}

/// Filters and ordering for the past-entries view
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Case-insensitive substring of the content
    pub text: Option<String>,
    /// Prefix of the theme key, e.g. `whimsical`
    pub theme_prefix: Option<String>,
    /// Local calendar day
    pub day: Option<NaiveDate>,
    pub sort: EntrySort,
}

impl EntryQuery {
    pub fn apply(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let text = self
            .text
            .as_deref()
            .and_then(non_empty)
            .map(str::to_lowercase);
        let prefix = self.theme_prefix.as_deref().and_then(non_empty);

        let mut matched: Vec<Entry> = entries
            .into_iter()
            .filter(|e| {
                text.as_ref()
                    .map_or(true, |t| e.content.to_lowercase().contains(t))
            })
            .filter(|e| prefix.map_or(true, |p| e.style.theme_key.starts_with(p)))
            .filter(|e| self.day.map_or(true, |d| e.local_day() == d))
            .collect();

        match self.sort {
            EntrySort::Newest => matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            EntrySort::Oldest => matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            EntrySort::ThemeAZ => matched.sort_by(|a, b| {
                a.style
                    .theme_key
                    .cmp(&b.style.theme_key)
                    .then(b.timestamp.cmp(&a.timestamp))
            }),
            EntrySort::ThemeZA => matched.sort_by(|a, b| {
                b.style
                    .theme_key
                    .cmp(&a.style.theme_key)
                    .then(b.timestamp.cmp(&a.timestamp))
            }),
        }

        matched
    }
}

/// Entries written in one calendar month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGroup {
    /// e.g. `October 2026`
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub entries: Vec<Entry>,
}

/// Group entries by local month, newest month first. Order inside a group
/// follows the input.
pub fn group_by_month(entries: &[Entry]) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();

    for entry in entries {
        let day = entry.local_day();
        match groups
            .iter_mut()
            .find(|g| g.year == day.year() && g.month == day.month())
        {
            Some(group) => group.entries.push(entry.clone()),
            None => groups.push(MonthGroup {
                label: day.format("%B %Y").to_string(),
                year: day.year(),
                month: day.month(),
                entries: vec![entry.clone()],
            }),
        }
    }

    groups.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    async fn create_test_service() -> (EntriesService, LocalStore) {
        let store = LocalStore::in_memory().await.unwrap();
        let prefs = PreferencesService::new(store.clone());
        let service = EntriesService::new(store.clone(), prefs, PaperCatalog::default());
        (service, store)
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_generated_id_shape() {
        let now = Utc::now();
        let id = generate_id(now);
        let (millis, suffix) = id.split_once('-').unwrap();

        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[tokio::test]
    async fn test_add_uses_preference_defaults() {
        let (service, _store) = create_test_service().await;
        service
            .preferences
            .save(json!({"selectedPaperKey": "whimsical3", "entryStyle": {"fontColor": "#AA0000"}}))
            .await
            .unwrap();

        let entry = service.add("Dear me".to_string(), StylePatch::default()).await;

        assert_eq!(entry.style.theme_key, "whimsical3");
        assert_eq!(entry.style.image_src, "/images/whimsical3.png");
        assert_eq!(entry.style.font_color, "#AA0000");
        assert_eq!(entry.style.date_color, "#AA0000");
        assert_eq!(entry.style.font_family, DEFAULT_FONT_FAMILY);
        assert_eq!(service.list().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_add_explicit_style_wins() {
        let (service, _store) = create_test_service().await;

        let entry = service
            .add(
                String::new(),
                StylePatch {
                    theme_key: Some("minimal2".to_string()),
                    font_color: Some("#000000".to_string()),
                    bold: Some(true),
                    ..StylePatch::default()
                },
            )
            .await;

        assert_eq!(entry.content, "");
        assert_eq!(entry.style.image_src, "/images/minimal2.png");
        assert_eq!(entry.style.date_color, "#000000");
        assert!(entry.style.bold);
        assert!(!entry.style.italic);
    }

    #[tokio::test]
    async fn test_update_preserves_identity() {
        let (service, _store) = create_test_service().await;
        let entry = service.add("first".to_string(), StylePatch::default()).await;

        let updated = service
            .update(
                &entry.id,
                EntryPatch {
                    content: Some("second".to_string()),
                    style: Some(StylePatch {
                        italic: Some(true),
                        date_color: Some("#123456".to_string()),
                        ..StylePatch::default()
                    }),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.timestamp, entry.timestamp);
        assert_eq!(updated.content, "second");
        assert!(updated.style.italic);
        assert_eq!(updated.style.date_color, "#123456");
        assert_eq!(updated.style.font_color, entry.style.font_color);
        assert_eq!(service.get(&entry.id).await, Some(updated));
    }

    #[tokio::test]
    async fn test_update_unknown_returns_none() {
        let (service, _store) = create_test_service().await;

        assert!(service.update("nope", EntryPatch::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (service, _store) = create_test_service().await;
        let keep = service.add("keep".to_string(), StylePatch::default()).await;
        let gone = service.add("gone".to_string(), StylePatch::default()).await;

        service.remove(&gone.id).await;
        service.remove(&gone.id).await;
        service.remove("never-existed").await;

        assert_eq!(service.list().await, vec![keep]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_and_removes_keep_every_change() {
        let (service, _store) = create_test_service().await;
        let doomed = service.add("doomed".to_string(), StylePatch::default()).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service.add(format!("entry {}", i), StylePatch::default()).await;
            }));
        }
        let remover = service.clone();
        let doomed_id = doomed.id.clone();
        tasks.push(tokio::spawn(async move { remover.remove(&doomed_id).await }));
        for task in tasks {
            task.await.unwrap();
        }

        let entries = service.list().await;
        assert_eq!(entries.len(), 8);
        assert!(entries.iter().all(|e| e.id != doomed.id));
        for i in 0..8 {
            let content = format!("entry {}", i);
            assert!(entries.iter().any(|e| e.content == content));
        }
    }

    #[tokio::test]
    async fn test_list_skips_malformed_and_repairs_legacy() {
        let (service, store) = create_test_service().await;

        store
            .write(
                ENTRIES_KEY,
                &json!([
                    {"id": "1-aaaaa", "timestamp": "2026-10-01T12:00:00Z", "content": "ok",
                     "style": {"themeKey": "florals2"}},
                    {"content": "no id"},
                    "garbage",
                    {"id": "2-bbbbb", "timestamp": "2026-10-02T12:00:00Z", "style": "broken"}
                ]),
            )
            .await;

        let entries = service.list().await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].style.image_src, "/images/florals2.png");
        assert_eq!(entries[0].style.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(entries[1].content, "");
        assert_eq!(entries[1].style.theme_key, DEFAULT_PAPER_KEY);
    }

    #[tokio::test]
    async fn test_query_filters_and_sorts() {
        let (service, _store) = create_test_service().await;
        let style = |key: &str| StylePatch {
            theme_key: Some(key.to_string()),
            ..StylePatch::default()
        };

        let a = service
            .add_at("Walked by the lake".to_string(), style("whimsical1"), local(2026, 10, 14, 9))
            .await;
        let b = service
            .add_at("Lake swim".to_string(), style("minimal1"), local(2026, 10, 15, 9))
            .await;
        let c = service
            .add_at("Quiet day".to_string(), style("whimsical2"), local(2026, 10, 15, 20))
            .await;

        let by_text = service
            .query(&EntryQuery {
                text: Some("LAKE".to_string()),
                ..EntryQuery::default()
            })
            .await;
        assert_eq!(by_text, vec![b.clone(), a.clone()]);

        let by_theme = service
            .query(&EntryQuery {
                theme_prefix: Some("whimsical".to_string()),
                sort: EntrySort::Oldest,
                ..EntryQuery::default()
            })
            .await;
        assert_eq!(by_theme, vec![a.clone(), c.clone()]);

        let by_day = service
            .query(&EntryQuery {
                day: NaiveDate::from_ymd_opt(2026, 10, 15),
                sort: EntrySort::ThemeZA,
                ..EntryQuery::default()
            })
            .await;
        assert_eq!(by_day, vec![c.clone(), b.clone()]);

        let az = EntryQuery {
            sort: EntrySort::ThemeAZ,
            ..EntryQuery::default()
        }
        .apply(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(az, vec![b, a, c]);
    }

    #[test]
    fn test_group_by_month() {
        let papers = PaperCatalog::default();
        let make = |ts: DateTime<Utc>| Entry {
            id: ts.timestamp_millis().to_string(),
            timestamp: ts,
            content: String::new(),
            style: EntryStyle::system_default(&papers),
        };
        let october = local(2026, 10, 3, 12);
        let entries = vec![
            make(local(2026, 9, 30, 12)),
            make(october),
            make(october + Duration::days(1)),
        ];

        let groups = group_by_month(&entries);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "October 2026");
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[1].label, "September 2026");
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("theme-az".parse::<EntrySort>(), Ok(EntrySort::ThemeAZ));
        assert_eq!("Oldest".parse::<EntrySort>(), Ok(EntrySort::Oldest));
        assert!("sideways".parse::<EntrySort>().is_err());
    }
}
