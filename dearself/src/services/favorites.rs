//! Favorites service
//!
//! Favorited affirmations, at most one per identity key. The identity key
//! is the item's id, or `<date>-<text>` for items without one.

use crate::config::{DEFAULT_CATEGORY, FAVORITES_KEY};
use crate::services::affirmations::{ymd, Affirmation};
use crate::storage::LocalStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A saved affirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub text: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub added_at: DateTime<Utc>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Favorite {
    pub fn key(&self) -> String {
        composite_key(Some(self.id.as_str()), self.date.as_deref(), &self.text)
    }
}

/// Something that can be favorited. Accepts both the current field names
/// and the older `affirmation`/`theme` spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FavoriteInput {
    pub id: Option<String>,
    pub date: Option<String>,
    pub text: Option<String>,
    pub affirmation: Option<String>,
    pub challenge: Option<String>,
    pub category: Option<String>,
    pub theme: Option<String>,
}

impl FavoriteInput {
    pub fn text(&self) -> &str {
        self.text
            .as_deref()
            .or(self.affirmation.as_deref())
            .unwrap_or_default()
    }

    pub fn category(&self) -> &str {
        self.category
            .as_deref()
            .or(self.theme.as_deref())
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn key(&self) -> String {
        composite_key(self.id.as_deref(), self.date.as_deref(), self.text())
    }

    fn into_favorite(self, added_at: DateTime<Utc>) -> Favorite {
        Favorite {
            id: self.key(),
            date: self.date.clone(),
            text: self.text().to_string(),
            challenge: self.challenge.clone().unwrap_or_default(),
            category: self.category().to_string(),
            added_at,
        }
    }
}

impl From<&Affirmation> for FavoriteInput {
    fn from(card: &Affirmation) -> Self {
        Self {
            id: Some(card.id.clone()),
            date: Some(ymd(card.date)),
            text: Some(card.text.clone()),
            challenge: Some(card.challenge.clone()),
            category: Some(card.category.clone()),
            ..Self::default()
        }
    }
}

/// A favorite as found in storage. Older records use `affirmation`, `theme`
/// and `addedIso`; a record without any text is unusable.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFavorite {
    #[serde(flatten)]
    item: FavoriteInput,
    #[serde(default)]
    added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    added_iso: Option<DateTime<Utc>>,
}

impl StoredFavorite {
    fn repair(self) -> Option<Favorite> {
        if self.item.text.is_none() && self.item.affirmation.is_none() {
            return None;
        }
        let added_at = self.added_at.or(self.added_iso).unwrap_or_default();
        Some(self.item.into_favorite(added_at))
    }
}

fn composite_key(id: Option<&str>, date: Option<&str>, text: &str) -> String {
    match id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id.to_string(),
        None => format!("{}-{}", date.unwrap_or_default(), text),
    }
}

/// What to remove: a key or the item itself
#[derive(Debug, Clone)]
pub enum FavoriteTarget {
    Key(String),
    Item(FavoriteInput),
}

impl FavoriteTarget {
    fn key(&self) -> String {
        match self {
            FavoriteTarget::Key(key) => key.clone(),
            FavoriteTarget::Item(item) => item.key(),
        }
    }
}

impl From<&str> for FavoriteTarget {
    fn from(key: &str) -> Self {
        FavoriteTarget::Key(key.to_string())
    }
}

impl From<FavoriteInput> for FavoriteTarget {
    fn from(item: FavoriteInput) -> Self {
        FavoriteTarget::Item(item)
    }
}

/// Service for managing favorites
#[derive(Clone)]
pub struct FavoritesService {
    store: LocalStore,
}

impl FavoritesService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Favorites, most recently added first
    ///
    /// Records that cannot be read are skipped; the rest are still listed.
    pub async fn list(&self) -> Vec<Favorite> {
        let raw: Vec<Value> = self.store.read(FAVORITES_KEY, Vec::new()).await;

        raw.into_iter()
            .filter_map(|record| match serde_json::from_value::<StoredFavorite>(record) {
                Ok(stored) => stored.repair().or_else(|| {
                    tracing::warn!("Skipping favorite without text");
                    None
                }),
                Err(e) => {
                    tracing::warn!("Skipping malformed favorite: {}", e);
                    None
                }
            })
            .collect()
    }

    pub async fn get(&self, key: &str) -> Option<Favorite> {
        self.list().await.into_iter().find(|f| f.key() == key)
    }

    pub async fn is_favorite(&self, item: &FavoriteInput) -> bool {
        let key = item.key();
        self.list().await.iter().any(|f| f.key() == key)
    }

    /// Remove the item if it is a favorite, add it otherwise
    pub async fn toggle(&self, item: FavoriteInput) -> Vec<Favorite> {
        let _guard = self.store.lock_key(FAVORITES_KEY).await;
        let mut favorites = self.list().await;
        let key = item.key();

        match favorites.iter().position(|f| f.key() == key) {
            Some(index) => {
                favorites.remove(index);
                tracing::info!("Favorite removed: {}", key);
            }
            None => {
                favorites.insert(0, item.into_favorite(Utc::now()));
                tracing::info!("Favorite added: {}", key);
            }
        }

        self.store.write(FAVORITES_KEY, &favorites).await;
        favorites
    }

    /// Remove by key or item. Unknown keys change nothing.
    pub async fn remove(&self, target: impl Into<FavoriteTarget>) -> Vec<Favorite> {
        let key = target.into().key();
        let _guard = self.store.lock_key(FAVORITES_KEY).await;
        let mut favorites = self.list().await;
        let before = favorites.len();
        favorites.retain(|f| f.key() != key);

        if favorites.len() != before {
            self.store.write(FAVORITES_KEY, &favorites).await;
            tracing::info!("Favorite removed: {}", key);
        }

        favorites
    }

    /// Distinct categories, sorted, for filter menus
    pub async fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.list().await.into_iter().map(|f| f.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub async fn query(&self, query: &FavoriteQuery) -> Vec<Favorite> {
        query.apply(self.list().await)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FavoriteSort {
    #[default]
    Newest,
    Oldest,
    CategoryAZ,
    CategoryZA,
}

impl std::str::FromStr for FavoriteSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "category-az" | "categoryaz" => Ok(Self::CategoryAZ),
            "category-za" | "categoryza" => Ok(Self::CategoryZA),
            other => Err(format!("Unknown sort '{}'", other)),
        }
    }
}

/// Filter and ordering for the favorites view
#[derive(Debug, Clone, Default)]
pub struct FavoriteQuery {
    /// Exact category, case-insensitive
    pub category: Option<String>,
    pub sort: FavoriteSort,
}

impl FavoriteQuery {
    pub fn apply(&self, favorites: Vec<Favorite>) -> Vec<Favorite> {
        let mut matched: Vec<Favorite> = favorites
            .into_iter()
            .filter(|f| {
                self.category
                    .as_deref()
                    .map_or(true, |c| f.category.eq_ignore_ascii_case(c.trim()))
            })
            .collect();

        match self.sort {
            FavoriteSort::Newest => matched.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
            FavoriteSort::Oldest => matched.sort_by(|a, b| a.added_at.cmp(&b.added_at)),
            FavoriteSort::CategoryAZ => matched.sort_by(|a, b| {
                a.category
                    .cmp(&b.category)
                    .then(b.added_at.cmp(&a.added_at))
            }),
            FavoriteSort::CategoryZA => matched.sort_by(|a, b| {
                b.category
                    .cmp(&a.category)
                    .then(b.added_at.cmp(&a.added_at))
            }),
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    async fn create_test_service() -> (FavoritesService, LocalStore) {
        let store = LocalStore::in_memory().await.unwrap();
        (FavoritesService::new(store.clone()), store)
    }

    fn card() -> Affirmation {
        Affirmation {
            id: "day-2026-10-16".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            text: "I am enough.".to_string(),
            challenge: "Say it twice.".to_string(),
            category: "Self-Compassion".to_string(),
        }
    }

    fn legacy(text: &str) -> FavoriteInput {
        FavoriteInput {
            date: Some("2026-10-01".to_string()),
            affirmation: Some(text.to_string()),
            theme: Some("Calm".to_string()),
            ..FavoriteInput::default()
        }
    }

    #[test]
    fn test_identity_key() {
        assert_eq!(FavoriteInput::from(&card()).key(), "day-2026-10-16");
        assert_eq!(legacy("Breathe").key(), "2026-10-01-Breathe");
        assert_eq!(
            FavoriteInput {
                text: Some("x".to_string()),
                ..FavoriteInput::default()
            }
            .category(),
            DEFAULT_CATEGORY
        );
    }

    #[tokio::test]
    async fn test_toggle_is_involution() {
        let (service, _store) = create_test_service().await;
        let item = FavoriteInput::from(&card());

        let added = service.toggle(item.clone()).await;
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].text, "I am enough.");
        assert!(service.is_favorite(&item).await);

        let removed = service.toggle(item.clone()).await;
        assert!(removed.is_empty());
        assert!(!service.is_favorite(&item).await);
    }

    #[tokio::test]
    async fn test_legacy_fields_normalized() {
        let (service, _store) = create_test_service().await;

        let favorites = service.toggle(legacy("Breathe")).await;

        assert_eq!(favorites[0].text, "Breathe");
        assert_eq!(favorites[0].category, "Calm");
        assert_eq!(favorites[0].id, "2026-10-01-Breathe");
    }

    #[tokio::test]
    async fn test_remove_by_key_or_item_is_idempotent() {
        let (service, _store) = create_test_service().await;
        service.toggle(FavoriteInput::from(&card())).await;
        service.toggle(legacy("Breathe")).await;

        let after_key = service.remove("day-2026-10-16").await;
        assert_eq!(after_key.len(), 1);

        let after_item = service.remove(legacy("Breathe")).await;
        assert!(after_item.is_empty());

        assert!(service.remove("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_stored_records_without_id_use_composite_key() {
        let (service, store) = create_test_service().await;
        store
            .write(
                FAVORITES_KEY,
                &json!([{"date": "2026-09-09", "text": "Old one", "addedAt": "2026-09-09T10:00:00Z"}]),
            )
            .await;

        let favorites = service.list().await;
        assert_eq!(favorites[0].category, DEFAULT_CATEGORY);
        assert!(service.get("2026-09-09-Old one").await.is_some());

        assert!(service.remove("2026-09-09-Old one").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_record_does_not_hide_the_rest() {
        let (service, store) = create_test_service().await;
        store
            .write(
                FAVORITES_KEY,
                &json!([
                    {"id": "a", "text": "Kept one", "addedAt": "2026-10-01T08:00:00Z"},
                    {"id": "b", "text": "Legacy", "addedIso": "2026-09-01T08:00:00Z"},
                    {"id": "broken", "addedAt": "2026-08-01T08:00:00Z"},
                    "not a record"
                ]),
            )
            .await;

        let listed = service.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].added_at.to_rfc3339(), "2026-09-01T08:00:00+00:00");

        let after = service
            .toggle(FavoriteInput {
                id: Some("c".to_string()),
                text: Some("New one".to_string()),
                ..FavoriteInput::default()
            })
            .await;
        let texts: Vec<&str> = after.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["New one", "Kept one", "Legacy"]);
        assert_eq!(service.list().await, after);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_keep_every_favorite() {
        let (service, _store) = create_test_service().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .toggle(FavoriteInput {
                            id: Some(format!("fav-{}", i)),
                            text: Some(format!("Favorite {}", i)),
                            ..FavoriteInput::default()
                        })
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut keys: Vec<String> = service.list().await.iter().map(Favorite::key).collect();
        keys.sort();
        assert_eq!(keys, (0..8).map(|i| format!("fav-{}", i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_query_filter_and_sort() {
        let base = Utc::now();
        let fav = |text: &str, category: &str, age: i64| Favorite {
            id: text.to_string(),
            date: None,
            text: text.to_string(),
            challenge: String::new(),
            category: category.to_string(),
            added_at: base - Duration::minutes(age),
        };
        let favorites = vec![fav("a", "Joy", 3), fav("b", "Calm", 2), fav("c", "Joy", 1)];

        let joy = FavoriteQuery {
            category: Some("joy".to_string()),
            sort: FavoriteSort::Oldest,
        }
        .apply(favorites.clone());
        assert_eq!(joy.iter().map(|f| f.text.as_str()).collect::<Vec<_>>(), ["a", "c"]);

        let by_category = FavoriteQuery {
            category: None,
            sort: FavoriteSort::CategoryAZ,
        }
        .apply(favorites);
        assert_eq!(
            by_category.iter().map(|f| f.text.as_str()).collect::<Vec<_>>(),
            ["b", "c", "a"]
        );
    }

    #[tokio::test]
    async fn test_categories_distinct_sorted() {
        let (service, _store) = create_test_service().await;
        service.toggle(legacy("one")).await;
        service.toggle(legacy("two")).await;
        service.toggle(FavoriteInput::from(&card())).await;

        assert_eq!(service.categories().await, vec!["Calm", "Self-Compassion"]);
    }
}
