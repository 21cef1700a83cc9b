//! Application state and initialization
//!
//! AppState owns the store handle and every service. It is built once at
//! start-up and cloned into whatever needs it.

use crate::database::{create_memory_pool, create_pool, Repository};
use crate::error::Result;
use crate::services::affirmations::{AffirmationPool, AffirmationService};
use crate::services::entries::EntriesService;
use crate::services::favorites::FavoritesService;
use crate::services::listing::PageSizes;
use crate::services::papers::PaperCatalog;
use crate::services::preferences::PreferencesService;
use crate::services::streak;
use crate::services::undo::UndoDeleteController;
use crate::services::usage::{UsageNotifier, UsageTracker};
use crate::storage::LocalStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DATABASE_FILE: &str = "dearself.db";

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    /// `None` when running on an in-memory store
    pub app_data_dir: Option<PathBuf>,
    pub store: LocalStore,
    pub papers: PaperCatalog,
    pub preferences: PreferencesService,
    pub affirmations: AffirmationService,
    pub entries: EntriesService,
    pub favorites: FavoritesService,
    pub page_sizes: PageSizes,
}

impl AppState {
    /// Open the store under `app_data_dir`.
    ///
    /// When the database cannot be opened the session continues on an
    /// in-memory store and nothing persists.
    pub async fn initialize(
        app_data_dir: &Path,
        pool: AffirmationPool,
        notifier: Arc<dyn UsageNotifier>,
    ) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        std::fs::create_dir_all(app_data_dir)?;

        let db_pool = match create_pool(&app_data_dir.join(DATABASE_FILE)).await {
            Ok(db_pool) => db_pool,
            Err(e) => {
                tracing::warn!("Local storage unavailable, changes will not persist: {}", e);
                create_memory_pool().await?
            }
        };

        let store = LocalStore::new(Repository::new(db_pool));
        let state = Self::with_store(store, pool, notifier, Some(app_data_dir.to_path_buf()));

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// State on a private in-memory store
    pub async fn in_memory(pool: AffirmationPool, notifier: Arc<dyn UsageNotifier>) -> Result<Self> {
        Ok(Self::with_store(LocalStore::in_memory().await?, pool, notifier, None))
    }

    fn with_store(
        store: LocalStore,
        pool: AffirmationPool,
        notifier: Arc<dyn UsageNotifier>,
        app_data_dir: Option<PathBuf>,
    ) -> Self {
        let papers = PaperCatalog::default();
        let preferences = PreferencesService::new(store.clone());
        let usage = UsageTracker::new(store.clone(), notifier);

        Self {
            app_data_dir,
            affirmations: AffirmationService::new(store.clone(), pool, usage),
            entries: EntriesService::new(store.clone(), preferences.clone(), papers.clone()),
            favorites: FavoritesService::new(store.clone()),
            page_sizes: PageSizes::new(store.clone()),
            preferences,
            papers,
            store,
        }
    }

    /// Undo controller for the entries list, using the preferred window
    pub async fn entry_undo(&self) -> UndoDeleteController<EntriesService> {
        UndoDeleteController::new(self.entries.clone(), self.preferences.undo_window().await)
    }

    /// Undo controller for the favorites list, using the preferred window
    pub async fn favorite_undo(&self) -> UndoDeleteController<FavoritesService> {
        UndoDeleteController::new(self.favorites.clone(), self.preferences.undo_window().await)
    }

    /// Current writing streak
    pub async fn streak(&self) -> u32 {
        streak::current_streak(&self.entries.list().await)
    }
}
