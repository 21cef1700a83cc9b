//! Optimistic delete with an undo window
//!
//! A delete request hides the item right away and commits it when the
//! window elapses. Until then the deletion can be cancelled. One controller
//! guards one list and holds at most one pending deletion: requesting a
//! different item commits the outstanding one first.

use crate::services::entries::{EntriesService, Entry};
use crate::services::favorites::{Favorite, FavoritesService};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A list whose items can be deleted through the controller
pub trait DeletionTarget: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Current value of an item, or `None` when it does not exist
    fn snapshot(&self, id: &str) -> impl Future<Output = Option<Self::Item>> + Send;

    /// Remove the item for good
    fn commit(&self, id: &str) -> impl Future<Output = ()> + Send;
}

impl DeletionTarget for EntriesService {
    type Item = Entry;

    async fn snapshot(&self, id: &str) -> Option<Entry> {
        self.get(id).await
    }

    async fn commit(&self, id: &str) {
        self.remove(id).await;
    }
}

impl DeletionTarget for FavoritesService {
    type Item = Favorite;

    async fn snapshot(&self, key: &str) -> Option<Favorite> {
        self.get(key).await
    }

    async fn commit(&self, key: &str) {
        self.remove(key).await;
    }
}

/// A deletion waiting for its window to elapse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion<T> {
    pub id: String,
    pub snapshot: T,
    pub deadline: Instant,
}

enum UndoState<T> {
    Idle,
    Pending {
        deletion: PendingDeletion<T>,
        generation: u64,
        timer: JoinHandle<()>,
    },
}

struct Inner<D: DeletionTarget> {
    target: D,
    window: Duration,
    state: Mutex<UndoState<D::Item>>,
    generation: AtomicU64,
}

impl<D: DeletionTarget> Inner<D> {
    /// Timer expiry. Stale timers find a newer generation and do nothing.
    async fn fire(&self, generation: u64) {
        let mut state = self.state.lock().await;

        let current = match &*state {
            UndoState::Pending { generation: g, .. } => *g == generation,
            UndoState::Idle => false,
        };
        if !current {
            return;
        }

        if let UndoState::Pending { deletion, .. } = std::mem::replace(&mut *state, UndoState::Idle) {
            tracing::info!("Undo window elapsed, deleting {}", deletion.id);
            self.target.commit(&deletion.id).await;
        }
    }
}

impl<D: DeletionTarget> Drop for Inner<D> {
    fn drop(&mut self) {
        if let UndoState::Pending { timer, deletion, .. } = self.state.get_mut() {
            tracing::debug!("Dropping pending deletion of {}", deletion.id);
            timer.abort();
        }
    }
}

/// Undo-delete state machine for one list
pub struct UndoDeleteController<D: DeletionTarget> {
    inner: Arc<Inner<D>>,
}

impl<D: DeletionTarget> UndoDeleteController<D> {
    pub fn new(target: D, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                target,
                window,
                state: Mutex::new(UndoState::Idle),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Start the undo window for `id`.
    ///
    /// Returns the pending deletion, or `None` when the item does not exist.
    /// Requesting the id that is already pending leaves its deadline alone.
    pub async fn request_delete(&self, id: &str) -> Option<PendingDeletion<D::Item>> {
        let mut state = self.inner.state.lock().await;

        if let UndoState::Pending { deletion, .. } = &*state {
            if deletion.id == id {
                return Some(deletion.clone());
            }
        }

        if let UndoState::Pending { deletion, timer, .. } = std::mem::replace(&mut *state, UndoState::Idle) {
            timer.abort();
            tracing::debug!("Committing {} before deleting {}", deletion.id, id);
            self.inner.target.commit(&deletion.id).await;
        }

        let snapshot = self.inner.target.snapshot(id).await?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + self.inner.window;

        let weak: Weak<Inner<D>> = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation).await;
            }
        });

        let deletion = PendingDeletion {
            id: id.to_string(),
            snapshot,
            deadline,
        };
        tracing::info!("Deletion of {} pending for {:?}", id, self.inner.window);

        *state = UndoState::Pending {
            deletion: deletion.clone(),
            generation,
            timer,
        };
        Some(deletion)
    }

    /// Undo the pending deletion. Returns the item that was kept.
    pub async fn cancel(&self) -> Option<D::Item> {
        let mut state = self.inner.state.lock().await;

        match std::mem::replace(&mut *state, UndoState::Idle) {
            UndoState::Pending { deletion, timer, .. } => {
                timer.abort();
                tracing::info!("Deletion of {} undone", deletion.id);
                Some(deletion.snapshot)
            }
            UndoState::Idle => None,
        }
    }

    /// Commit the pending deletion now. Returns the committed id.
    pub async fn flush(&self) -> Option<String> {
        let mut state = self.inner.state.lock().await;

        match std::mem::replace(&mut *state, UndoState::Idle) {
            UndoState::Pending { deletion, timer, .. } => {
                timer.abort();
                self.inner.target.commit(&deletion.id).await;
                Some(deletion.id)
            }
            UndoState::Idle => None,
        }
    }

    pub async fn pending(&self) -> Option<PendingDeletion<D::Item>> {
        match &*self.inner.state.lock().await {
            UndoState::Pending { deletion, .. } => Some(deletion.clone()),
            UndoState::Idle => None,
        }
    }

    /// Drop the pending item from a listing
    pub async fn hide_pending<T>(&self, items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
        let Some(pending) = self.pending().await else {
            return items;
        };
        items.into_iter().filter(|item| key(item) != pending.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::affirmations::Affirmation;
    use crate::services::entries::StylePatch;
    use crate::services::favorites::FavoriteInput;
    use crate::services::papers::PaperCatalog;
    use crate::services::preferences::PreferencesService;
    use crate::storage::LocalStore;
    use chrono::NaiveDate;

    const WINDOW: Duration = Duration::from_millis(60);

    async fn create_entries() -> EntriesService {
        let store = LocalStore::in_memory().await.unwrap();
        EntriesService::new(
            store.clone(),
            PreferencesService::new(store),
            PaperCatalog::default(),
        )
    }

    async fn elapse() {
        tokio::time::sleep(WINDOW * 4).await;
    }

    #[tokio::test]
    async fn test_elapsed_window_commits() {
        let entries = create_entries().await;
        let entry = entries.add("bye".to_string(), StylePatch::default()).await;
        let controller = UndoDeleteController::new(entries.clone(), WINDOW);

        let pending = controller.request_delete(&entry.id).await.unwrap();
        assert_eq!(pending.snapshot, entry);
        assert!(entries.get(&entry.id).await.is_some());

        elapse().await;

        assert!(entries.get(&entry.id).await.is_none());
        assert!(controller.pending().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_keeps_item() {
        let entries = create_entries().await;
        let entry = entries.add("stay".to_string(), StylePatch::default()).await;
        let controller = UndoDeleteController::new(entries.clone(), WINDOW);

        controller.request_delete(&entry.id).await;
        let kept = controller.cancel().await;
        elapse().await;

        assert_eq!(kept, Some(entry.clone()));
        assert_eq!(entries.list().await, vec![entry]);
        assert!(controller.cancel().await.is_none());
    }

    #[tokio::test]
    async fn test_new_request_commits_previous() {
        let entries = create_entries().await;
        let first = entries.add("one".to_string(), StylePatch::default()).await;
        let second = entries.add("two".to_string(), StylePatch::default()).await;
        let controller = UndoDeleteController::new(entries.clone(), Duration::from_secs(30));

        controller.request_delete(&first.id).await;
        controller.request_delete(&second.id).await;

        assert!(entries.get(&first.id).await.is_none());
        assert!(entries.get(&second.id).await.is_some());
        assert_eq!(controller.pending().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_repeat_request_keeps_deadline() {
        let entries = create_entries().await;
        let entry = entries.add("again".to_string(), StylePatch::default()).await;
        let controller = UndoDeleteController::new(entries.clone(), Duration::from_secs(30));

        let first = controller.request_delete(&entry.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = controller.request_delete(&entry.id).await.unwrap();

        assert_eq!(first.deadline, second.deadline);
        assert!(entries.get(&entry.id).await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_id_stays_idle() {
        let entries = create_entries().await;
        let controller = UndoDeleteController::new(entries, WINDOW);

        assert!(controller.request_delete("missing").await.is_none());
        assert!(controller.pending().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_commits_immediately() {
        let entries = create_entries().await;
        let entry = entries.add("now".to_string(), StylePatch::default()).await;
        let controller = UndoDeleteController::new(entries.clone(), Duration::from_secs(30));

        controller.request_delete(&entry.id).await;
        assert_eq!(controller.flush().await, Some(entry.id.clone()));

        assert!(entries.list().await.is_empty());
        assert!(controller.flush().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_timer() {
        let entries = create_entries().await;
        let entry = entries.add("kept".to_string(), StylePatch::default()).await;

        let controller = UndoDeleteController::new(entries.clone(), WINDOW);
        controller.request_delete(&entry.id).await;
        drop(controller);
        elapse().await;

        assert!(entries.get(&entry.id).await.is_some());
    }

    #[tokio::test]
    async fn test_hide_pending_and_favorites_target() {
        let store = LocalStore::in_memory().await.unwrap();
        let favorites = FavoritesService::new(store);
        let card = Affirmation {
            id: "day-2026-10-16".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            text: "I am enough.".to_string(),
            challenge: "Rest.".to_string(),
            category: "Calm".to_string(),
        };
        favorites.toggle(FavoriteInput::from(&card)).await;
        let controller = UndoDeleteController::new(favorites.clone(), WINDOW);

        controller.request_delete(&card.id).await.unwrap();
        let visible = controller
            .hide_pending(favorites.list().await, Favorite::key)
            .await;
        assert!(visible.is_empty());
        assert_eq!(favorites.list().await.len(), 1);

        elapse().await;
        assert!(favorites.list().await.is_empty());
    }
}
