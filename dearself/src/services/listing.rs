//! Paged listings
//!
//! The past-entries and favorites views each remember their page size.

use crate::config::{
    DEFAULT_PAGE_SIZE, FAVORITES_PAGE_SIZE_KEY, PAGE_SIZE_OPTIONS, PAST_ENTRIES_PAGE_SIZE_KEY,
};
use crate::storage::LocalStore;
use serde::Serialize;

/// Views with a persisted page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    PastEntries,
    Favorites,
}

impl ListView {
    fn storage_key(self) -> &'static str {
        match self {
            ListView::PastEntries => PAST_ENTRIES_PAGE_SIZE_KEY,
            ListView::Favorites => FAVORITES_PAGE_SIZE_KEY,
        }
    }
}

fn is_allowed(size: usize) -> bool {
    PAGE_SIZE_OPTIONS.contains(&size)
}

/// Page size per view. Stored as a bare integer.
#[derive(Clone)]
pub struct PageSizes {
    store: LocalStore,
}

impl PageSizes {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Stored size, or the default when missing or not one of the options
    pub async fn get(&self, view: ListView) -> usize {
        self.store
            .read_raw(view.storage_key())
            .await
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|size| is_allowed(*size))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Store a size. Returns `false` and stores nothing for sizes outside
    /// the options.
    pub async fn set(&self, view: ListView, size: usize) -> bool {
        if !is_allowed(size) {
            tracing::debug!("Rejected page size {} for {:?}", size, view);
            return false;
        }
        self.store.write_raw(view.storage_key(), size.to_string()).await;
        true
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Cut out a page. Out-of-range page numbers clamp to the first or last page.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_size_defaults_and_validates() {
        let store = LocalStore::in_memory().await.unwrap();
        let sizes = PageSizes::new(store.clone());

        assert_eq!(sizes.get(ListView::PastEntries).await, DEFAULT_PAGE_SIZE);

        assert!(sizes.set(ListView::Favorites, 50).await);
        assert!(!sizes.set(ListView::Favorites, 13).await);
        assert_eq!(sizes.get(ListView::Favorites).await, 50);
        assert_eq!(sizes.get(ListView::PastEntries).await, DEFAULT_PAGE_SIZE);
        assert_eq!(store.read_raw(FAVORITES_PAGE_SIZE_KEY).await.as_deref(), Some("50"));

        store.write_raw(PAST_ENTRIES_PAGE_SIZE_KEY, "7".to_string()).await;
        assert_eq!(sizes.get(ListView::PastEntries).await, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=30).collect();

        let second = paginate(items.clone(), 2, 12);
        assert_eq!(second.items, (13..=24).collect::<Vec<_>>());
        assert_eq!(second.total_pages, 3);

        let clamped = paginate(items.clone(), 9, 12);
        assert_eq!(clamped.page, 3);
        assert_eq!(clamped.items.len(), 6);

        let empty = paginate(Vec::<u32>::new(), 0, 12);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
