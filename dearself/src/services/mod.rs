//! Services module
//!
//! Business logic on top of the local store.

pub mod affirmations;
pub mod entries;
pub mod export;
pub mod favorites;
pub mod listing;
pub mod papers;
pub mod preferences;
pub mod streak;
pub mod undo;
pub mod usage;

pub use affirmations::{Affirmation, AffirmationPool, AffirmationService};
pub use entries::{EntriesService, Entry, EntryPatch, EntryQuery, EntrySort, EntryStyle, StylePatch};
pub use favorites::{Favorite, FavoriteInput, FavoriteQuery, FavoriteSort, FavoritesService};
pub use listing::{paginate, ListView, Page, PageSizes};
pub use papers::PaperCatalog;
pub use preferences::{Preferences, PreferencesService};
pub use undo::{DeletionTarget, UndoDeleteController};
pub use usage::{UsageNotifier, UsageTracker};
