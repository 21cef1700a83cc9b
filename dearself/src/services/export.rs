//! Entry export
//!
//! Rendering an entry onto its paper happens outside this crate. This module
//! builds the request a renderer needs and writes whatever it produces.

use crate::config::{EXPORT_CANVAS_HEIGHT, EXPORT_CANVAS_WIDTH};
use crate::error::Result;
use crate::services::entries::{Entry, EntryStyle};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything a renderer needs to draw one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub content: String,
    pub style: EntryStyle,
    pub timestamp: DateTime<Utc>,
}

impl From<&Entry> for ExportRequest {
    fn from(entry: &Entry) -> Self {
        Self {
            content: entry.content.clone(),
            style: entry.style.clone(),
            timestamp: entry.timestamp,
        }
    }
}

impl ExportRequest {
    /// `dear-self-YYYY-MM-DD.png`, dated by the entry's local day
    pub fn file_name(&self) -> String {
        format!(
            "dear-self-{}.png",
            self.timestamp.with_timezone(&Local).format("%Y-%m-%d")
        )
    }
}

/// Draws an entry onto a canvas and returns encoded PNG bytes
pub trait EntryRenderer {
    fn render(&self, request: &ExportRequest, width: u32, height: u32) -> Result<Vec<u8>>;
}

/// Render an entry and write it into `dir`
pub fn export_entry(entry: &Entry, renderer: &impl EntryRenderer, dir: &Path) -> Result<PathBuf> {
    let request = ExportRequest::from(entry);
    let bytes = renderer.render(&request, EXPORT_CANVAS_WIDTH, EXPORT_CANVAS_HEIGHT)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(request.file_name());
    std::fs::write(&path, bytes)?;

    tracing::info!("Exported entry {} to {:?}", entry.id, path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::papers::PaperCatalog;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRenderer {
        seen: RefCell<Vec<(String, u32, u32)>>,
    }

    impl EntryRenderer for FakeRenderer {
        fn render(&self, request: &ExportRequest, width: u32, height: u32) -> Result<Vec<u8>> {
            self.seen
                .borrow_mut()
                .push((request.content.clone(), width, height));
            Ok(b"png".to_vec())
        }
    }

    struct BrokenRenderer;

    impl EntryRenderer for BrokenRenderer {
        fn render(&self, _: &ExportRequest, _: u32, _: u32) -> Result<Vec<u8>> {
            Err(AppError::Generic("no canvas".to_string()))
        }
    }

    fn entry() -> Entry {
        Entry {
            id: "1-abcde".to_string(),
            timestamp: Local
                .with_ymd_and_hms(2026, 10, 16, 21, 0, 0)
                .unwrap()
                .with_timezone(&Utc),
            content: "Tonight I rested.".to_string(),
            style: EntryStyle::system_default(&PaperCatalog::default()),
        }
    }

    #[test]
    fn test_export_writes_rendered_file() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = FakeRenderer::default();

        let path = export_entry(&entry(), &renderer, temp_dir.path()).unwrap();

        assert_eq!(path.file_name().unwrap(), "dear-self-2026-10-16.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
        assert_eq!(
            *renderer.seen.borrow(),
            vec![(
                "Tonight I rested.".to_string(),
                EXPORT_CANVAS_WIDTH,
                EXPORT_CANVAS_HEIGHT
            )]
        );
    }

    #[test]
    fn test_render_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();

        assert!(export_entry(&entry(), &BrokenRenderer, temp_dir.path()).is_err());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
