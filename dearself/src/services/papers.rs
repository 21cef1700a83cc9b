//! Paper catalog
//!
//! Journal papers are background images grouped into themes. A paper key
//! such as `whimsical3` resolves to `<base>/whimsical3.png`; keys that are not
//! registered resolve with the same rule so older entries keep their image.

use crate::config::{DEFAULT_IMAGE_BASE, DEFAULT_PAPER_KEY};
use serde::Serialize;

/// One selectable paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub key: String,
    pub label: String,
    pub file: String,
}

/// A themed group of papers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperGroup {
    pub key: String,
    pub label: String,
    pub items: Vec<Paper>,
}

fn numbered(prefix: &str, label: &str, from: u32, to: u32) -> Vec<Paper> {
    (from..=to)
        .map(|n| Paper {
            key: format!("{}{}", prefix, n),
            label: format!("{} {}", label, n),
            file: format!("{}{}.png", prefix, n),
        })
        .collect()
}

/// Resolves paper keys to image paths
#[derive(Debug, Clone)]
pub struct PaperCatalog {
    base: String,
    groups: Vec<PaperGroup>,
}

impl Default for PaperCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_BASE)
    }
}

impl PaperCatalog {
    /// Built-in catalog served from `base`
    pub fn new(base: &str) -> Self {
        let groups = vec![
            PaperGroup {
                key: "minimal".to_string(),
                label: "Minimalist & Professional".to_string(),
                items: numbered("minimal", "Minimal", 1, 6),
            },
            PaperGroup {
                key: "whimsical".to_string(),
                label: "Whimsical".to_string(),
                items: numbered("whimsical", "Whimsical", 1, 10),
            },
            PaperGroup {
                key: "soft".to_string(),
                label: "Soft & Elegant".to_string(),
                items: [
                    numbered("coquette", "Coquette", 1, 8),
                    numbered("florals", "Florals", 1, 5),
                    numbered("romantic", "Romantic", 1, 6),
                ]
                .concat(),
            },
        ];

        Self {
            base: base.trim_end_matches('/').to_string(),
            groups,
        }
    }

    pub fn groups(&self) -> &[PaperGroup] {
        &self.groups
    }

    pub fn find(&self, key: &str) -> Option<&Paper> {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter())
            .find(|p| p.key == key)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Image path for a paper key
    pub fn resolve(&self, key: &str) -> String {
        let key = key.trim();
        let key = if key.is_empty() { DEFAULT_PAPER_KEY } else { key };

        let file = match self.find(key) {
            Some(paper) => paper.file.clone(),
            None if key.ends_with(".png") => key.to_string(),
            None => format!("{}.png", key),
        };

        format!("{}/{}", self.base, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_groups() {
        let catalog = PaperCatalog::default();

        let sizes: Vec<usize> = catalog.groups().iter().map(|g| g.items.len()).collect();
        assert_eq!(sizes, vec![6, 10, 19]);
        assert!(catalog.is_registered(DEFAULT_PAPER_KEY));
        assert!(catalog.is_registered("florals5"));
        assert!(!catalog.is_registered("florals6"));
    }

    #[test]
    fn test_resolve_registered_and_fallback() {
        let catalog = PaperCatalog::new("/static/images/");

        assert_eq!(catalog.resolve("whimsical1"), "/static/images/whimsical1.png");
        assert_eq!(catalog.resolve("sunset9"), "/static/images/sunset9.png");
        assert_eq!(catalog.resolve("sunset9.png"), "/static/images/sunset9.png");
        assert_eq!(catalog.resolve("  "), "/static/images/romantic2.png");
    }
}
