use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::info;

static BUILTIN_JSON: &str = include_str!("../data/catalog.json");

static BUILTIN: Lazy<Catalog> = Lazy::new(|| {
    Catalog::from_json(BUILTIN_JSON).expect("valid built-in catalog")
});

/// Color token used for entries whose category key is not recognized.
pub const DEFAULT_COLOR: &str = "var(--grey)";

/// One searchable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: String,
    pub text: String,
    pub category: String,
    pub category_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl MenuEntry {
    pub fn color(&self) -> &'static str {
        category_color(&self.category_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Typography,
    Photoprint,
    Souvenirs,
    Publishing,
    Engraving,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Typography,
        Category::Photoprint,
        Category::Souvenirs,
        Category::Publishing,
        Category::Engraving,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::Typography => "typography",
            Category::Photoprint => "photoprint",
            Category::Souvenirs => "souvenirs",
            Category::Publishing => "publishing",
            Category::Engraving => "engraving",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Category::Typography => "var(--blue)",
            Category::Photoprint => "var(--red)",
            Category::Souvenirs => "var(--orange)",
            Category::Publishing => "var(--green)",
            Category::Engraving => "var(--blue_2)",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Maps a category key to its display color, falling back to grey.
pub fn category_color(key: &str) -> &'static str {
    Category::from_key(key)
        .map(Category::color)
        .unwrap_or(DEFAULT_COLOR)
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Json(serde_json::Error),
    EmptyId { text: String },
    DuplicateId(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "io error: {err}"),
            CatalogError::Json(err) => write!(f, "invalid catalog json: {err}"),
            CatalogError::EmptyId { text } => write!(f, "entry {text:?} has an empty id"),
            CatalogError::DuplicateId(id) => write!(f, "duplicate entry id {id:?}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(err) => Some(err),
            CatalogError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(value: std::io::Error) -> Self {
        CatalogError::Io(value)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(value: serde_json::Error) -> Self {
        CatalogError::Json(value)
    }
}

/// Immutable, ordered collection of menu entries with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<MenuEntry>,
}

impl Catalog {
    /// Validates that every id is non-blank and unique.
    pub fn new(entries: Vec<MenuEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(CatalogError::EmptyId {
                    text: entry.text.clone(),
                });
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Parses a JSON array of entries and validates it.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<MenuEntry> = serde_json::from_str(json)?;
        let catalog = Self::new(entries)?;
        info!(entries = catalog.len(), "Loaded menu catalog");
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// All entries in menu order.
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one category, in menu order.
    pub fn by_category<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MenuEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.category_key == key)
    }

    /// Distinct `(key, display name)` pairs in first-seen order.
    pub fn categories(&self) -> Vec<(&str, &str)> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| seen.insert(entry.category_key.as_str()))
            .map(|entry| (entry.category_key.as_str(), entry.category.as_str()))
            .collect()
    }
}
