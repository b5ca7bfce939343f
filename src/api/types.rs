//! Wallpaper metadata types and search filters.
//!
//! The `*Record` types mirror the JSON shapes returned by the wallhaven API.
//! [`WallpaperDescriptor`] and [`CollectionInfo`] are the domain types handed
//! to the planner.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Content rating of a wallpaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purity {
    /// Safe for work.
    Sfw,
    /// Suggestive content.
    Sketchy,
    /// Not safe for work. Requires an API key upstream.
    Nsfw,
}

impl Purity {
    /// All purity levels in query-bitmask order.
    pub const ALL: [Self; 3] = [Self::Sfw, Self::Sketchy, Self::Nsfw];

    /// Lowercase label used by the API and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sfw => "sfw",
            Self::Sketchy => "sketchy",
            Self::Nsfw => "nsfw",
        }
    }
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sfw" => Ok(Self::Sfw),
            "sketchy" => Ok(Self::Sketchy),
            "nsfw" => Ok(Self::Nsfw),
            other => Err(format!(
                "unknown purity '{other}' (expected sfw, sketchy or nsfw)"
            )),
        }
    }
}

/// Subject-matter category of a wallpaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// General wallpapers.
    General,
    /// Anime and manga.
    Anime,
    /// People.
    People,
}

impl Category {
    /// All categories in query-bitmask order (general, anime, people).
    pub const ALL: [Self; 3] = [Self::General, Self::Anime, Self::People];

    /// Lowercase label used by the API and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Anime => "anime",
            Self::People => "people",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "anime" => Ok(Self::Anime),
            "people" => Ok(Self::People),
            other => Err(format!(
                "unknown category '{other}' (expected general, people or anime)"
            )),
        }
    }
}

/// Accepted purity and category sets.
///
/// An empty selection on either axis means "accept everything" on that axis,
/// matching the CLI behaviour when `--purity`/`--category` are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    purity: BTreeSet<Purity>,
    categories: BTreeSet<Category>,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            purity: Purity::ALL.into_iter().collect(),
            categories: Category::ALL.into_iter().collect(),
        }
    }
}

impl SearchFilter {
    /// Builds a filter from explicit selections. Empty iterators select everything.
    #[must_use]
    pub fn new(
        purity: impl IntoIterator<Item = Purity>,
        categories: impl IntoIterator<Item = Category>,
    ) -> Self {
        let mut filter = Self::default();
        let purity: BTreeSet<Purity> = purity.into_iter().collect();
        let categories: BTreeSet<Category> = categories.into_iter().collect();
        if !purity.is_empty() {
            filter.purity = purity;
        }
        if !categories.is_empty() {
            filter.categories = categories;
        }
        filter
    }

    /// Returns true if the purity level is accepted.
    #[must_use]
    pub fn accepts_purity(&self, purity: Purity) -> bool {
        self.purity.contains(&purity)
    }

    /// Returns true if the category is accepted.
    #[must_use]
    pub fn accepts_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Returns true if the descriptor passes both axes.
    #[must_use]
    pub fn accepts(&self, wallpaper: &WallpaperDescriptor) -> bool {
        self.accepts_purity(wallpaper.purity) && self.accepts_category(wallpaper.category)
    }

    /// Whether the filter needs an API key upstream (NSFW content).
    #[must_use]
    pub fn requires_api_key(&self) -> bool {
        self.accepts_purity(Purity::Nsfw)
    }

    /// Purity bitmask query value, e.g. `"110"` for sfw + sketchy.
    #[must_use]
    pub fn purity_param(&self) -> String {
        Purity::ALL
            .iter()
            .map(|p| if self.accepts_purity(*p) { '1' } else { '0' })
            .collect()
    }

    /// Categories bitmask query value, e.g. `"101"` for general + people.
    #[must_use]
    pub fn categories_param(&self) -> String {
        Category::ALL
            .iter()
            .map(|c| if self.accepts_category(*c) { '1' } else { '0' })
            .collect()
    }
}

/// A named collection owned by a wallhaven user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionInfo {
    /// Numeric collection id.
    pub id: u64,
    /// Display name chosen by the owner.
    pub label: String,
    /// View counter.
    #[serde(default)]
    pub views: u64,
    /// Number of wallpapers in the collection.
    #[serde(default)]
    pub count: u64,
}

/// Immutable description of one wallpaper to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperDescriptor {
    /// Wallhaven id, e.g. `94x38z`.
    pub id: String,
    /// Full-resolution image URL. Empty when upstream did not include one;
    /// the sink resolves it through the detail endpoint in that case.
    pub source_url: String,
    /// Content rating.
    pub purity: Purity,
    /// Subject-matter category.
    pub category: Category,
    /// Collection the wallpaper was listed under (`None` for uploads).
    pub collection_name: Option<String>,
    /// MIME type reported upstream, used to pick a file extension.
    pub file_type: Option<String>,
}

impl WallpaperDescriptor {
    pub(crate) fn from_record(record: WallpaperRecord, collection_name: Option<&str>) -> Self {
        Self {
            id: record.id,
            source_url: record.path,
            purity: record.purity,
            category: record.category,
            collection_name: collection_name.map(str::to_string),
            file_type: record.file_type,
        }
    }
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct PageMeta {
    #[serde(default = "first_page")]
    pub last_page: u32,
}

fn first_page() -> u32 {
    1
}

/// Generic `{ "data": [...], "meta": {...} }` list envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

/// Generic `{ "data": {...} }` detail envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct DetailResponse<T> {
    pub data: T,
}

/// A wallpaper as it appears in search, collection and detail responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WallpaperRecord {
    pub id: String,
    #[serde(default)]
    pub path: String,
    pub purity: Purity,
    pub category: Category,
    #[serde(default)]
    pub file_type: Option<String>,
}
