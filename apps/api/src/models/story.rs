use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Story theme. The four built-in themes drive story composition and the
/// fallback illustration table; anything else is carried through as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Theme {
    Adventure,
    Safari,
    Friendship,
    Kindness,
    Custom(String),
}

impl Theme {
    /// Lowercase key used for fallback lookups and prompt text.
    pub fn key(&self) -> String {
        match self {
            Theme::Adventure => "adventure".to_string(),
            Theme::Safari => "safari".to_string(),
            Theme::Friendship => "friendship".to_string(),
            Theme::Kindness => "kindness".to_string(),
            Theme::Custom(s) => s.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Adventure => write!(f, "Adventure"),
            Theme::Safari => write!(f, "Safari"),
            Theme::Friendship => write!(f, "Friendship"),
            Theme::Kindness => write!(f, "Kindness"),
            Theme::Custom(s) => write!(f, "{}", s.trim()),
        }
    }
}

impl From<&str> for Theme {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "adventure" => Theme::Adventure,
            "safari" => Theme::Safari,
            "friendship" => Theme::Friendship,
            "kindness" => Theme::Kindness,
            _ => Theme::Custom(s.trim().to_string()),
        }
    }
}

impl FromStr for Theme {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Theme::from(s))
    }
}

impl Serialize for Theme {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Theme::from(raw.as_str()))
    }
}

/// A story joined with its owning child and profile.
///
/// `page_images` is sparse and positionally aligned with `paginate(content)`:
/// entry `i` belongs to the paragraph at index `i`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoryRow {
    pub id: Uuid,
    pub child_id: Uuid,
    pub profile_id: Uuid,
    pub child_name: String,
    pub theme: String,
    pub content: String,
    pub image_url: String,
    pub child_photo_url: Option<String>,
    pub page_images: Vec<Option<String>>,
    pub pdf_url: Option<String>,
    pub has_pdf: bool,
    pub created_at: DateTime<Utc>,
}

impl StoryRow {
    pub fn theme(&self) -> Theme {
        Theme::from(self.theme.as_str())
    }

    /// Title used on the cover and in the reader header.
    pub fn title(&self) -> String {
        format!("{}'s {} Adventure", self.child_name, self.theme())
    }

    /// The stored export reference, only when the record says it exists.
    pub fn confirmed_export(&self) -> Option<&str> {
        if self.has_pdf {
            self.pdf_url.as_deref()
        } else {
            None
        }
    }
}

/// Fields supplied when a new story row is inserted.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub child_id: Uuid,
    pub theme: Theme,
    pub content: String,
    pub image_url: String,
    pub child_photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChildRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub username: Option<String>,
}
