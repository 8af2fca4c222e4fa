use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BlogError;

pub const DEFAULT_THUMBNAIL: &str = "/static/placeholder.svg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "인사이트")]
    Insight,
    #[serde(rename = "회고")]
    Retrospective,
    #[serde(rename = "트러블 슈팅")]
    Troubleshooting,
    #[serde(rename = "독서")]
    Reading,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Insight,
        Category::Retrospective,
        Category::Troubleshooting,
        Category::Reading,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Insight => "인사이트",
            Self::Retrospective => "회고",
            Self::Troubleshooting => "트러블 슈팅",
            Self::Reading => "독서",
        }
    }

    /// Badge classes shown next to the category label.
    pub fn badge_class(self) -> &'static str {
        match self {
            Self::Insight => "bg-blue-100 text-blue-800",
            Self::Retrospective => "bg-green-100 text-green-800",
            Self::Troubleshooting => "bg-red-100 text-red-800",
            Self::Reading => "bg-purple-100 text-purple-800",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A blog post, either bundled with the site content or written through the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Category,
    pub thumbnail: String,
    pub published_at: NaiveDate,
    pub read_time: String,
    pub slug: String,
}

impl Post {
    /// Rejects posts that deserialized fine but cannot be listed or routed to.
    pub fn validate(&self) -> Result<(), BlogError> {
        let missing = [("id", &self.id), ("slug", &self.slug), ("title", &self.title)]
            .into_iter()
            .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => Err(BlogError::CorruptStore(format!(
                "post is missing required field `{}`",
                field
            ))),
            None => Ok(()),
        }
    }
}

/// Front matter of a bundled post file; the markdown body becomes `Post::content`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FrontMatter {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub published_at: String,
    pub read_time: String,
    pub slug: String,
}

impl FrontMatter {
    pub fn into_post(self, content: String) -> Result<Post, BlogError> {
        let published_at = NaiveDate::parse_from_str(&self.published_at, "%Y-%m-%d")
            .map_err(|e| {
                BlogError::Content(format!(
                    "invalid publishedAt `{}` in {}: {}",
                    self.published_at, self.slug, e
                ))
            })?;
        let category = self.category.parse::<Category>().map_err(|_| {
            BlogError::Content(format!("unknown category `{}` in {}", self.category, self.slug))
        })?;

        Ok(Post {
            id: self.id,
            title: self.title,
            excerpt: self.excerpt,
            content,
            category,
            thumbnail: self
                .thumbnail
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            published_at,
            read_time: self.read_time,
            slug: self.slug,
        })
    }
}

/// Work in progress saved from the editor under the `blog-draft` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub title: String,
    pub category: Option<Category>,
    pub content: String,
    pub thumbnail: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestbookEntry {
    pub id: String,
    pub nickname: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
