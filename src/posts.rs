use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{BlogError, BlogResult};
use crate::models::{Category, Draft, Post, DEFAULT_THUMBNAIL};
use crate::storage::{KeyValueStore, DRAFT_KEY, POSTS_KEY};

const EXCERPT_CHARS: usize = 150;
const CHARS_PER_MINUTE: usize = 200;

static SLUG_INVALID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9가-힣]").expect("Invalid slug regex pattern"));
static SLUG_DASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-+").expect("Invalid dash regex pattern"));

pub trait PostRepository: Send + Sync {
    /// Persisted posts, newest first (insertion order).
    fn list(&self) -> BlogResult<Vec<Post>>;
    fn get(&self, id: &str) -> BlogResult<Option<Post>>;
    /// Prepends `post` to the persisted list.
    fn save(&self, post: Post) -> BlogResult<()>;
    /// Removes every post with `id`. Returns whether anything was removed.
    fn delete(&self, id: &str) -> BlogResult<bool>;
}

/// Posts kept as one JSON array under the `blog-posts` key.
pub struct StoredPosts {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl StoredPosts {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> BlogResult<Vec<Post>> {
        let Some(raw) = self.store.get(POSTS_KEY)? else {
            return Ok(Vec::new());
        };
        let posts: Vec<Post> = serde_json::from_str(&raw)
            .map_err(|e| BlogError::CorruptStore(format!("`{}`: {}", POSTS_KEY, e)))?;
        for post in &posts {
            post.validate()?;
        }
        Ok(posts)
    }

    fn write_all(&self, posts: &[Post]) -> BlogResult<()> {
        let raw = serde_json::to_string(posts)?;
        self.store.set(POSTS_KEY, &raw)
    }
}

impl PostRepository for StoredPosts {
    fn list(&self) -> BlogResult<Vec<Post>> {
        self.read_all()
    }

    fn get(&self, id: &str) -> BlogResult<Option<Post>> {
        Ok(self.read_all()?.into_iter().find(|p| p.id == id))
    }

    fn save(&self, post: Post) -> BlogResult<()> {
        post.validate()?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut posts = self.read_all()?;
        info!(id = %post.id, slug = %post.slug, "Publishing post");
        posts.insert(0, post);
        self.write_all(&posts)
    }

    fn delete(&self, id: &str) -> BlogResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut posts = self.read_all()?;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        if posts.len() == before {
            debug!(%id, "Delete requested for a post that is not stored");
            return Ok(false);
        }
        self.write_all(&posts)?;
        info!(%id, "Deleted post");
        Ok(true)
    }
}

/// The single draft kept under the `blog-draft` key.
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> BlogResult<Option<Draft>> {
        match self.store.get(DRAFT_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| BlogError::CorruptStore(format!("`{}`: {}", DRAFT_KEY, e))),
            None => Ok(None),
        }
    }

    pub fn save(&self, draft: &Draft) -> BlogResult<()> {
        let raw = serde_json::to_string(draft)?;
        self.store.set(DRAFT_KEY, &raw)?;
        info!(title = %draft.title, "Saved draft");
        Ok(())
    }
}

/// Persisted posts first, then bundled ones; the first post seen for a slug wins.
/// The result is ordered by `published_at`, newest first, keeping input order on ties.
pub fn merge_posts(persisted: &[Post], bundled: &[Post]) -> Vec<Post> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Post> = persisted
        .iter()
        .chain(bundled)
        .filter(|post| seen.insert(post.slug.as_str()))
        .cloned()
        .collect();
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged
}

pub fn combined_posts(repo: &dyn PostRepository, bundled: &[Post]) -> BlogResult<Vec<Post>> {
    Ok(merge_posts(&repo.list()?, bundled))
}

/// `None` selects every category. The query matches title or excerpt, ignoring case.
pub fn filter_posts<'a>(posts: &'a [Post], category: Option<Category>, query: &str) -> Vec<&'a Post> {
    let query = query.to_lowercase();
    posts
        .iter()
        .filter(|post| category.map_or(true, |c| post.category == c))
        .filter(|post| {
            post.title.to_lowercase().contains(&query)
                || post.excerpt.to_lowercase().contains(&query)
        })
        .collect()
}

pub struct Neighbours<'a> {
    pub current: &'a Post,
    /// The next older post.
    pub previous: Option<&'a Post>,
    /// The next newer post.
    pub next: Option<&'a Post>,
}

pub fn find_with_neighbours<'a>(posts: &'a [Post], slug: &str) -> Option<Neighbours<'a>> {
    let index = posts.iter().position(|p| p.slug == slug)?;
    Some(Neighbours {
        current: &posts[index],
        previous: posts.get(index + 1),
        next: index.checked_sub(1).and_then(|i| posts.get(i)),
    })
}

pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let dashed = SLUG_INVALID.replace_all(&lowered, "-");
    SLUG_DASHES.replace_all(&dashed, "-").into_owned()
}

pub fn excerpt_of(content: &str) -> String {
    let head: String = content.trim().chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head)
}

pub fn read_time_of(content: &str) -> String {
    let minutes = content.chars().count().div_ceil(CHARS_PER_MINUTE);
    format!("{}분", minutes)
}

/// Fields submitted from the editor.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub category: Option<Category>,
    pub content: String,
    pub thumbnail: Option<String>,
}

impl PostInput {
    pub fn publish(&self, id: String, today: NaiveDate) -> BlogResult<Post> {
        let category = match self.category {
            Some(c) if !self.title.trim().is_empty() && !self.content.trim().is_empty() => c,
            _ => {
                return Err(BlogError::Validation(
                    "제목, 카테고리, 내용을 모두 입력해주세요.".to_string(),
                ))
            }
        };

        Ok(Post {
            id,
            title: self.title.trim().to_string(),
            excerpt: excerpt_of(&self.content),
            content: self.content.trim().to_string(),
            category,
            thumbnail: self
                .thumbnail
                .clone()
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            published_at: today,
            read_time: read_time_of(&self.content),
            slug: slugify(&self.title),
        })
    }

    pub fn to_draft(&self, saved_at: DateTime<Utc>) -> BlogResult<Draft> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(BlogError::Validation(
                "제목과 내용을 입력해주세요.".to_string(),
            ));
        }
        Ok(Draft {
            title: self.title.trim().to_string(),
            category: self.category,
            content: self.content.trim().to_string(),
            thumbnail: self.thumbnail.clone(),
            saved_at,
        })
    }
}

impl From<Draft> for PostInput {
    fn from(draft: Draft) -> Self {
        Self {
            title: draft.title,
            category: draft.category,
            content: draft.content,
            thumbnail: draft.thumbnail,
        }
    }
}
