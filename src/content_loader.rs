use std::path::{Path, PathBuf};

use gray_matter::{engine::YAML, Matter};
use serde::Deserialize;
use tokio::fs;
use tracing::{error, info};

use crate::error::BlogError;
use crate::markdown::render_page_markdown;
use crate::models::{FrontMatter, Post};
use crate::state::AppState;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AboutPage {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub intro: Vec<String>,
    #[serde(default)]
    pub stack: Vec<StackGroup>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StackGroup {
    pub group: String,
    pub items: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Project {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tech: Vec<String>,
    pub github: Option<String>,
    pub demo: Option<String>,
}

/// Everything read from the content directory.
#[derive(Debug, Clone, Default)]
pub struct SiteContent {
    pub layout_html: String,
    pub not_found_html: String, // supports {{slug}} placeholder
    pub home_html: String,
    pub about: AboutPage,
    /// Bundled posts in file name order.
    pub posts: Vec<Post>,
}

async fn read(dir: &Path, name: &str) -> Result<String, BlogError> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .await
        .map_err(|e| BlogError::Content(format!("{}: {}", path.display(), e)))
}

pub async fn load_content(content_dir: &Path) -> Result<SiteContent, BlogError> {
    let layout_html = read(content_dir, "layout.html").await?;
    let not_found_html = read(content_dir, "not_found.html").await?;

    let home_md_content = read(content_dir, "home.md").await?;
    let home_html = render_page_markdown(&home_md_content);

    let about_toml = read(content_dir, "about.toml").await?;
    let about: AboutPage = toml::from_str(&about_toml)
        .map_err(|e| BlogError::Content(format!("about.toml: {}", e)))?;

    let posts = load_bundled_posts(&content_dir.join("posts")).await?;

    Ok(SiteContent {
        layout_html,
        not_found_html,
        home_html,
        about,
        posts,
    })
}

async fn load_bundled_posts(posts_dir: &Path) -> Result<Vec<Post>, BlogError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(posts_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut posts = Vec::with_capacity(paths.len());
    for path in paths {
        let file_content = fs::read_to_string(&path).await?;
        match parse_post(&file_content) {
            Ok(post) => posts.push(post),
            // A broken sample post should not take the whole site down.
            Err(e) => error!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(posts)
}

pub fn parse_post(file_content: &str) -> Result<Post, BlogError> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(file_content)
        .map_err(|e| BlogError::Content(format!("failed to parse front matter: {}", e)))?;

    let front_matter = parsed
        .data
        .ok_or_else(|| BlogError::Content("missing front matter".to_string()))?;
    front_matter.into_post(parsed.content.trim().to_string())
}

pub async fn reload_content(app_state: &AppState) {
    info!("Reloading site content...");
    match load_content(&app_state.config.content_dir).await {
        Ok(content) => {
            let count = content.posts.len();
            *app_state.content.write().await = content;
            info!(posts = count, "Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content: {}", e);
        }
    }
}
