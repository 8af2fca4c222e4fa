use std::path::PathBuf;

use tracing::warn;

use crate::gate::DEFAULT_PASSWORD;

const DEFAULT_PORT: u16 = 8080;

/// Settings read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub is_development: bool,
    pub log_filter: String,
    pub content_dir: PathBuf,
    pub data_dir: PathBuf,
    pub admin_password: String,
    pub render_links: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            is_development: false,
            log_filter: "info".to_string(),
            content_dir: PathBuf::from("content"),
            data_dir: PathBuf::from("data"),
            admin_password: DEFAULT_PASSWORD.to_string(),
            render_links: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("PORT `{}` is not a valid port, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => defaults.port,
        };

        let render_links = match lookup("BLOG_RENDER_LINKS").as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") | None => false,
            Some(other) => {
                warn!("BLOG_RENDER_LINKS `{}` is not a boolean, links stay off", other);
                false
            }
        };

        Self {
            port,
            is_development: lookup("RUST_ENV").map_or(false, |v| v == "development"),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
            content_dir: lookup("BLOG_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            data_dir: lookup("BLOG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            admin_password: lookup("BLOG_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            render_links,
        }
    }
}
