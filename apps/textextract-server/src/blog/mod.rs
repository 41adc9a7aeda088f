//! Blog articles
//!
//! Markdown files with YAML front matter, parsed at startup and cached in
//! memory until an explicit refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("{0}: missing front matter block")]
    MissingFrontMatter(String),

    #[error("{path}: invalid front matter: {source}")]
    InvalidFrontMatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blog loader task failed: {0}")]
    Task(String),
}

/// A published article
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    /// Markdown body
    pub content: String,
    pub author: String,
    pub published_date: NaiveDate,
    /// Minutes
    pub reading_time: u32,
    pub tags: Vec<String>,
}

/// Article without its body, for listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub author: String,
    pub published_date: NaiveDate,
    pub reading_time: u32,
    pub tags: Vec<String>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            title: article.title.clone(),
            slug: article.slug.clone(),
            excerpt: article.excerpt.clone(),
            author: article.author.clone(),
            published_date: article.published_date,
            reading_time: article.reading_time,
            tags: article.tags.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    author: Option<String>,
    published_date: NaiveDate,
    /// Either a number of minutes or text such as "5 min read"
    #[serde(default)]
    reading_time: Option<serde_yaml::Value>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Split `---` fenced front matter from the body
fn split_front_matter(source: &str) -> Option<(&str, &str)> {
    let source = source.trim_start_matches('\u{feff}').trim_start();
    let rest = source.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn reading_minutes(value: Option<&serde_yaml::Value>, body: &str) -> u32 {
    let stated = match value {
        Some(serde_yaml::Value::Number(n)) => n.as_u64().map(|m| m as u32),
        Some(serde_yaml::Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    };

    stated.filter(|m| *m > 0).unwrap_or_else(|| {
        let words = body.split_whitespace().count();
        words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
    })
}

/// Parse one markdown file. `stem` is the file name without extension.
pub fn parse_article(path: &str, stem: &str, source: &str) -> Result<Article, BlogError> {
    let (yaml, body) =
        split_front_matter(source).ok_or_else(|| BlogError::MissingFrontMatter(path.to_string()))?;

    let front: FrontMatter =
        serde_yaml::from_str(yaml).map_err(|source| BlogError::InvalidFrontMatter {
            path: path.to_string(),
            source,
        })?;

    let slug = front
        .slug
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| stem.to_string());
    let content = body.trim().to_string();

    Ok(Article {
        id: front.id.unwrap_or_else(|| slug.clone()),
        reading_time: reading_minutes(front.reading_time.as_ref(), &content),
        title: front.title,
        slug,
        excerpt: front.excerpt,
        content,
        author: front.author.unwrap_or_else(|| "TextExtract Team".to_string()),
        published_date: front.published_date,
        tags: front.tags,
    })
}

/// Load every `*.md` file in `dir`, newest first.
///
/// A missing directory yields no articles; unparseable files are skipped.
pub fn load_dir(dir: &Path) -> Result<Vec<Article>, BlogError> {
    if !dir.exists() {
        tracing::warn!("Blog directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut articles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!("Skipping unreadable blog directory entry: {}", e);
                continue;
            }
        };
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Skipping blog article {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_article(&path.display().to_string(), &stem, &source) {
            Ok(article) => articles.push(article),
            Err(e) => tracing::warn!("Skipping blog article: {}", e),
        }
    }

    articles.sort_by(|a, b| {
        b.published_date
            .cmp(&a.published_date)
            .then_with(|| a.slug.cmp(&b.slug))
    });
    Ok(articles)
}

/// Cached blog articles
#[derive(Clone)]
pub struct BlogStore {
    dir: PathBuf,
    articles: Arc<RwLock<Vec<Article>>>,
}

impl BlogStore {
    /// Empty store reading from `dir` on refresh
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            articles: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create the store and load it once
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, BlogError> {
        let store = Self::new(dir);
        store.refresh().await?;
        Ok(store)
    }

    /// Re-read the directory, replacing the cache; returns the article count
    pub async fn refresh(&self) -> Result<usize, BlogError> {
        let dir = self.dir.clone();
        let articles = tokio::task::spawn_blocking(move || load_dir(&dir))
            .await
            .map_err(|e| BlogError::Task(e.to_string()))??;

        let count = articles.len();
        *self.articles.write().await = articles;
        tracing::info!("Loaded {} blog articles from {}", count, self.dir.display());
        Ok(count)
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    pub async fn summaries(&self) -> Vec<ArticleSummary> {
        self.articles.read().await.iter().map(ArticleSummary::from).collect()
    }

    pub async fn get(&self, slug: &str) -> Option<Article> {
        self.articles
            .read()
            .await
            .iter()
            .find(|a| a.slug == slug)
            .cloned()
    }
}
