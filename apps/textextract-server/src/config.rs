//! Configuration management for TextExtract Server

use std::env;
use std::time::Duration;

/// Which surface this process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Full API backend (OCR, usage, blog, sitemap)
    Backend,
    /// Edge proxy forwarding `/api/*` to a backend origin
    Edge,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub database: DatabaseConfig,
    pub blog: BlogConfig,
    pub proxy: ProxyConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: ServerMode,
    /// Absolute base URL used for sitemap links
    pub site_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub tesseract_path: String,
    pub default_language: String,
    /// Maximum number of lines kept by the heuristic filter
    pub max_lines: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BlogConfig {
    pub dir: String,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub backend_origin: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    /// OAuth callback base, taken from the first entry of `REPLIT_DOMAINS`
    pub callback_base_url: Option<String>,
}

impl AuthConfig {
    pub fn is_configured(&self) -> bool {
        self.google_client_id.is_some() && self.google_client_secret.is_some()
    }
}

pub const OCR_SPACE_ENDPOINT: &str = "https://api.ocr.space/parse/image";

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                mode: ServerMode::Backend,
                site_url: None,
            },
            ocr: OcrConfig {
                api_key: None,
                endpoint: OCR_SPACE_ENDPOINT.to_string(),
                timeout: Duration::from_secs(20),
                tesseract_path: "tesseract".to_string(),
                default_language: "eng".to_string(),
                max_lines: 20,
            },
            database: DatabaseConfig { url: None },
            blog: BlogConfig {
                dir: "./content/blog".to_string(),
            },
            proxy: ProxyConfig {
                backend_origin: "http://127.0.0.1:3001".to_string(),
                timeout: Duration::from_secs(30),
            },
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        let mode = match env::var("SERVER_MODE")
            .unwrap_or_else(|_| "backend".to_string())
            .to_lowercase()
            .as_str()
        {
            "edge" | "proxy" => ServerMode::Edge,
            _ => ServerMode::Backend,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
                mode,
                site_url: non_empty_var("SITE_URL"),
            },
            ocr: OcrConfig {
                api_key: non_empty_var("OCR_SPACE_API_KEY").or_else(|| non_empty_var("OCRSPACE_API_KEY")),
                endpoint: env::var("OCR_SPACE_ENDPOINT").unwrap_or(defaults.ocr.endpoint),
                timeout: secs_var("OCR_TIMEOUT_SECS").unwrap_or(defaults.ocr.timeout),
                tesseract_path: env::var("TESSERACT_PATH").unwrap_or(defaults.ocr.tesseract_path),
                default_language: defaults.ocr.default_language,
                max_lines: env::var("OCR_MAX_LINES")
                    .ok()
                    .and_then(|n| n.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.ocr.max_lines),
            },
            database: DatabaseConfig {
                url: non_empty_var("DATABASE_URL"),
            },
            blog: BlogConfig {
                dir: env::var("BLOG_DIR").unwrap_or(defaults.blog.dir),
            },
            proxy: ProxyConfig {
                backend_origin: env::var("PROXY_BACKEND_ORIGIN")
                    .map(|o| o.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.proxy.backend_origin),
                timeout: secs_var("PROXY_TIMEOUT_SECS").unwrap_or(defaults.proxy.timeout),
            },
            auth: AuthConfig {
                google_client_id: non_empty_var("GOOGLE_CLIENT_ID"),
                google_client_secret: non_empty_var("GOOGLE_CLIENT_SECRET"),
                callback_base_url: non_empty_var("REPLIT_DOMAINS").and_then(|domains| first_domain(&domains)),
            },
        })
    }

    /// Base URL for absolute links
    pub fn site_url(&self) -> String {
        match &self.server.site_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.host, self.server.port),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn secs_var(key: &str) -> Option<Duration> {
    parse_secs(env::var(key).ok()?.as_str())
}

/// Whole seconds; zero is rejected since it would time out every call
fn parse_secs(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
        .filter(|d| !d.is_zero())
}

fn first_domain(domains: &str) -> Option<String> {
    domains
        .split(',')
        .map(str::trim)
        .find(|d| !d.is_empty())
        .map(|d| format!("https://{}", d))
}
