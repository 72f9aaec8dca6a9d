use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use confik::{Configuration, EnvSource};
use serde::{Deserialize, Serialize};

use self::yaml::YamlFileSource;

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct SiteSettings {
    #[confik(default = default_site_title())]
    pub title: String,
    #[confik(default)]
    pub title_suffix: String,
    #[confik(default)]
    pub description: String,
    /// Absolute origin used for canonical links, without a trailing slash.
    #[confik(default = default_hostname())]
    pub hostname: String,
    #[confik(default)]
    pub author: String,
    #[confik(default = default_locale())]
    pub locale: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            title_suffix: String::new(),
            description: String::new(),
            hostname: default_hostname(),
            author: String::new(),
            locale: default_locale(),
        }
    }
}

fn default_site_title() -> String {
    "Folio".into()
}

fn default_hostname() -> String {
    "http://localhost".into()
}

fn default_locale() -> String {
    "en-US".into()
}

/// Names of the database properties a post is read from.
#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct PropertyNames {
    #[confik(default = default_title_property())]
    pub title: String,
    #[confik(default = default_slug_property())]
    pub slug: String,
    #[confik(default = default_date_property())]
    pub date: String,
    #[confik(default = default_author_property())]
    pub author: String,
    #[confik(default = default_tag_property())]
    pub tag: String,
    #[confik(default = default_published_property())]
    pub published: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: default_title_property(),
            slug: default_slug_property(),
            date: default_date_property(),
            author: default_author_property(),
            tag: default_tag_property(),
            published: default_published_property(),
        }
    }
}

fn default_title_property() -> String {
    "name".into()
}

fn default_slug_property() -> String {
    "slug".into()
}

fn default_date_property() -> String {
    "date".into()
}

fn default_author_property() -> String {
    "author".into()
}

fn default_tag_property() -> String {
    "tag".into()
}

fn default_published_property() -> String {
    "published".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct NotionConfig {
    #[confik(secret)]
    pub token: String,
    pub database_id: String,
    #[confik(default = default_api_base())]
    pub api_base: String,
    #[confik(default = default_notion_version())]
    pub version: String,
    #[confik(default = 30u64)]
    pub timeout_secs: u64,
    #[confik(default)]
    pub properties: PropertyNames,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            api_base: default_api_base(),
            version: default_notion_version(),
            timeout_secs: 30,
            properties: PropertyNames::default(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.notion.com/v1".into()
}

fn default_notion_version() -> String {
    "2022-06-28".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct BuildConfig {
    #[confik(default = default_output_dir())]
    pub output_dir: PathBuf,
    #[confik(default = default_cache_dir())]
    pub cache_dir: PathBuf,
    #[confik(default = default_templates_dir())]
    pub templates_dir: PathBuf,
    /// Upper bound on in-flight requests for any single fan-out.
    #[confik(default = 8usize)]
    pub concurrency: usize,
    /// How many levels of nested blocks are fetched below a page.
    #[confik(default = 3usize)]
    pub max_child_depth: usize,
    #[confik(default = 1_048_576usize)]
    pub max_probe_bytes: usize,
    #[confik(default = true)]
    pub incremental: bool,
    /// Notion-hosted file URLs expire after an hour, so cached pages are
    /// rebuilt at least that often.
    #[confik(default = 3600u64)]
    pub revalidate_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            templates_dir: default_templates_dir(),
            concurrency: 8,
            max_child_depth: 3,
            max_probe_bytes: 1_048_576,
            incremental: true,
            revalidate_secs: 3600,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".folio")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct ProjectConfig {
    pub name: String,
    #[confik(default)]
    pub description: String,
    #[confik(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct SiteConfig {
    #[confik(default)]
    pub site: SiteSettings,
    pub notion: NotionConfig,
    #[confik(default)]
    pub build: BuildConfig,
    #[confik(default)]
    pub projects: Vec<ProjectConfig>,
}

impl SiteConfig {
    pub fn new(notion: NotionConfig) -> Self {
        Self {
            site: SiteSettings::default(),
            notion,
            build: BuildConfig::default(),
            projects: vec![],
        }
    }

    /// Load configuration from `config.yml` (or `$FOLIO_CONFIG`) and environment variables.
    /// The Notion token is a secret and is only accepted from the environment.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }

        let config_path = env::var("FOLIO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.yml"));
        let mut builder = SiteConfig::builder();

        if config_path.exists() {
            builder.override_with(YamlFileSource::new(&config_path));
        } else {
            log::info!(
                "No config file at {}, using environment only",
                config_path.display()
            );
        }

        builder.override_with(EnvSource::new().allow_secrets());

        builder
            .try_build()
            .with_context(|| format!("loading {} and env overrides", config_path.display()))
    }

    pub fn canonical_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.site.hostname.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

mod yaml {
    use std::error::Error;
    use std::path::PathBuf;

    use confik::Source;
    use serde::de::DeserializeOwned;
    use serde_yaml;

    #[derive(Debug)]
    pub struct YamlFileSource {
        path: PathBuf,
    }

    impl YamlFileSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl<T> Source<T> for YamlFileSource
    where
        T: DeserializeOwned + confik::ConfigurationBuilder,
    {
        fn allows_secrets(&self) -> bool {
            false
        }

        fn provide(&self) -> Result<T, Box<dyn Error + Sync + Send>> {
            let contents = std::fs::read_to_string(&self.path)?;
            let parsed = serde_yaml::from_str(&contents)?;
            Ok(parsed)
        }
    }
}
