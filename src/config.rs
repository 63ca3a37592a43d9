use std::{net::SocketAddr, path::PathBuf};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct UploadConfig {
    /// Directory served under `/images`.
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FeedConfig {
    /// Notifications per feed page.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Users per search page.
    #[serde(default = "default_user_page_size")]
    pub user_page_size: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            user_page_size: default_user_page_size(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FeaturedConfig {
    /// How long a new featured title stays on display.
    #[serde(default = "default_lifetime_months")]
    pub lifetime_months: u32,
}

impl Default for FeaturedConfig {
    fn default() -> Self {
        Self {
            lifetime_months: default_lifetime_months(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusConfig {
    /// The URL of the Prometheus push gateway.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum MetricConfig {
    PrometheusPush(PrometheusConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub listen_address: Option<SocketAddr>,
    /// sqlite connection URL, e.g. `sqlite://data/mediaful.db`.
    pub db: String,
    pub uploads: UploadConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub featured: FeaturedConfig,
    pub metrics: Option<MetricConfig>,
}

const fn default_page_size() -> i64 {
    15
}

const fn default_user_page_size() -> i64 {
    20
}

const fn default_lifetime_months() -> u32 {
    1
}
