use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::quotes;

pub const USER_AGENT: &str = "DataEngineeringWorkshop/1.0 (+https://example.org/training)";

/// Runtime settings: built-in defaults, overridden by `HARVEST_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub quotes_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub page_delay_ms: u64,
    /// 0 disables the cap.
    pub max_pages: u32,

    pub tiles_url: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub max_scrolls: u32,
    pub scroll_step_px: u32,
    pub reveal_pause_ms: u64,
    pub reveal_jitter_ms: u64,
    /// Wait after the replayed scrolls finish, before capture.
    pub settle_ms: u64,
    pub nav_timeout_ms: u64,
    pub selector_timeout_ms: u64,

    pub output_dir: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_config(Config::builder().add_source(Environment::with_prefix("HARVEST")))
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings = builder
            .set_default("quotes_url", quotes::DEFAULT_URL)?
            .set_default("user_agent", USER_AGENT)?
            .set_default("request_timeout_ms", 15_000)?
            .set_default("page_delay_ms", 400)?
            .set_default("max_pages", 500)?
            .set_default("tiles_url", "https://www.lazada.com.ph/")?
            .set_default("browserless_url", "http://localhost:3000")?
            .set_default("max_scrolls", 4)?
            .set_default("scroll_step_px", 2500)?
            .set_default("reveal_pause_ms", 800)?
            .set_default("reveal_jitter_ms", 500)?
            .set_default("settle_ms", 1500)?
            .set_default("nav_timeout_ms", 30_000)?
            .set_default("selector_timeout_ms", 15_000)?
            .set_default("output_dir", "output")?
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn page_cap(&self) -> Option<u32> {
        (self.max_pages > 0).then_some(self.max_pages)
    }

    pub fn reveal_pause(&self) -> Duration {
        Duration::from_millis(self.reveal_pause_ms)
    }

    pub fn reveal_jitter(&self) -> Duration {
        Duration::from_millis(self.reveal_jitter_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }
}
