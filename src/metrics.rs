//! Metric name constants.

use std::time::Duration;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const AUTH_FAILED: &str = "mediaful.auth.failed"; // Counter.

pub const WATCH_LOGGED: &str = "mediaful.watch.logged"; // Counter.
pub const FEED_SHARED: &str = "mediaful.feed.shared"; // Counter.

pub const REPORTS_SUBMITTED: &str = "mediaful.reports.submitted"; // Counter.
pub const MODERATION_ACTIONS: &str = "mediaful.moderation.actions"; // Counter, labelled by `action`.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: Option<&config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(AUTH_FAILED, "The number of failed login attempts.");

    describe_counter!(WATCH_LOGGED, "The number of watch log submissions.");
    describe_counter!(FEED_SHARED, "The number of entries shared to the feed.");

    describe_counter!(REPORTS_SUBMITTED, "The number of reports filed against feed posts.");
    describe_counter!(
        MODERATION_ACTIONS,
        "The number of moderation decisions applied to reports."
    );

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
