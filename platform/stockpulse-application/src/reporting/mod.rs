use crate::config::{Config, DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_TOP_LIMIT};
use std::fmt::Write as _;
use std::time::Duration;
use stockpulse_domain::repositories::snapshot_store::SnapshotStore;
use stockpulse_domain::value_objects::snapshot::{CompanyDelta, CompanyVolume};

#[derive(Debug, Clone, Copy)]
pub struct ReportSettings {
    pub interval_secs: u64,
    pub top_limit: usize,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Self {
        let report = config.report.as_ref();
        Self {
            interval_secs: report
                .and_then(|r| r.interval_secs)
                .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS),
            top_limit: report.and_then(|r| r.top_limit).unwrap_or(DEFAULT_TOP_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketReport {
    pub movers: Vec<CompanyDelta>,
    pub volume_leaders: Vec<CompanyVolume>,
}

impl MarketReport {
    /// Plain-text rendering for the periodic log line.
    pub fn render(&self) -> String {
        let mut out = String::from("largest percentage moves:\n");
        if self.movers.is_empty() {
            out.push_str("  (no data yet)\n");
        }
        for entry in &self.movers {
            let _ = writeln!(out, "  {:<24} {:+.2}%", entry.name, entry.delta);
        }
        out.push_str("largest traded volume:\n");
        if self.volume_leaders.is_empty() {
            out.push_str("  (no data yet)\n");
        }
        for entry in &self.volume_leaders {
            let _ = writeln!(out, "  {:<24} {}", entry.name, entry.volume);
        }
        out
    }
}

/// One snapshot of both ranking queries.
pub async fn report_once<S: SnapshotStore>(
    store: &S,
    top_limit: usize,
) -> Result<MarketReport, String> {
    let movers = store
        .top_by_delta(top_limit)
        .await
        .map_err(|err| format!("failed to query largest deltas: {err}"))?;
    let volume_leaders = store
        .top_by_volume(top_limit)
        .await
        .map_err(|err| format!("failed to query largest volumes: {err}"))?;
    Ok(MarketReport {
        movers,
        volume_leaders,
    })
}

/// Periodic reporting task reading shared store state. A failed tick is
/// logged and skipped so a transient read error never kills the
/// reporter.
pub async fn run_reporter<S: SnapshotStore>(store: S, settings: ReportSettings) {
    // tokio::time::interval panics on a zero period.
    let period = Duration::from_secs(settings.interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        match report_once(&store, settings.top_limit).await {
            Ok(report) => tracing::info!("market report\n{}", report.render()),
            Err(err) => tracing::warn!(error = %err, "market report skipped"),
        }
    }
}
