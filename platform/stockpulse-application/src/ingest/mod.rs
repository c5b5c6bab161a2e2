use crate::config::{Config, DEFAULT_CHUNK_SIZE, DEFAULT_FETCH_CONCURRENCY};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use stockpulse_domain::repositories::quote_source::QuoteSource;
use stockpulse_domain::repositories::snapshot_store::SnapshotStore;
use stockpulse_domain::services::change_detection::changed_snapshots;
use stockpulse_domain::value_objects::quote::CompanyQuote;

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub fetch_concurrency: usize,
    pub sweep_pause_ms: Option<u64>,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        let poll = config.poll.as_ref();
        Self {
            // chunks() panics on zero, so clamp both knobs to at least 1.
            chunk_size: poll
                .and_then(|p| p.chunk_size)
                .unwrap_or(DEFAULT_CHUNK_SIZE)
                .max(1),
            fetch_concurrency: poll
                .and_then(|p| p.fetch_concurrency)
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY)
                .max(1),
            sweep_pause_ms: poll.and_then(|p| p.sweep_pause_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub symbols: usize,
    pub quotes: usize,
    pub written: usize,
    pub fetch_failures: usize,
    pub failed_chunks: usize,
}

/// Drives the bootstrap-then-poll pipeline against a quote source and a
/// snapshot store. One instance is owned by one long-lived worker task.
pub struct IngestionService<Q, S> {
    source: Q,
    store: S,
    settings: IngestSettings,
}

impl<Q, S> IngestionService<Q, S>
where
    Q: QuoteSource,
    S: SnapshotStore,
{
    pub fn new(source: Q, store: S, settings: IngestSettings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// Fetches the symbol universe, upserts it, and returns the active
    /// symbol set. Any failure here is fatal to the bootstrap attempt.
    pub async fn bootstrap(&self) -> Result<Vec<String>, String> {
        let universe = self
            .source
            .fetch_symbol_universe()
            .await
            .map_err(|err| format!("bootstrap failed while fetching the symbol universe: {err}"))?;
        self.store
            .upsert_symbols(&universe)
            .await
            .map_err(|err| format!("bootstrap failed while upserting companies: {err}"))?;

        let active = self
            .store
            .list_active_symbols()
            .await
            .map_err(|err| format!("bootstrap failed while listing active companies: {err}"))?;
        tracing::info!(
            universe = universe.len(),
            active = active.len(),
            "symbol universe bootstrapped"
        );
        Ok(active.into_iter().map(|company| company.symbol).collect())
    }

    /// Bootstraps once, then sweeps the active set until the task is
    /// dropped. There is no pause between sweeps unless one is
    /// configured; the loop is bounded by upstream response latency.
    pub async fn run(&self) -> Result<(), String> {
        let active = self.bootstrap().await?;
        loop {
            let start = Instant::now();
            let stats = self.sweep_once(&active).await;
            metrics::counter!("stockpulse.ingest.sweeps_total").increment(1);
            metrics::histogram!("stockpulse.ingest.sweep_ms")
                .record(start.elapsed().as_secs_f64() * 1000.0);
            tracing::debug!(
                symbols = stats.symbols,
                quotes = stats.quotes,
                written = stats.written,
                fetch_failures = stats.fetch_failures,
                failed_chunks = stats.failed_chunks,
                "sweep complete"
            );
            if let Some(pause_ms) = self.settings.sweep_pause_ms {
                tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            }
        }
    }

    /// One full pass over the active symbol set, chunk by chunk. A
    /// failed chunk is logged and skipped; the sweep always finishes.
    pub async fn sweep_once(&self, active: &[String]) -> SweepStats {
        let mut stats = SweepStats {
            symbols: active.len(),
            ..SweepStats::default()
        };
        for chunk in active.chunks(self.settings.chunk_size) {
            match self.process_chunk(chunk, &mut stats).await {
                Ok(written) => stats.written += written,
                Err(err) => {
                    stats.failed_chunks += 1;
                    metrics::counter!("stockpulse.ingest.chunk_failures_total").increment(1);
                    tracing::error!(error = %err, chunk = chunk.len(), "chunk failed, moving on");
                }
            }
        }
        stats
    }

    async fn process_chunk(
        &self,
        symbols: &[String],
        stats: &mut SweepStats,
    ) -> Result<usize, String> {
        let quotes = self.fetch_chunk(symbols, stats).await;
        if quotes.is_empty() {
            return Ok(0);
        }

        let previous = self
            .store
            .latest_snapshots_for(symbols)
            .await
            .map_err(|err| format!("failed to load latest snapshots: {err}"))?;
        let changed = changed_snapshots(&quotes, &previous, Utc::now());
        if changed.is_empty() {
            return Ok(0);
        }

        self.store
            .insert_snapshots(&changed)
            .await
            .map_err(|err| format!("failed to insert snapshots: {err}"))?;
        metrics::counter!("stockpulse.ingest.snapshots_written_total")
            .increment(changed.len() as u64);
        Ok(changed.len())
    }

    /// Fetches quotes for one chunk with a fixed number of requests in
    /// flight. A symbol whose fetch fails is skipped, not fatal.
    async fn fetch_chunk(&self, symbols: &[String], stats: &mut SweepStats) -> Vec<CompanyQuote> {
        let source = &self.source;
        let results: Vec<(String, Result<CompanyQuote, String>)> = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let quote = source.fetch_quote(&symbol).await;
                (symbol, quote)
            })
            .buffer_unordered(self.settings.fetch_concurrency)
            .collect()
            .await;

        let mut quotes = Vec::with_capacity(results.len());
        for (symbol, result) in results {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(err) => {
                    stats.fetch_failures += 1;
                    metrics::counter!("stockpulse.ingest.fetch_errors_total").increment(1);
                    tracing::warn!(symbol = %symbol, error = %err, "quote fetch failed, skipping symbol");
                }
            }
        }
        stats.quotes += quotes.len();
        quotes
    }
}
