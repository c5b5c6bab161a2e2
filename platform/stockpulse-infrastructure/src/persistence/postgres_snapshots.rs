use std::collections::HashSet;
use std::time::Instant;
use stockpulse_domain::repositories::snapshot_store::SnapshotStore;
use stockpulse_domain::value_objects::company::{Company, CompanyStatus};
use stockpulse_domain::value_objects::snapshot::{CompanyDelta, CompanyVolume, PriceSnapshot};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS companies (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    symbol      TEXT NOT NULL UNIQUE,
    is_enabled  BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_prices (
    id              BIGSERIAL PRIMARY KEY,
    latest_price    DOUBLE PRECISION,
    change          DOUBLE PRECISION,
    previous_volume DOUBLE PRECISION,
    previous_close  DOUBLE PRECISION,
    volume          DOUBLE PRECISION,
    created_at      TIMESTAMPTZ NOT NULL,
    delta           DOUBLE PRECISION NOT NULL,
    company_symbol  TEXT NOT NULL REFERENCES companies (symbol)
);

CREATE INDEX IF NOT EXISTS stock_prices_symbol_created_at_idx
    ON stock_prices (company_symbol, created_at DESC);
";

const LATEST_SNAPSHOTS_SQL: &str = "\
SELECT sp.latest_price, sp.change, sp.previous_volume, sp.previous_close, sp.volume, \
       sp.created_at, sp.delta, sp.company_symbol \
FROM stock_prices sp \
JOIN (SELECT company_symbol, MAX(created_at) AS created_at \
      FROM stock_prices GROUP BY company_symbol) latest \
  ON sp.company_symbol = latest.company_symbol AND sp.created_at = latest.created_at \
WHERE sp.company_symbol = ANY($1)";

const TOP_BY_DELTA_SQL: &str = "\
SELECT c.name, sp.delta \
FROM stock_prices sp \
JOIN (SELECT company_symbol, MAX(created_at) AS created_at \
      FROM stock_prices GROUP BY company_symbol) latest \
  ON sp.company_symbol = latest.company_symbol AND sp.created_at = latest.created_at \
JOIN companies c ON sp.company_symbol = c.symbol \
WHERE c.is_enabled \
ORDER BY sp.delta DESC, c.name \
LIMIT $1";

const TOP_BY_VOLUME_SQL: &str = "\
SELECT c.name, COALESCE(sp.volume, sp.previous_volume) AS volume \
FROM stock_prices sp \
JOIN (SELECT company_symbol, MAX(created_at) AS created_at \
      FROM stock_prices GROUP BY company_symbol) latest \
  ON sp.company_symbol = latest.company_symbol AND sp.created_at = latest.created_at \
JOIN companies c ON sp.company_symbol = c.symbol \
WHERE c.is_enabled AND COALESCE(sp.volume, sp.previous_volume) IS NOT NULL \
ORDER BY volume DESC, c.name \
LIMIT $1";

/// Snapshot store backed by PostgreSQL. Batch writes are single
/// multi-row statements, so each batch commits or fails as a whole.
#[derive(Debug)]
pub struct PostgresSnapshotStore {
    client: tokio_postgres::Client,
}

impl PostgresSnapshotStore {
    /// Connects and spawns the connection driver task.
    pub async fn connect(db_url: &str) -> Result<Self, String> {
        let (client, connection) = tokio_postgres::connect(db_url, NoTls)
            .await
            .map_err(|err| format!("failed to connect to postgres: {err}"))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection terminated");
            }
        });
        Ok(Self { client })
    }

    /// Idempotent schema setup, run once at startup.
    pub async fn init_schema(&self) -> Result<(), String> {
        self.client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(|err| format!("failed to initialise schema: {err}"))
    }

    async fn query_companies(&self, sql: &str) -> Result<Vec<Company>, String> {
        let rows = self
            .client
            .query(sql, &[])
            .await
            .map_err(|err| format!("failed to query companies: {err}"))?;
        Ok(rows.iter().map(company_from_row).collect())
    }
}

impl SnapshotStore for PostgresSnapshotStore {
    async fn upsert_symbols(&self, companies: &[CompanyStatus]) -> Result<(), String> {
        let deduped = dedup_last_by_symbol(companies);
        if deduped.is_empty() {
            return Ok(());
        }

        // The name column keeps its first-inserted value: a status
        // refresh only flips the enabled flag.
        let sql = format!(
            "INSERT INTO companies (name, symbol, is_enabled) VALUES {} \
             ON CONFLICT (symbol) DO UPDATE SET is_enabled = EXCLUDED.is_enabled",
            multirow_placeholders(deduped.len(), 3)
        );
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(deduped.len() * 3);
        for company in &deduped {
            params.push(&company.name);
            params.push(&company.symbol);
            params.push(&company.enabled);
        }

        let start = Instant::now();
        self.client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|err| format!("failed to upsert companies: {err}"))?;
        metrics::histogram!("stockpulse.infra.postgres.upsert_symbols_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(companies = deduped.len(), "companies upserted");
        Ok(())
    }

    async fn list_active_symbols(&self) -> Result<Vec<Company>, String> {
        self.query_companies(
            "SELECT id, name, symbol, is_enabled FROM companies WHERE is_enabled = true",
        )
        .await
    }

    async fn list_all_symbols(&self) -> Result<Vec<Company>, String> {
        self.query_companies("SELECT id, name, symbol, is_enabled FROM companies")
            .await
    }

    async fn insert_snapshots(&self, snapshots: &[PriceSnapshot]) -> Result<(), String> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO stock_prices (latest_price, change, previous_volume, previous_close, \
             volume, created_at, delta, company_symbol) VALUES {}",
            multirow_placeholders(snapshots.len(), 8)
        );
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(snapshots.len() * 8);
        for snapshot in snapshots {
            params.push(&snapshot.latest_price);
            params.push(&snapshot.change);
            params.push(&snapshot.previous_volume);
            params.push(&snapshot.previous_close);
            params.push(&snapshot.volume);
            params.push(&snapshot.created_at);
            params.push(&snapshot.delta);
            params.push(&snapshot.symbol);
        }

        let start = Instant::now();
        self.client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|err| format!("failed to insert snapshots: {err}"))?;
        metrics::histogram!("stockpulse.infra.postgres.insert_snapshots_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!("stockpulse.infra.postgres.snapshots_inserted_total")
            .increment(snapshots.len() as u64);
        Ok(())
    }

    async fn latest_snapshots_for(&self, symbols: &[String]) -> Result<Vec<PriceSnapshot>, String> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let rows = self
            .client
            .query(LATEST_SNAPSHOTS_SQL, &[&symbols])
            .await
            .map_err(|err| format!("failed to query latest snapshots: {err}"))?;
        metrics::histogram!("stockpulse.infra.postgres.latest_snapshots_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(rows.iter().map(snapshot_from_row).collect())
    }

    async fn top_by_delta(&self, limit: usize) -> Result<Vec<CompanyDelta>, String> {
        let limit = limit as i64;
        let rows = self
            .client
            .query(TOP_BY_DELTA_SQL, &[&limit])
            .await
            .map_err(|err| format!("failed to query largest deltas: {err}"))?;
        Ok(rows.iter().map(delta_from_row).collect())
    }

    async fn top_by_volume(&self, limit: usize) -> Result<Vec<CompanyVolume>, String> {
        let limit = limit as i64;
        let rows = self
            .client
            .query(TOP_BY_VOLUME_SQL, &[&limit])
            .await
            .map_err(|err| format!("failed to query largest volumes: {err}"))?;
        Ok(rows.iter().map(volume_from_row).collect())
    }
}

/// One placeholder group per row: `($1, $2, $3), ($4, $5, $6), ...`.
fn multirow_placeholders(rows: usize, columns: usize) -> String {
    let mut out = String::new();
    for row in 0..rows {
        if row > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for column in 0..columns {
            if column > 0 {
                out.push_str(", ");
            }
            out.push('$');
            out.push_str(&(row * columns + column + 1).to_string());
        }
        out.push(')');
    }
    out
}

/// ON CONFLICT cannot touch the same row twice within one statement;
/// keep the last entry per symbol.
fn dedup_last_by_symbol(companies: &[CompanyStatus]) -> Vec<&CompanyStatus> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<&CompanyStatus> = companies
        .iter()
        .rev()
        .filter(|company| seen.insert(company.symbol.as_str()))
        .collect();
    deduped.reverse();
    deduped
}

fn company_from_row(row: &Row) -> Company {
    Company {
        id: row.get("id"),
        name: row.get("name"),
        symbol: row.get("symbol"),
        enabled: row.get("is_enabled"),
    }
}

fn snapshot_from_row(row: &Row) -> PriceSnapshot {
    PriceSnapshot {
        symbol: row.get("company_symbol"),
        latest_price: row.get("latest_price"),
        change: row.get("change"),
        previous_volume: row.get("previous_volume"),
        previous_close: row.get("previous_close"),
        volume: row.get("volume"),
        delta: row.get("delta"),
        created_at: row.get("created_at"),
    }
}

fn delta_from_row(row: &Row) -> CompanyDelta {
    CompanyDelta {
        name: row.get("name"),
        delta: row.get("delta"),
    }
}

fn volume_from_row(row: &Row) -> CompanyVolume {
    CompanyVolume {
        name: row.get("name"),
        volume: row.get("volume"),
    }
}
