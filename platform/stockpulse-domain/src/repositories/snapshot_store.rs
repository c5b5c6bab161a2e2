use crate::value_objects::company::{Company, CompanyStatus};
use crate::value_objects::snapshot::{CompanyDelta, CompanyVolume, PriceSnapshot};
use std::future::Future;
use std::sync::Arc;

/// Durable store of the symbol universe and the append-only snapshot
/// log. Empty inputs to the batch and lookup operations are valid and
/// yield empty results, never errors.
pub trait SnapshotStore {
    /// Insert-or-update by symbol key. On conflict only `enabled` is
    /// updated; the name and row id keep their first-inserted values.
    fn upsert_symbols(
        &self,
        companies: &[CompanyStatus],
    ) -> impl Future<Output = Result<(), String>> + Send;

    fn list_active_symbols(&self) -> impl Future<Output = Result<Vec<Company>, String>> + Send;

    fn list_all_symbols(&self) -> impl Future<Output = Result<Vec<Company>, String>> + Send;

    /// Append-only batch insert; one batch commits or fails as a whole.
    fn insert_snapshots(
        &self,
        snapshots: &[PriceSnapshot],
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// The maximal-`created_at` snapshot per requested symbol.
    fn latest_snapshots_for(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = Result<Vec<PriceSnapshot>, String>> + Send;

    /// Enabled companies' latest snapshots ranked by delta descending,
    /// name ascending on ties.
    fn top_by_delta(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CompanyDelta>, String>> + Send;

    /// Enabled companies' latest snapshots ranked by traded volume
    /// (falling back to previous volume) descending, name ascending on
    /// ties; rows with neither volume field are excluded.
    fn top_by_volume(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CompanyVolume>, String>> + Send;
}

impl<S: SnapshotStore> SnapshotStore for Arc<S> {
    fn upsert_symbols(
        &self,
        companies: &[CompanyStatus],
    ) -> impl Future<Output = Result<(), String>> + Send {
        (**self).upsert_symbols(companies)
    }

    fn list_active_symbols(&self) -> impl Future<Output = Result<Vec<Company>, String>> + Send {
        (**self).list_active_symbols()
    }

    fn list_all_symbols(&self) -> impl Future<Output = Result<Vec<Company>, String>> + Send {
        (**self).list_all_symbols()
    }

    fn insert_snapshots(
        &self,
        snapshots: &[PriceSnapshot],
    ) -> impl Future<Output = Result<(), String>> + Send {
        (**self).insert_snapshots(snapshots)
    }

    fn latest_snapshots_for(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = Result<Vec<PriceSnapshot>, String>> + Send {
        (**self).latest_snapshots_for(symbols)
    }

    fn top_by_delta(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CompanyDelta>, String>> + Send {
        (**self).top_by_delta(limit)
    }

    fn top_by_volume(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CompanyVolume>, String>> + Send {
        (**self).top_by_volume(limit)
    }
}
