use parking_lot::Mutex;
use stockpulse_domain::repositories::snapshot_store::SnapshotStore;
use stockpulse_domain::value_objects::company::{Company, CompanyStatus};
use stockpulse_domain::value_objects::snapshot::{CompanyDelta, CompanyVolume, PriceSnapshot};

/// In-memory snapshot store with the same latest-row-per-symbol and
/// ranking semantics as the Postgres adapter. Backs the test suites
/// across the workspace.
#[derive(Default)]
pub struct MemorySnapshotStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    companies: Vec<Company>,
    snapshots: Vec<PriceSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn upsert_symbols(&self, companies: &[CompanyStatus]) -> Result<(), String> {
        let mut state = self.state.lock();
        for status in companies {
            match state
                .companies
                .iter()
                .position(|company| company.symbol == status.symbol)
            {
                // Conflict updates only the enabled flag; the row id and
                // the first-inserted name are retained.
                Some(idx) => state.companies[idx].enabled = status.enabled,
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.companies.push(Company {
                        id,
                        name: status.name.clone(),
                        symbol: status.symbol.clone(),
                        enabled: status.enabled,
                    });
                }
            }
        }
        Ok(())
    }

    async fn list_active_symbols(&self) -> Result<Vec<Company>, String> {
        let state = self.state.lock();
        Ok(state
            .companies
            .iter()
            .filter(|company| company.enabled)
            .cloned()
            .collect())
    }

    async fn list_all_symbols(&self) -> Result<Vec<Company>, String> {
        Ok(self.state.lock().companies.clone())
    }

    async fn insert_snapshots(&self, snapshots: &[PriceSnapshot]) -> Result<(), String> {
        self.state.lock().snapshots.extend_from_slice(snapshots);
        Ok(())
    }

    async fn latest_snapshots_for(&self, symbols: &[String]) -> Result<Vec<PriceSnapshot>, String> {
        let state = self.state.lock();
        Ok(symbols
            .iter()
            .filter_map(|symbol| latest_for(&state.snapshots, symbol).cloned())
            .collect())
    }

    async fn top_by_delta(&self, limit: usize) -> Result<Vec<CompanyDelta>, String> {
        let state = self.state.lock();
        let mut rows: Vec<CompanyDelta> = state
            .companies
            .iter()
            .filter(|company| company.enabled)
            .filter_map(|company| {
                let snapshot = latest_for(&state.snapshots, &company.symbol)?;
                Some(CompanyDelta {
                    name: company.name.clone(),
                    delta: snapshot.delta,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.delta.total_cmp(&a.delta).then_with(|| a.name.cmp(&b.name)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn top_by_volume(&self, limit: usize) -> Result<Vec<CompanyVolume>, String> {
        let state = self.state.lock();
        let mut rows: Vec<CompanyVolume> = state
            .companies
            .iter()
            .filter(|company| company.enabled)
            .filter_map(|company| {
                let snapshot = latest_for(&state.snapshots, &company.symbol)?;
                let volume = snapshot.effective_volume()?;
                Some(CompanyVolume {
                    name: company.name.clone(),
                    volume,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.volume
                .total_cmp(&a.volume)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

fn latest_for<'a>(snapshots: &'a [PriceSnapshot], symbol: &str) -> Option<&'a PriceSnapshot> {
    snapshots
        .iter()
        .filter(|snapshot| snapshot.symbol == symbol)
        .max_by_key(|snapshot| snapshot.created_at)
}

#[cfg(test)]
mod tests {
    use super::MemorySnapshotStore;
    use chrono::{DateTime, TimeZone, Utc};
    use stockpulse_domain::repositories::snapshot_store::SnapshotStore;
    use stockpulse_domain::value_objects::company::CompanyStatus;
    use stockpulse_domain::value_objects::snapshot::{CompanyDelta, CompanyVolume, PriceSnapshot};

    fn status(name: &str, symbol: &str, enabled: bool) -> CompanyStatus {
        CompanyStatus {
            name: name.to_string(),
            symbol: symbol.to_string(),
            enabled,
        }
    }

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn snapshot(
        symbol: &str,
        delta: f64,
        volume: Option<f64>,
        previous_volume: Option<f64>,
        created_at: DateTime<Utc>,
    ) -> PriceSnapshot {
        PriceSnapshot {
            symbol: symbol.to_string(),
            latest_price: Some(10.0),
            change: None,
            previous_volume,
            previous_close: None,
            volume,
            delta,
            created_at,
        }
    }

    #[tokio::test]
    async fn active_listing_excludes_disabled_companies() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[
                status("First", "A", true),
                status("Second", "B", true),
                status("Third", "C", false),
            ])
            .await
            .expect("upsert");

        assert_eq!(store.list_active_symbols().await.expect("active").len(), 2);
        assert_eq!(store.list_all_symbols().await.expect("all").len(), 3);
    }

    #[tokio::test]
    async fn upsert_keeps_row_id_and_name_and_flips_enabled() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[status("First", "A", false)])
            .await
            .expect("insert");
        let before = store.list_all_symbols().await.expect("all")[0].clone();
        assert!(!before.enabled);

        store
            .upsert_symbols(&[status("Renamed", "A", true)])
            .await
            .expect("update");
        let all = store.list_all_symbols().await.expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, before.id);
        assert_eq!(all[0].name, "First");
        assert!(all[0].enabled);
    }

    #[tokio::test]
    async fn largest_delta_ranks_latest_snapshots_under_the_limit() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[
                status("1", "A", true),
                status("2", "B", true),
                status("3", "C", true),
                status("ghost", "D", false),
            ])
            .await
            .expect("upsert");
        store
            .insert_snapshots(&[
                // A: the older row has the bigger delta; only the newer counts.
                snapshot("A", 10.0, Some(1.0), None, ts(-86_400)),
                snapshot("A", 5.0, Some(1.0), None, ts(0)),
                snapshot("B", 10.0, Some(1.0), None, ts(-86_400)),
                snapshot("C", -50.0, Some(1.0), None, ts(0)),
                // Disabled company, largest delta of all; never ranked.
                snapshot("D", 99.0, Some(1.0), None, ts(0)),
            ])
            .await
            .expect("insert");

        let ranked = store.top_by_delta(2).await.expect("rank");
        assert_eq!(
            ranked,
            vec![
                CompanyDelta {
                    name: "2".to_string(),
                    delta: 10.0
                },
                CompanyDelta {
                    name: "1".to_string(),
                    delta: 5.0
                },
            ]
        );
    }

    #[tokio::test]
    async fn largest_volume_coalesces_and_breaks_ties_by_name() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[
                status("1", "A", true),
                status("2", "B", true),
                status("3", "C", true),
                status("4", "D", true),
                status("5", "E", true),
            ])
            .await
            .expect("upsert");
        store
            .insert_snapshots(&[
                snapshot("A", 0.0, Some(100.0), None, ts(-86_400)),
                snapshot("A", 0.0, Some(50.0), None, ts(0)),
                snapshot("B", 0.0, Some(49.0), None, ts(-86_400)),
                snapshot("C", 0.0, Some(60.0), None, ts(0)),
                // D has no traded volume; its previous volume ties with A.
                snapshot("D", 0.0, None, Some(50.0), ts(-86_400)),
                // E ranks last and falls off the limit.
                snapshot("E", 0.0, None, Some(40.0), ts(0)),
            ])
            .await
            .expect("insert");

        let ranked = store.top_by_volume(4).await.expect("rank");
        assert_eq!(
            ranked,
            vec![
                CompanyVolume {
                    name: "3".to_string(),
                    volume: 60.0
                },
                CompanyVolume {
                    name: "1".to_string(),
                    volume: 50.0
                },
                CompanyVolume {
                    name: "4".to_string(),
                    volume: 50.0
                },
                CompanyVolume {
                    name: "2".to_string(),
                    volume: 49.0
                },
            ]
        );
    }

    #[tokio::test]
    async fn volume_ranking_excludes_rows_with_no_volume_at_all() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[status("1", "A", true), status("2", "B", true)])
            .await
            .expect("upsert");
        store
            .insert_snapshots(&[
                snapshot("A", 0.0, None, None, ts(0)),
                snapshot("B", 0.0, Some(10.0), None, ts(0)),
            ])
            .await
            .expect("insert");

        let ranked = store.top_by_volume(5).await.expect("rank");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "2");
    }

    #[tokio::test]
    async fn latest_snapshots_for_picks_the_maximum_created_at() {
        let store = MemorySnapshotStore::new();
        store
            .upsert_symbols(&[status("1", "A", true)])
            .await
            .expect("upsert");
        store
            .insert_snapshots(&[
                snapshot("A", 1.0, Some(1.0), None, ts(-86_400)),
                snapshot("A", 2.0, Some(2.0), None, ts(0)),
            ])
            .await
            .expect("insert");

        let latest = store
            .latest_snapshots_for(&["A".to_string()])
            .await
            .expect("latest");
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].created_at, ts(0));
        assert_eq!(latest[0].delta, 2.0);
    }

    #[tokio::test]
    async fn latest_snapshots_for_empty_input_is_empty() {
        let store = MemorySnapshotStore::new();
        let latest = store.latest_snapshots_for(&[]).await.expect("latest");
        assert!(latest.is_empty());
    }
}
