use crate::services::delta::compute_delta;
use crate::value_objects::quote::CompanyQuote;
use crate::value_objects::snapshot::PriceSnapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Diffs freshly fetched quotes against the latest stored snapshot per
/// symbol and returns the snapshots that must be written.
///
/// A quote whose comparable fields equal the previous snapshot's is
/// skipped entirely. Everything else becomes a snapshot candidate with
/// a delta computed from the previous latest price and a `created_at`
/// of `observed_at`. Re-running the same batch against the state it
/// produced emits nothing.
pub fn changed_snapshots(
    quotes: &[CompanyQuote],
    previous: &[PriceSnapshot],
    observed_at: DateTime<Utc>,
) -> Vec<PriceSnapshot> {
    let previous_by_symbol: HashMap<&str, &PriceSnapshot> = previous
        .iter()
        .map(|snapshot| (snapshot.symbol.as_str(), snapshot))
        .collect();

    quotes
        .iter()
        .filter_map(|quote| {
            let last = previous_by_symbol.get(quote.symbol.as_str()).copied();
            if last.is_some_and(|last| last.comparable() == quote.comparable()) {
                return None;
            }
            let delta = compute_delta(last.and_then(|l| l.latest_price), quote.latest_price);
            Some(PriceSnapshot {
                symbol: quote.symbol.clone(),
                latest_price: quote.latest_price,
                change: quote.change,
                previous_volume: quote.previous_volume,
                previous_close: quote.previous_close,
                volume: quote.volume,
                delta,
                created_at: observed_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::changed_snapshots;
    use crate::value_objects::quote::CompanyQuote;
    use crate::value_objects::snapshot::PriceSnapshot;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).single().expect("valid timestamp")
    }

    fn quote(symbol: &str, latest_price: Option<f64>) -> CompanyQuote {
        CompanyQuote {
            symbol: symbol.to_string(),
            company_name: Some(format!("{symbol} Inc")),
            latest_price,
            change: Some(1.0),
            previous_volume: Some(2.0),
            previous_close: Some(3.0),
            volume: Some(4.0),
        }
    }

    fn snapshot_of(quote: &CompanyQuote, delta: f64, created_at: DateTime<Utc>) -> PriceSnapshot {
        PriceSnapshot {
            symbol: quote.symbol.clone(),
            latest_price: quote.latest_price,
            change: quote.change,
            previous_volume: quote.previous_volume,
            previous_close: quote.previous_close,
            volume: quote.volume,
            delta,
            created_at,
        }
    }

    #[test]
    fn first_observation_is_written_with_zero_delta() {
        let quotes = vec![quote("AAPL", Some(50.0))];
        let written = changed_snapshots(&quotes, &[], ts(0));
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].symbol, "AAPL");
        assert_eq!(written[0].delta, 0.0);
        assert_eq!(written[0].created_at, ts(0));
    }

    #[test]
    fn unchanged_quote_is_skipped() {
        let quotes = vec![quote("AAPL", Some(50.0))];
        let previous = vec![snapshot_of(&quotes[0], 12.5, ts(-60))];
        assert!(changed_snapshots(&quotes, &previous, ts(0)).is_empty());
    }

    #[test]
    fn delta_uses_previous_latest_price_as_baseline() {
        let previous = vec![snapshot_of(&quote("AAPL", Some(50.0)), 0.0, ts(-60))];
        let quotes = vec![quote("AAPL", Some(75.0))];
        let written = changed_snapshots(&quotes, &previous, ts(0));
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].delta, 50.0);
    }

    #[test]
    fn any_single_field_change_triggers_a_write() {
        let base = quote("AAPL", Some(50.0));
        let previous = vec![snapshot_of(&base, 0.0, ts(-60))];

        let mutations: Vec<fn(&mut CompanyQuote)> = vec![
            |q| q.latest_price = Some(51.0),
            |q| q.change = Some(9.0),
            |q| q.previous_volume = Some(9.0),
            |q| q.previous_close = Some(9.0),
            |q| q.volume = Some(9.0),
            |q| q.volume = None,
        ];
        for mutate in mutations {
            let mut changed = base.clone();
            mutate(&mut changed);
            let written = changed_snapshots(&[changed], &previous, ts(0));
            assert_eq!(written.len(), 1);
        }
    }

    #[test]
    fn company_name_alone_does_not_trigger_a_write() {
        let base = quote("AAPL", Some(50.0));
        let previous = vec![snapshot_of(&base, 0.0, ts(-60))];
        let mut renamed = base.clone();
        renamed.company_name = Some("Apple Computer".to_string());
        assert!(changed_snapshots(&[renamed], &previous, ts(0)).is_empty());
    }

    #[test]
    fn second_pass_against_written_state_is_idempotent() {
        let quotes = vec![quote("AAPL", Some(50.0)), quote("MSFT", Some(30.0))];
        let first = changed_snapshots(&quotes, &[], ts(0));
        assert_eq!(first.len(), 2);
        assert!(changed_snapshots(&quotes, &first, ts(60)).is_empty());
    }

    #[test]
    fn only_changed_symbols_are_written() {
        let apple = quote("AAPL", Some(50.0));
        let microsoft = quote("MSFT", Some(30.0));
        let previous = vec![
            snapshot_of(&apple, 0.0, ts(-60)),
            snapshot_of(&microsoft, 0.0, ts(-60)),
        ];
        let quotes = vec![quote("AAPL", Some(100.0)), microsoft];
        let written = changed_snapshots(&quotes, &previous, ts(0));
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].symbol, "AAPL");
        assert_eq!(written[0].delta, 100.0);
    }

    #[test]
    fn missing_baseline_price_degrades_delta_to_zero() {
        let previous = vec![snapshot_of(&quote("AAPL", None), 0.0, ts(-60))];
        let quotes = vec![quote("AAPL", Some(75.0))];
        let written = changed_snapshots(&quotes, &previous, ts(0));
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].delta, 0.0);
    }
}
