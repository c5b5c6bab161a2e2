use crate::value_objects::company::CompanyStatus;
use crate::value_objects::quote::CompanyQuote;
use std::future::Future;

/// Upstream market-data feed.
///
/// Transient-failure retry is the adapter's concern; an error returned
/// here is final for the current attempt.
pub trait QuoteSource {
    /// The full symbol universe with enabled flags.
    fn fetch_symbol_universe(
        &self,
    ) -> impl Future<Output = Result<Vec<CompanyStatus>, String>> + Send;

    /// The current quote for one symbol. One symbol failing must not
    /// affect the rest of a batch; callers isolate errors per symbol.
    fn fetch_quote(
        &self,
        symbol: &str,
    ) -> impl Future<Output = Result<CompanyQuote, String>> + Send;
}
