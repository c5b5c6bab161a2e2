use reqwest::StatusCode;
use std::time::Duration;
use stockpulse_domain::repositories::quote_source::QuoteSource;
use stockpulse_domain::value_objects::company::CompanyStatus;
use stockpulse_domain::value_objects::quote::CompanyQuote;

const RETRY_BASE_DELAY_MS: u64 = 250;
const RETRY_MAX_DELAY_MS: u64 = 5_000;

/// IEX-style REST quote feed. Every request carries the account token
/// as a query parameter; rate limits and transient transport failures
/// are retried with an exponential delay before an error surfaces.
#[derive(Debug)]
pub struct IexQuoteClient {
    base: reqwest::Url,
    token: String,
    retries: u32,
    client: reqwest::Client,
}

impl IexQuoteClient {
    pub fn new(base_url: &str, token: String, timeout_ms: u64, retries: u32) -> Result<Self, String> {
        let base = reqwest::Url::parse(base_url)
            .map_err(|err| format!("invalid api url {base_url}: {err}"))?;
        if base.cannot_be_a_base() {
            return Err(format!("invalid api url {base_url}: cannot carry a path"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base,
            token,
            retries,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base.clone();
        // new() rejects bases that cannot carry path segments.
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: reqwest::Url) -> Result<T, String> {
        let path = url.path().to_string();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let response = self
                .client
                .get(url.clone())
                .query(&[("token", self.token.as_str())])
                .send()
                .await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .map_err(|err| format!("failed to parse response from {path}: {err}"));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if should_retry_status(status) && attempts <= self.retries {
                        metrics::counter!("stockpulse.infra.iex.retries_total").increment(1);
                        tokio::time::sleep(retry_delay(attempts)).await;
                        continue;
                    }
                    metrics::counter!("stockpulse.infra.iex.errors_total").increment(1);
                    return Err(format!(
                        "http error from {path}: status {}",
                        status.as_u16()
                    ));
                }
                Err(err) => {
                    if should_retry_error(&err) && attempts <= self.retries {
                        metrics::counter!("stockpulse.infra.iex.retries_total").increment(1);
                        tokio::time::sleep(retry_delay(attempts)).await;
                        continue;
                    }
                    metrics::counter!("stockpulse.infra.iex.errors_total").increment(1);
                    return Err(format!("request to {path} failed: {err}"));
                }
            }
        }
    }
}

impl QuoteSource for IexQuoteClient {
    async fn fetch_symbol_universe(&self) -> Result<Vec<CompanyStatus>, String> {
        self.get_json(self.endpoint(&["v1", "data", "core", "ref_data_iex_symbols"]))
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<CompanyQuote, String> {
        let quotes: Vec<CompanyQuote> = self
            .get_json(self.endpoint(&["v1", "data", "core", "quote", symbol]))
            .await?;
        quotes
            .into_iter()
            .next()
            .ok_or_else(|| format!("empty quote response for {symbol}"))
    }
}

/// Rate limits and upstream hiccups are worth retrying; other client
/// errors are final.
fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1 << exponent);
    Duration::from_millis(delay_ms.min(RETRY_MAX_DELAY_MS))
}
