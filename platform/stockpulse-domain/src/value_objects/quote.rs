use crate::value_objects::snapshot::ComparableQuote;
use serde::{Deserialize, Serialize};

/// Quote payload returned by the upstream feed for one symbol. Every
/// numeric field may be absent; absence is data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyQuote {
    pub symbol: String,
    pub company_name: Option<String>,
    pub latest_price: Option<f64>,
    pub change: Option<f64>,
    pub previous_volume: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
}

impl CompanyQuote {
    pub fn comparable(&self) -> ComparableQuote {
        ComparableQuote {
            latest_price: self.latest_price,
            change: self.change,
            previous_volume: self.previous_volume,
            previous_close: self.previous_close,
            volume: self.volume,
        }
    }
}
