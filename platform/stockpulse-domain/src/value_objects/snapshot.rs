use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed quote for one company at one point in time. Snapshots
/// are append-only; the row with the maximum `created_at` per symbol is
/// that symbol's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub latest_price: Option<f64>,
    pub change: Option<f64>,
    pub previous_volume: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
    pub delta: f64,
    pub created_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn comparable(&self) -> ComparableQuote {
        ComparableQuote {
            latest_price: self.latest_price,
            change: self.change,
            previous_volume: self.previous_volume,
            previous_close: self.previous_close,
            volume: self.volume,
        }
    }

    /// Volume used for ranking: the traded volume, falling back to the
    /// previous session's volume when the feed omitted it.
    pub fn effective_volume(&self) -> Option<f64> {
        self.volume.or(self.previous_volume)
    }
}

/// The subset of snapshot fields that participates in change detection.
/// Delta and timestamp are deliberately excluded: two observations are
/// "unchanged" iff all five fields compare equal, absent included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparableQuote {
    pub latest_price: Option<f64>,
    pub change: Option<f64>,
    pub previous_volume: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyDelta {
    pub name: String,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyVolume {
    pub name: String,
    pub volume: f64,
}
