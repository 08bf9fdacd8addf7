//! Core types shared by the analytics, repair and pipeline stages

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Price type (using f64 for precision)
pub type Price = f64;

/// One strike's observation for an underlying/expiry pair.
///
/// Every numeric field may be absent; absence is encoded as NaN, which is
/// the normal state of the computed columns before enrichment or repair.
/// Field order matches the on-disk column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainRow {
    #[serde(rename = "Strike Price", default = "missing", deserialize_with = "deserialize_missing")]
    pub strike_price: Price,
    #[serde(rename = "CALL_LTP", default = "missing", deserialize_with = "deserialize_missing")]
    pub call_ltp: Price,
    #[serde(rename = "PUT_LTP", default = "missing", deserialize_with = "deserialize_missing")]
    pub put_ltp: Price,
    #[serde(rename = "GAMMA_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub gamma_call: f64,
    #[serde(rename = "GAMMA_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub gamma_put: f64,
    #[serde(rename = "IV_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub iv_call: f64,
    #[serde(rename = "IV_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub iv_put: f64,
    #[serde(rename = "VOLUME_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub volume_call: f64,
    #[serde(rename = "VOLUME_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub volume_put: f64,
    #[serde(rename = "DELTA_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub delta_call: f64,
    #[serde(rename = "DELTA_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub delta_put: f64,
    #[serde(rename = "THETA_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub theta_call: f64,
    #[serde(rename = "THETA_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub theta_put: f64,
    #[serde(rename = "RHO_CALL", default = "missing", deserialize_with = "deserialize_missing")]
    pub rho_call: f64,
    #[serde(rename = "RHO_PUT", default = "missing", deserialize_with = "deserialize_missing")]
    pub rho_put: f64,
    #[serde(rename = "Underlying LTP", default = "missing", deserialize_with = "deserialize_missing")]
    pub underlying_ltp: Price,
    #[serde(rename = "CALL_OPEN_INTEREST", default = "missing", deserialize_with = "deserialize_missing")]
    pub call_open_interest: f64,
    #[serde(rename = "PUT_OPEN_INTEREST", default = "missing", deserialize_with = "deserialize_missing")]
    pub put_open_interest: f64,
    #[serde(rename = "Days to Expiry", default = "missing", deserialize_with = "deserialize_missing")]
    pub days_to_expiry: f64,
    #[serde(rename = "Vega_Call", default = "missing", deserialize_with = "deserialize_missing")]
    pub vega_call: f64,
    #[serde(rename = "Vega_Put", default = "missing", deserialize_with = "deserialize_missing")]
    pub vega_put: f64,
}

/// Column headers in on-disk order
pub const COLUMNS: [&str; 21] = [
    "Strike Price",
    "CALL_LTP",
    "PUT_LTP",
    "GAMMA_CALL",
    "GAMMA_PUT",
    "IV_CALL",
    "IV_PUT",
    "VOLUME_CALL",
    "VOLUME_PUT",
    "DELTA_CALL",
    "DELTA_PUT",
    "THETA_CALL",
    "THETA_PUT",
    "RHO_CALL",
    "RHO_PUT",
    "Underlying LTP",
    "CALL_OPEN_INTEREST",
    "PUT_OPEN_INTEREST",
    "Days to Expiry",
    "Vega_Call",
    "Vega_Put",
];

fn missing() -> f64 {
    f64::NAN
}

/// Empty cells, `NaN` and `-` all decode as a missing value
fn deserialize_missing<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("-") => Ok(f64::NAN),
        Some(s) if s.eq_ignore_ascii_case("nan") => Ok(f64::NAN),
        Some(s) => s
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

/// Whether a numeric field holds no value
#[inline]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

impl Default for OptionChainRow {
    fn default() -> Self {
        Self {
            strike_price: f64::NAN,
            call_ltp: f64::NAN,
            put_ltp: f64::NAN,
            gamma_call: f64::NAN,
            gamma_put: f64::NAN,
            iv_call: f64::NAN,
            iv_put: f64::NAN,
            volume_call: f64::NAN,
            volume_put: f64::NAN,
            delta_call: f64::NAN,
            delta_put: f64::NAN,
            theta_call: f64::NAN,
            theta_put: f64::NAN,
            rho_call: f64::NAN,
            rho_put: f64::NAN,
            underlying_ltp: f64::NAN,
            call_open_interest: f64::NAN,
            put_open_interest: f64::NAN,
            days_to_expiry: f64::NAN,
            vega_call: f64::NAN,
            vega_put: f64::NAN,
        }
    }
}

impl OptionChainRow {
    /// Create a freshly ingested row: market observables only, analytics unset
    pub fn quote(
        strike_price: Price,
        call_ltp: Price,
        put_ltp: Price,
        underlying_ltp: Price,
        days_to_expiry: f64,
    ) -> Self {
        Self {
            strike_price,
            call_ltp,
            put_ltp,
            underlying_ltp,
            days_to_expiry,
            ..Self::default()
        }
    }

    /// Observed market price for one side
    pub fn market_price(&self, side: OptionSide) -> Price {
        match side {
            OptionSide::Call => self.call_ltp,
            OptionSide::Put => self.put_ltp,
        }
    }

    /// Write one side's analytics back into the row.
    ///
    /// Rho and the market observables are left as they are.
    pub fn set_analytics(&mut self, side: OptionSide, analytics: &SideAnalytics) {
        match side {
            OptionSide::Call => {
                self.iv_call = analytics.implied_vol;
                self.delta_call = analytics.delta;
                self.gamma_call = analytics.gamma;
                self.vega_call = analytics.vega;
                self.theta_call = analytics.theta;
            }
            OptionSide::Put => {
                self.iv_put = analytics.implied_vol;
                self.delta_put = analytics.delta;
                self.gamma_put = analytics.gamma;
                self.vega_put = analytics.vega;
                self.theta_put = analytics.theta;
            }
        }
    }

    /// Whether the strike lies within `window` of this row's underlying price
    pub fn in_strike_window(&self, window: f64) -> bool {
        self.strike_within(window, self.underlying_ltp)
    }

    /// Whether the strike lies within `window` of `underlying`. A missing
    /// underlying places every strike outside.
    pub fn strike_within(&self, window: f64, underlying: f64) -> bool {
        self.strike_price >= underlying - window && self.strike_price <= underlying + window
    }
}

/// Call or put side of a strike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    pub const BOTH: [OptionSide; 2] = [OptionSide::Call, OptionSide::Put];

    pub fn is_call(self) -> bool {
        matches!(self, OptionSide::Call)
    }
}

/// Implied volatility and sensitivities computed for one side of a row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideAnalytics {
    pub implied_vol: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
}

/// Unit of concurrent work: one file's path and its loaded rows
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub path: PathBuf,
    pub rows: Vec<OptionChainRow>,
    /// Set when the load stopped early; such items are never written back
    pub partial: bool,
}

impl WorkItem {
    pub fn new(path: PathBuf, rows: Vec<OptionChainRow>) -> Self {
        Self {
            path,
            rows,
            partial: false,
        }
    }

    pub fn partial(path: PathBuf, rows: Vec<OptionChainRow>) -> Self {
        Self {
            path,
            rows,
            partial: true,
        }
    }
}

/// A file judged unsalvageable by the repair pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSignal {
    pub path: PathBuf,
}

impl DeletionSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory grouping this file with its underlying's other snapshots
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }
}
