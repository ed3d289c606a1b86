//! Yahoo Finance chart API response models.
//!
//! Only the `meta` block of the chart response is used; the OHLC series is
//! ignored.

use serde::Deserialize;

/// Top-level wrapper of `/v8/finance/chart/{symbol}`
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooChartError>,
}

/// Error object, e.g. `{"code": "Not Found", "description": "No data found, symbol may be delisted"}`
#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
}

impl YahooChartMeta {
    /// Reference close for the change computation.
    pub fn reference_close(&self) -> Option<f64> {
        self.chart_previous_close.or(self.previous_close)
    }
}
