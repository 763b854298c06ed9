//! Technical indicator readings
//!
//! The technical tool reports the latest SMA50, SMA200, RSI and MACD values,
//! either as a JSON object or as text such as
//! `Technical analysis for AAPL: {'SMA50': 203.65, 'RSI': 74.8, ...}`.
//! [`Indicators::parse`] accepts both and [`interpret`] turns them into
//! bullish/bearish readings and a category.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use verdict_core::VerdictCategory;

/// `None` only if the pattern fails to compile
static INDICATOR_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"['"]?\b(SMA50|SMA200|RSI|MACD_signal|MACD_hist|MACD)['"]?\s*[:=]\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)"#,
    )
    .ok()
});

/// RSI above this level is overbought
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// RSI below this level is oversold
pub const RSI_OVERSOLD: f64 = 30.0;

/// Latest indicator values; absent or non-numeric readings are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
}

impl Indicators {
    /// Extract indicator values from tool text
    pub fn parse(text: &str) -> Self {
        let mut indicators = Self::default();
        let Some(pattern) = INDICATOR_PATTERN.as_ref() else {
            tracing::error!("Indicator pattern failed to compile, no readings parsed");
            return indicators;
        };

        for captures in pattern.captures_iter(text) {
            let Ok(value) = captures[2].parse::<f64>() else {
                continue;
            };
            indicators.set(&captures[1], value);
        }
        indicators
    }

    /// Extract indicator values from a tool payload
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let mut indicators = Self::default();
                for (key, value) in map {
                    if let Some(number) = value.as_f64().filter(|n| n.is_finite()) {
                        indicators.set(key, number);
                    }
                }
                indicators
            }
            Value::String(text) => Self::parse(text),
            _ => Self::default(),
        }
    }

    fn set(&mut self, key: &str, value: f64) {
        let slot = match key {
            "SMA50" => &mut self.sma50,
            "SMA200" => &mut self.sma200,
            "RSI" => &mut self.rsi,
            "MACD" => &mut self.macd,
            "MACD_signal" => &mut self.macd_signal,
            "MACD_hist" => &mut self.macd_hist,
            _ => return,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Direction an indicator points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn score(self) -> i32 {
        match self {
            Signal::Bullish => 1,
            Signal::Bearish => -1,
            Signal::Neutral => 0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Bullish => f.write_str("bullish"),
            Signal::Bearish => f.write_str("bearish"),
            Signal::Neutral => f.write_str("neutral"),
        }
    }
}

/// One interpreted indicator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub indicator: &'static str,
    pub signal: Signal,
    pub detail: String,
}

/// Readings and the category they add up to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    pub readings: Vec<Reading>,
    pub score: i32,
    pub category: VerdictCategory,
}

/// Interpret the available indicators
///
/// Returns `None` when none of the trend, momentum or MACD readings can be
/// derived.
pub fn interpret(indicators: &Indicators) -> Option<Interpretation> {
    let mut readings = Vec::new();

    if let (Some(sma50), Some(sma200)) = (indicators.sma50, indicators.sma200) {
        let (signal, label) = if sma50 > sma200 {
            (Signal::Bullish, "golden cross")
        } else if sma50 < sma200 {
            (Signal::Bearish, "death cross")
        } else {
            (Signal::Neutral, "no cross")
        };
        readings.push(Reading {
            indicator: "SMA50/SMA200",
            signal,
            detail: format!("SMA50 {sma50:.2} vs SMA200 {sma200:.2}: {label}"),
        });
    }

    if let Some(rsi) = indicators.rsi {
        let (signal, label) = if rsi > RSI_OVERBOUGHT {
            (Signal::Bearish, "overbought")
        } else if rsi < RSI_OVERSOLD {
            (Signal::Bullish, "oversold")
        } else {
            (Signal::Neutral, "neutral range")
        };
        readings.push(Reading {
            indicator: "RSI",
            signal,
            detail: format!("RSI {rsi:.2}: {label}"),
        });
    }

    if let Some(macd) = indicators.macd {
        let (signal, detail) = match indicators.macd_signal {
            Some(line) if macd > line => (
                Signal::Bullish,
                format!("MACD {macd:.2} above signal {line:.2}: bullish momentum"),
            ),
            Some(line) if macd < line => (
                Signal::Bearish,
                format!("MACD {macd:.2} below signal {line:.2}: bearish momentum"),
            ),
            Some(line) => (
                Signal::Neutral,
                format!("MACD {macd:.2} on its signal {line:.2}"),
            ),
            None if macd > 0.0 => (
                Signal::Bullish,
                format!("MACD {macd:.2} above zero: bullish momentum"),
            ),
            None if macd < 0.0 => (
                Signal::Bearish,
                format!("MACD {macd:.2} below zero: bearish momentum"),
            ),
            None => (Signal::Neutral, format!("MACD {macd:.2} at zero")),
        };
        readings.push(Reading {
            indicator: "MACD",
            signal,
            detail,
        });
    }

    if readings.is_empty() {
        return None;
    }

    let score = readings.iter().map(|reading| reading.signal.score()).sum();
    Some(Interpretation {
        readings,
        score,
        category: VerdictCategory::from_score(score),
    })
}
