//! Threshold-based macro regime labels.
//!
//! Labels are computed on the forward-filled pivot (one row per reporting
//! date), then spread onto every calendar day by forward-filling the labels
//! themselves, and finally melted into `(date, regime_type, regime_label)` rows.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::matrix::{expand_forward_filled, DailyIndicatorMatrix};
use crate::error::PipelineError;
use crate::models::{
    IndicatorObservation, RegimeLabel, RegimeRecord, RegimeType, CONSUMER_SENTIMENT, CPI,
    FED_FUNDS_RATE, GDP_GROWTH,
};

pub const GROWTH_RECESSION_BELOW: f64 = 0.0;
pub const GROWTH_EXPANSION_ABOVE: f64 = 1.5;
pub const SENTIMENT_BEARISH_BELOW: f64 = 70.0;
pub const SENTIMENT_BULLISH_ABOVE: f64 = 90.0;
pub const INFLATION_HIGH_ABOVE: f64 = 0.03;
pub const INFLATION_PERIODS: usize = 12;

pub fn classify_growth(gdp_growth: f64) -> RegimeLabel {
    if gdp_growth < GROWTH_RECESSION_BELOW {
        RegimeLabel::Recession
    } else if gdp_growth > GROWTH_EXPANSION_ABOVE {
        RegimeLabel::Expansion
    } else {
        RegimeLabel::Neutral
    }
}

/// Based on the change in the policy rate, not its level
pub fn classify_policy(rate_change: f64) -> RegimeLabel {
    if rate_change > 0.0 {
        RegimeLabel::Tightening
    } else if rate_change < 0.0 {
        RegimeLabel::Easing
    } else {
        RegimeLabel::Neutral
    }
}

pub fn classify_yield_curve(spread: f64) -> RegimeLabel {
    if spread < 0.0 {
        RegimeLabel::Inverted
    } else {
        RegimeLabel::Normal
    }
}

pub fn classify_sentiment(sentiment: f64) -> RegimeLabel {
    if sentiment < SENTIMENT_BEARISH_BELOW {
        RegimeLabel::Bearish
    } else if sentiment > SENTIMENT_BULLISH_ABOVE {
        RegimeLabel::Bullish
    } else {
        RegimeLabel::Neutral
    }
}

pub fn classify_inflation(price_change: f64) -> RegimeLabel {
    if price_change > INFLATION_HIGH_ABOVE {
        RegimeLabel::High
    } else {
        RegimeLabel::Normal
    }
}

/// Row-over-row difference; the first row has none
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            Some(values[i]? - values[i - 1]?)
        })
        .collect()
}

/// Fractional change over `periods` rows
pub fn pct_change(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < periods {
                return None;
            }
            let current = values[i]?;
            let previous = values[i - periods]?;
            if previous == 0.0 {
                return None;
            }
            Some(current / previous - 1.0)
        })
        .collect()
}

fn label_all(inputs: &[Option<f64>], classify: fn(f64) -> RegimeLabel) -> Vec<Option<RegimeLabel>> {
    inputs
        .iter()
        .map(|v| v.filter(|x| x.is_finite()).map(classify))
        .collect()
}

/// Regime labels per date
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeFrame {
    dates: Vec<NaiveDate>,
    labels: BTreeMap<RegimeType, Vec<Option<RegimeLabel>>>,
}

impl RegimeFrame {
    /// Label every row of an already forward-filled matrix.
    /// Any indicator the five regimes depend on must be present.
    pub fn from_matrix(matrix: &DailyIndicatorMatrix) -> Result<Self, PipelineError> {
        let spread = matrix.yield_spread()?;
        let growth = matrix.column(GDP_GROWTH)?;
        let policy_rate = matrix.column(FED_FUNDS_RATE)?;
        let sentiment = matrix.column(CONSUMER_SENTIMENT)?;
        let prices = matrix.column(CPI)?;

        let mut labels = BTreeMap::new();
        labels.insert(RegimeType::Growth, label_all(growth, classify_growth));
        labels.insert(RegimeType::Policy, label_all(&diff(policy_rate), classify_policy));
        labels.insert(RegimeType::YieldCurve, label_all(&spread, classify_yield_curve));
        labels.insert(RegimeType::Sentiment, label_all(sentiment, classify_sentiment));
        labels.insert(
            RegimeType::Inflation,
            label_all(&pct_change(prices, INFLATION_PERIODS), classify_inflation),
        );

        Ok(Self {
            dates: matrix.dates().to_vec(),
            labels,
        })
    }

    /// Spread labels onto every calendar day between the first and last date
    pub fn expand_to_calendar(&self) -> Self {
        let calendar = match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => crate::utils::calendar_days(*first, *last),
            _ => Vec::new(),
        };
        let labels = self
            .labels
            .iter()
            .map(|(regime, values)| (*regime, expand_forward_filled(&self.dates, values, &calendar)))
            .collect();
        Self {
            dates: calendar,
            labels,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn labels(&self, regime: RegimeType) -> &[Option<RegimeLabel>] {
        self.labels.get(&regime).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One row per (date, regime type), grouped by regime type
    pub fn to_long_form(&self) -> Vec<RegimeRecord> {
        let mut records = Vec::with_capacity(self.dates.len() * RegimeType::ALL.len());
        for regime in RegimeType::ALL {
            let labels = self.labels(regime);
            for (i, date) in self.dates.iter().enumerate() {
                records.push(RegimeRecord {
                    date: *date,
                    regime_type: regime,
                    regime_label: labels.get(i).copied().flatten(),
                });
            }
        }
        records
    }
}

/// Full derivation: pivot, forward-fill, label, calendar expansion, melt
pub fn derive_market_regimes(observations: &[IndicatorObservation]) -> Result<Vec<RegimeRecord>, PipelineError> {
    let mut matrix = DailyIndicatorMatrix::pivot(observations)?;
    matrix.forward_fill();
    let frame = RegimeFrame::from_matrix(&matrix)?;
    Ok(frame.expand_to_calendar().to_long_form())
}
