use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{OntoscopeError, Result};

pub const PERIOD_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Day,
    Week,
}

impl PeriodType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }

    pub const fn length_days(self) -> u64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = OntoscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            other => Err(OntoscopeError::Validation(format!(
                "unsupported period type: {other}"
            ))),
        }
    }
}

/// A single observation bucket: start date plus bucket length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub period_type: PeriodType,
}

impl Period {
    pub const fn new(start: NaiveDate, period_type: PeriodType) -> Self {
        Self { start, period_type }
    }

    pub fn parse(start: &str, period_type: &str) -> Result<Self> {
        let start = parse_period_date(start)?;
        Ok(Self::new(start, period_type.parse()?))
    }

    /// Start of the bucket immediately before this one.
    #[must_use]
    pub fn previous(self) -> Self {
        Self::new(step_back(self.start, self.period_type), self.period_type)
    }

    /// Exclusive end date of the bucket.
    #[must_use]
    pub fn end(self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(self.period_type.length_days()))
            .unwrap_or(NaiveDate::MAX)
    }

    #[must_use]
    pub fn start_key(self) -> String {
        format_period_date(self.start)
    }

    #[must_use]
    pub fn label(self) -> String {
        let suffix = match self.period_type {
            PeriodType::Day => "daily report",
            PeriodType::Week => "weekly report",
        };
        format!("{} {suffix}", self.start_key())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start_key(), self.period_type)
    }
}

#[must_use]
pub fn step_back(start: NaiveDate, period_type: PeriodType) -> NaiveDate {
    start
        .checked_sub_days(Days::new(period_type.length_days()))
        .unwrap_or(NaiveDate::MIN)
}

/// Bucket start containing `today`: the ISO Monday for weeks, the date itself for days.
#[must_use]
pub fn current_period_start(today: NaiveDate, period_type: PeriodType) -> NaiveDate {
    match period_type {
        PeriodType::Day => today,
        PeriodType::Week => {
            let offset = u64::from(today.weekday().num_days_from_monday());
            today
                .checked_sub_days(Days::new(offset))
                .unwrap_or(NaiveDate::MIN)
        }
    }
}

#[must_use]
pub fn format_period_date(date: NaiveDate) -> String {
    date.format(PERIOD_DATE_FORMAT).to_string()
}

pub fn parse_period_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), PERIOD_DATE_FORMAT).map_err(|err| {
        OntoscopeError::Validation(format!("invalid period date '{raw}': {err}"))
    })
}
