//! Report date-range queries.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Date format the portal's date controls and query parameters use.
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive date range requested from the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
    /// First day of the range.
    pub start: NaiveDate,
    /// Last day of the range.
    pub end: NaiveDate,
}

impl ReportQuery {
    /// Creates a query, rejecting ranges whose end precedes their start.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::InvalidConfig(format!(
                "report range ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    /// A single-day query.
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// A single-day query for `days_back` days before `today`.
    ///
    /// `days_back = 1` is the daily "yesterday to yesterday" report.
    pub fn days_before(today: NaiveDate, days_back: u64) -> Self {
        let day = today.checked_sub_days(Days::new(days_back)).unwrap_or(today);
        Self::single_day(day)
    }

    /// Start date formatted as `YYYY-MM-DD`.
    pub fn start_param(&self) -> String {
        self.start.format(QUERY_DATE_FORMAT).to_string()
    }

    /// End date formatted as `YYYY-MM-DD`.
    pub fn end_param(&self) -> String {
        self.end.format(QUERY_DATE_FORMAT).to_string()
    }

    /// The date a run is reported under (the end of the range).
    pub fn reporting_date(&self) -> NaiveDate {
        self.end
    }

    /// Partition key derived from the reporting date.
    pub fn partition_key(&self) -> String {
        self.end_param()
    }
}
