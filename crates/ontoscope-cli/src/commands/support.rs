use std::io::{self, Write};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use ontoscope_core::models::{Period, PeriodType, current_period_start};

pub(super) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Explicit start date, or the bucket containing today (UTC).
pub(super) fn resolve_period(start: Option<NaiveDate>, period_type: PeriodType) -> Period {
    let start =
        start.unwrap_or_else(|| current_period_start(Utc::now().date_naive(), period_type));
    Period::new(start, period_type)
}
