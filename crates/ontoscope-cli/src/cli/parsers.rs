use chrono::NaiveDate;
use ontoscope_core::models::{FactSeverity, PeriodType, parse_period_date};

pub(super) fn parse_period_date_arg(raw: &str) -> std::result::Result<NaiveDate, String> {
    parse_period_date(raw).map_err(|err| err.to_string())
}

pub(super) fn parse_period_type_arg(raw: &str) -> std::result::Result<PeriodType, String> {
    raw.parse::<PeriodType>().map_err(|err| err.to_string())
}

pub(super) fn parse_severity_arg(raw: &str) -> std::result::Result<FactSeverity, String> {
    raw.parse::<FactSeverity>().map_err(|err| err.to_string())
}

pub(super) fn parse_min_one_u64(raw: &str) -> std::result::Result<u64, String> {
    let value = raw
        .parse::<u64>()
        .map_err(|_| format!("invalid integer value '{raw}'"))?;
    if value == 0 {
        return Err("value must be >= 1".to_string());
    }
    Ok(value)
}
