use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(date)
}

/// `YYYY-MM` bucket used by monthly trend tables.
pub fn month_key(timestamp: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", timestamp.year(), timestamp.month())
}

/// Calendar-month addition, clamping to the end of shorter months.
pub fn add_months(timestamp: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    timestamp
        .checked_add_months(Months::new(months))
        .unwrap_or(timestamp)
}

/// Base-36 rendering as used in payment receipt identifiers.
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
