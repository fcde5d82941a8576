//! Calendar helpers for monthly totals and hourly time stamps

use crate::errors::{EmgridError, EmgridResult};

/// Number of hours in a simulated day
pub const HOURS_PER_DAY: usize = 24;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year` in the Gregorian calendar
pub fn days_in_month(year: i32, month: u32) -> EmgridResult<u32> {
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => {
            return Err(EmgridError::Config(format!(
                "month must be within 1..=12, got {}",
                month
            )))
        }
    };
    Ok(days)
}

pub fn hours_in_month(days: u32) -> f64 {
    (days as usize * HOURS_PER_DAY) as f64
}

pub fn seconds_in_month(days: u32) -> f64 {
    hours_in_month(days) * 3600.0
}

/// The 24 hourly stamps of a simulated day in `YYYY-MM-DD_HH:MM:SS` form
pub fn hourly_timestamps(year: i32, month: u32, day: u32) -> EmgridResult<Vec<String>> {
    let days = days_in_month(year, month)?;
    if day == 0 || day > days {
        return Err(EmgridError::Config(format!(
            "day {} is outside {}-{:02} which has {} days",
            day, year, month, days
        )));
    }
    Ok((0..HOURS_PER_DAY)
        .map(|hour| format!("{:04}-{:02}-{:02}_{:02}:00:00", year, month, day, hour))
        .collect())
}
