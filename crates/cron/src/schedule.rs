//! Cron expression parsing and next-run computation.

use {
    chrono::{DateTime, Local, Utc},
    chrono_tz::Tz,
    cron::Schedule,
    std::str::FromStr,
};

use crate::{Error, Result};

/// Parse a cron expression.
///
/// Five fields (`min hour dom month dow`) run at second 0; six fields add a
/// leading seconds field. Both use standard day-of-week numbering (0-6 or
/// names, Sunday is 0 or 7). Seven fields add a trailing year and are handed
/// to the `cron` crate unchanged, so their days run 1-7 from Sunday.
pub fn parse_expr(expr: &str) -> Result<Schedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let dow = |field: &str| {
        remap_day_of_week(field)
            .ok_or_else(|| Error::invalid_expression(expr, format!("bad day of week '{field}'")))
    };
    let normalized = match fields.as_slice() {
        [rest @ .., last] if fields.len() == 5 => {
            format!("0 {} {} *", rest.join(" "), dow(last)?)
        },
        [rest @ .., last] if fields.len() == 6 => format!("{} {} *", rest.join(" "), dow(last)?),
        _ if fields.len() == 7 => fields.join(" "),
        _ => {
            return Err(Error::invalid_expression(
                expr,
                format!("expected 5, 6 or 7 fields, got {}", fields.len()),
            ));
        },
    };
    Schedule::from_str(&normalized).map_err(|e| Error::invalid_expression(expr, e))
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Rewrite a standard day-of-week field into the `cron` crate's numbering
/// (1-7, Sunday is 1). `None` if any item is unreadable.
fn remap_day_of_week(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }
    let mut out: Vec<String> = Vec::new();
    for item in field.split(',') {
        for day in expand_day_item(item)? {
            let day = (day % 7 + 1).to_string();
            if !out.contains(&day) {
                out.push(day);
            }
        }
    }
    Some(out.join(","))
}

/// Standard day numbers (0-7) named by one list item: `*`, `n`, `a-b`,
/// optionally with a `/step`. `n/step` runs from `n` to Saturday.
fn expand_day_item(item: &str) -> Option<Vec<u32>> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step.parse::<usize>().ok().filter(|s| *s > 0)?)),
        None => (item, None),
    };
    let (lo, hi) = match (range, range.split_once('-')) {
        ("*", _) => (0, 6),
        (_, Some((lo, hi))) => (day_number(lo)?, day_number(hi)?),
        (day, None) => {
            let d = day_number(day)?;
            match step {
                Some(_) => (d, d.max(6)),
                None => (d, d),
            }
        },
    };
    (lo <= hi).then(|| (lo..=hi).step_by(step.unwrap_or(1)).collect())
}

fn day_number(token: &str) -> Option<u32> {
    if let Ok(n) = token.parse::<u32>() {
        return (n <= 7).then_some(n);
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .and_then(|i| u32::try_from(i).ok())
}

/// Parse an IANA timezone name such as "Europe/Paris".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse().map_err(|_| Error::unknown_timezone(name))
}

/// Next run strictly after `now_ms` (epoch millis), evaluated in `tz` or the
/// local timezone when unset. `None` if the schedule has no future runs.
pub fn next_run_after(schedule: &Schedule, tz: Option<Tz>, now_ms: u64) -> Option<u64> {
    let now = DateTime::<Utc>::from_timestamp_millis(i64::try_from(now_ms).ok()?)?;
    let next = match tz {
        Some(tz) => schedule
            .after(&now.with_timezone(&tz))
            .next()
            .map(|dt| dt.timestamp_millis()),
        None => schedule
            .after(&now.with_timezone(&Local))
            .next()
            .map(|dt| dt.timestamp_millis()),
    }?;
    u64::try_from(next).ok()
}
