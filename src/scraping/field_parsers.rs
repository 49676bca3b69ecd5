// src/scraping/field_parsers.rs
//! Normalizes free-text listing fragments ("3 days ago", "42 applicants").

use regex::Regex;
use std::sync::LazyLock;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static integer pattern"));

const HOURS_PER_DAY: u32 = 24;
const HOURS_PER_WEEK: u32 = 7 * HOURS_PER_DAY;
const HOURS_PER_MONTH: u32 = 30 * HOURS_PER_DAY;

fn first_integer(text: &str) -> Option<u32> {
    FIRST_INTEGER.find(text)?.as_str().parse().ok()
}

/// Converts a "posted N units ago" caption into hours of recency.
///
/// Anything finer than a day collapses to `0`. Returns `None` when the text is
/// missing, carries no integer, or names a unit we do not recognise.
pub fn parse_time_posted(text: Option<&str>) -> Option<u32> {
    let text = text?;
    let num = first_integer(text)?;
    let lower = text.to_lowercase();

    if lower.contains("second") || lower.contains("minute") || lower.contains("hour") {
        Some(0)
    } else if lower.contains("day") {
        num.checked_mul(HOURS_PER_DAY)
    } else if lower.contains("week") {
        num.checked_mul(HOURS_PER_WEEK)
    } else if lower.contains("month") {
        num.checked_mul(HOURS_PER_MONTH)
    } else {
        None
    }
}

pub fn parse_applicant_count(text: Option<&str>) -> Option<u32> {
    first_integer(text?)
}
