//! Document numbers of the shape `<PREFIX>-<YYYYMMDD>-<sequence>`.
//!
//! Sequences are scoped per tenant, prefix and UTC calendar day, start at
//! `0001` and are zero-padded to four digits. Past `9999` they simply grow a
//! digit. The Postgres store allocates sequences from the `document_counters`
//! table; the in-memory store derives them from its own records with
//! [`next_after`] while holding its write lock.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberPrefix {
    Invoice,
    Payment,
}

impl NumberPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberPrefix::Invoice => "INV",
            NumberPrefix::Payment => "PAY",
        }
    }
}

impl fmt::Display for NumberPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn stem(prefix: NumberPrefix, day: NaiveDate) -> String {
    format!("{}-{}-", prefix, day.format("%Y%m%d"))
}

pub fn format(prefix: NumberPrefix, day: NaiveDate, sequence: u32) -> String {
    format!("{}{:04}", stem(prefix, day), sequence)
}

/// Trailing sequence of `number` if it was issued under `prefix` on `day`.
pub fn parse_sequence(number: &str, prefix: NumberPrefix, day: NaiveDate) -> Option<u32> {
    let digits = number.strip_prefix(&stem(prefix, day))?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Number following the greatest existing sequence for `prefix` on `day`,
/// or the day's first number when there is none.
///
/// Sequences are compared numerically so `...-10000` sorts after `...-9999`.
pub fn next_after<'a, I>(existing: I, prefix: NumberPrefix, day: NaiveDate) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let last = existing
        .into_iter()
        .filter_map(|number| parse_sequence(number, prefix, day))
        .max()
        .unwrap_or(0);
    format(prefix, day, last.saturating_add(1))
}
