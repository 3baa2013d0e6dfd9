use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::format::{month_label, Locale};

/// Length of the dashboard trend series.
pub const TREND_MONTHS: usize = 6;

/// Inclusive on both ends, matching SQL `BETWEEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant <= self.end
    }
}

/// One calendar month of the trend window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthPeriod {
    pub year: i32,
    /// 1-based
    pub month: u32,
    pub label: String,
    pub range: DateRange,
}

/// Supplies "now" in the user's time zone.
pub trait Clock: Send + Sync {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock<Tz: TimeZone> {
    instant: DateTime<Tz>,
}

impl<Tz: TimeZone> FixedClock<Tz> {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }
}

impl<Tz> Clock for FixedClock<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    type Tz = Tz;

    fn now(&self) -> DateTime<Tz> {
        self.instant.clone()
    }
}

/// Moves a (year, month) pair by `delta` months, rolling over year boundaries.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = shift_month(year, month, 1);
    first_day_of_month(next_year, next_month)
        .pred_opt()
        .unwrap_or(NaiveDate::MIN)
}

/// First instant of `date` in `tz`.
///
/// An ambiguous midnight resolves to the earlier instant; a midnight inside a
/// DST gap resolves to the first valid local time of that day.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = NaiveDateTime::new(date, NaiveTime::MIN);
    let mut candidate = midnight;

    // gaps are at most a few hours long and aligned to quarter hours
    while candidate.date() == date {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }

    Utc.from_utc_datetime(&midnight)
}

/// Full calendar month `year`/`month` in `tz`: first instant to the last millisecond.
pub fn month_range<Tz: TimeZone>(tz: &Tz, year: i32, month: u32) -> DateRange {
    let (next_year, next_month) = shift_month(year, month, 1);
    let start = start_of_day(tz, first_day_of_month(year, month));
    let next_start = start_of_day(tz, first_day_of_month(next_year, next_month));
    DateRange::new(start, next_start - Duration::milliseconds(1))
}

/// Month-to-date: first instant of the month containing `now` up to `now` itself.
pub fn current_month_range<Tz: TimeZone>(now: &DateTime<Tz>) -> DateRange {
    let today = now.naive_local().date();
    let start = start_of_day(&now.timezone(), first_day_of_month(today.year(), today.month()));
    DateRange::new(start, now.with_timezone(&Utc))
}

/// The `count` calendar months ending with the month containing `now`, oldest first.
pub fn trailing_months<Tz: TimeZone>(
    now: &DateTime<Tz>,
    count: usize,
    locale: Locale,
) -> Vec<MonthPeriod> {
    let tz = now.timezone();
    let today = now.naive_local().date();

    (0..count)
        .rev()
        .map(|back| {
            let (year, month) = shift_month(today.year(), today.month(), -(back as i32));
            MonthPeriod {
                year,
                month,
                label: month_label(year, month, locale),
                range: month_range(&tz, year, month),
            }
        })
        .collect()
}
