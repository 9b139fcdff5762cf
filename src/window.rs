use chrono::{
    DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};

/// Inclusive `[start, end]` range covering one calendar month.
///
/// `start` is day 1 at 00:00:00 and `end` is the last day of the month at
/// 23:59:59, both taken in the local offset the window was built with and
/// stored as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    month: u32,
    year: i32,
    offset: FixedOffset,
}

/// Window for `(month, year)` in UTC, or the current month when either is
/// missing. `month` is zero-based.
pub fn compute_month_window(month: Option<i32>, year: Option<i32>) -> MonthWindow {
    MonthWindow::resolve(month, year, utc_offset())
}

impl MonthWindow {
    /// Window for a zero-based `month` of `year`. Months outside `0..12` roll
    /// over into neighbouring years.
    pub fn of(month: i32, year: i32, offset: FixedOffset) -> Self {
        let total = i64::from(year) * 12 + i64::from(month);
        let year = clamp_year(total.div_euclid(12));
        let month = total.rem_euclid(12) as u32;

        let first = first_of_month(year, month);
        let last = first_of_month(year + (month as i32 + 1) / 12, (month + 1) % 12)
            .checked_sub_days(Days::new(1))
            .unwrap_or(first);

        Self {
            start: local_to_utc(first.and_hms_opt(0, 0, 0).unwrap_or_default(), offset),
            end: local_to_utc(
                last.and_hms_opt(23, 59, 59).unwrap_or_default(),
                offset,
            ),
            month,
            year,
            offset,
        }
    }

    /// Like [`MonthWindow::of`], falling back to the current month in `offset`
    /// when either part is omitted.
    pub fn resolve(month: Option<i32>, year: Option<i32>, offset: FixedOffset) -> Self {
        match (month, year) {
            (Some(month), Some(year)) => Self::of(month, year, offset),
            _ => Self::containing(Utc::now(), offset),
        }
    }

    /// Window of the month that `instant` falls in, seen from `offset`.
    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self::of(local.month0() as i32, local.year(), offset)
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    /// Zero-based month index.
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Last calendar day of the month, in local time.
    pub fn last_day(&self) -> u32 {
        self.end.with_timezone(&self.offset).day()
    }

    pub fn shift(&self, months: i32) -> Self {
        Self::of(self.month as i32 + months, self.year, self.offset)
    }

    pub fn next(&self) -> Self {
        self.shift(1)
    }

    pub fn previous(&self) -> Self {
        self.shift(-1)
    }
}

pub(crate) fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn clamp_year(year: i64) -> i32 {
    year.clamp(
        i64::from(NaiveDate::MIN.year()) + 1,
        i64::from(NaiveDate::MAX.year()) - 1,
    ) as i32
}

fn first_of_month(year: i32, month0: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(NaiveDate::MIN)
}

fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}
