use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserMonthlyStats {
    pub account_id: Uuid,
    pub year: i32,
    pub month: i16,
    pub routines_started: i32,
    pub sessions_logged: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerMonthlyStats {
    pub trainer_id: Uuid,
    pub year: i32,
    pub month: i16,
    pub new_assignments: i32,
    pub follow_ups: i32,
    pub updated_at: DateTime<Utc>,
}

/// Half-open `[start, end)` range covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBounds {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthBounds {
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self { year, month, start, end })
    }

    pub fn containing(date: NaiveDate) -> Self {
        // A date always has a valid month.
        Self::for_month(date.year(), date.month()).unwrap_or(Self {
            year: date.year(),
            month: date.month(),
            start: date,
            end: date,
        })
    }

    /// Both parts or neither; neither means the current month.
    pub fn from_parts(year: Option<i32>, month: Option<u32>) -> Result<Self, &'static str> {
        match (year, month) {
            (None, None) => Ok(Self::current()),
            (Some(year), Some(month)) => {
                Self::for_month(year, month).ok_or("month must be between 1 and 12")
            }
            _ => Err("year and month must be given together"),
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now().date_naive())
    }

    /// The calendar month before this one.
    pub fn previous(&self) -> Self {
        Self::containing(self.start.pred_opt().unwrap_or(self.start))
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
    }

    /// Last day included in the month.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

#[derive(Debug, Deserialize)]
pub struct RecalculateRequest {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecalculateReport {
    pub year: i32,
    pub month: u32,
    pub users: usize,
    pub trainers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_are_half_open() {
        let feb = MonthBounds::for_month(2024, 2).unwrap();
        assert_eq!(feb.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.end, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(feb.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let dec = MonthBounds::for_month(2023, 12).unwrap();
        assert_eq!(dec.end, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(dec.last_day(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(MonthBounds::for_month(2024, 0).is_none());
        assert!(MonthBounds::for_month(2024, 13).is_none());
    }

    #[test]
    fn containing_picks_the_calendar_month() {
        let bounds = MonthBounds::containing(NaiveDate::from_ymd_opt(2024, 7, 17).unwrap());
        assert_eq!((bounds.year, bounds.month), (2024, 7));
        assert_eq!(bounds.start_utc().to_rfc3339(), "2024-07-01T00:00:00+00:00");
    }

    #[test]
    fn previous_month_crosses_year_boundary() {
        let january = MonthBounds::for_month(2025, 1).unwrap();
        assert_eq!(january.previous(), MonthBounds::for_month(2024, 12).unwrap());

        let march = MonthBounds::for_month(2024, 3).unwrap();
        assert_eq!(march.previous().last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn parts_must_come_together() {
        assert_eq!(MonthBounds::from_parts(None, None), Ok(MonthBounds::current()));
        assert!(MonthBounds::from_parts(Some(2024), None).is_err());
        assert!(MonthBounds::from_parts(None, Some(3)).is_err());
        assert!(MonthBounds::from_parts(Some(2024), Some(13)).is_err());
        assert_eq!(
            MonthBounds::from_parts(Some(2024), Some(2)).map(|b| b.last_day()),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
    }
}
