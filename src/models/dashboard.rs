use serde::Serialize;
use sqlx::FromRow;

use super::{
    Assignee, CurrentTrainer, IdentityProfile, ProgressLog, RoleCount, Routine,
    TrainerMonthlyStats, UserMonthlyStats,
};
use crate::documents::OutboxStatus;

#[derive(Debug, Serialize)]
pub struct UserDashboard {
    pub profile: IdentityProfile,
    pub latest_progress: Vec<ProgressLog>,
    pub recent_routines: Vec<Routine>,
    pub total_routines: i64,
    pub total_sessions: i64,
    pub month: MonthActivity,
    pub stats: Option<UserMonthlyStats>,
    pub trainer: Option<CurrentTrainer>,
    pub unread_messages: i64,
    pub unread_recommendations: i64,
}

/// Current-month activity figures shown on the home screen.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MonthActivity {
    pub sessions: i64,
    pub active_days: i64,
    pub average_effort: f64,
}

impl MonthActivity {
    pub fn new(sessions: i64, active_days: i64, effort_sum: i64) -> Self {
        let average_effort = if sessions > 0 {
            ((effort_sum as f64 / sessions as f64) * 10.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            sessions,
            active_days,
            average_effort,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrainerDashboard {
    pub profile: IdentityProfile,
    pub assignees: Vec<Assignee>,
    pub presets_authored: Vec<Routine>,
    pub recommendations_this_month: i64,
    pub stats: Option<TrainerMonthlyStats>,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub accounts_by_role: Vec<RoleCount>,
    pub active_assignments: i64,
    pub upcoming_events: i64,
    pub pending_reservations: i64,
    pub outbox: Option<OutboxStatus>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub sessions: i64,
}

#[derive(Debug, Serialize)]
pub struct AdherenceReport {
    pub period_start: chrono::NaiveDate,
    pub period_end: chrono::NaiveDate,
    pub active_days: i64,
    pub by_category: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LoadBalanceRow {
    pub category: Option<String>,
    pub total_repetitions: Option<i64>,
    pub total_seconds: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_effort_is_rounded_to_one_decimal() {
        assert_eq!(MonthActivity::new(3, 2, 20).average_effort, 6.7);
        assert_eq!(MonthActivity::new(4, 4, 30).average_effort, 7.5);
    }

    #[test]
    fn no_sessions_means_zero_effort() {
        assert_eq!(MonthActivity::new(0, 0, 0), MonthActivity::default());
    }
}
