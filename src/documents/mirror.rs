use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{Collection, Document};
use crate::models::{
    AssignmentAction, Exercise, ExerciseDetails, ProgressLog, Routine, RoutineItemView,
    TrainerAssignment,
};

/// Request origin recorded on activity documents.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub account_id: Uuid,
    pub action: &'static str,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
    pub client: ClientInfo,
}

impl ActivityRecord {
    pub fn new(account_id: Uuid, action: &'static str) -> Self {
        Self {
            account_id,
            action,
            entity_type: None,
            entity_id: None,
            metadata: json!({}),
            client: ClientInfo::default(),
        }
    }

    pub fn entity(mut self, entity_type: &'static str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_id = Some(entity_id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    pub fn into_document(self) -> Document {
        let occurred_at = Utc::now();
        Document {
            collection: Collection::UserActivityLogs,
            key: Uuid::new_v4().to_string(),
            user_key: Some(self.account_id.to_string()),
            occurred_at,
            body: json!({
                "user_id": self.account_id,
                "action": self.action,
                "entity_type": self.entity_type,
                "entity_id": self.entity_id,
                "metadata": self.metadata,
                "ip_address": self.client.ip,
                "user_agent": self.client.user_agent,
                "timestamp": occurred_at,
            }),
        }
    }
}

/// Fields of a progress log that only live in the mirror.
#[derive(Debug, Clone, Default)]
pub struct ProgressExtras {
    pub exercise_id: Option<Uuid>,
    pub metrics: Option<Value>,
    pub photos: Vec<String>,
    pub tags: Vec<String>,
}

fn start_of_day(log: &ProgressLog) -> DateTime<Utc> {
    log.logged_on.and_time(NaiveTime::MIN).and_utc()
}

pub fn progress_document(log: &ProgressLog, extras: &ProgressExtras) -> Document {
    Document {
        collection: Collection::ProgressLogs,
        key: log.id.to_string(),
        user_key: Some(log.account_id.to_string()),
        occurred_at: start_of_day(log),
        body: json!({
            "progress_id": log.id,
            "user_id": log.account_id,
            "routine_id": log.routine_id,
            "exercise_id": extras.exercise_id,
            "date": log.logged_on,
            "repetitions": log.repetitions,
            "seconds": log.seconds,
            "effort": log.effort,
            "weight_kg": log.weight_kg,
            "notes": log.notes,
            "metrics": extras.metrics.clone().unwrap_or_else(|| json!({})),
            "photos": extras.photos,
            "tags": extras.tags,
            "recorded_at": log.created_at,
        }),
    }
}

pub fn exercise_document(exercise: &Exercise, details: &ExerciseDetails) -> Document {
    Document {
        collection: Collection::ExerciseDetails,
        key: exercise.id.to_string(),
        user_key: exercise.created_by.map(|id| id.to_string()),
        occurred_at: Utc::now(),
        body: json!({
            "exercise_id": exercise.id,
            "name": exercise.name,
            "category": exercise.category,
            "variations": details.variations,
            "tips": details.tips,
            "equipment": details.equipment,
            "muscles": details.muscles,
            "recommended_level": details.recommended_level,
            "tags": details.tags,
        }),
    }
}

pub fn routine_template_document(routine: &Routine, items: &[RoutineItemView]) -> Document {
    let items: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "exercise_id": item.exercise_id,
                "exercise_name": item.exercise_name,
                "position": item.position,
                "sets": item.sets,
                "reps": item.reps,
                "seconds": item.seconds,
                "notes": item.notes,
            })
        })
        .collect();

    Document {
        collection: Collection::RoutineTemplates,
        key: routine.id.to_string(),
        user_key: routine.author_trainer_id.map(|id| id.to_string()),
        occurred_at: routine.created_at,
        body: json!({
            "routine_id": routine.id,
            "name": routine.name,
            "description": routine.description,
            "author_trainer_id": routine.author_trainer_id,
            "frequency": routine.frequency,
            "items": items,
        }),
    }
}

pub fn assignment_document(
    assignment: &TrainerAssignment,
    action: AssignmentAction,
    admin_id: Uuid,
) -> Document {
    Document {
        collection: Collection::TrainerAssignments,
        key: assignment.id.to_string(),
        user_key: Some(assignment.account_id.to_string()),
        occurred_at: assignment.updated_at,
        body: json!({
            "assignment_id": assignment.id,
            "user_id": assignment.account_id,
            "trainer_id": assignment.trainer_id,
            "assigned_on": assignment.assigned_on,
            "active": assignment.active,
            "last_action": action,
            "admin_id": admin_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn log() -> ProgressLog {
        ProgressLog {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            routine_id: Uuid::new_v4(),
            logged_on: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            repetitions: Some(30),
            seconds: None,
            effort: 7,
            weight_kg: Some(40.0),
            notes: "felt good".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn progress_mirror_carries_free_form_fields() {
        let log = log();
        let extras = ProgressExtras {
            metrics: Some(json!({"heart_rate": 142})),
            photos: vec!["https://cdn.example/p.jpg".to_string()],
            ..Default::default()
        };

        let document = progress_document(&log, &extras);
        assert_eq!(document.collection, Collection::ProgressLogs);
        assert_eq!(document.key, log.id.to_string());
        assert_eq!(document.user_key, Some(log.account_id.to_string()));
        assert_eq!(document.body["metrics"]["heart_rate"], 142);
        assert_eq!(document.body["photos"][0], "https://cdn.example/p.jpg");
        assert_eq!(document.body["effort"], 7);
        assert_eq!(document.occurred_at.date_naive(), log.logged_on);
    }

    #[test]
    fn progress_mirror_defaults_metrics_to_an_object() {
        let document = progress_document(&log(), &ProgressExtras::default());
        assert_eq!(document.body["metrics"], json!({}));
    }

    #[test]
    fn activity_documents_get_unique_keys() {
        let account = Uuid::new_v4();
        let a = ActivityRecord::new(account, "login").into_document();
        let b = ActivityRecord::new(account, "login").into_document();
        assert_ne!(a.key, b.key);
        assert_eq!(a.body["action"], "login");
        assert_eq!(a.user_key, Some(account.to_string()));
    }

    #[test]
    fn activity_records_client_and_entity() {
        let account = Uuid::new_v4();
        let routine = Uuid::new_v4();
        let document = ActivityRecord::new(account, "routine_created")
            .entity("routine", routine)
            .client(ClientInfo {
                ip: Some("10.0.0.1".to_string()),
                user_agent: Some("curl/8".to_string()),
            })
            .into_document();

        assert_eq!(document.body["entity_type"], "routine");
        assert_eq!(document.body["entity_id"], json!(routine));
        assert_eq!(document.body["ip_address"], "10.0.0.1");
    }
}
