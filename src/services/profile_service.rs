use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::api::ApiResult;
use crate::models::{HealthProfile, HealthProfileView, UpsertHealthProfileRequest};

#[derive(Debug, Clone)]
pub struct ProfileService {
    db: PgPool,
}

impl ProfileService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, account_id: Uuid) -> ApiResult<Option<HealthProfileView>> {
        let profile = sqlx::query_as::<_, HealthProfile>(
            "SELECT account_id, weight_kg, height_cm, medical_conditions, created_at, updated_at
             FROM health_profiles WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile.map(|profile| HealthProfileView {
            bmi: profile.bmi(),
            profile,
        }))
    }

    pub async fn upsert(&self, account_id: Uuid, request: UpsertHealthProfileRequest) -> ApiResult<HealthProfileView> {
        request.validate()?;

        let profile = sqlx::query_as::<_, HealthProfile>(
            "INSERT INTO health_profiles (account_id, weight_kg, height_cm, medical_conditions)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (account_id) DO UPDATE
             SET weight_kg = EXCLUDED.weight_kg,
                 height_cm = EXCLUDED.height_cm,
                 medical_conditions = EXCLUDED.medical_conditions,
                 updated_at = NOW()
             RETURNING account_id, weight_kg, height_cm, medical_conditions, created_at, updated_at",
        )
        .bind(account_id)
        .bind(request.weight_kg)
        .bind(request.height_cm)
        .bind(&request.medical_conditions)
        .fetch_one(&self.db)
        .await?;

        Ok(HealthProfileView {
            bmi: profile.bmi(),
            profile,
        })
    }
}
