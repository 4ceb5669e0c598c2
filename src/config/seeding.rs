use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ExerciseCategory, SpaceType};

struct CatalogExercise {
    name: &'static str,
    category: ExerciseCategory,
    description: &'static str,
    duration_min: i32,
    difficulty: i16,
    muscles: &'static str,
    equipment: &'static str,
}

const CATALOG: &[CatalogExercise] = &[
    CatalogExercise {
        name: "Treadmill run",
        category: ExerciseCategory::Cardio,
        description: "Steady pace run on the treadmill.",
        duration_min: 20,
        difficulty: 2,
        muscles: "quadriceps, hamstrings, calves",
        equipment: "treadmill",
    },
    CatalogExercise {
        name: "Stationary bike intervals",
        category: ExerciseCategory::Cardio,
        description: "Alternate one minute hard with two minutes easy.",
        duration_min: 25,
        difficulty: 3,
        muscles: "quadriceps, glutes",
        equipment: "stationary bike",
    },
    CatalogExercise {
        name: "Jump rope",
        category: ExerciseCategory::Cardio,
        description: "Continuous skipping with short rests.",
        duration_min: 10,
        difficulty: 2,
        muscles: "calves, shoulders",
        equipment: "jump rope",
    },
    CatalogExercise {
        name: "Back squat",
        category: ExerciseCategory::Strength,
        description: "Barbell squat to parallel or below.",
        duration_min: 15,
        difficulty: 4,
        muscles: "quadriceps, glutes, lower back",
        equipment: "barbell, squat rack",
    },
    CatalogExercise {
        name: "Bench press",
        category: ExerciseCategory::Strength,
        description: "Flat barbell press with a spotter.",
        duration_min: 15,
        difficulty: 3,
        muscles: "chest, triceps, front deltoids",
        equipment: "barbell, bench",
    },
    CatalogExercise {
        name: "Push-up",
        category: ExerciseCategory::Strength,
        description: "Bodyweight press keeping a straight line from head to heels.",
        duration_min: 5,
        difficulty: 1,
        muscles: "chest, triceps, core",
        equipment: "",
    },
    CatalogExercise {
        name: "Plank",
        category: ExerciseCategory::Strength,
        description: "Forearm plank held for time.",
        duration_min: 5,
        difficulty: 1,
        muscles: "core, shoulders",
        equipment: "mat",
    },
    CatalogExercise {
        name: "Hip flexor stretch",
        category: ExerciseCategory::Mobility,
        description: "Half-kneeling stretch, both sides.",
        duration_min: 5,
        difficulty: 1,
        muscles: "hip flexors",
        equipment: "mat",
    },
    CatalogExercise {
        name: "Thoracic rotations",
        category: ExerciseCategory::Mobility,
        description: "Quadruped rotations to open the upper back.",
        duration_min: 5,
        difficulty: 1,
        muscles: "upper back, obliques",
        equipment: "mat",
    },
    CatalogExercise {
        name: "Sun salutation flow",
        category: ExerciseCategory::Mobility,
        description: "Slow yoga sequence linking breath and movement.",
        duration_min: 10,
        difficulty: 2,
        muscles: "full body",
        equipment: "mat",
    },
];

const SPACES: &[(&str, SpaceType, Option<i32>, &str)] = &[
    ("Main weight room", SpaceType::Gym, Some(40), "Sports building, ground floor"),
    ("Indoor court", SpaceType::Court, None, "Sports building, hall B"),
    ("Semi-olympic pool", SpaceType::Pool, Some(30), "Aquatic center"),
    ("Studio 1", SpaceType::Room, Some(20), "Sports building, first floor"),
];

pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        let exercises = self.seed_exercises().await?;
        let spaces = self.seed_spaces().await?;

        tracing::info!(exercises, spaces, "Database seeding completed");
        Ok(())
    }

    /// Catalog exercises, skipped when a catalog entry with the same name
    /// already exists. Returns how many were added.
    pub async fn seed_exercises(&self) -> Result<u64> {
        let mut added = 0;
        for exercise in CATALOG {
            added += sqlx::query(
                "INSERT INTO exercises (id, name, category, description, duration_min, difficulty, muscles, equipment)
                 SELECT $1, $2, $3, $4, $5, $6, $7, $8
                 WHERE NOT EXISTS (SELECT 1 FROM exercises WHERE name = $2 AND NOT is_custom)",
            )
            .bind(Uuid::new_v4())
            .bind(exercise.name)
            .bind(exercise.category)
            .bind(exercise.description)
            .bind(exercise.duration_min)
            .bind(exercise.difficulty)
            .bind(exercise.muscles)
            .bind(exercise.equipment)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }

        tracing::info!(added, "catalog exercises seeded");
        Ok(added)
    }

    pub async fn seed_spaces(&self) -> Result<u64> {
        let mut added = 0;
        for (name, space_type, capacity, location) in SPACES {
            added += sqlx::query(
                "INSERT INTO spaces (id, name, space_type, capacity, location)
                 SELECT $1, $2, $3, $4, $5
                 WHERE NOT EXISTS (SELECT 1 FROM spaces WHERE name = $2)",
            )
            .bind(Uuid::new_v4())
            .bind(*name)
            .bind(*space_type)
            .bind(*capacity)
            .bind(*location)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }

        tracing::info!(added, "spaces seeded");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_are_unique_and_values_in_range() {
        let names: HashSet<_> = CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), CATALOG.len());
        assert!(CATALOG.iter().all(|e| (1..=5).contains(&e.difficulty) && e.duration_min >= 0));
    }

    #[test]
    fn catalog_covers_every_category() {
        for category in [ExerciseCategory::Cardio, ExerciseCategory::Strength, ExerciseCategory::Mobility] {
            assert!(CATALOG.iter().any(|e| e.category == category));
        }
    }
}
