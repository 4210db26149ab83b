use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use leadline_core::domain::trigger::{TriggerPoint, TriggerPointId, TriggerType};
use leadline_core::errors::ApplicationError;
use leadline_core::ports::TriggerPointSource;

use super::{parse_json, to_json, RepositoryError};
use crate::DbPool;

pub struct SqlTriggerPointRepository {
    pool: DbPool,
}

impl SqlTriggerPointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Trigger points for an owner in configured order.
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<TriggerPoint>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                owner_id,
                name,
                trigger_type,
                keywords_json,
                conditions_json,
                actions_json,
                selection_criteria_json,
                is_active
             FROM trigger_point
             WHERE owner_id = ?
             ORDER BY position ASC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(trigger_point_from_row).collect()
    }

    /// Upserts a trigger point at `position` within its owner's list.
    pub async fn save(&self, trigger: &TriggerPoint, position: u32) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO trigger_point (
                id,
                owner_id,
                name,
                trigger_type,
                keywords_json,
                conditions_json,
                actions_json,
                selection_criteria_json,
                is_active,
                position
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                trigger_type = excluded.trigger_type,
                keywords_json = excluded.keywords_json,
                conditions_json = excluded.conditions_json,
                actions_json = excluded.actions_json,
                selection_criteria_json = excluded.selection_criteria_json,
                is_active = excluded.is_active,
                position = excluded.position",
        )
        .bind(&trigger.id.0)
        .bind(&trigger.owner_id)
        .bind(&trigger.name)
        .bind(trigger.trigger_type.as_str())
        .bind(to_json("keywords_json", &trigger.keywords)?)
        .bind(to_json("conditions_json", &trigger.conditions)?)
        .bind(to_json("actions_json", &trigger.actions)?)
        .bind(to_json("selection_criteria_json", &trigger.vendor_selection_criteria)?)
        .bind(trigger.is_active)
        .bind(i64::from(position))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TriggerPointSource for SqlTriggerPointRepository {
    async fn trigger_points(&self, owner_id: &str) -> Result<Vec<TriggerPoint>, ApplicationError> {
        Ok(self.list_for_owner(owner_id).await?)
    }
}

fn trigger_point_from_row(row: SqliteRow) -> Result<TriggerPoint, RepositoryError> {
    let type_raw = row.try_get::<String, _>("trigger_type")?;
    let trigger_type = TriggerType::parse(&type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown trigger type `{type_raw}`")))?;

    Ok(TriggerPoint {
        id: TriggerPointId(row.try_get("id")?),
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        trigger_type,
        keywords: parse_json("keywords_json", &row.try_get::<String, _>("keywords_json")?)?,
        conditions: parse_json("conditions_json", &row.try_get::<String, _>("conditions_json")?)?,
        actions: parse_json("actions_json", &row.try_get::<String, _>("actions_json")?)?,
        vendor_selection_criteria: parse_json(
            "selection_criteria_json",
            &row.try_get::<String, _>("selection_criteria_json")?,
        )?,
        is_active: row.try_get("is_active")?,
    })
}
