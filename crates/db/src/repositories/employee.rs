use chrono::Utc;
use sqlx::Row;

use hrflow_core::domain::employee::{Actor, DepartmentId, EmployeeId, EmployeeProfile};

use super::{decode_date, decode_enum, IdentityProvider, RepositoryError};
use crate::DbPool;

/// Employee directory backed by the `employee` and `compensatory_credit` tables.
pub struct SqlEmployeeDirectory {
    pool: DbPool,
}

impl SqlEmployeeDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upserts the employee and replaces their free compensatory credits. Credits held by a
    /// request survive.
    pub async fn save(&self, profile: &EmployeeProfile) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO employee (id, name, role, department_id, gender, employment_status,
                                   emergency_leave_granted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 role = excluded.role,
                 department_id = excluded.department_id,
                 gender = excluded.gender,
                 employment_status = excluded.employment_status,
                 emergency_leave_granted = excluded.emergency_leave_granted,
                 updated_at = excluded.updated_at",
        )
        .bind(&profile.actor.user_id.0)
        .bind(&profile.name)
        .bind(profile.actor.role.as_str())
        .bind(&profile.actor.department_id.0)
        .bind(profile.gender.as_str())
        .bind(profile.employment_status.as_str())
        .bind(profile.emergency_leave_granted)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM compensatory_credit WHERE employee_id = ? AND redeemed_by IS NULL",
        )
        .bind(&profile.actor.user_id.0)
        .execute(&mut *tx)
        .await?;
        for worked_on in &profile.compensatory_credits {
            sqlx::query(
                "INSERT OR IGNORE INTO compensatory_credit (employee_id, worked_on, created_at)
                 VALUES (?, ?, ?)",
            )
            .bind(&profile.actor.user_id.0)
            .bind(worked_on.format("%Y-%m-%d").to_string())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SqlEmployeeDirectory {
    async fn resolve(
        &self,
        user_id: &EmployeeId,
    ) -> Result<Option<EmployeeProfile>, RepositoryError> {
        let Some(row) = sqlx::query(
            "SELECT id, name, role, department_id, gender, employment_status,
                    emergency_leave_granted
             FROM employee WHERE id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        let gender: String = row.try_get("gender")?;
        let employment_status: String = row.try_get("employment_status")?;

        let credits: Vec<String> = sqlx::query_scalar(
            "SELECT worked_on FROM compensatory_credit
             WHERE employee_id = ? AND redeemed_by IS NULL
             ORDER BY worked_on",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EmployeeProfile {
            actor: Actor {
                user_id: EmployeeId(row.try_get("id")?),
                role: decode_enum("role", &role)?,
                department_id: DepartmentId(row.try_get("department_id")?),
            },
            name: row.try_get("name")?,
            gender: decode_enum("gender", &gender)?,
            employment_status: decode_enum("employment_status", &employment_status)?,
            emergency_leave_granted: row.try_get("emergency_leave_granted")?,
            compensatory_credits: credits
                .iter()
                .map(|value| decode_date("worked_on", value))
                .collect::<Result<Vec<_>, _>>()?,
        }))
    }
}
