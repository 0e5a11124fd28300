//! Points balances
//!
//! One `UserPointsTable` row per account, created on first change. Balances
//! never drop below zero.

use sqlx::mysql::MySqlRow;
use sqlx::types::uuid::fmt::Hyphenated;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::user::{role_from_row, user_table};
use crate::error::Result;
use crate::models::{StudentPoints, UserInfo, ValidationError};
use crate::sql::{InsertOptions, QueryOptions, SqlColumn, SqlRepository, Table};

const INCREMENT: &str = "INSERT INTO UserPointsTable (uuid, points) VALUES (?, ?) \
    ON DUPLICATE KEY UPDATE points = points + ?";
const DECREMENT: &str = "INSERT INTO UserPointsTable (uuid, points) VALUES (?, 0) \
    ON DUPLICATE KEY UPDATE points = GREATEST(points - ?, 0)";

pub(crate) fn points_table() -> Table {
    Table::new("UserPointsTable")
        .column(SqlColumn::uuid_for_table("uuid", false))
        .column(SqlColumn::integer_for_table("points", false, false))
        .primary_key("uuid")
}

fn select_points(n: usize) -> String {
    format!(
        "SELECT ut.uuid, ut.username, ut.role, upt.points \
         FROM UserPointsTable upt \
         INNER JOIN UserTable ut ON ut.uuid = upt.uuid \
         WHERE upt.uuid IN ({})",
        vec!["?"; n].join(", ")
    )
}

fn check_amount(amount: i64) -> std::result::Result<i64, ValidationError> {
    if amount < 0 {
        return Err(ValidationError::Negative {
            field: "points",
            value: amount,
        });
    }
    Ok(amount)
}

fn points_from_row(row: &MySqlRow) -> sqlx::Result<StudentPoints> {
    Ok(StudentPoints {
        info: UserInfo {
            uuid: row.try_get::<Hyphenated, _>("uuid")?.into_uuid(),
            username: row.try_get("username")?,
            role: role_from_row(row)?,
        },
        points: row.try_get("points")?,
    })
}

#[derive(Debug, Clone)]
pub struct PointsRepo {
    sql: SqlRepository,
}

impl PointsRepo {
    pub async fn new(sql: SqlRepository) -> Result<Self> {
        let tables = [
            user_table().get_or_create_table_query(false)?,
            points_table().get_or_create_table_query(false)?,
        ];
        sql.init_schema(&tables, &[]).await?;
        Ok(Self { sql })
    }

    /// Add `amount` to the balance, starting from zero if there is none.
    pub async fn increment(&self, uuid: Uuid, amount: i64) -> Result<()> {
        let amount = check_amount(amount)?;
        self.sql
            .execute_insert(
                INCREMENT,
                &[
                    SqlColumn::uuid("uuid", uuid),
                    SqlColumn::integer("points", amount),
                    SqlColumn::integer("points", amount),
                ],
                InsertOptions::default(),
            )
            .await?;
        debug!(user = %uuid, amount, "incremented points");
        Ok(())
    }

    /// Subtract `amount`, stopping at zero.
    pub async fn decrement(&self, uuid: Uuid, amount: i64) -> Result<()> {
        let amount = check_amount(amount)?;
        self.sql
            .execute_insert(
                DECREMENT,
                &[SqlColumn::uuid("uuid", uuid), SqlColumn::integer("points", amount)],
                InsertOptions::default(),
            )
            .await?;
        debug!(user = %uuid, amount, "decremented points");
        Ok(())
    }

    /// Balances for every listed account that has one. Accounts without a
    /// points row are left out.
    pub async fn get(&self, uuids: &[Uuid]) -> Result<Vec<StudentPoints>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }

        let columns: Vec<SqlColumn> = uuids.iter().map(|u| SqlColumn::uuid("uuid", *u)).collect();
        let rows = self
            .sql
            .execute_query(&select_points(uuids.len()), Some(&columns[..]), QueryOptions::default())
            .await?;

        Ok(rows.iter().map(points_from_row).collect::<sqlx::Result<_>>()?)
    }
}
