//! User repository
//!
//! Every account lives in `UserTable`. Recruiters add a `RecruiterTable` row,
//! students a `StudentInfoTable` row, and anyone who has earned points a
//! `UserPointsTable` row. Reads LEFT JOIN all of them, so the role-specific
//! fields of a [`UserRecord`] are `None` where no row exists.

use sqlx::mysql::MySqlRow;
use sqlx::types::uuid::fmt::Hyphenated;
use sqlx::{FromRow, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::points::points_table;
use super::student::{student_info_table, INSERT_EMPTY_STUDENT_INFO};
use crate::error::{DataError, Result};
use crate::models::{Role, User, UserRecord};
use crate::sql::{InsertOptions, QueryOptions, SqlColumn, SqlRepository, Table};

const INDEXES: [&str; 2] = [
    "CREATE UNIQUE INDEX idx_user_username ON UserTable(username);",
    "CREATE UNIQUE INDEX idx_user_email ON UserTable(email);",
];

const INSERT_USER: &str =
    "INSERT INTO UserTable (uuid, username, email, hashed_pass, salt, role) VALUES (?, ?, ?, ?, ?, ?)";
const INSERT_RECRUITER: &str =
    "INSERT INTO RecruiterTable (uuid, organisationName, applicationStatus) VALUES (?, ?, ?)";
const UPDATE_APPLICATION_STATUS: &str = "UPDATE RecruiterTable SET applicationStatus = ? WHERE uuid = ?";

fn select_users(filter: &str) -> String {
    format!(
        "SELECT ut.uuid, ut.username, ut.email, ut.hashed_pass, ut.salt, ut.role, \
         rt.organisationName, rt.applicationStatus, upt.points \
         FROM UserTable ut \
         LEFT JOIN RecruiterTable rt ON rt.uuid = ut.uuid \
         LEFT JOIN UserPointsTable upt ON upt.uuid = ut.uuid \
         WHERE {filter}"
    )
}

pub(crate) fn user_table() -> Table {
    Table::new("UserTable")
        .column(SqlColumn::uuid_for_table("uuid", false))
        .column(SqlColumn::varchar_for_table("username", false, 60))
        .column(SqlColumn::varchar_for_table("email", false, 254))
        .column(SqlColumn::varchar_for_table("hashed_pass", false, 255))
        .column(SqlColumn::varchar_for_table("salt", false, 50))
        .column(SqlColumn::varchar_for_table("role", false, 20))
        .primary_key("uuid")
}

/// Decode the `role` column, reporting unknown names as a decode error.
pub(crate) fn role_from_row(row: &MySqlRow) -> sqlx::Result<Role> {
    let name: String = row.try_get("role")?;
    name.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
        index: "role".into(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, MySqlRow> for UserRecord {
    fn from_row(row: &'r MySqlRow) -> sqlx::Result<Self> {
        Ok(Self {
            user: User {
                uuid: row.try_get::<Hyphenated, _>("uuid")?.into_uuid(),
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                hashed_password: row.try_get("hashed_pass")?,
                salt: row.try_get("salt")?,
                role: role_from_row(row)?,
            },
            organisation_name: row.try_get("organisationName")?,
            application_status: row.try_get("applicationStatus")?,
            points: row.try_get("points")?,
        })
    }
}

/// Table and index statements, in creation order.
pub fn schema_statements() -> Result<(Vec<String>, Vec<String>)> {
    let recruiters = Table::new("RecruiterTable")
        .column(SqlColumn::uuid_for_table("uuid", false))
        .column(SqlColumn::varchar_for_table("organisationName", false, 100))
        .column(SqlColumn::bool_for_table("applicationStatus", false))
        .primary_key("uuid");

    let tables = vec![
        user_table().get_or_create_table_query(false)?,
        recruiters.get_or_create_table_query(false)?,
        student_info_table().get_or_create_table_query(false)?,
        points_table().get_or_create_table_query(false)?,
    ];
    let indexes = INDEXES.iter().map(|s| (*s).to_owned()).collect();

    Ok((tables, indexes))
}

/// At most one record, for lookups on a unique column.
fn single(mut records: Vec<UserRecord>) -> Result<Option<UserRecord>> {
    match records.len() {
        0 | 1 => Ok(records.pop()),
        found => Err(DataError::MultipleResults { expected: 1, found }),
    }
}

#[derive(Debug, Clone)]
pub struct UserRepo {
    sql: SqlRepository,
}

impl UserRepo {
    /// Wrap `sql`, creating any missing tables and indexes first.
    pub async fn new(sql: SqlRepository) -> Result<Self> {
        let (tables, indexes) = schema_statements()?;
        sql.init_schema(&tables, &indexes).await?;
        Ok(Self { sql })
    }

    /// Insert the account. Students get an empty profile row in the same
    /// transaction.
    pub async fn add(&self, user: &User) -> Result<()> {
        let mut tx = self.sql.start_transaction().await?;

        tx.execute(
            INSERT_USER,
            &[
                SqlColumn::uuid("uuid", user.uuid),
                SqlColumn::varchar("username", user.username.as_str()),
                SqlColumn::varchar("email", user.email.as_str()),
                SqlColumn::varchar("hashed_pass", user.hashed_password.as_str()),
                SqlColumn::varchar("salt", user.salt.as_str()),
                SqlColumn::varchar("role", user.role.as_str()),
            ],
        )
        .await?;

        if user.role == Role::Student {
            tx.execute(INSERT_EMPTY_STUDENT_INFO, &[SqlColumn::uuid("uuid", user.uuid)])
                .await?;
        }

        tx.commit().await?;
        info!(user = %user.uuid, role = %user.role, "added user");
        Ok(())
    }

    /// Fetch accounts by UUID in one query.
    pub async fn get_by_ids(&self, uuids: &[Uuid]) -> Result<Option<Vec<UserRecord>>> {
        if uuids.is_empty() {
            return Ok(None);
        }

        let query = select_users(&format!("ut.uuid IN ({})", vec!["?"; uuids.len()].join(", ")));
        let columns: Vec<SqlColumn> = uuids.iter().map(|u| SqlColumn::uuid("uuid", *u)).collect();

        let records = self.fetch(&query, &columns).await?;
        Ok((!records.is_empty()).then_some(records))
    }

    pub async fn get_by_name(&self, username: &str) -> Result<Option<UserRecord>> {
        let records = self
            .fetch(&select_users("ut.username = ?"), &[SqlColumn::varchar("username", username)])
            .await?;
        single(records)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let records = self
            .fetch(&select_users("ut.email = ?"), &[SqlColumn::varchar("email", email)])
            .await?;
        single(records)
    }

    /// Attach a recruiter profile. New recruiters start unapproved.
    pub async fn add_recruiter(&self, uuid: Uuid, organisation: &str) -> Result<()> {
        self.sql
            .execute_insert(
                INSERT_RECRUITER,
                &[
                    SqlColumn::uuid("uuid", uuid),
                    SqlColumn::varchar("organisationName", organisation),
                    SqlColumn::bool("applicationStatus", false),
                ],
                InsertOptions::default(),
            )
            .await?;
        debug!(user = %uuid, "added recruiter profile");
        Ok(())
    }

    /// Approve or revoke a recruiter. Returns the number of rows changed.
    pub async fn set_application_status(&self, uuid: Uuid, approved: bool) -> Result<u64> {
        self.sql
            .execute_insert(
                UPDATE_APPLICATION_STATUS,
                &[
                    SqlColumn::bool("applicationStatus", approved),
                    SqlColumn::uuid("uuid", uuid),
                ],
                InsertOptions::default(),
            )
            .await
    }

    async fn fetch(&self, query: &str, columns: &[SqlColumn]) -> Result<Vec<UserRecord>> {
        let rows = self
            .sql
            .execute_query(query, Some(columns), QueryOptions::default())
            .await?;
        Ok(rows
            .iter()
            .map(UserRecord::from_row)
            .collect::<sqlx::Result<_>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::placeholder_count;

    fn record(username: &str) -> UserRecord {
        UserRecord {
            user: User {
                uuid: Uuid::new_v4(),
                username: username.into(),
                email: format!("{username}@example.com"),
                hashed_password: "hash".into(),
                salt: "salt".into(),
                role: Role::Student,
            },
            organisation_name: None,
            application_status: None,
            points: Some(10),
        }
    }

    #[test]
    fn single_accepts_zero_or_one() {
        assert_eq!(single(Vec::new()).unwrap(), None);
        let only = record("ada");
        assert_eq!(single(vec![only.clone()]).unwrap(), Some(only));
    }

    #[test]
    fn single_rejects_duplicates() {
        let err = single(vec![record("ada"), record("grace")]).unwrap_err();
        assert!(matches!(err, DataError::MultipleResults { expected: 1, found: 2 }));
    }

    #[test]
    fn statements_bind_what_they_declare() {
        assert_eq!(placeholder_count(INSERT_USER), 6);
        assert_eq!(placeholder_count(INSERT_RECRUITER), 3);
        assert_eq!(placeholder_count(UPDATE_APPLICATION_STATUS), 2);
        assert_eq!(placeholder_count(&select_users("ut.uuid IN (?, ?, ?)")), 3);
    }

    #[test]
    fn schema_creates_every_joined_table() {
        let (tables, indexes) = schema_statements().unwrap();
        let names = ["UserTable", "RecruiterTable", "StudentInfoTable", "UserPointsTable"];
        for (ddl, name) in tables.iter().zip(names) {
            assert!(ddl.starts_with(&format!("CREATE TABLE IF NOT EXISTS `{name}`(")), "{ddl}");
        }
        assert!(tables[0].ends_with("PRIMARY KEY (uuid));"));
        assert_eq!(indexes.len(), 2);
    }
}
