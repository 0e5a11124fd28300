//! Student profiles and tag preferences
//!
//! A profile is read with one query that LEFT JOINs both the liked and the
//! disliked tags, so L liked and D disliked tags arrive as L x D rows.
//! [`materialize`] folds them back, keeping each tag once per list.

use sqlx::mysql::MySqlRow;
use sqlx::types::uuid::fmt::Hyphenated;
use sqlx::{FromRow, Row};
use tracing::info;
use uuid::Uuid;

use super::aggregate::{Arena, Children};
use super::opportunity::{tag_from_row, tag_id_in, tags_table, TAG_NAME_INDEX};
use super::user::user_table;
use crate::error::Result;
use crate::models::{StudentInfo, Tag};
use crate::sql::{QueryOptions, SqlColumn, SqlRepository, Table, TransactionScope};

pub(crate) const INSERT_EMPTY_STUDENT_INFO: &str =
    "INSERT INTO StudentInfoTable (uuid, description, profile) VALUES (?, NULL, NULL)";
const UPDATE_STUDENT_INFO: &str = "UPDATE StudentInfoTable SET description = ?, profile = ? WHERE uuid = ?";

const SELECT_STUDENT_INFO: &str = "SELECT ut.uuid, ut.username, ut.email, st.description, st.profile, \
    utl.tagID AS likedID, ttl.tagName AS likedName, \
    utd.tagID AS dislikedID, ttd.tagName AS dislikedName \
    FROM UserTable ut \
    INNER JOIN StudentInfoTable st ON st.uuid = ut.uuid \
    LEFT JOIN UserTagsLiked utl ON utl.uuid = ut.uuid \
    LEFT JOIN TagsTable ttl ON ttl.id = utl.tagID \
    LEFT JOIN UserTagsDisLiked utd ON utd.uuid = ut.uuid \
    LEFT JOIN TagsTable ttd ON ttd.id = utd.tagID \
    WHERE ut.uuid = ? ORDER BY utl.tagID, utd.tagID";

/// Which preference list a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagOpinion {
    Liked,
    Disliked,
}

impl TagOpinion {
    fn table(self) -> &'static str {
        match self {
            Self::Liked => "UserTagsLiked",
            Self::Disliked => "UserTagsDisLiked",
        }
    }

    fn insert(self, rows: usize) -> String {
        format!(
            "INSERT INTO {} (uuid, tagID) VALUES {}",
            self.table(),
            vec!["(?, ?)"; rows].join(", ")
        )
    }

    fn delete_all(self) -> String {
        format!("DELETE FROM {} WHERE uuid = ?", self.table())
    }

    fn select(self) -> String {
        format!(
            "SELECT t.id, t.tagName FROM {} o JOIN TagsTable t ON t.id = o.tagID \
             WHERE o.uuid = ? ORDER BY t.id",
            self.table()
        )
    }
}

pub(crate) fn student_info_table() -> Table {
    Table::new("StudentInfoTable")
        .column(SqlColumn::uuid_for_table("uuid", false))
        .column(SqlColumn::text_for_table("description", true))
        .column(SqlColumn::text_for_table("profile", true))
        .primary_key("uuid")
}

fn opinion_table(opinion: TagOpinion) -> Table {
    Table::new(opinion.table())
        .column(SqlColumn::uuid_for_table("uuid", false))
        .column(SqlColumn::integer_for_table("tagID", false, false))
        .primary_key("uuid")
        .primary_key("tagID")
}

/// Table and index statements, in creation order.
pub fn schema_statements() -> Result<(Vec<String>, Vec<String>)> {
    let tables = vec![
        user_table().get_or_create_table_query(false)?,
        tags_table().get_or_create_table_query(false)?,
        student_info_table().get_or_create_table_query(false)?,
        opinion_table(TagOpinion::Liked).get_or_create_table_query(false)?,
        opinion_table(TagOpinion::Disliked).get_or_create_table_query(false)?,
    ];
    Ok((tables, vec![TAG_NAME_INDEX.to_owned()]))
}

/// `None` binds as NULL.
fn optional_text(name: &str, value: Option<&str>) -> SqlColumn {
    match value {
        Some(value) => SqlColumn::text(name, value),
        None => SqlColumn::text_for_table(name, true),
    }
}

/// One flattened row of the profile/liked/disliked join.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentInfoRow {
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub description: Option<String>,
    pub profile: Option<String>,
    pub liked: Option<(i64, String)>,
    pub disliked: Option<(i64, String)>,
}

fn tag_pair(row: &MySqlRow, id: &str, name: &str) -> sqlx::Result<Option<(i64, String)>> {
    let id: Option<i64> = row.try_get(id)?;
    let name: Option<String> = row.try_get(name)?;
    Ok(id.zip(name))
}

impl<'r> FromRow<'r, MySqlRow> for StudentInfoRow {
    fn from_row(row: &'r MySqlRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: row.try_get::<Hyphenated, _>("uuid")?.into_uuid(),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            description: row.try_get("description")?,
            profile: row.try_get("profile")?,
            liked: tag_pair(row, "likedID", "likedName")?,
            disliked: tag_pair(row, "dislikedID", "dislikedName")?,
        })
    }
}

struct Profile {
    info: StudentInfo,
    liked: Children<i64, String>,
    disliked: Children<i64, String>,
}

/// Fold joined rows into one [`StudentInfo`] per student, in first-seen
/// order. Liked and disliked tags are each unique by tag id.
pub fn materialize<I>(rows: I) -> Vec<StudentInfo>
where
    I: IntoIterator<Item = StudentInfoRow>,
{
    let mut arena: Arena<Uuid, Profile> = Arena::new();

    for row in rows {
        let profile = arena.slot(row.uuid, || Profile {
            info: StudentInfo {
                student_id: row.uuid,
                student_name: row.username.clone(),
                student_email: row.email.clone(),
                description: row.description.clone(),
                profile_pic: row.profile.clone(),
                tags_liked: Vec::new(),
                tags_disliked: Vec::new(),
            },
            liked: Children::new(),
            disliked: Children::new(),
        });

        if let Some((id, name)) = row.liked {
            profile.liked.insert(id, name);
        }
        if let Some((id, name)) = row.disliked {
            profile.disliked.insert(id, name);
        }
    }

    arena
        .into_slots()
        .into_iter()
        .map(|p| StudentInfo {
            tags_liked: p.liked.into_items(),
            tags_disliked: p.disliked.into_items(),
            ..p.info
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct StudentRepo {
    sql: SqlRepository,
}

impl StudentRepo {
    /// Wrap `sql`, creating any missing tables and indexes first.
    pub async fn new(sql: SqlRepository) -> Result<Self> {
        let (tables, indexes) = schema_statements()?;
        sql.init_schema(&tables, &indexes).await?;
        Ok(Self { sql })
    }

    /// Replace the profile text and both tag lists in one transaction.
    /// Unknown tag names are created.
    pub async fn update_info(&self, info: &StudentInfo) -> Result<()> {
        let key = [SqlColumn::uuid("uuid", info.student_id)];
        let mut tx = self.sql.start_transaction().await?;

        tx.execute(
            UPDATE_STUDENT_INFO,
            &[
                optional_text("description", info.description.as_deref()),
                optional_text("profile", info.profile_pic.as_deref()),
                SqlColumn::uuid("uuid", info.student_id),
            ],
        )
        .await?;

        let mut linked = 0;
        for (opinion, names) in [
            (TagOpinion::Liked, &info.tags_liked),
            (TagOpinion::Disliked, &info.tags_disliked),
        ] {
            tx.execute(&opinion.delete_all(), &key).await?;
            linked += link_tags(&mut tx, info.student_id, opinion, names).await?;
        }

        tx.commit().await?;
        info!(student = %info.student_id, tags = linked, "updated student info");
        Ok(())
    }

    /// The profile with both tag lists, or `None` for an unknown student.
    pub async fn get_info(&self, uuid: Uuid) -> Result<Option<StudentInfo>> {
        let rows = self
            .sql
            .execute_query(
                SELECT_STUDENT_INFO,
                Some(&[SqlColumn::uuid("uuid", uuid)][..]),
                QueryOptions::default(),
            )
            .await?;

        let rows = rows
            .iter()
            .map(StudentInfoRow::from_row)
            .collect::<sqlx::Result<Vec<_>>>()?;
        Ok(materialize(rows).into_iter().next())
    }

    /// One preference list with tag ids.
    pub async fn tags(&self, uuid: Uuid, opinion: TagOpinion) -> Result<Vec<Tag>> {
        let rows = self
            .sql
            .execute_query(
                &opinion.select(),
                Some(&[SqlColumn::uuid("uuid", uuid)][..]),
                QueryOptions::default(),
            )
            .await?;

        Ok(rows.iter().map(tag_from_row).collect::<sqlx::Result<_>>()?)
    }
}

/// Resolve `names` to tag ids and link each distinct id once. Returns the
/// number of links written.
async fn link_tags(tx: &mut TransactionScope, student: Uuid, opinion: TagOpinion, names: &[String]) -> Result<usize> {
    let mut ids = Children::new();
    for name in names {
        let id = tag_id_in(tx, name).await?;
        ids.insert(id, id);
    }
    let ids = ids.into_items();
    if ids.is_empty() {
        return Ok(0);
    }

    let columns: Vec<SqlColumn> = ids
        .iter()
        .flat_map(|id| [SqlColumn::uuid("uuid", student), SqlColumn::integer("tagID", *id)])
        .collect();
    tx.execute(&opinion.insert(ids.len()), &columns).await?;
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::placeholder_count;

    fn row(uuid: Uuid, liked: Option<(i64, &str)>, disliked: Option<(i64, &str)>) -> StudentInfoRow {
        StudentInfoRow {
            uuid,
            username: "ada".into(),
            email: "ada@example.com".into(),
            description: Some("Maths".into()),
            profile: None,
            liked: liked.map(|(id, name)| (id, name.into())),
            disliked: disliked.map(|(id, name)| (id, name.into())),
        }
    }

    #[test]
    fn liked_by_disliked_product_collapses() {
        let uuid = Uuid::new_v4();
        let liked = [(1, "outdoors"), (2, "music"), (3, "coding")];
        let disliked = [(4, "early starts"), (5, "crowds")];

        let mut rows = Vec::new();
        for l in liked {
            for d in disliked {
                rows.push(row(uuid, Some(l), Some(d)));
            }
        }
        assert_eq!(rows.len(), 6);

        let students = materialize(rows);
        assert_eq!(students.len(), 1);
        let info = &students[0];
        assert_eq!(info.tags_liked, ["outdoors", "music", "coding"]);
        assert_eq!(info.tags_disliked, ["early starts", "crowds"]);
        assert_eq!(info.description.as_deref(), Some("Maths"));
        assert_eq!(info.profile_pic, None);
    }

    #[test]
    fn one_sided_preferences() {
        let uuid = Uuid::new_v4();
        let rows = vec![row(uuid, None, Some((7, "crowds"))), row(uuid, None, Some((8, "mud")))];

        let info = &materialize(rows)[0];
        assert!(info.tags_liked.is_empty());
        assert_eq!(info.tags_disliked, ["crowds", "mud"]);
    }

    #[test]
    fn same_tag_may_be_liked_and_disliked() {
        let uuid = Uuid::new_v4();
        let info = &materialize(vec![row(uuid, Some((1, "mud")), Some((1, "mud")))])[0];
        assert_eq!(info.tags_liked, ["mud"]);
        assert_eq!(info.tags_disliked, ["mud"]);
    }

    #[test]
    fn student_without_tags_is_kept() {
        let students = materialize(vec![row(Uuid::new_v4(), None, None)]);
        assert_eq!(students.len(), 1);
        assert!(students[0].tags_liked.is_empty());
        assert!(students[0].tags_disliked.is_empty());
    }

    #[test]
    fn no_rows_no_students() {
        assert!(materialize(Vec::new()).is_empty());
    }

    #[test]
    fn opinion_statements() {
        assert_eq!(
            TagOpinion::Liked.insert(2),
            "INSERT INTO UserTagsLiked (uuid, tagID) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(placeholder_count(&TagOpinion::Disliked.insert(3)), 6);
        assert_eq!(placeholder_count(&TagOpinion::Disliked.delete_all()), 1);
        assert!(TagOpinion::Disliked.select().contains("FROM UserTagsDisLiked o"));
        assert_eq!(placeholder_count(SELECT_STUDENT_INFO), 1);
        assert_eq!(placeholder_count(UPDATE_STUDENT_INFO), 3);
    }

    #[test]
    fn missing_profile_text_binds_null() {
        use crate::sql::Column;

        assert!(optional_text("profile", None).value().is_none());
        assert!(optional_text("profile", Some("me.png")).value().is_some());
    }

    #[test]
    fn schema_creates_link_tables_after_their_parents() {
        let (tables, indexes) = schema_statements().unwrap();
        assert_eq!(tables.len(), 5);
        assert!(tables[3].starts_with("CREATE TABLE IF NOT EXISTS `UserTagsLiked`("));
        assert!(tables[4].ends_with("PRIMARY KEY (uuid, tagID));"));
        assert_eq!(indexes, vec![TAG_NAME_INDEX.to_owned()]);
    }
}
