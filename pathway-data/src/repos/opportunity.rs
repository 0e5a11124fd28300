//! Opportunity repository
//!
//! Opportunities are read back with one LEFT JOIN over media and tags, so a
//! parent with M media and T tags arrives as up to M x T rows. [`materialize`]
//! folds those rows back into aggregates without duplicating children.
//!
//! Writes that touch several tables go through one transaction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::types::uuid::fmt::Hyphenated;
use sqlx::{FromRow, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregate::{Arena, Children};
use crate::error::Result;
use crate::models::{Cursor, Media, MediaType, Opportunity, Page, Tag};
use crate::sql::{InsertOptions, QueryOptions, SqlColumn, SqlRepository, Table, TransactionScope};

const CREATE_OPPORTUNITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS OpportunitiesTable (
    id INT AUTO_INCREMENT PRIMARY KEY,
    uuid VARCHAR(36) NOT NULL UNIQUE,
    title VARCHAR(100) NOT NULL,
    description TEXT NOT NULL,
    points INT NOT NULL,
    location VARCHAR(100),
    opportunityType ENUM('event', 'volunteer', 'job', 'issue') NOT NULL,
    postedByUUID VARCHAR(36) NOT NULL,
    createdAt DATETIME DEFAULT CURRENT_TIMESTAMP,
    updatedAt DATETIME DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
);
"#;

pub(crate) const TAG_NAME_INDEX: &str = "CREATE UNIQUE INDEX idx_tag_name ON TagsTable(tagName);";

const INDEXES: [&str; 4] = [
    "CREATE INDEX idx_opportunity_posted_by ON OpportunitiesTable(postedByUUID);",
    TAG_NAME_INDEX,
    "CREATE INDEX idx_opportunity_tags_tag ON OpportunityTagsTable(tagID);",
    "CREATE INDEX idx_media_opportunity ON OpportunityMediaTable(opportunityUUID);",
];

const INSERT_OPPORTUNITY: &str = "INSERT INTO OpportunitiesTable \
    (uuid, title, description, points, location, opportunityType, postedByUUID) \
    VALUES (?, ?, ?, ?, ?, ?, ?)";
const INSERT_OPPORTUNITY_TAG: &str =
    "INSERT INTO OpportunityTagsTable (opportunityUUID, tagID) VALUES (?, ?)";
const INSERT_MEDIA: &str =
    "INSERT INTO OpportunityMediaTable (opportunityUUID, mediaURL, mediaType) VALUES (?, ?, ?)";

const SELECT_TAG_BY_NAME: &str = "SELECT id, tagName FROM TagsTable WHERE tagName = ?";
const INSERT_TAG: &str = "INSERT INTO TagsTable (tagName) VALUES (?)";

const SELECT_TAGS_FOR: &str = "SELECT t.id, t.tagName FROM OpportunityTagsTable ot \
    JOIN TagsTable t ON ot.tagID = t.id \
    WHERE ot.opportunityUUID = ? ORDER BY t.id";
const SELECT_MEDIA_FOR: &str =
    "SELECT mediaURL, mediaType FROM OpportunityMediaTable WHERE opportunityUUID = ? ORDER BY id";

const DELETE_TAG_LINKS: &str = "DELETE FROM OpportunityTagsTable WHERE opportunityUUID = ?";
const DELETE_MEDIA: &str = "DELETE FROM OpportunityMediaTable WHERE opportunityUUID = ?";
const DELETE_OPPORTUNITY: &str = "DELETE FROM OpportunitiesTable WHERE uuid = ?";

/// Joined select over `source`, which is aliased `o`.
fn joined_select(source: &str, filter: &str) -> String {
    format!(
        "SELECT o.id, o.uuid, o.title, o.description, o.points, o.location, \
         o.opportunityType, o.postedByUUID, o.createdAt, o.updatedAt, \
         m.mediaURL, m.mediaType, t.id AS tagID, t.tagName \
         FROM {source} o \
         LEFT JOIN OpportunityMediaTable m ON o.uuid = m.opportunityUUID \
         LEFT JOIN OpportunityTagsTable ot ON o.uuid = ot.opportunityUUID \
         LEFT JOIN TagsTable t ON ot.tagID = t.id \
         {filter} ORDER BY o.id, m.id, t.id"
    )
}

/// One flattened row of the opportunity/media/tag join.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityRow {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
    pub points: i64,
    pub location: Option<String>,
    pub opportunity_type: String,
    pub posted_by: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
}

impl<'r> FromRow<'r, MySqlRow> for OpportunityRow {
    fn from_row(row: &'r MySqlRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            uuid: row.try_get::<Hyphenated, _>("uuid")?.into_uuid(),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            points: row.try_get("points")?,
            location: row.try_get("location")?,
            opportunity_type: row.try_get("opportunityType")?,
            posted_by: row.try_get::<Hyphenated, _>("postedByUUID")?.into_uuid(),
            created_at: row.try_get("createdAt")?,
            updated_at: row.try_get("updatedAt")?,
            media_url: row.try_get("mediaURL")?,
            media_type: row.try_get("mediaType")?,
            tag_id: row.try_get("tagID")?,
            tag_name: row.try_get("tagName")?,
        })
    }
}

/// Aggregates rebuilt from joined rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    /// In the order each parent was first seen.
    pub items: Vec<Opportunity>,
    /// Highest row id among the parents.
    pub last_id: i64,
    /// Distinct media entries dropped because their type did not parse.
    pub skipped_media: usize,
}

struct Aggregate {
    opportunity: Opportunity,
    media: Children<String, Media>,
    tags: Children<i64, Tag>,
}

/// Fold joined rows into one [`Opportunity`] per UUID.
///
/// Media are unique by URL and tags by id within each parent. A media row
/// whose type does not parse is skipped, once per URL however many tag rows
/// repeat it. Returns `None` when there were no rows at all, which is
/// distinct from parents with no children.
pub fn materialize<I>(rows: I) -> Option<Materialized>
where
    I: IntoIterator<Item = OpportunityRow>,
{
    let mut arena: Arena<Uuid, Aggregate> = Arena::new();
    let mut last_id = 0;
    let mut skipped_media = 0;

    for row in rows {
        last_id = last_id.max(row.id);

        let aggregate = arena.slot(row.uuid, || Aggregate {
            opportunity: Opportunity {
                id: row.id,
                uuid: row.uuid,
                title: row.title.clone(),
                description: row.description.clone(),
                points: row.points,
                location: row.location.clone().unwrap_or_default(),
                opportunity_type: row.opportunity_type.clone(),
                posted_by: row.posted_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
                tags: Vec::new(),
                media: Vec::new(),
            },
            media: Children::new(),
            tags: Children::new(),
        });

        if let (Some(url), Some(kind)) = (row.media_url, row.media_type) {
            if aggregate.media.first_sight(url.clone()) {
                match kind.parse::<MediaType>() {
                    Ok(kind) => aggregate.media.push(Media { kind, url }),
                    Err(e) => {
                        skipped_media += 1;
                        warn!(opportunity = %row.uuid, url = %url, error = %e, "skipping media row");
                    }
                }
            }
        }

        if let (Some(id), Some(name)) = (row.tag_id, row.tag_name) {
            aggregate.tags.insert(id, Tag { id, name });
        }
    }

    if arena.is_empty() {
        return None;
    }

    let items = arena
        .into_slots()
        .into_iter()
        .map(|a| Opportunity {
            media: a.media.into_items(),
            tags: a.tags.into_items(),
            ..a.opportunity
        })
        .collect();

    Some(Materialized {
        items,
        last_id,
        skipped_media,
    })
}

/// Shared by every repository that resolves tag names.
pub(crate) fn tags_table() -> Table {
    Table::new("TagsTable")
        .column(SqlColumn::integer_for_table("id", false, true))
        .column(SqlColumn::varchar_for_table("tagName", false, 50))
        .primary_key("id")
}

/// Table and index statements, in creation order.
pub fn schema_statements() -> Result<(Vec<String>, Vec<String>)> {
    let tags = tags_table();

    let opportunity_tags = Table::new("OpportunityTagsTable")
        .column(SqlColumn::uuid_for_table("opportunityUUID", false))
        .column(SqlColumn::integer_for_table("tagID", false, false))
        .primary_key("opportunityUUID")
        .primary_key("tagID");

    let media = Table::new("OpportunityMediaTable")
        .column(SqlColumn::integer_for_table("id", false, true))
        .column(SqlColumn::uuid_for_table("opportunityUUID", false))
        .column(SqlColumn::text_for_table("mediaURL", false))
        .column(SqlColumn::varchar_for_table("mediaType", false, 50))
        .primary_key("id");

    let tables = vec![
        CREATE_OPPORTUNITIES_TABLE.trim().to_owned(),
        tags.get_or_create_table_query(false)?,
        opportunity_tags.get_or_create_table_query(false)?,
        media.get_or_create_table_query(false)?,
    ];
    let indexes = INDEXES.iter().map(|s| (*s).to_owned()).collect();

    Ok((tables, indexes))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn tag_from_row(row: &MySqlRow) -> sqlx::Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("tagName")?,
    })
}

#[derive(Debug, Clone)]
pub struct OpportunityRepo {
    sql: SqlRepository,
}

impl OpportunityRepo {
    /// Wrap `sql`, creating any missing tables and indexes first.
    pub async fn new(sql: SqlRepository) -> Result<Self> {
        let (tables, indexes) = schema_statements()?;
        sql.init_schema(&tables, &indexes).await?;
        Ok(Self { sql })
    }

    /// Insert the opportunity with its tags and media. Nothing is written
    /// unless every statement succeeds.
    pub async fn create(&self, opportunity: &Opportunity) -> Result<()> {
        let mut tx = self.sql.start_transaction().await?;

        tx.execute(
            INSERT_OPPORTUNITY,
            &[
                SqlColumn::uuid("uuid", opportunity.uuid),
                SqlColumn::varchar("title", opportunity.title.as_str()),
                SqlColumn::text("description", opportunity.description.as_str()),
                SqlColumn::integer("points", opportunity.points),
                SqlColumn::varchar("location", opportunity.location.as_str()),
                SqlColumn::varchar("opportunityType", opportunity.opportunity_type.as_str()),
                SqlColumn::uuid("postedByUUID", opportunity.posted_by),
            ],
        )
        .await?;

        // names can differ yet resolve to one row under the column collation
        let mut linked = HashSet::new();
        for tag in &opportunity.tags {
            let tag_id = tag_id_in(&mut tx, &tag.name).await?;
            if !linked.insert(tag_id) {
                continue;
            }
            tx.execute(
                INSERT_OPPORTUNITY_TAG,
                &[
                    SqlColumn::uuid("opportunityUUID", opportunity.uuid),
                    SqlColumn::integer("tagID", tag_id),
                ],
            )
            .await?;
        }

        let mut attached = HashSet::new();
        for media in &opportunity.media {
            if !attached.insert(media.url.as_str()) {
                continue;
            }
            tx.execute(
                INSERT_MEDIA,
                &[
                    SqlColumn::uuid("opportunityUUID", opportunity.uuid),
                    SqlColumn::text("mediaURL", media.url.as_str()),
                    SqlColumn::varchar("mediaType", media.kind.as_str()),
                ],
            )
            .await?;
        }

        tx.commit().await?;
        info!(opportunity = %opportunity.uuid, tags = linked.len(), media = attached.len(), "created opportunity");
        Ok(())
    }

    /// Fetch opportunities by UUID in one query.
    pub async fn get(&self, uuids: &[Uuid]) -> Result<Option<Vec<Opportunity>>> {
        if uuids.is_empty() {
            return Ok(None);
        }

        let query = joined_select(
            "OpportunitiesTable",
            &format!("WHERE o.uuid IN ({})", placeholders(uuids.len())),
        );
        let columns: Vec<SqlColumn> = uuids.iter().map(|u| SqlColumn::uuid("uuid", *u)).collect();

        let rows = self.fetch_rows(&query, &columns).await?;
        Ok(materialize(rows).map(|m| m.items))
    }

    /// Every opportunity carrying the tag `name`.
    pub async fn list_by_tag(&self, name: &str) -> Result<Option<Vec<Opportunity>>> {
        let query = joined_select(
            "OpportunitiesTable",
            "WHERE o.uuid IN (SELECT link.opportunityUUID FROM OpportunityTagsTable link \
             JOIN TagsTable tag ON link.tagID = tag.id WHERE tag.tagName = ?)",
        );

        let rows = self
            .fetch_rows(&query, &[SqlColumn::varchar("tagName", name)])
            .await?;
        Ok(materialize(rows).map(|m| m.items))
    }

    /// Up to `cursor.limit()` opportunities with an id above `cursor.after()`.
    pub async fn list_from(&self, cursor: Cursor) -> Result<Option<Page<Opportunity>>> {
        let query = joined_select(
            "(SELECT * FROM OpportunitiesTable WHERE id > ? ORDER BY id LIMIT ?)",
            "",
        );
        let columns = [
            SqlColumn::integer("id", cursor.after()),
            SqlColumn::integer("limit", i64::from(cursor.limit())),
        ];

        let rows = self.fetch_rows(&query, &columns).await?;
        Ok(materialize(rows).map(|m| Page {
            items: m.items,
            last_id: m.last_id,
        }))
    }

    /// Remove the opportunity with its tag links and media. Returns the
    /// number of opportunities deleted.
    pub async fn delete(&self, uuid: Uuid) -> Result<u64> {
        let key = [SqlColumn::uuid("uuid", uuid)];

        let mut tx = self.sql.start_transaction().await?;
        tx.execute(DELETE_TAG_LINKS, &key).await?;
        tx.execute(DELETE_MEDIA, &key).await?;
        let deleted = tx.execute(DELETE_OPPORTUNITY, &key).await?.rows_affected();
        tx.commit().await?;

        debug!(opportunity = %uuid, deleted, "deleted opportunity");
        Ok(deleted)
    }

    pub async fn tags_for(&self, uuid: Uuid) -> Result<Vec<Tag>> {
        let rows = self
            .sql
            .execute_query(
                SELECT_TAGS_FOR,
                Some(&[SqlColumn::uuid("opportunityUUID", uuid)][..]),
                QueryOptions::default(),
            )
            .await?;

        Ok(rows.iter().map(tag_from_row).collect::<sqlx::Result<_>>()?)
    }

    /// Attached media, skipping rows with an unknown type.
    pub async fn media_for(&self, uuid: Uuid) -> Result<Vec<Media>> {
        let rows = self
            .sql
            .execute_query(
                SELECT_MEDIA_FOR,
                Some(&[SqlColumn::uuid("opportunityUUID", uuid)][..]),
                QueryOptions::default(),
            )
            .await?;

        let mut media = Vec::with_capacity(rows.len());
        for row in &rows {
            let url: String = row.try_get("mediaURL")?;
            let kind: String = row.try_get("mediaType")?;
            match kind.parse::<MediaType>() {
                Ok(kind) => media.push(Media { kind, url }),
                Err(e) => warn!(opportunity = %uuid, error = %e, "skipping media row"),
            }
        }
        Ok(media)
    }

    /// Look a tag up by name, inserting it when `create_if_missing` is set.
    pub async fn find_tag(&self, name: &str, create_if_missing: bool) -> Result<Option<Tag>> {
        let rows = self
            .sql
            .execute_query(
                SELECT_TAG_BY_NAME,
                Some(&[SqlColumn::varchar("tagName", name)][..]),
                QueryOptions::default(),
            )
            .await?;

        if let Some(row) = rows.first() {
            return Ok(Some(tag_from_row(row)?));
        }
        if !create_if_missing {
            return Ok(None);
        }

        let mut inserted_id = None;
        self.sql
            .execute_insert(
                INSERT_TAG,
                &[SqlColumn::varchar("tagName", name)],
                InsertOptions::default().on_complete(|r| inserted_id = Some(r.last_insert_id() as i64)),
            )
            .await?;

        Ok(inserted_id.map(|id| Tag {
            id,
            name: name.to_owned(),
        }))
    }

    async fn fetch_rows(&self, query: &str, columns: &[SqlColumn]) -> Result<Vec<OpportunityRow>> {
        let rows = self
            .sql
            .execute_query(query, Some(columns), QueryOptions::default())
            .await?;
        Ok(rows
            .iter()
            .map(OpportunityRow::from_row)
            .collect::<sqlx::Result<_>>()?)
    }
}

/// Resolve a tag id inside `tx`, creating the tag if needed.
pub(crate) async fn tag_id_in(tx: &mut TransactionScope, name: &str) -> Result<i64> {
    let column = [SqlColumn::varchar("tagName", name)];

    let rows = tx.fetch_all(SELECT_TAG_BY_NAME, &column).await?;
    if let Some(row) = rows.first() {
        return Ok(row.try_get("id")?);
    }

    let result = tx.execute(INSERT_TAG, &column).await?;
    Ok(result.last_insert_id() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::placeholder_count;

    fn row(id: i64, uuid: Uuid) -> OpportunityRow {
        OpportunityRow {
            id,
            uuid,
            title: "Beach clean-up".into(),
            description: "Bring gloves".into(),
            points: 50,
            location: Some("Brighton".into()),
            opportunity_type: "volunteer".into(),
            posted_by: Uuid::nil(),
            created_at: None,
            updated_at: None,
            media_url: None,
            media_type: None,
            tag_id: None,
            tag_name: None,
        }
    }

    fn with_child(mut base: OpportunityRow, media: Option<(&str, &str)>, tag: Option<(i64, &str)>) -> OpportunityRow {
        if let Some((url, kind)) = media {
            base.media_url = Some(url.into());
            base.media_type = Some(kind.into());
        }
        if let Some((id, name)) = tag {
            base.tag_id = Some(id);
            base.tag_name = Some(name.into());
        }
        base
    }

    #[test]
    fn join_product_collapses_to_one_aggregate() {
        let uuid = Uuid::new_v4();
        let media = [("https://cdn/a.png", "Image"), ("https://cdn/b.mp4", "Video")];
        let tags = [(1, "outdoors"), (2, "beach"), (3, "weekend")];

        let mut rows = Vec::new();
        for m in media {
            for t in tags {
                rows.push(with_child(row(7, uuid), Some(m), Some(t)));
            }
        }
        assert_eq!(rows.len(), 6);

        let result = materialize(rows).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.last_id, 7);

        let opportunity = &result.items[0];
        assert_eq!(opportunity.media.len(), 2);
        assert_eq!(opportunity.tags.len(), 3);
        assert_eq!(opportunity.media[0].url, "https://cdn/a.png");
        assert_eq!(opportunity.media[1].kind, MediaType::Video);
        let names: Vec<_> = opportunity.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["outdoors", "beach", "weekend"]);
    }

    #[test]
    fn no_rows_is_none() {
        assert_eq!(materialize(Vec::new()), None);
    }

    #[test]
    fn parent_without_children_is_kept() {
        let result = materialize(vec![row(3, Uuid::new_v4())]).unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].tags.is_empty());
        assert!(result.items[0].media.is_empty());
        assert_eq!(result.items[0].location, "Brighton");
    }

    #[test]
    fn media_and_tags_are_independent() {
        let uuid = Uuid::new_v4();
        let rows = vec![
            with_child(row(1, uuid), None, Some((9, "food"))),
            with_child(row(1, uuid), Some(("https://cdn/x.png", "Image")), None),
        ];
        let opportunity = &materialize(rows).unwrap().items[0];
        assert_eq!(opportunity.tags, vec![Tag { id: 9, name: "food".into() }]);
        assert_eq!(opportunity.media.len(), 1);
    }

    #[test]
    fn unknown_media_type_is_skipped() {
        let uuid = Uuid::new_v4();
        let rows = vec![
            with_child(row(1, uuid), Some(("https://cdn/x.gif", "Gif")), None),
            with_child(row(1, uuid), Some(("https://cdn/y.txt", "Text")), None),
        ];
        let result = materialize(rows).unwrap();
        assert_eq!(result.skipped_media, 1);
        let opportunity = &result.items[0];
        assert_eq!(opportunity.media.len(), 1);
        assert_eq!(opportunity.media[0].kind, MediaType::Text);
    }

    #[test]
    fn bad_media_repeated_by_tag_rows_is_skipped_once() {
        let uuid = Uuid::new_v4();
        let rows: Vec<_> = [(1, "a"), (2, "b"), (3, "c")]
            .into_iter()
            .map(|t| with_child(row(1, uuid), Some(("https://cdn/x.gif", "Gif")), Some(t)))
            .collect();

        let result = materialize(rows).unwrap();
        assert_eq!(result.skipped_media, 1);
        assert!(result.items[0].media.is_empty());
        assert_eq!(result.items[0].tags.len(), 3);
    }

    #[test]
    fn same_bad_url_on_two_parents_counts_per_parent() {
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            with_child(row(1, first), Some(("https://cdn/x.gif", "Gif")), None),
            with_child(row(2, second), Some(("https://cdn/x.gif", "Gif")), None),
        ];
        assert_eq!(materialize(rows).unwrap().skipped_media, 2);
    }

    #[test]
    fn parents_keep_first_seen_order() {
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            with_child(row(4, first), None, Some((1, "a"))),
            with_child(row(9, second), None, Some((1, "a"))),
            with_child(row(4, first), None, Some((2, "b"))),
        ];
        let result = materialize(rows).unwrap();
        let order: Vec<_> = result.items.iter().map(|o| o.uuid).collect();
        assert_eq!(order, vec![first, second]);
        assert_eq!(result.items[0].tags.len(), 2);
        assert_eq!(result.last_id, 9);
    }

    #[test]
    fn schema_uses_builder_for_link_tables() {
        let (tables, indexes) = schema_statements().unwrap();
        assert_eq!(tables.len(), 4);
        assert!(tables[0].starts_with("CREATE TABLE IF NOT EXISTS OpportunitiesTable"));
        assert!(tables[2].ends_with("PRIMARY KEY (opportunityUUID, tagID));"));
        assert_eq!(indexes.len(), 4);
    }

    #[test]
    fn joined_select_placeholders_match_bindings() {
        let by_uuid = joined_select("OpportunitiesTable", &format!("WHERE o.uuid IN ({})", placeholders(3)));
        assert_eq!(placeholder_count(&by_uuid), 3);

        let page = joined_select("(SELECT * FROM OpportunitiesTable WHERE id > ? ORDER BY id LIMIT ?)", "");
        assert_eq!(placeholder_count(&page), 2);
    }
}
