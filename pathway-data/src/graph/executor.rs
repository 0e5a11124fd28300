//! Graph operations over a [`GraphStore`]
//!
//! Each call compiles one query, runs it in a write transaction that lives
//! only for that call, and folds every node-typed value of every record into
//! one flat list, record by record. Which value answered which tag is not
//! tracked.

use tracing::{debug, warn};

use super::node::Node;
use super::query::{CompiledQuery, CypherBuilder, QueryKind};
use super::store::{GraphRecord, GraphStore, GraphValue, SessionConfig};
use crate::error::{DataError, Result};

#[derive(Debug, Clone)]
pub struct GraphRepository<S> {
    store: S,
    session: SessionConfig,
}

impl<S: GraphStore> GraphRepository<S> {
    /// Sessions target the `neo4j` database in write mode.
    pub fn new(store: S) -> Self {
        Self::with_session(store, SessionConfig::default())
    }

    pub fn with_session(store: S, session: SessionConfig) -> Self {
        Self { store, session }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `MERGE` the node and return what the store reports back.
    pub async fn create_node(&self, node: &Node) -> Result<Node> {
        let query = CypherBuilder::new(QueryKind::Merge)
            .node(node)
            .with_properties(true)
            .done()
            .returning(true)
            .build()?;

        self.execute(query)
            .await?
            .into_iter()
            .next()
            .ok_or(DataError::NoNodeCreated)
    }

    /// Match `old` and overwrite it with every property of `new`.
    pub async fn update_node(&self, old: &Node, new: &Node) -> Result<Node> {
        let query = CypherBuilder::new(QueryKind::Match)
            .node(old)
            .with_properties(true)
            .with_tag('a')
            .done()
            .update()
            .set('a', new)
            .done()
            .returning(true)
            .build()?;

        self.execute(query)
            .await?
            .into_iter()
            .next()
            .ok_or(DataError::NoNodesUpdated)
    }

    /// Exactly-one lookup by label and properties.
    pub async fn get_node(&self, node: &Node) -> Result<Option<Node>> {
        let query = CypherBuilder::new(QueryKind::Match)
            .node(node)
            .with_properties(true)
            .done()
            .returning(true)
            .build()?;

        let mut nodes = self.execute(query).await?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            found => Err(DataError::MultipleResults { expected: 1, found }),
        }
    }

    /// Follow one outgoing `relation` hop. The source node appears in the
    /// output once per record, ahead of each target.
    pub async fn get_node_relations(&self, node: &Node, relation: &str) -> Result<Vec<Node>> {
        let query = CypherBuilder::new(QueryKind::Match)
            .node(node)
            .with_properties(true)
            .relates_to(relation)
            .returning(true)
            .build()?;

        self.execute(query).await
    }

    pub async fn create_relation(&self, a: &Node, b: &Node, relation: &str, bidirectional: bool) -> Result<()> {
        let query = Self::pair(a, b)
            .relation('a', 'b', relation, bidirectional)
            .create()
            .returning(true)
            .build()?;

        self.execute(query).await.map(drop)
    }

    pub async fn remove_relation(&self, a: &Node, b: &Node, relation: &str, bidirectional: bool) -> Result<()> {
        let query = Self::pair(a, b)
            .relation('a', 'b', relation, bidirectional)
            .remove()
            .returning(true)
            .build()?;

        self.execute(query).await.map(drop)
    }

    fn pair(a: &Node, b: &Node) -> CypherBuilder {
        CypherBuilder::new(QueryKind::Match)
            .node(a)
            .with_properties(true)
            .with_tag('a')
            .done()
            .node(b)
            .with_properties(true)
            .with_tag('b')
            .done()
    }

    async fn execute(&self, query: CompiledQuery) -> Result<Vec<Node>> {
        debug!(query = %query, params = query.params.len(), "running graph query");

        let mut tx = self.store.begin(&self.session).await?;
        match tx.run(&query).await {
            Ok(records) => {
                tx.commit().await?;
                Ok(collect_nodes(records))
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "graph rollback failed");
                }
                Err(e.into())
            }
        }
    }
}

fn collect_nodes(records: Vec<GraphRecord>) -> Vec<Node> {
    records
        .into_iter()
        .flat_map(|record| record.values)
        .filter_map(|value| match value {
            GraphValue::Node(graph_node) => {
                let mut node = Node::new();
                if let Some(label) = graph_node.labels.into_iter().next() {
                    node.set_label(label);
                }
                for (key, value) in graph_node.properties {
                    node.add_property(key, value);
                }
                Some(node)
            }
            GraphValue::Scalar(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::graph::testing::{record, user_node, Event, ScriptedStore};
    use serde_json::json;

    fn user(uuid: &str) -> Node {
        let mut node = Node::with_label("User");
        node.add_property("uuid", uuid);
        node
    }

    #[tokio::test]
    async fn create_node_commits_and_maps_result() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![record(vec![user_node("u-1")])]));

        let created = repo.create_node(&user("u-1")).await.unwrap();

        assert_eq!(created.label(), "User");
        assert_eq!(created.property("uuid"), Some(&json!("u-1")));
        assert_eq!(repo.store().queries(), vec!["MERGE (a:user{uuid: $p0}) RETURN a"]);
        let events = repo.store().events();
        assert_eq!(events.first(), Some(&Event::Begin(SessionConfig::default())));
        assert_eq!(events.last(), Some(&Event::Commit));
    }

    #[tokio::test]
    async fn create_node_without_result_fails() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![]));
        let err = repo.create_node(&user("u-1")).await.unwrap_err();
        assert!(matches!(err, DataError::NoNodeCreated));
    }

    #[tokio::test]
    async fn update_node_without_match_fails() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![]));
        let err = repo.update_node(&user("u-1"), &user("u-2")).await.unwrap_err();
        assert!(matches!(err, DataError::NoNodesUpdated));
        assert_eq!(
            repo.store().queries(),
            vec!["MATCH (a:user{uuid: $p0}) SET a.uuid = $p1 RETURN a"]
        );
    }

    #[tokio::test]
    async fn get_node_result_counts() {
        let none = GraphRepository::new(ScriptedStore::new().reply(vec![]));
        assert_eq!(none.get_node(&user("u-1")).await.unwrap(), None);

        let one = GraphRepository::new(ScriptedStore::new().reply(vec![record(vec![user_node("u-1")])]));
        assert_eq!(one.get_node(&user("u-1")).await.unwrap(), Some(user("u-1")));

        let two = GraphRepository::new(ScriptedStore::new().reply(vec![
            record(vec![user_node("u-1")]),
            record(vec![user_node("u-1")]),
        ]));
        let err = two.get_node(&user("u-1")).await.unwrap_err();
        assert!(matches!(err, DataError::MultipleResults { expected: 1, found: 2 }));
    }

    #[tokio::test]
    async fn relations_flatten_every_node_value() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![
            record(vec![user_node("u-1"), user_node("u-2")]),
            record(vec![user_node("u-1"), GraphValue::Scalar(json!(3)), user_node("u-3")]),
        ]));

        let nodes = repo.get_node_relations(&user("u-1"), "MATCH").await.unwrap();
        let uuids: Vec<_> = nodes.iter().map(|n| n.property("uuid").cloned().unwrap()).collect();

        assert_eq!(uuids, vec![json!("u-1"), json!("u-2"), json!("u-1"), json!("u-3")]);
        assert_eq!(
            repo.store().queries(),
            vec!["MATCH (a:user{uuid: $p0})-[:MATCH]->(b) RETURN a, b"]
        );
    }

    #[tokio::test]
    async fn store_failure_rolls_back() {
        let repo = GraphRepository::new(ScriptedStore::new().fail("connection reset"));
        let err = repo
            .create_relation(&user("u-1"), &user("u-2"), "MATCH", true)
            .await
            .unwrap_err();

        assert!(matches!(err, DataError::Graph(_)));
        let events = repo.store().events();
        assert_eq!(events.last(), Some(&Event::Rollback));
        assert_eq!(events.iter().filter(|e| **e == Event::Rollback).count(), 1);
        assert!(!events.contains(&Event::Commit));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_call_rolls_back_on_drop() {
        let repo = GraphRepository::new(ScriptedStore::new().hang());

        let outcome = tokio::time::timeout(Duration::from_secs(5), repo.create_node(&user("u-1"))).await;

        assert!(outcome.is_err());
        let events = repo.store().events();
        assert!(matches!(events[..], [Event::Begin(_), Event::Run(_), Event::Rollback]));
    }

    #[tokio::test]
    async fn committed_transaction_is_not_rolled_back_on_drop() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![]));
        repo.create_relation(&user("u-1"), &user("u-2"), "MATCH", false)
            .await
            .unwrap();

        assert!(!repo.store().events().contains(&Event::Rollback));
    }

    #[tokio::test]
    async fn remove_relation_runs_one_transaction() {
        let repo = GraphRepository::new(ScriptedStore::new().reply(vec![]));
        repo.remove_relation(&user("u-1"), &user("u-2"), "MATCH", true)
            .await
            .unwrap();

        let queries = repo.store().queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].matches("DELETE rel").count(), 2);
    }

    #[tokio::test]
    async fn bad_relation_name_never_reaches_store() {
        let repo = GraphRepository::new(ScriptedStore::new());
        let err = repo
            .create_relation(&user("u-1"), &user("u-2"), "A B", false)
            .await
            .unwrap_err();

        assert!(matches!(err, DataError::Compile(_)));
        assert!(repo.store().events().is_empty());
    }
}
