//! Match graph between users
//!
//! Users are `User` nodes keyed by their `uuid` property; a match is a
//! `MATCH` edge in both directions.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::graph::{GraphRepository, GraphStore, Node};

const USER_LABEL: &str = "User";
const MATCH_RELATION: &str = "MATCH";

fn user_node(uuid: Uuid) -> Node {
    let mut node = Node::with_label(USER_LABEL);
    node.add_property("uuid", uuid.to_string());
    node
}

pub struct MatchesRepo<S> {
    graph: GraphRepository<S>,
}

impl<S: GraphStore> MatchesRepo<S> {
    pub fn new(graph: GraphRepository<S>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &GraphRepository<S> {
        &self.graph
    }

    /// Ensure both users exist, then link them both ways.
    pub async fn create_match(&self, a: Uuid, b: Uuid) -> Result<()> {
        let first = self.graph.create_node(&user_node(a)).await?;
        let second = self.graph.create_node(&user_node(b)).await?;
        self.graph
            .create_relation(&first, &second, MATCH_RELATION, true)
            .await?;
        debug!(%a, %b, "created match");
        Ok(())
    }

    pub async fn remove_match(&self, a: Uuid, b: Uuid) -> Result<()> {
        self.graph
            .remove_relation(&user_node(a), &user_node(b), MATCH_RELATION, true)
            .await
    }

    /// UUIDs matched with `user`, or `None` when there are none.
    ///
    /// The user node is created on first lookup.
    pub async fn get_matches(&self, user: Uuid) -> Result<Option<Vec<Uuid>>> {
        let wanted = user_node(user);
        let node = match self.graph.get_node(&wanted).await? {
            Some(node) => node,
            None => self.graph.create_node(&wanted).await?,
        };

        let related = self.graph.get_node_relations(&node, MATCH_RELATION).await?;

        let mut matches = Vec::new();
        for node in &related {
            let Some(raw) = node.property("uuid").and_then(|v| v.as_str()) else {
                warn!(?node, "related node has no string uuid");
                continue;
            };
            let Ok(uuid) = Uuid::parse_str(raw) else {
                warn!(uuid = raw, "related node has an unparsable uuid");
                continue;
            };
            if uuid != user && !matches.contains(&uuid) {
                matches.push(uuid);
            }
        }

        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(matches))
    }
}
