//! Fluent Cypher compiler
//!
//! ```text
//! CypherBuilder ──node()──▶ NodeStage ──done()/relates_to()──▶ CypherBuilder
//!       │                                                         │
//!       ├──relation()──▶ RelationStage ──create()/remove()──▶ ────┤
//!       ├──update()────▶ UpdateStage ──set()*──done()──────▶ ─────┤
//!       └──returning()/build()──▶ CompiledQuery
//! ```
//!
//! Property values never appear in the query text. Each one is bound as a
//! parameter (`$p0`, `$p1`, … in emission order) and travels next to the
//! text in [`CompiledQuery::params`]. Labels, relation types and property
//! keys cannot be parameters, so they must match an identifier allow-list.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write as _};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::node::Node;
use super::tag::{Tag, TagAllocator};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("invalid identifier regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("tag '{0}' is not an ASCII letter")]
    InvalidTag(char),

    #[error("tag '{0}' is claimed by more than one node")]
    DuplicateTag(char),

    #[error("tag '{0}' does not refer to a node in this query")]
    UnknownTag(char),

    #[error("all 26 tags are in use")]
    TagsExhausted,

    #[error("'{value}' is not a valid {kind}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("query has no node patterns")]
    NoNodes,
}

fn identifier(kind: &'static str, value: &str) -> Result<(), CompileError> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(CompileError::InvalidIdentifier {
            kind,
            value: value.to_owned(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Match,
    Merge,
}

impl QueryKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Merge => "MERGE",
        }
    }
}

/// Query text plus the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub params: BTreeMap<String, Value>,
}

impl CompiledQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Default)]
struct Params(BTreeMap<String, Value>);

impl Params {
    fn bind(&mut self, value: &Value) -> String {
        let name = format!("p{}", self.0.len());
        self.0.insert(name.clone(), value.clone());
        name
    }
}

#[derive(Debug, Clone)]
struct NodeSpec {
    node: Node,
    tag: Option<char>,
    with_properties: bool,
    relationship_match: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationOp {
    Create,
    Remove,
}

#[derive(Debug, Clone)]
struct RelationSpec {
    a: char,
    b: char,
    relation: String,
    bidirectional: bool,
    op: RelationOp,
}

impl RelationSpec {
    /// `scope` lists every tag in play, carried across each `WITH`.
    fn render(&self, scope: &str, out: &mut String) {
        let (a, b, rel) = (self.a, self.b, &self.relation);
        match self.op {
            RelationOp::Create => {
                let _ = write!(out, " MERGE ({a})-[:{rel}]->({b})");
                if self.bidirectional {
                    let _ = write!(out, " MERGE ({b})-[:{rel}]->({a})");
                }
            }
            RelationOp::Remove => {
                let _ = write!(out, " MATCH ({a})-[rel:{rel}]->({b}) DELETE rel");
                if self.bidirectional {
                    let _ = write!(out, " WITH {scope}");
                    let _ = write!(out, " MATCH ({b})-[rel:{rel}]->({a}) DELETE rel");
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct UpdateSpec {
    tag: char,
    node: Node,
}

/// Entry point of the compiler.
#[derive(Debug, Clone)]
pub struct CypherBuilder {
    kind: QueryKind,
    nodes: Vec<NodeSpec>,
    relations: Vec<RelationSpec>,
    updates: Vec<UpdateSpec>,
    with_return: bool,
    allocator: TagAllocator,
}

impl CypherBuilder {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            relations: Vec::new(),
            updates: Vec::new(),
            with_return: false,
            allocator: TagAllocator::sequential(),
        }
    }

    /// Replace the default sequential tag source.
    pub fn with_allocator(mut self, allocator: TagAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn node(self, node: &Node) -> NodeStage {
        NodeStage {
            builder: self,
            spec: NodeSpec {
                node: node.clone(),
                tag: None,
                with_properties: false,
                relationship_match: None,
            },
        }
    }

    pub fn relation(self, a: char, b: char, relation: impl Into<String>, bidirectional: bool) -> RelationStage {
        RelationStage {
            builder: self,
            a,
            b,
            relation: relation.into(),
            bidirectional,
        }
    }

    pub fn update(self) -> UpdateStage {
        UpdateStage { builder: self }
    }

    pub fn returning(mut self, with_return: bool) -> Self {
        self.with_return = with_return;
        self
    }

    /// Assemble the final query text and parameters.
    pub fn build(mut self) -> Result<CompiledQuery, CompileError> {
        if self.nodes.is_empty() {
            return Err(CompileError::NoNodes);
        }

        let mut claimed = HashSet::new();
        for spec in &self.nodes {
            if let Some(c) = spec.tag {
                let tag = Tag::new(c)?;
                if !claimed.insert(tag) {
                    return Err(CompileError::DuplicateTag(c));
                }
                self.allocator.reserve(tag);
            }
        }

        let mut params = Params::default();
        let mut allocated: Vec<Tag> = Vec::new();
        let mut clauses = Vec::with_capacity(self.nodes.len());

        for spec in &self.nodes {
            let tag = match spec.tag {
                Some(c) => Tag::new(c)?,
                None => self.allocator.allocate()?,
            };
            allocated.push(tag);

            let mut clause = format!("{} ({}", self.kind.keyword(), tag);
            let label = spec.node.label();
            if !label.is_empty() {
                identifier("label", label)?;
                let _ = write!(clause, ":{}", label.to_lowercase());
            }

            if spec.with_properties && spec.node.has_properties() {
                let mut pairs = Vec::new();
                for (key, value) in spec.node.property_iter() {
                    identifier("property key", key)?;
                    pairs.push(format!("{key}: ${}", params.bind(value)));
                }
                let _ = write!(clause, "{{{}}}", pairs.join(", "));
            }
            clause.push(')');

            if let Some(relation) = &spec.relationship_match {
                identifier("relation type", relation)?;
                let target = self.allocator.allocate()?;
                allocated.push(target);
                let _ = write!(clause, "-[:{relation}]->({target})");
            }

            clauses.push(clause);
        }

        let known = |c: char| allocated.iter().any(|t| t.as_char() == c);
        let scope = allocated
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut text = clauses.join(" ");

        // a MATCH may not follow an updating clause without a WITH
        for (i, relation) in self.relations.iter().enumerate() {
            for c in [relation.a, relation.b] {
                if !known(c) {
                    return Err(CompileError::UnknownTag(c));
                }
            }
            identifier("relation type", &relation.relation)?;
            if i > 0 {
                let _ = write!(text, " WITH {scope}");
            }
            relation.render(&scope, &mut text);
        }

        let mut assignments = Vec::new();
        for update in &self.updates {
            if !known(update.tag) {
                return Err(CompileError::UnknownTag(update.tag));
            }
            for (key, value) in update.node.property_iter() {
                identifier("property key", key)?;
                assignments.push(format!("{}.{key} = ${}", update.tag, params.bind(value)));
            }
        }
        if !assignments.is_empty() {
            text.push_str(" SET ");
            text.push_str(&assignments.join(", "));
        }

        if self.with_return {
            text.push_str(" RETURN ");
            text.push_str(&scope);
        }

        Ok(CompiledQuery {
            text,
            params: params.0,
        })
    }
}

/// Configures one node pattern.
#[derive(Debug)]
pub struct NodeStage {
    builder: CypherBuilder,
    spec: NodeSpec,
}

impl NodeStage {
    /// Emit the node's properties inside the pattern.
    pub fn with_properties(mut self, with_properties: bool) -> Self {
        self.spec.with_properties = with_properties;
        self
    }

    /// Use an explicit tag instead of an allocated one.
    pub fn with_tag(mut self, tag: char) -> Self {
        self.spec.tag = Some(tag);
        self
    }

    /// Follow one outgoing `relation` hop from this node to a fresh tag.
    pub fn match_relationship(mut self, relation: impl Into<String>) -> Self {
        self.spec.relationship_match = Some(relation.into());
        self
    }

    pub fn relates_to(self, relation: impl Into<String>) -> CypherBuilder {
        self.match_relationship(relation).done()
    }

    pub fn done(mut self) -> CypherBuilder {
        self.builder.nodes.push(self.spec);
        self.builder
    }
}

/// Relationship clause between two tagged nodes.
#[derive(Debug)]
pub struct RelationStage {
    builder: CypherBuilder,
    a: char,
    b: char,
    relation: String,
    bidirectional: bool,
}

impl RelationStage {
    fn finish(mut self, op: RelationOp) -> CypherBuilder {
        self.builder.relations.push(RelationSpec {
            a: self.a,
            b: self.b,
            relation: self.relation,
            bidirectional: self.bidirectional,
            op,
        });
        self.builder
    }

    /// `MERGE` the edge (and its reverse when bidirectional).
    pub fn create(self) -> CypherBuilder {
        self.finish(RelationOp::Create)
    }

    /// `MATCH` the edge and `DELETE` it (and its reverse when bidirectional).
    pub fn remove(self) -> CypherBuilder {
        self.finish(RelationOp::Remove)
    }
}

/// Property assignments onto already-tagged nodes.
#[derive(Debug)]
pub struct UpdateStage {
    builder: CypherBuilder,
}

impl UpdateStage {
    /// Assign every property of `replacement` onto the node tagged `tag`.
    pub fn set(mut self, tag: char, replacement: &Node) -> Self {
        self.builder.updates.push(UpdateSpec {
            tag,
            node: replacement.clone(),
        });
        self
    }

    pub fn done(self) -> CypherBuilder {
        self.builder
    }
}
