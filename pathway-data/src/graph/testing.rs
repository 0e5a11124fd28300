//! Scripted in-memory graph store for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::query::CompiledQuery;
use super::store::{
    GraphNode, GraphRecord, GraphStore, GraphStoreError, GraphTransaction, GraphValue, SessionConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin(SessionConfig),
    Run(CompiledQuery),
    Commit,
    Rollback,
}

enum Response {
    Records(Result<Vec<GraphRecord>, GraphStoreError>),
    Hang,
}

/// Replies to each transaction with the next queued response.
#[derive(Default)]
pub struct ScriptedStore {
    responses: Mutex<VecDeque<Response>>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, records: Vec<GraphRecord>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Records(Ok(records)));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Records(Err(GraphStoreError::new(message))));
        self
    }

    /// The next query never completes.
    pub fn hang(self) -> Self {
        self.responses.lock().unwrap().push_back(Response::Hang);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Text of every query run so far.
    pub fn queries(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Run(q) => Some(q.text),
                _ => None,
            })
            .collect()
    }
}

/// Rolls back on drop unless finished, like a driver transaction.
struct ScriptedTransaction {
    response: Option<Response>,
    events: Arc<Mutex<Vec<Event>>>,
    finished: bool,
}

impl ScriptedTransaction {
    fn finish(mut self: Box<Self>, event: Event) {
        self.finished = true;
        self.events.lock().unwrap().push(event);
    }
}

impl Drop for ScriptedTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.events.lock().unwrap().push(Event::Rollback);
        }
    }
}

#[async_trait]
impl GraphTransaction for ScriptedTransaction {
    async fn run(&mut self, query: &CompiledQuery) -> Result<Vec<GraphRecord>, GraphStoreError> {
        self.events.lock().unwrap().push(Event::Run(query.clone()));
        match self.response.take() {
            Some(Response::Records(records)) => records,
            Some(Response::Hang) => std::future::pending().await,
            None => Ok(Vec::new()),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphStoreError> {
        self.finish(Event::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphStoreError> {
        self.finish(Event::Rollback);
        Ok(())
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn begin(&self, config: &SessionConfig) -> Result<Box<dyn GraphTransaction>, GraphStoreError> {
        self.events.lock().unwrap().push(Event::Begin(config.clone()));
        Ok(Box::new(ScriptedTransaction {
            response: self.responses.lock().unwrap().pop_front(),
            events: Arc::clone(&self.events),
            finished: false,
        }))
    }
}

pub fn user_node(uuid: &str) -> GraphValue {
    let mut properties = Map::new();
    properties.insert("uuid".into(), Value::from(uuid));
    GraphValue::Node(GraphNode {
        labels: vec!["User".into()],
        properties,
    })
}

pub fn record(values: Vec<GraphValue>) -> GraphRecord {
    let keys = (0..values.len())
        .map(|i| char::from(b'a' + i as u8).to_string())
        .collect();
    GraphRecord { keys, values }
}
