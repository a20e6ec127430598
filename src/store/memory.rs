//! In-memory quad store
//!
//! Interprets [`SelectQuery`] and [`Statement`] values structurally instead
//! of parsing SPARQL. Every graph is visible to every lookup, whatever the
//! query's dataset context. Records each write and can be told to fail a
//! given write or every query.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::error::{MapperError, Result};
use crate::query::{Object, SelectQuery, Statement, Subject, Triple};
use crate::reduce::Solution;
use crate::store::{ErrorResponse, TripleStore};
use crate::value::Term;
use crate::vocab::{ASSET_INVENTORY, ID, INVENTORY_ASSETS, RDF_TYPE};

/// A triple inside a named graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    pub graph: String,
    pub triple: Triple,
}

#[derive(Default)]
pub struct MemoryStore {
    quads: RwLock<Vec<Quad>>,
    log: Mutex<Vec<(String, Statement)>>,
    writes: AtomicUsize,
    queries: AtomicUsize,
    fail_write: Option<usize>,
    fail_queries: Option<ErrorResponse>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one empty asset inventory at `iri`
    pub fn with_inventory(iri: &str) -> Self {
        let store = Self::new();
        store.insert_quad(iri, Triple::new(iri, RDF_TYPE, Object::iri(ASSET_INVENTORY)));
        store
    }

    /// Fail the `n`-th write call (1-based) with a backend error
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_write = Some(n);
        self
    }

    /// Answer every query with `response`
    pub fn fail_queries(mut self, response: ErrorResponse) -> Self {
        self.fail_queries = Some(response);
        self
    }

    /// Statements applied so far, with their labels
    pub fn statements(&self) -> Vec<(String, Statement)> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of lookups issued
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn quads(&self) -> Vec<Quad> {
        self.quads.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether any triple lives in graph `iri`
    pub fn graph_exists(&self, iri: &str) -> bool {
        let iri = crate::value::strip_angles(iri);
        self.quads.read().unwrap_or_else(PoisonError::into_inner).iter().any(|q| q.graph == iri)
    }

    /// Objects of `<subject> <predicate>` across all graphs
    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<Object> {
        self.quads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|q| q.triple.subject == subject && q.triple.predicate == predicate)
            .map(|q| q.triple.object.clone())
            .collect()
    }

    pub fn insert_quad(&self, graph: &str, triple: Triple) {
        let quad = Quad {
            graph: crate::value::strip_angles(graph).to_string(),
            triple,
        };
        let mut quads = self.quads.write().unwrap_or_else(PoisonError::into_inner);
        if !quads.contains(&quad) {
            quads.push(quad);
        }
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Solution>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(resp) = &self.fail_queries {
            return Err(resp.clone().into());
        }
        let quads = self.quads.read().unwrap_or_else(PoisonError::into_inner);
        let has = |s: &str, p: &str, o: &Object| {
            quads
                .iter()
                .any(|q| q.triple.subject == s && q.triple.predicate == p && q.triple.object == *o)
        };
        let class = Object::iri(&query.class_iri);

        let mut subjects: Vec<String> = Vec::new();
        match &query.subject {
            Subject::Bound(iri) => subjects.push(iri.clone()),
            Subject::ById(id) => {
                let literal = Object::literal(id.clone(), crate::value::Datatype::String);
                for q in quads.iter() {
                    if q.triple.predicate == ID && q.triple.object == literal && !subjects.contains(&q.triple.subject) {
                        subjects.push(q.triple.subject.clone());
                    }
                }
            }
            Subject::Any => {
                for q in quads.iter() {
                    if q.triple.predicate == RDF_TYPE && q.triple.object == class && !subjects.contains(&q.triple.subject) {
                        subjects.push(q.triple.subject.clone());
                    }
                }
            }
        }
        subjects.retain(|s| has(s, RDF_TYPE, &class));
        if query.inventory {
            let inventory = Object::iri(ASSET_INVENTORY);
            subjects.retain(|s| {
                let member = Object::iri(s);
                quads.iter().any(|q| {
                    q.triple.predicate == INVENTORY_ASSETS
                        && q.triple.object == member
                        && has(&q.triple.subject, RDF_TYPE, &inventory)
                })
            });
        }

        let follow = |start: &str, path: &[String]| -> Vec<Object> {
            let mut frontier = vec![Object::iri(start)];
            for predicate in path {
                let mut next = Vec::new();
                for node in &frontier {
                    let Object::Iri { iri } = node else { continue };
                    for q in quads.iter() {
                        if &q.triple.subject == iri && &q.triple.predicate == predicate && !next.contains(&q.triple.object) {
                            next.push(q.triple.object.clone());
                        }
                    }
                }
                frontier = next;
            }
            frontier
        };

        let mut solutions = Vec::new();
        for subject in subjects {
            let mut base = Solution::new();
            base.insert("iri".to_string(), Term::iri(subject.clone()));
            let mut extra = Vec::new();
            for pattern in &query.patterns {
                let mut values = follow(&subject, pattern.path()).into_iter();
                if let Some(first) = values.next() {
                    base.insert(pattern.name().to_string(), first.to_term());
                }
                for more in values {
                    let mut s = Solution::new();
                    s.insert("iri".to_string(), Term::iri(subject.clone()));
                    s.insert(pattern.name().to_string(), more.to_term());
                    extra.push(s);
                }
            }
            solutions.push(base);
            solutions.extend(extra);
        }
        Ok(solutions)
    }

    fn apply(&self, statement: &Statement, label: &str) -> Result<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_write == Some(n) {
            debug!(write = n, label, "injected write failure");
            return Err(MapperError::from(
                ErrorResponse::new(500, "Internal Server Error").with_body("injected failure", "TEST"),
            ));
        }

        {
            let mut quads = self.quads.write().unwrap_or_else(PoisonError::into_inner);
            match statement {
                Statement::InsertData { graph, triples } => {
                    for t in triples {
                        let quad = Quad {
                            graph: graph.clone(),
                            triple: t.clone(),
                        };
                        if !quads.contains(&quad) {
                            quads.push(quad);
                        }
                    }
                }
                Statement::DeleteData { graph, triples } => {
                    quads.retain(|q| !(q.graph == *graph && triples.contains(&q.triple)));
                }
                Statement::Replace {
                    graph,
                    subject,
                    predicate,
                    values,
                } => {
                    quads.retain(|q| {
                        !(q.graph == *graph && q.triple.subject == *subject && q.triple.predicate == *predicate)
                    });
                    for v in values {
                        quads.push(Quad {
                            graph: graph.clone(),
                            triple: Triple::new(subject, predicate, v.clone()),
                        });
                    }
                }
                Statement::DropEntityGraph { graph, class_iri } => {
                    let class = Object::iri(class_iri);
                    let typed: Vec<String> = quads
                        .iter()
                        .filter(|q| q.graph == *graph && q.triple.predicate == RDF_TYPE && q.triple.object == class)
                        .map(|q| q.triple.subject.clone())
                        .collect();
                    quads.retain(|q| !(q.graph == *graph && typed.contains(&q.triple.subject)));
                }
                Statement::AddToInventory { iri } => {
                    let inventory = Object::iri(ASSET_INVENTORY);
                    let links: Vec<Quad> = quads
                        .iter()
                        .filter(|q| q.triple.predicate == RDF_TYPE && q.triple.object == inventory)
                        .map(|q| Quad {
                            graph: q.graph.clone(),
                            triple: Triple::new(&q.triple.subject, INVENTORY_ASSETS, Object::iri(iri)),
                        })
                        .collect();
                    for link in links {
                        if !quads.contains(&link) {
                            quads.push(link);
                        }
                    }
                }
                Statement::RemoveFromInventory { iri } => {
                    let member = Object::iri(iri);
                    quads.retain(|q| !(q.triple.predicate == INVENTORY_ASSETS && q.triple.object == member));
                }
            }
        }

        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((label.to_string(), statement.clone()));
        Ok(())
    }
}

impl TripleStore for MemoryStore {
    fn query_by_id(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>> {
        debug!(db, label, "memory query_by_id");
        self.select(query)
    }

    fn query_all(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>> {
        debug!(db, label, "memory query_all");
        self.select(query)
    }

    fn create(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        debug!(db, label, "memory create");
        self.apply(statement, label)
    }

    fn edit(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        debug!(db, label, "memory edit");
        self.apply(statement, label)
    }

    fn delete(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        debug!(db, label, "memory delete");
        self.apply(statement, label)
    }
}
