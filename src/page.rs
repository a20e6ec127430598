//! Cursor pagination, sorting and post-retrieval filtering
//!
//! The store only narrows by type (and optionally identity); everything here
//! runs over the full candidate list it returns.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::reduce::Entity;
use crate::value::{parse_datetime, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Eq,
    NotEq,
    Gt,
    Lt,
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    #[default]
    Asc,
    Desc,
}

/// One post-retrieval filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub key: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub operator: FilterOperator,
    /// How this filter's own values combine; any value matching by default
    #[serde(default)]
    pub filter_mode: Option<FilterMode>,
}

impl Filter {
    pub fn new(key: &str, values: &[&str], operator: FilterOperator) -> Self {
        Filter {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            operator,
            filter_mode: None,
        }
    }

    /// Whether `entity` passes this filter.
    ///
    /// A filter without values constrains nothing. Otherwise an entity
    /// without the key fails every operator except `not_eq`.
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.values.is_empty() {
            return true;
        }
        let actual = match entity.lookup(&self.key) {
            Some(v) => v.values(),
            None => return self.operator == FilterOperator::NotEq,
        };
        let test = |expected: &String| -> bool {
            match self.operator {
                FilterOperator::Eq => actual.iter().any(|a| compare_to(a, expected) == Ordering::Equal),
                FilterOperator::NotEq => actual.iter().all(|a| compare_to(a, expected) != Ordering::Equal),
                FilterOperator::Gt => actual.iter().any(|a| compare_to(a, expected) == Ordering::Greater),
                FilterOperator::Lt => actual.iter().any(|a| compare_to(a, expected) == Ordering::Less),
                FilterOperator::Lte => actual.iter().any(|a| compare_to(a, expected) != Ordering::Greater),
            }
        };
        match self.filter_mode.unwrap_or(FilterMode::Or) {
            FilterMode::Or => self.values.iter().any(test),
            FilterMode::And => self.values.iter().all(test),
        }
    }
}

/// Compare a stored value against a filter literal, reading the literal as
/// the stored value's kind
fn compare_to(actual: &Value, expected: &str) -> Ordering {
    let expected = match actual {
        Value::DateTime(_) => parse_datetime(expected).map(Value::DateTime),
        Value::Int(_) | Value::Float(_) => expected
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| expected.parse::<f64>().map(Value::Float))
            .ok(),
        Value::Bool(_) => expected.parse::<bool>().ok().map(Value::Bool),
        Value::Str(_) | Value::Iri(_) => None,
    }
    .unwrap_or_else(|| Value::Str(expected.to_string()));
    actual.compare(&expected)
}

/// Windowing, ordering and filtering for a list request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageArgs {
    pub first: Option<usize>,
    pub offset: Option<usize>,
    pub ordered_by: Option<String>,
    pub order_mode: OrderMode,
    pub filters: Vec<Filter>,
    pub filter_mode: FilterMode,
}

impl PageArgs {
    pub fn first(mut self, n: usize) -> Self {
        self.first = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn order_by(mut self, key: &str, mode: OrderMode) -> Self {
        self.ordered_by = Some(key.to_string());
        self.order_mode = mode;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    /// Keys the filters read, so they can be projected
    pub fn filter_keys(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.key.as_str()).collect()
    }

    fn accepts(&self, entity: &Entity) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.filter_mode {
            FilterMode::And => self.filters.iter().all(|f| f.matches(entity)),
            FilterMode::Or => self.filters.iter().any(|f| f.matches(entity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub cursor: String,
    pub node: Entity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub global_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

impl Connection {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Entity> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Sort, skip, filter and window `candidates`.
///
/// `offset` counts sorted candidates before filtering. Entities without an
/// `id` are skipped when `require_id` is set. `global_count` is the number
/// of candidates passing the filters; `has_next_page` is set when matches
/// remain past the returned window.
pub fn paginate(mut candidates: Vec<Entity>, args: &PageArgs, require_id: bool) -> Connection {
    if let Some(key) = &args.ordered_by {
        sort_entities(&mut candidates, key, args.order_mode);
    }

    let eligible = |entity: &Entity| -> bool {
        if require_id && entity.id().is_none() {
            warn!(iri = entity.iri(), "DATA-ERROR: object is missing its id; skipping");
            return false;
        }
        args.accepts(entity)
    };

    let offset = args.offset.unwrap_or(0);
    let limit = args.first.unwrap_or(usize::MAX);
    let mut global_count = 0;
    let mut edges = Vec::new();
    let mut has_next_page = false;

    for (position, entity) in candidates.into_iter().enumerate() {
        if !eligible(&entity) {
            continue;
        }
        global_count += 1;
        if position < offset {
            continue;
        }
        if edges.len() < limit {
            edges.push(Edge {
                cursor: entity.iri().to_string(),
                node: entity,
            });
        } else {
            has_next_page = true;
        }
    }

    Connection {
        page_info: PageInfo {
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
            has_next_page,
            has_previous_page: offset > 0,
            global_count,
        },
        edges,
    }
}

/// Stable sort on the first value of `key`; entities lacking it go last
pub fn sort_entities(entities: &mut [Entity], key: &str, mode: OrderMode) {
    entities.sort_by(|a, b| {
        let a = a.lookup(key).and_then(|v| v.first());
        let b = b.lookup(key).and_then(|v| v.first());
        match (a, b) {
            (Some(a), Some(b)) => match mode {
                OrderMode::Asc => a.compare(b),
                OrderMode::Desc => b.compare(a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}
