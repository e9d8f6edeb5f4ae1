//! Project aggregate - the read-only snapshot gates are evaluated against

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One record (project attributes or a child row) as field name -> value
pub type Record = BTreeMap<String, Value>;

/// Build a record from field/value pairs
pub fn record<K, I>(fields: I) -> Record
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// A project plus the child collections requirements can reach
///
/// In YAML the project's own attributes sit at the top level next to `id`,
/// and children are grouped under `relations`:
///
/// ```yaml
/// id: TCS-2024-001
/// partner_id: 42
/// design_approved_at: ~
/// relations:
///   orders:
///     - id: SO-1001
///       deposit_paid_at: 2024-03-01T10:00:00Z
///   rooms:
///     - name: Kitchen
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectAggregate {
    /// Project identifier
    pub id: String,

    /// Named child collections (orders, rooms, cabinets, bom_lines, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Vec<Record>>,

    /// The project's own attributes
    #[serde(flatten)]
    pub fields: Record,
}

impl ProjectAggregate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set a project attribute
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Replace a child collection
    pub fn with_relation(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.relations.insert(name.into(), records);
        self
    }

    /// A project can only be evaluated when it has a usable identifier
    pub fn is_addressable(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Project attribute, or None when the attribute is not part of the snapshot
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Child collection, or None when the relation is not part of the snapshot
    pub fn relation(&self, name: &str) -> Option<&[Record]> {
        self.relations.get(name).map(|v| v.as_slice())
    }

    /// Resolve a target model name to the record its fields are read from
    ///
    /// `Project` (or no model) is the project itself; `SalesOrder` and
    /// `Partner` are the first record of `orders` / `partner`; any other
    /// name is the first record of the relation with that exact name.
    pub fn model(&self, name: Option<&str>) -> ModelLookup<'_> {
        let relation = match name.map(str::trim) {
            None | Some("") | Some("Project") => return ModelLookup::Found(&self.fields),
            Some("SalesOrder") => "orders",
            Some("Partner") => "partner",
            Some(other) => other,
        };
        match self.relation(relation) {
            Some(rows) => match rows.first() {
                Some(first) => ModelLookup::Found(first),
                None => ModelLookup::Empty(relation.to_string()),
            },
            None => ModelLookup::Unknown(relation.to_string()),
        }
    }
}

/// Outcome of resolving a target model against an aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum ModelLookup<'a> {
    /// The record the model resolves to
    Found(&'a Record),
    /// The backing relation is present but holds no rows
    Empty(String),
    /// The backing relation is not part of the snapshot
    Unknown(String),
}

impl<'a> ModelLookup<'a> {
    pub fn record(self) -> Option<&'a Record> {
        match self {
            ModelLookup::Found(record) => Some(record),
            _ => None,
        }
    }
}
