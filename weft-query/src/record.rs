//! Materialized objects and the per-session identity map.
//!
//! Objects live in an [`ObjectStore`] arena and refer to each other by
//! [`ObjectId`], so the bidirectional object graph needs no reference cycles.
//! The store's identity map guarantees that one database row (entity plus
//! primary-key values) hydrates to exactly one [`Record`] for the whole session,
//! across every statement the session runs.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use crate::value::Value;

/// Handle to an object in an [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Primary-key values of one row, hashable for identity lookups.
#[derive(Debug, Clone)]
pub struct PrimaryKey(pub Vec<Value>);

impl PrimaryKey {
    /// Check if every component is null (no row behind it).
    pub fn is_null(&self) -> bool {
        self.0.iter().all(Value::is_null)
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.same_as(b))
    }
}

impl Eq for PrimaryKey {}

impl Hash for PrimaryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash_into(state);
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

/// Value of a loaded relationship property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    /// A "one" relationship pointing at a single object.
    One(ObjectId),
    /// A "many" relationship; insertion-ordered and free of duplicates.
    Many(IndexSet<ObjectId>),
}

impl Related {
    /// The single target of a "one" relationship.
    pub fn as_one(&self) -> Option<ObjectId> {
        match self {
            Self::One(id) => Some(*id),
            Self::Many(_) => None,
        }
    }

    /// The targets of a "many" relationship.
    pub fn as_many(&self) -> Option<&IndexSet<ObjectId>> {
        match self {
            Self::Many(ids) => Some(ids),
            Self::One(_) => None,
        }
    }
}

/// Plain field access on a materialized object.
pub trait Properties {
    /// Read a field value.
    fn get(&self, field: &str) -> Option<&Value>;

    /// Write a field value, returning the previous one.
    fn set(&mut self, field: &str, value: Value) -> Option<Value>;
}

/// Access to relationship-backed properties.
///
/// A property that was never loaded reports `is_loaded == false`; it is not
/// the same thing as an empty collection.
pub trait RelationshipBacked {
    /// The loaded value of a relationship property.
    fn related(&self, property: &str) -> Option<&Related>;

    /// Whether the relationship property has been loaded.
    fn is_loaded(&self, property: &str) -> bool {
        self.related(property).is_some()
    }
}

/// One materialized row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: SmolStr,
    key: PrimaryKey,
    values: IndexMap<SmolStr, Value>,
    relations: IndexMap<SmolStr, Related>,
}

impl Record {
    /// Entity name of this object.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Primary-key values.
    pub fn key(&self) -> &PrimaryKey {
        &self.key
    }

    /// Field values in load order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Targets of a "many" property; empty when not loaded.
    pub fn many(&self, property: &str) -> Vec<ObjectId> {
        self.related(property)
            .and_then(Related::as_many)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Target of a "one" property.
    pub fn one(&self, property: &str) -> Option<ObjectId> {
        self.related(property).and_then(Related::as_one)
    }
}

impl Properties for Record {
    fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    fn set(&mut self, field: &str, value: Value) -> Option<Value> {
        self.values.insert(SmolStr::new(field), value)
    }
}

impl RelationshipBacked for Record {
    fn related(&self, property: &str) -> Option<&Related> {
        self.relations.get(property)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.key)
    }
}

/// Arena of objects plus the identity map.
#[derive(Debug, Default)]
pub struct ObjectStore {
    records: Vec<Record>,
    identity: HashMap<(SmolStr, PrimaryKey), ObjectId>,
}

impl ObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up an object by entity and primary key.
    pub fn find(&self, entity: &str, key: &PrimaryKey) -> Option<ObjectId> {
        self.identity.get(&(SmolStr::new(entity), key.clone())).copied()
    }

    /// Get an object.
    pub fn get(&self, id: ObjectId) -> Option<&Record> {
        self.records.get(id.0)
    }

    /// Get an object mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Record> {
        self.records.get_mut(id.0)
    }

    /// Materialize a row, reusing the existing object for a known key.
    ///
    /// Values of a known object are refreshed with the incoming cells; fields
    /// absent from this row keep what an earlier statement loaded.
    pub fn load(
        &mut self,
        entity: &str,
        key: PrimaryKey,
        values: impl IntoIterator<Item = (SmolStr, Value)>,
    ) -> ObjectId {
        let entity = SmolStr::new(entity);
        if let Some(&id) = self.identity.get(&(entity.clone(), key.clone())) {
            let record = &mut self.records[id.0];
            record.values.extend(values);
            return id;
        }

        let id = ObjectId(self.records.len());
        self.records.push(Record {
            entity: entity.clone(),
            key: key.clone(),
            values: values.into_iter().collect(),
            relations: IndexMap::new(),
        });
        self.identity.insert((entity, key), id);
        id
    }

    /// Make sure a "many" property exists, creating it empty on first use.
    ///
    /// A property previously holding a "one" value is replaced.
    pub fn init_many(&mut self, source: ObjectId, property: &str) {
        if let Some(record) = self.records.get_mut(source.0) {
            let slot = record
                .relations
                .entry(SmolStr::new(property))
                .or_insert_with(|| Related::Many(IndexSet::new()));
            if !matches!(slot, Related::Many(_)) {
                *slot = Related::Many(IndexSet::new());
            }
        }
    }

    /// Add a target to a "many" property. Returns `false` if it was already there.
    pub fn link_many(&mut self, source: ObjectId, property: &str, target: ObjectId) -> bool {
        self.init_many(source, property);
        match self
            .records
            .get_mut(source.0)
            .and_then(|r| r.relations.get_mut(property))
        {
            Some(Related::Many(ids)) => ids.insert(target),
            _ => false,
        }
    }

    /// Set a "one" property, returning the previous target if it differed.
    pub fn link_one(
        &mut self,
        source: ObjectId,
        property: &str,
        target: ObjectId,
    ) -> Option<ObjectId> {
        let record = self.records.get_mut(source.0)?;
        let previous = record
            .relations
            .insert(SmolStr::new(property), Related::One(target));
        match previous {
            Some(Related::One(old)) if old != target => Some(old),
            _ => None,
        }
    }

    /// Iterate all objects in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Record)> {
        self.records.iter().enumerate().map(|(i, r)| (ObjectId(i), r))
    }
}

impl Index<ObjectId> for ObjectStore {
    type Output = Record;

    fn index(&self, id: ObjectId) -> &Record {
        &self.records[id.0]
    }
}
