//! The entity registry and its relationship cache.

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::relations::{RelationDef, Relationship, RelationshipRegistry};

/// Read-only entity metadata plus lazily resolved relationships.
///
/// A schema is built once and shared (`Arc<Schema>`) by every session; the
/// relationship cache inside it is safe to use from many threads.
#[derive(Debug, Default)]
pub struct Schema {
    entities: IndexMap<SmolStr, Arc<Entity>>,
    relationships: RelationshipRegistry,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up an entity.
    pub fn entity(&self, name: &str) -> QueryResult<&Arc<Entity>> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::unknown_entity(name))
    }

    /// All entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    /// Resolve a relationship of `entity`.
    pub fn relationship(&self, entity: &str, name: &str) -> QueryResult<Arc<Relationship>> {
        self.relationships.resolve(&self.entities, entity, name)
    }

    /// Resolve the reverse of a relationship.
    pub fn reverse(&self, relationship: &Relationship) -> QueryResult<Arc<Relationship>> {
        self.relationships.reverse(&self.entities, relationship)
    }

    /// Register an explicit relationship definition.
    pub fn register_relationship(&self, entity: &str, def: RelationDef) -> QueryResult<()> {
        self.entity(entity)?;
        self.relationships.register(entity, def)
    }

    /// Number of relationships resolved so far.
    pub fn resolved_relationships(&self) -> usize {
        self.relationships.resolved()
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: IndexMap<SmolStr, Arc<Entity>>,
    defs: Vec<(SmolStr, RelationDef)>,
}

impl SchemaBuilder {
    /// Add an entity. A later entity with the same name replaces the earlier one.
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities
            .insert(SmolStr::new(entity.name()), Arc::new(entity));
        self
    }

    /// Add an explicit relationship definition for `entity`.
    pub fn relationship(mut self, entity: impl Into<SmolStr>, def: RelationDef) -> Self {
        self.defs.push((entity.into(), def));
        self
    }

    /// Finish the schema.
    pub fn build(self) -> Schema {
        let relationships = RelationshipRegistry::new();
        for (entity, def) in self.defs {
            // Nothing is resolved yet, so registration cannot conflict.
            let _ = relationships.register(&entity, def);
        }
        Schema {
            entities: self.entities,
            relationships,
        }
    }
}
