//! Relationship resolution and the process-wide descriptor cache.
//!
//! Resolution is lazy: a relationship is built the first time (entity, name)
//! is asked for, from an explicit [`RelationDef`] if one was registered, with
//! every unset attribute filled in by naming convention. The result is cached
//! for the registry's lifetime. Building happens outside the lock and the
//! first inserted instance wins, so racing resolvers all end up holding the
//! same `Arc`. Registration and caching both happen under the cache write
//! lock, so a registered definition is either rejected or used.

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::relationship::{Relationship, qualify};
use super::spec::{JoinMapping, RawMapping, RelationDef, RelationType};
use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};

type Key = (SmolStr, SmolStr);

/// Registered definitions plus resolved relationships.
#[derive(Debug, Default)]
pub struct RelationshipRegistry {
    defs: RwLock<HashMap<Key, RelationDef>>,
    cache: RwLock<HashMap<Key, Arc<Relationship>>>,
}

impl RelationshipRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit definition for `entity`.
    ///
    /// Fails if a relationship of that name was already resolved; cached
    /// descriptors never change.
    pub fn register(&self, entity: &str, def: RelationDef) -> QueryResult<()> {
        let key = (SmolStr::new(entity), def.name.clone());
        // Held across the check and the insert so no resolver can cache a
        // convention build in between.
        let cache = self.cache.write();
        if cache.contains_key(&key) {
            return Err(QueryError::invalid_mapping(
                entity,
                def.name.as_str(),
                "relationship already resolved",
            ));
        }
        self.defs.write().insert(key, def);
        Ok(())
    }

    /// Number of resolved relationships.
    pub fn resolved(&self) -> usize {
        self.cache.read().len()
    }

    /// Resolve `entity.name`, building and caching it on first use.
    pub fn resolve(
        &self,
        entities: &IndexMap<SmolStr, Arc<Entity>>,
        entity: &str,
        name: &str,
    ) -> QueryResult<Arc<Relationship>> {
        let key = (SmolStr::new(entity), SmolStr::new(name));
        if let Some(found) = self.cache.read().get(&key) {
            return Ok(Arc::clone(found));
        }

        let (built, mut cache) = loop {
            let def = self.defs.read().get(&key).cloned();
            let declared = def.is_some();
            let built = build(entities, entity, name, def)?;

            let cache = self.cache.write();
            // A definition registered while building invalidates a convention build.
            if cache.contains_key(&key) || self.defs.read().contains_key(&key) == declared {
                break (built, cache);
            }
        };
        let resolved = cache.entry(key).or_insert_with(|| {
            debug!(
                entity = entity,
                relationship = name,
                target = built.target().name(),
                kind = ?built.kind(),
                property = built.property(),
                reverse = built.reverse_name(),
                "relationship resolved"
            );
            Arc::new(built)
        });
        Ok(Arc::clone(resolved))
    }

    /// Resolve the reverse of a relationship through the same cache.
    pub fn reverse(
        &self,
        entities: &IndexMap<SmolStr, Arc<Entity>>,
        relationship: &Relationship,
    ) -> QueryResult<Arc<Relationship>> {
        self.resolve(
            entities,
            relationship.target().name(),
            relationship.reverse_name(),
        )
    }
}

/// Relationship name without its convention suffix.
fn base_name(name: &str) -> &str {
    match name.chars().last() {
        Some('Z' | 'S' | '1') => &name[..name.len() - 1],
        _ => name,
    }
}

fn build(
    entities: &IndexMap<SmolStr, Arc<Entity>>,
    entity: &str,
    name: &str,
    def: Option<RelationDef>,
) -> QueryResult<Relationship> {
    let source = entities
        .get(entity)
        .cloned()
        .ok_or_else(|| QueryError::unknown_entity(entity))?;

    let explicit = def.is_some();
    let def = def.unwrap_or_else(|| RelationDef::new(name));
    let kind = def.kind.unwrap_or_else(|| RelationType::from_name(name));
    let base = base_name(name);

    let target_name = def.target.clone().unwrap_or_else(|| SmolStr::new(base));
    let target = match entities.get(target_name.as_str()) {
        Some(target) => Arc::clone(target),
        None if explicit => return Err(QueryError::unknown_entity(target_name.as_str())),
        None => return Err(QueryError::unknown_relationship(entity, name)),
    };

    let property = def.property.clone().unwrap_or_else(|| match kind {
        RelationType::ManyToMany => SmolStr::new(format!("{}s", base.to_lowercase())),
        RelationType::ManyToOne => SmolStr::new(base.to_lowercase()),
        RelationType::OneToMany | RelationType::OneToOne => SmolStr::new(name.to_lowercase()),
    });

    let reverse_declared = def.reverse.is_some();
    let reverse = def.reverse.clone().unwrap_or_else(|| {
        let mut reverse = String::from(source.name());
        if let Some(suffix) = kind.reverse().suffix() {
            reverse.push(suffix);
        }
        SmolStr::new(reverse)
    });

    let raw = match def.mapping {
        Some(mapping) => mapping,
        None => convention_mapping(entities, &source, &target, kind, name)?,
    };

    let mut mapping = JoinMapping::new();
    let pivot = match &raw {
        RawMapping::Direct(pairs) => {
            qualify(&mut mapping, &target, &source, pairs, name)?;
            None
        }
        RawMapping::Pivot {
            pivot,
            source: to_pivot,
            target: to_target,
        } => {
            let pivot = entities
                .get(pivot.as_str())
                .cloned()
                .ok_or_else(|| QueryError::unknown_entity(pivot.as_str()))?;
            qualify(&mut mapping, &pivot, &source, to_pivot, name)?;
            qualify(&mut mapping, &target, &pivot, to_target, name)?;
            Some(pivot)
        }
    };

    Ok(Relationship::new(
        source,
        SmolStr::new(name),
        target,
        kind,
        property,
        reverse,
        reverse_declared,
        pivot,
        mapping,
    ))
}

/// Field pairs `(owner field, referenced field)` of the foreign key from
/// `owner` to `referenced`: the declared one, else `lower(REFERENCED)_<pk>`.
fn foreign_key(
    owner: &Entity,
    referenced: &Entity,
    relationship: (&str, &str),
) -> QueryResult<Vec<(SmolStr, SmolStr)>> {
    if let Some(declared) = owner.foreign_key_to(referenced.name()) {
        return Ok(declared
            .iter()
            .map(|(local, remote)| (local.clone(), remote.clone()))
            .collect());
    }
    referenced
        .primary_key()
        .iter()
        .map(|pk| {
            let local = format!("{}_{}", referenced.name().to_lowercase(), pk);
            if owner.field(&local).is_some() {
                Ok((SmolStr::new(local), pk.clone()))
            } else {
                Err(QueryError::invalid_mapping(
                    relationship.0,
                    relationship.1,
                    format!(
                        "{} has no foreign key to {} (expected field {})",
                        owner.name(),
                        referenced.name(),
                        local
                    ),
                ))
            }
        })
        .collect()
}

fn swap(pairs: Vec<(SmolStr, SmolStr)>) -> Vec<(SmolStr, SmolStr)> {
    pairs.into_iter().map(|(a, b)| (b, a)).collect()
}

fn convention_mapping(
    entities: &IndexMap<SmolStr, Arc<Entity>>,
    source: &Entity,
    target: &Entity,
    kind: RelationType,
    name: &str,
) -> QueryResult<RawMapping> {
    let rel = (source.name(), name);
    match kind {
        // Foreign key lives on the target and points at the source.
        RelationType::OneToMany | RelationType::OneToOne => {
            Ok(RawMapping::Direct(swap(foreign_key(target, source, rel)?)))
        }
        // Foreign key lives on the source and points at the target.
        RelationType::ManyToOne => Ok(RawMapping::Direct(foreign_key(source, target, rel)?)),
        RelationType::ManyToMany => {
            let forward = format!("{}2{}", source.name(), target.name());
            let backward = format!("{}2{}", target.name(), source.name());
            let pivot = entities
                .get(forward.as_str())
                .or_else(|| entities.get(backward.as_str()))
                .ok_or_else(|| {
                    QueryError::invalid_mapping(
                        source.name(),
                        name,
                        format!("no pivot entity {} or {}", forward, backward),
                    )
                })?;
            Ok(RawMapping::Pivot {
                pivot: SmolStr::new(pivot.name()),
                source: swap(foreign_key(pivot, source, rel)?),
                target: foreign_key(pivot, target, rel)?,
            })
        }
    }
}
