//! Resolved relationships: join compilation and object linking.

use smol_str::SmolStr;
use std::sync::Arc;
use tracing::warn;

use super::spec::{Cardinality, JoinMapping, RelationType};
use crate::config::LinkConflictPolicy;
use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::record::{ObjectId, ObjectStore};
use crate::row::Row;
use crate::sql::{JoinType, SelectQuery};

/// A fully resolved, immutable relationship.
#[derive(Debug, Clone)]
pub struct Relationship {
    source: Arc<Entity>,
    name: SmolStr,
    target: Arc<Entity>,
    kind: RelationType,
    property: SmolStr,
    reverse: SmolStr,
    reverse_declared: bool,
    pivot: Option<Arc<Entity>>,
    mapping: JoinMapping,
}

impl Relationship {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        source: Arc<Entity>,
        name: SmolStr,
        target: Arc<Entity>,
        kind: RelationType,
        property: SmolStr,
        reverse: SmolStr,
        reverse_declared: bool,
        pivot: Option<Arc<Entity>>,
        mapping: JoinMapping,
    ) -> Self {
        Self {
            source,
            name,
            target,
            kind,
            property,
            reverse,
            reverse_declared,
            pivot,
            mapping,
        }
    }

    /// Source entity.
    pub fn source(&self) -> &Arc<Entity> {
        &self.source
    }

    /// Relationship name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target entity.
    pub fn target(&self) -> &Arc<Entity> {
        &self.target
    }

    /// Pivot entity of a many-to-many relationship.
    pub fn pivot(&self) -> Option<&Arc<Entity>> {
        self.pivot.as_ref()
    }

    /// Relationship kind.
    pub fn kind(&self) -> RelationType {
        self.kind
    }

    /// Target cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.kind.cardinality()
    }

    /// Check if the property holds a collection.
    pub fn is_many(&self) -> bool {
        self.kind.is_many()
    }

    /// Property name on source objects.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Name of the reverse relationship on the target entity.
    pub fn reverse_name(&self) -> &str {
        &self.reverse
    }

    /// Check if the reverse name was registered rather than derived.
    pub fn has_declared_reverse(&self) -> bool {
        self.reverse_declared
    }

    /// Canonical join mapping.
    pub fn mapping(&self) -> &JoinMapping {
        &self.mapping
    }

    fn entity(&self, name: &str) -> QueryResult<&Arc<Entity>> {
        if self.target.name() == name {
            Ok(&self.target)
        } else if self.source.name() == name {
            Ok(&self.source)
        } else {
            self.pivot
                .as_ref()
                .filter(|p| p.name() == name)
                .ok_or_else(|| {
                    QueryError::internal(format!(
                        "entity {} is not part of relationship {}.{}",
                        name,
                        self.source.name(),
                        self.name
                    ))
                })
        }
    }

    /// Alias for an intermediate entity joined between two aliases.
    pub fn pivot_alias(source_alias: &str, target_alias: &str, entity: &str) -> String {
        format!("{}__{}__{}", source_alias, target_alias, entity)
    }

    /// Join the target (and pivot, if any) of this relationship into `query`.
    ///
    /// `source_alias` must already be part of the query. Every field pair of
    /// the mapping becomes one equality of the joined entity's ON clause.
    pub fn join(
        &self,
        query: &mut SelectQuery,
        source_alias: &str,
        target_alias: &str,
        join_type: JoinType,
    ) -> QueryResult<()> {
        let alias_of = |entity: &str, terminal: bool| -> String {
            if terminal && entity == self.target.name() {
                target_alias.to_string()
            } else if entity == self.source.name() {
                source_alias.to_string()
            } else if entity == self.target.name() {
                target_alias.to_string()
            } else {
                Self::pivot_alias(source_alias, target_alias, entity)
            }
        };

        for (target_entity, sources) in self.mapping.groups() {
            let joined = self.entity(target_entity)?;
            let joined_alias = alias_of(target_entity, true);

            let mut bindings: Vec<(SmolStr, String)> = Vec::new();
            for (source_entity, fields) in sources {
                let from = self.entity(source_entity)?;
                let from_alias = alias_of(source_entity, false);
                for (source_field, target_field) in fields {
                    bindings.push((
                        target_field.clone(),
                        from.field_expr(&from_alias, source_field)?,
                    ));
                }
            }
            joined.query_join(query, &joined_alias, &bindings, join_type)?;
        }
        Ok(())
    }

    /// Link hydrated objects of `source_alias` to those of `target_alias`.
    ///
    /// Every row must carry object slots for both aliases. "Many" properties
    /// are initialized for every present source even when its target is
    /// absent, and never receive the same target twice. When `reverse` has
    /// cardinality "one" the target also gets a back-pointer to the source.
    pub fn link(
        &self,
        rows: &[Row],
        source_alias: &str,
        target_alias: &str,
        store: &mut ObjectStore,
        reverse: Option<&Relationship>,
        policy: LinkConflictPolicy,
    ) -> QueryResult<LinkStats> {
        let back = reverse.filter(|r| !r.is_many()).map(Relationship::property);
        let mut stats = LinkStats::default();

        for row in rows {
            let Some(source) = row.object(source_alias)? else {
                continue;
            };
            let target = row.object(target_alias)?;

            if self.is_many() {
                store.init_many(source, &self.property);
                if let Some(target) = target {
                    if store.link_many(source, &self.property, target) {
                        stats.links += 1;
                    }
                }
            } else if let Some(target) = target {
                match store.link_one(source, &self.property, target) {
                    Some(previous) => {
                        self.conflict(store, source, previous, policy, &self.property)?;
                        stats.conflicts += 1;
                    }
                    None => stats.links += 1,
                }
            }

            if let (Some(property), Some(target)) = (back, target) {
                if let Some(previous) = store.link_one(target, property, source) {
                    self.conflict(store, target, previous, policy, property)?;
                    stats.conflicts += 1;
                }
            }
        }
        Ok(stats)
    }

    fn conflict(
        &self,
        store: &ObjectStore,
        object: ObjectId,
        previous: ObjectId,
        policy: LinkConflictPolicy,
        property: &str,
    ) -> QueryResult<()> {
        let object = store
            .get(object)
            .map(ToString::to_string)
            .unwrap_or_default();
        let previous = store
            .get(previous)
            .map(ToString::to_string)
            .unwrap_or_default();
        match policy {
            LinkConflictPolicy::Warn => {
                warn!(
                    relationship = %self.name,
                    object = %object,
                    property = %property,
                    replaced = %previous,
                    "conflicting link, keeping the last row"
                );
                Ok(())
            }
            LinkConflictPolicy::Error => Err(QueryError::conflicting_link(object, property)),
        }
    }
}

/// Counters reported by [`Relationship::link`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// New links made.
    pub links: usize,
    /// "One" properties overwritten with a different object.
    pub conflicts: usize,
}

/// Qualify a raw field-pair list as one mapping group.
pub(crate) fn qualify(
    mapping: &mut JoinMapping,
    target: &Entity,
    source: &Entity,
    pairs: &[(SmolStr, SmolStr)],
    relationship: &str,
) -> QueryResult<()> {
    if pairs.is_empty() {
        return Err(QueryError::invalid_mapping(
            source.name(),
            relationship,
            format!("no join fields towards {}", target.name()),
        ));
    }
    for (source_field, target_field) in pairs {
        for (entity, field) in [(source, source_field), (target, target_field)] {
            if entity.field(field).is_none() {
                return Err(QueryError::invalid_mapping(
                    source.name(),
                    relationship,
                    format!("{}.{} does not exist", entity.name(), field),
                ));
            }
        }
        mapping.bind(
            target.name(),
            source.name(),
            source_field.clone(),
            target_field.clone(),
        );
    }
    Ok(())
}
