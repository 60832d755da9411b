//! The load-request tree.
//!
//! Every [`Command`] produces exactly one result set: command `n` of a tree
//! targets set `n`, and the set's alias is the entity name followed by `n + 1`
//! (`AUTHOR1`, `BOOK2`, ...). When that label is already taken, which can
//! happen for entity names ending in a digit (`LOG2` + 1 and `LOG` + 21), a
//! `_k` suffix is added until it is unique. The tree is only ever appended
//! to while a session builds it; partitioning and compilation read it
//! without mutation (see [`crate::plan`]).

use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::filter::Predicate;
use crate::pagination::Pagination;
use crate::relations::{Cardinality, Relationship};
use crate::types::{OrderByField, Projection};

/// Handle to a result set of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetRef {
    pub(crate) session: u64,
    pub(crate) command: CommandId,
    pub(crate) alias: SmolStr,
}

impl SetRef {
    /// The set's alias, unique within its session.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The command producing this set.
    pub fn command(&self) -> CommandId {
        self.command
    }
}

impl fmt::Display for SetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

/// Index of a command in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub usize);

/// Whether a child command is fused into its parent's statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChainPolicy {
    /// Own statement exactly when the relationship is "many".
    #[default]
    Auto,
    /// Always its own statement.
    Root,
    /// Always fused into the parent's statement.
    Slave,
}

impl FromStr for ChainPolicy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "root" => Ok(Self::Root),
            "slave" => Ok(Self::Slave),
            _ => Err(QueryError::invalid_chain_policy(s)),
        }
    }
}

impl fmt::Display for ChainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Root => "root",
            Self::Slave => "slave",
        })
    }
}

/// Per-command modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    /// Field projection.
    pub projection: Projection,
    /// WHERE predicates, ANDed.
    pub predicates: Vec<Predicate>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderByField>,
    /// LIMIT/OFFSET.
    pub pagination: Pagination,
    /// Chain partitioning policy.
    pub policy: ChainPolicy,
}

/// One node of the tree.
#[derive(Debug, Clone)]
pub struct Command {
    id: CommandId,
    alias: SmolStr,
    entity: Arc<Entity>,
    parent: Option<CommandId>,
    relationship: Option<Arc<Relationship>>,
    children: Vec<CommandId>,
    /// Modifiers set through the session.
    pub modifiers: Modifiers,
}

impl Command {
    /// Command id (also the index of its set).
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Alias of the produced set.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Target entity.
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// Command owning the source set; `None` for the tree root.
    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    /// Relationship from the source set; `None` for the tree root.
    pub fn relationship(&self) -> Option<&Arc<Relationship>> {
        self.relationship.as_ref()
    }

    /// Child commands in declaration order.
    pub fn children(&self) -> &[CommandId] {
        &self.children
    }

    /// Cardinality of the relationship; the tree root counts as "many".
    pub fn cardinality(&self) -> Cardinality {
        self.relationship
            .as_ref()
            .map(|r| r.cardinality())
            .unwrap_or(Cardinality::Many)
    }

    /// Check if limit or offset is set.
    pub fn is_paginated(&self) -> bool {
        !self.modifiers.pagination.is_empty()
    }
}

/// An append-only command tree.
#[derive(Debug, Clone)]
pub struct CommandTree {
    session: u64,
    commands: Vec<Command>,
}

impl CommandTree {
    /// Start a tree whose root loads `entity`.
    pub fn new(session: u64, entity: Arc<Entity>) -> Self {
        let mut tree = Self {
            session,
            commands: Vec::new(),
        };
        tree.push(entity, None, None);
        tree
    }

    fn push(
        &mut self,
        entity: Arc<Entity>,
        parent: Option<CommandId>,
        relationship: Option<Arc<Relationship>>,
    ) -> CommandId {
        let id = CommandId(self.commands.len());
        let alias = self.unique_alias(format!("{}{}", entity.name(), id.0 + 1));
        self.commands.push(Command {
            id,
            alias,
            entity,
            parent,
            relationship,
            children: Vec::new(),
            modifiers: Modifiers::default(),
        });
        if let Some(parent) = parent {
            self.commands[parent.0].children.push(id);
        }
        id
    }

    fn unique_alias(&self, base: String) -> SmolStr {
        let taken = |alias: &str| self.commands.iter().any(|c| c.alias == alias);
        if !taken(&base) {
            return SmolStr::new(base);
        }
        (1..)
            .map(|k| format!("{base}_{k}"))
            .find(|alias| !taken(alias))
            .map(SmolStr::new)
            .unwrap_or_else(|| SmolStr::new(base))
    }

    /// Append a child loading `relationship` from the set of `parent`.
    ///
    /// The relationship's source entity must be the parent's entity.
    pub fn add(
        &mut self,
        parent: CommandId,
        relationship: Arc<Relationship>,
    ) -> QueryResult<CommandId> {
        let source = self
            .get(parent)
            .ok_or_else(|| QueryError::internal(format!("no command {}", parent.0)))?;
        if source.entity.name() != relationship.source().name() {
            return Err(QueryError::invalid_mapping(
                relationship.source().name(),
                relationship.name(),
                format!("set {} holds {}", source.alias, source.entity.name()),
            ));
        }
        let target = Arc::clone(relationship.target());
        Ok(self.push(target, Some(parent), Some(relationship)))
    }

    /// Session that built this tree.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// The root command.
    pub fn root(&self) -> &Command {
        &self.commands[0]
    }

    /// Look up a command.
    pub fn get(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: CommandId) -> Option<&mut Command> {
        self.commands.get_mut(id.0)
    }

    pub(crate) fn modifiers_mut(&mut self, id: CommandId) -> &mut Modifiers {
        &mut self.commands[id.0].modifiers
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Always false; a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All commands in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Handle to the set of a command.
    pub fn set_ref(&self, id: CommandId) -> Option<SetRef> {
        self.get(id).map(|c| SetRef {
            session: self.session,
            command: id,
            alias: c.alias.clone(),
        })
    }
}

impl std::ops::Index<CommandId> for CommandTree {
    type Output = Command;

    fn index(&self, id: CommandId) -> &Command {
        &self.commands[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::fixtures;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("AUTO".parse::<ChainPolicy>().unwrap(), ChainPolicy::Auto);
        assert_eq!(" root".parse::<ChainPolicy>().unwrap(), ChainPolicy::Root);
        assert_eq!("Slave".parse::<ChainPolicy>().unwrap(), ChainPolicy::Slave);
        for bad in ["", "master", "roots"] {
            let err = bad.parse::<ChainPolicy>().unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidChainPolicy);
        }
        assert_eq!(Modifiers::default().policy, ChainPolicy::Auto);
    }

    #[test]
    fn test_aliases_follow_creation_order() {
        let schema = fixtures::library();
        let mut tree = CommandTree::new(1, Arc::clone(schema.entity("AUTHOR").unwrap()));
        let books = tree
            .add(CommandId(0), schema.relationship("AUTHOR", "BOOKS").unwrap())
            .unwrap();
        let tags = tree
            .add(books, schema.relationship("BOOK", "TAGZ").unwrap())
            .unwrap();

        let aliases: Vec<_> = tree.iter().map(|c| c.alias().to_string()).collect();
        assert_eq!(aliases, vec!["AUTHOR1", "BOOK2", "TAG3"]);
        assert_eq!(tree.root().children(), &[books]);
        assert_eq!(tree[tags].parent(), Some(books));
        assert_eq!(tree[tags].cardinality(), Cardinality::Many);
        assert_eq!(tree.set_ref(tags).unwrap().alias(), "TAG3");
    }

    #[test]
    fn test_relationship_must_start_at_parent_entity() {
        let schema = fixtures::library();
        let mut tree = CommandTree::new(1, Arc::clone(schema.entity("AUTHOR").unwrap()));
        let err = tree
            .add(CommandId(0), schema.relationship("BOOK", "TAGZ").unwrap())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidMapping);
    }

    #[test]
    fn test_aliases_stay_unique_for_digit_suffixed_entities() {
        let schema = crate::schema::Schema::builder()
            .entity(Entity::builder("LOG2").field("id").build().unwrap())
            .entity(Entity::builder("LOG").field("id").field("log2_id").build().unwrap())
            .build();
        let logs = schema.relationship("LOG2", "LOGS").unwrap();
        let mut tree = CommandTree::new(1, Arc::clone(schema.entity("LOG2").unwrap()));
        for _ in 0..21 {
            tree.add(CommandId(0), Arc::clone(&logs)).unwrap();
        }

        let aliases: Vec<_> = tree.iter().map(|c| c.alias().to_string()).collect();
        let distinct: std::collections::HashSet<_> = aliases.iter().collect();
        assert_eq!(distinct.len(), aliases.len());
        assert_eq!(aliases[0], "LOG21");
        assert_eq!(aliases[20], "LOG21_1");
        assert_eq!(aliases[21], "LOG22");
    }
}
