//! Chain partitioning, query compilation and the execution cascade.
//!
//! A [`Plan`] is derived in one pass from a finished [`CommandTree`]:
//!
//! 1. every command's projection and reverse relationship are resolved;
//! 2. the tree is cut into chains, each a group of commands fused into one
//!    SELECT, starting from the tree root and recursing depth-first into the
//!    sub-chain roots (see [`is_relative_root`] and [`find_chain`]);
//! 3. each chain is compiled into a [`SelectQuery`].
//!
//! Nothing in the tree is mutated while planning. Executing a plan runs the
//! chains in that same depth-first order, one statement each.

use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::command::{ChainPolicy, Command, CommandId, CommandTree};
use crate::config::EngineConfig;
use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::executor::QueryExecutor;
use crate::filter::Filter;
use crate::hydrate;
use crate::record::{ObjectId, ObjectStore};
use crate::relations::{Cardinality, Relationship};
use crate::schema::Schema;
use crate::session::{QueryOutput, ResultSet};
use crate::sql::{JoinType, SelectQuery, quote_identifier};

/// Decide whether `child` needs its own statement instead of joining the
/// chain that starts at `chain_root`.
///
/// In priority order: a paginated child is always a root; a "many" child
/// under a paginated chain root is always a root; otherwise the child's
/// [`ChainPolicy`] decides, `Auto` meaning "root iff many".
pub fn is_relative_root(chain_root: &Command, child: &Command) -> bool {
    let many = child.cardinality() == Cardinality::Many;

    if child.is_paginated() {
        return true;
    }
    if chain_root.is_paginated() && many {
        return true;
    }
    match child.modifiers.policy {
        ChainPolicy::Auto => many,
        ChainPolicy::Root => true,
        ChainPolicy::Slave => false,
    }
}

/// Partition the subtree under `root` into the commands fused with it (the
/// chain, `root` first, depth-first) and the sub-chain roots found below.
pub fn find_chain(tree: &CommandTree, root: CommandId) -> (Vec<CommandId>, Vec<CommandId>) {
    let mut chain = vec![root];
    let mut roots = Vec::new();
    collect(tree, &tree[root], root, &mut chain, &mut roots);
    (chain, roots)
}

fn collect(
    tree: &CommandTree,
    chain_root: &Command,
    node: CommandId,
    chain: &mut Vec<CommandId>,
    roots: &mut Vec<CommandId>,
) {
    for &child in tree[node].children() {
        if is_relative_root(chain_root, &tree[child]) {
            roots.push(child);
        } else {
            chain.push(child);
            collect(tree, chain_root, child, chain, roots);
        }
    }
}

/// One statement of a plan.
#[derive(Debug, Clone)]
pub struct Chain {
    root: CommandId,
    source: Option<CommandId>,
    commands: Vec<CommandId>,
    roots: Vec<CommandId>,
    query: SelectQuery,
}

impl Chain {
    /// The command the chain starts from.
    pub fn root(&self) -> CommandId {
        self.root
    }

    /// For a sub-chain, the command whose set feeds it.
    pub fn source(&self) -> Option<CommandId> {
        self.source
    }

    /// Commands hydrated from this statement, root first.
    pub fn commands(&self) -> &[CommandId] {
        &self.commands
    }

    /// Sub-chain roots directly below this chain, in declaration order.
    pub fn roots(&self) -> &[CommandId] {
        &self.roots
    }

    /// Compiled statement, before any source-key restriction.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }
}

/// A read-only execution plan.
#[derive(Debug, Clone)]
pub struct Plan {
    tree: CommandTree,
    config: EngineConfig,
    chains: Vec<Chain>,
    projections: Vec<Vec<SmolStr>>,
    reverse: Vec<Option<Arc<Relationship>>>,
}

impl Plan {
    /// Partition and compile a finished tree.
    pub fn build(tree: CommandTree, schema: &Schema, config: &EngineConfig) -> QueryResult<Self> {
        let mut projections = Vec::with_capacity(tree.len());
        let mut reverse = Vec::with_capacity(tree.len());
        for command in tree.iter() {
            projections.push(command.modifiers.projection.resolve(command.entity())?);
            reverse.push(match command.relationship() {
                Some(rel) => resolve_reverse(schema, rel)?,
                None => None,
            });
        }

        let mut chains = Vec::new();
        let mut pending = vec![tree.root().id()];
        while let Some(root) = pending.pop() {
            let (commands, roots) = find_chain(&tree, root);
            let query = compile(&tree, &commands, &projections, config)?;
            debug!(
                root = tree[root].alias(),
                fused = commands.len(),
                sub_chains = roots.len(),
                "chain partitioned"
            );
            pending.extend(roots.iter().rev().copied());
            chains.push(Chain {
                root,
                source: tree[root].parent(),
                commands,
                roots,
                query,
            });
        }

        let plan = Self {
            tree,
            config: config.clone(),
            chains,
            projections,
            reverse,
        };
        crate::weft_debug!(session = plan.tree.session(), "plan built\n{}", plan);
        Ok(plan)
    }

    /// The planned tree.
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Engine settings used for compilation and hydration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Chains in execution order.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Number of statements the plan runs (at most; empty sources skip theirs).
    pub fn statement_count(&self) -> usize {
        self.chains.len()
    }

    /// Resolved fields of a command, primary key included.
    pub fn projection(&self, id: CommandId) -> &[SmolStr] {
        self.projections.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reverse relationship of a command, when one resolves.
    pub fn reverse(&self, id: CommandId) -> Option<&Relationship> {
        self.reverse.get(id.0).and_then(|r| r.as_deref())
    }

    /// Chain containing a command.
    pub fn chain_of(&self, id: CommandId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.commands.contains(&id))
    }

    fn chain_rooted_at(&self, id: CommandId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.root == id)
    }

    /// Run every chain, depth-first, and collect the hydrated sets.
    ///
    /// The first error aborts the cascade; chains already run are lost with
    /// the rest of the output.
    pub async fn execute<E>(self, executor: &E) -> QueryResult<QueryOutput>
    where
        E: QueryExecutor + ?Sized,
    {
        let db = self.config.database;
        let mut store = ObjectStore::new();
        let mut sets: Vec<Vec<ObjectId>> = vec![Vec::new(); self.tree.len()];

        for chain in &self.chains {
            let compiled = match chain.source {
                None => chain.query.build(db),
                Some(source) => {
                    let source_command = &self.tree[source];
                    let objects = &sets[source.0];
                    if objects.is_empty() {
                        debug!(
                            root = self.tree[chain.root].alias(),
                            source = source_command.alias(),
                            "source set empty, statement skipped"
                        );
                        continue;
                    }
                    let mut query = chain.query.clone();
                    query.filter(key_filter(source_command, objects, &store)?);
                    query.build(db)
                }
            };

            debug!(
                root = self.tree[chain.root].alias(),
                sql = %compiled.sql,
                params = compiled.params.len(),
                "executing chain"
            );
            let mut rows = executor.fetch(&compiled).await.map_err(|e| {
                if e.context.sql.is_none() {
                    e.with_sql(&compiled.sql)
                } else {
                    e
                }
            })?;
            debug!(root = self.tree[chain.root].alias(), rows = rows.len(), "chain fetched");

            hydrate::hydrate_chain(&self, chain, &mut rows, &mut store, &mut sets)?;
        }

        let sets = self
            .tree
            .iter()
            .zip(sets)
            .map(|(command, objects)| ResultSet {
                alias: SmolStr::new(command.alias()),
                entity: SmolStr::new(command.entity().name()),
                objects,
            })
            .collect();
        Ok(QueryOutput::new(self.tree.session(), store, sets))
    }

    fn fmt_chain(&self, f: &mut fmt::Formatter<'_>, chain: &Chain, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let root = &self.tree[chain.root];
        match chain.source {
            None => writeln!(f, "{}chain {} ({})", pad, root.alias(), root.entity().name())?,
            Some(source) => writeln!(
                f,
                "{}chain {} (keys of {})",
                pad,
                root.alias(),
                self.tree[source].alias()
            )?,
        }
        for &id in &chain.commands {
            let command = &self.tree[id];
            match (command.parent(), command.relationship()) {
                (Some(parent), Some(rel)) => writeln!(
                    f,
                    "{}  {} <- {}.{} [{}, {}]",
                    pad,
                    command.alias(),
                    self.tree[parent].alias(),
                    rel.name(),
                    rel.cardinality(),
                    command.modifiers.policy
                )?,
                _ => writeln!(f, "{}  {} [{}]", pad, command.alias(), command.entity().name())?,
            }
        }
        writeln!(f, "{}  sql: {}", pad, chain.query.build(self.config.database).sql)?;
        for &sub in &chain.roots {
            if let Some(sub) = self.chain_rooted_at(sub) {
                self.fmt_chain(f, sub, depth + 1)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chains.first() {
            Some(first) => self.fmt_chain(f, first, 0),
            None => Ok(()),
        }
    }
}

fn resolve_reverse(
    schema: &Schema,
    relationship: &Relationship,
) -> QueryResult<Option<Arc<Relationship>>> {
    match schema.reverse(relationship) {
        Ok(reverse) => Ok(Some(reverse)),
        // A derived reverse name is only a guess; it never blocks the forward load.
        Err(e)
            if e.code == ErrorCode::UnknownRelationship || !relationship.has_declared_reverse() =>
        {
            debug!(
                entity = relationship.source().name(),
                relationship = relationship.name(),
                reverse = relationship.reverse_name(),
                error = %e,
                "no reverse relationship, back-pointers disabled"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn parent_of(tree: &CommandTree, id: CommandId) -> QueryResult<(&Command, &Arc<Relationship>)> {
    let command = &tree[id];
    let parent = command
        .parent()
        .and_then(|p| tree.get(p))
        .ok_or_else(|| QueryError::internal(format!("{} has no source set", command.alias())))?;
    let rel = command
        .relationship()
        .ok_or_else(|| QueryError::internal(format!("{} has no relationship", command.alias())))?;
    Ok((parent, rel))
}

fn compile(
    tree: &CommandTree,
    commands: &[CommandId],
    projections: &[Vec<SmolStr>],
    config: &EngineConfig,
) -> QueryResult<SelectQuery> {
    let root = &tree[commands[0]];

    let mut query = match root.parent() {
        None => SelectQuery::from(quote_identifier(root.entity().table()), root.alias()),
        Some(_) => {
            // A sub-chain starts from its source set, restricted at run time
            // to the keys already hydrated there.
            let (source, rel) = parent_of(tree, root.id())?;
            let mut query =
                SelectQuery::from(quote_identifier(source.entity().table()), source.alias());
            source
                .entity()
                .query_select(&mut query, source.alias(), source.entity().primary_key())?;
            rel.join(&mut query, source.alias(), root.alias(), JoinType::Inner)?;
            query
        }
    };

    for &id in commands {
        let command = &tree[id];
        if id != root.id() {
            let (parent, rel) = parent_of(tree, id)?;
            rel.join(&mut query, parent.alias(), command.alias(), config.join_type)?;
        }
        command
            .entity()
            .query_select(&mut query, command.alias(), &projections[id.0])?;
        // Fused children filter the whole statement, not just their join.
        for predicate in &command.modifiers.predicates {
            let column = command.entity().field_expr(command.alias(), &predicate.field)?;
            query.filter(predicate.to_filter(column));
        }
    }

    for &id in commands {
        let command = &tree[id];
        for order in &command.modifiers.order_by {
            command
                .entity()
                .query_order_by(&mut query, command.alias(), &order.field, order.order)?;
        }
    }

    query.paginate(root.modifiers.pagination);
    trace!(root = root.alias(), columns = query.columns().len(), "chain compiled");
    Ok(query)
}

/// `pk IN (...)` over the objects of a source set; composite keys become an
/// OR of per-object ANDs.
fn key_filter(source: &Command, objects: &[ObjectId], store: &ObjectStore) -> QueryResult<Filter> {
    let entity = source.entity();
    let pk = entity.primary_key();
    let columns = pk
        .iter()
        .map(|field| entity.field_expr(source.alias(), field))
        .collect::<QueryResult<Vec<_>>>()?;

    let keys = objects
        .iter()
        .map(|&id| {
            store
                .get(id)
                .map(|record| record.key().0.clone())
                .ok_or_else(|| QueryError::internal(format!("object {} missing from store", id)))
        })
        .collect::<QueryResult<Vec<_>>>()?;

    if let [column] = columns.as_slice() {
        let values = keys.into_iter().filter_map(|mut k| k.pop()).collect();
        return Ok(Filter::In(column.clone(), values));
    }
    Ok(Filter::or(keys.into_iter().map(|key| {
        Filter::and(
            columns
                .iter()
                .zip(key)
                .map(|(column, value)| Filter::Equals(column.clone(), value)),
        )
    })))
}
