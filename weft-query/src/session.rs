//! The per-request query session.
//!
//! A [`Query`] owns one command tree. Every `create`/`with` call appends a
//! command and makes it the *active* command; the fluent modifiers that follow
//! (`order_by`, `select`, `limit`, ...) apply to it.
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_query::entity::Entity;
//! use weft_query::schema::Schema;
//! use weft_query::session::Query;
//! use weft_query::types::SortOrder;
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(Entity::builder("AUTHOR").field("id").field("name").build().unwrap())
//!         .entity(
//!             Entity::builder("BOOK")
//!                 .field("id")
//!                 .field("title")
//!                 .field("author_id")
//!                 .build()
//!                 .unwrap(),
//!         )
//!         .build(),
//! );
//!
//! let (mut query, authors) = Query::create(schema, "AUTHOR").unwrap();
//! query.limit(10);
//! let books = query.with(&authors, "BOOKS").unwrap();
//! query.order_by("title", SortOrder::Asc);
//!
//! let plan = query.plan().unwrap();
//! assert_eq!(plan.statement_count(), 2);
//! assert_eq!(books.alias(), "BOOK2");
//! ```

use smol_str::SmolStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::command::{ChainPolicy, CommandId, CommandTree, Modifiers, SetRef};
use crate::config::EngineConfig;
use crate::error::{QueryError, QueryResult};
use crate::executor::QueryExecutor;
use crate::filter::{Operator, Predicate};
use crate::plan::Plan;
use crate::record::{ObjectId, ObjectStore, Record};
use crate::schema::Schema;
use crate::types::{OrderByField, Projection, SortOrder};
use crate::value::Value;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A query under construction.
#[derive(Debug)]
pub struct Query {
    schema: Arc<Schema>,
    config: EngineConfig,
    tree: CommandTree,
    active: CommandId,
}

impl Query {
    /// Start a session loading `entity`, with the default engine settings.
    pub fn create(schema: Arc<Schema>, entity: &str) -> QueryResult<(Self, SetRef)> {
        Self::create_with_config(schema, entity, EngineConfig::default())
    }

    /// Start a session loading `entity`.
    pub fn create_with_config(
        schema: Arc<Schema>,
        entity: &str,
        config: EngineConfig,
    ) -> QueryResult<(Self, SetRef)> {
        let entity = Arc::clone(schema.entity(entity)?);
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let tree = CommandTree::new(session, entity);
        let root = tree.root().id();
        let set = tree
            .set_ref(root)
            .ok_or_else(|| QueryError::internal("tree without root"))?;
        debug!(session, set = %set, "session created");
        Ok((
            Self {
                schema,
                config,
                tree,
                active: root,
            },
            set,
        ))
    }

    /// Load `relationship` from the objects of `source`.
    ///
    /// The new set becomes the active one.
    pub fn with(&mut self, source: &SetRef, relationship: &str) -> QueryResult<SetRef> {
        let parent = self.owned(source)?;
        let rel = self
            .schema
            .relationship(self.tree[parent].entity().name(), relationship)?;
        let id = self.tree.add(parent, rel)?;
        self.active = id;
        let set = self
            .tree
            .set_ref(id)
            .ok_or_else(|| QueryError::internal("command without set"))?;
        crate::weft_trace!(session = self.tree.session(), source = %source, set = %set, relationship, "set added");
        Ok(set)
    }

    fn owned(&self, set: &SetRef) -> QueryResult<CommandId> {
        if set.session != self.tree.session() {
            return Err(QueryError::foreign_set(set.alias()));
        }
        match self.tree.get(set.command) {
            Some(command) if command.alias() == set.alias() => Ok(set.command),
            _ => Err(QueryError::foreign_set(set.alias())),
        }
    }

    fn modifiers(&mut self) -> &mut Modifiers {
        self.tree.modifiers_mut(self.active)
    }

    /// Append an ORDER BY term.
    pub fn order_by(&mut self, field: impl Into<SmolStr>, order: SortOrder) -> &mut Self {
        self.modifiers().order_by.push(OrderByField::new(field, order));
        self
    }

    /// Replace the ordering with a textual clause, e.g. `"year DESC, title"`.
    pub fn order_by_clause(&mut self, clause: &str) -> QueryResult<&mut Self> {
        let terms = OrderByField::parse_list(clause)?;
        self.modifiers().order_by = terms;
        Ok(self)
    }

    /// Project only these fields (the primary key is always kept).
    pub fn select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.modifiers().projection = Projection::Only(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Project every field except these.
    pub fn not_select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.modifiers().projection =
            Projection::Except(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set LIMIT.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        let modifiers = self.modifiers();
        modifiers.pagination = modifiers.pagination.limit(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        let modifiers = self.modifiers();
        modifiers.pagination = modifiers.pagination.offset(offset);
        self
    }

    /// Force the active command into its own statement.
    pub fn root(&mut self) -> &mut Self {
        self.policy(ChainPolicy::Root)
    }

    /// Fuse the active command into its parent's statement where allowed.
    pub fn slave(&mut self) -> &mut Self {
        self.policy(ChainPolicy::Slave)
    }

    /// Set the chain policy.
    pub fn policy(&mut self, policy: ChainPolicy) -> &mut Self {
        self.modifiers().policy = policy;
        self
    }

    /// Set the chain policy from its textual name.
    pub fn policy_str(&mut self, policy: &str) -> QueryResult<&mut Self> {
        let policy: ChainPolicy = policy.parse()?;
        Ok(self.policy(policy))
    }

    /// Add a WHERE predicate on a field of the active set.
    pub fn r#where(
        &mut self,
        field: impl Into<SmolStr>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.modifiers()
            .predicates
            .push(Predicate::new(field, operator, value));
        self
    }

    /// Add a WHERE predicate with a textual operator (`"="`, `"IN"`, ...).
    pub fn where_op(
        &mut self,
        field: impl Into<SmolStr>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        let operator: Operator = operator.parse()?;
        Ok(self.r#where(field, operator, value))
    }

    /// Handles of all sets, in creation order.
    pub fn sets(&self) -> Vec<SetRef> {
        self.tree
            .iter()
            .filter_map(|c| self.tree.set_ref(c.id()))
            .collect()
    }

    /// The command tree built so far.
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Engine settings of this session.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Partition and compile without executing.
    pub fn plan(&self) -> QueryResult<Plan> {
        Plan::build(self.tree.clone(), &self.schema, &self.config)
    }

    /// Plan and run the whole cascade.
    pub async fn execute<E>(self, executor: &E) -> QueryResult<QueryOutput>
    where
        E: QueryExecutor + ?Sized,
    {
        let plan = Plan::build(self.tree, &self.schema, &self.config)?;
        plan.execute(executor).await
    }
}

/// The objects of one set, in set order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    /// Set alias.
    pub alias: SmolStr,
    /// Entity name.
    pub entity: SmolStr,
    /// Objects in row order, deduplicated.
    pub objects: Vec<ObjectId>,
}

/// Everything a session loaded.
#[derive(Debug)]
pub struct QueryOutput {
    session: u64,
    store: ObjectStore,
    sets: Vec<ResultSet>,
}

impl QueryOutput {
    pub(crate) fn new(session: u64, store: ObjectStore, sets: Vec<ResultSet>) -> Self {
        Self {
            session,
            store,
            sets,
        }
    }

    /// All sets in creation order.
    pub fn sets(&self) -> &[ResultSet] {
        &self.sets
    }

    /// The set behind a handle of the same session.
    pub fn set(&self, set: &SetRef) -> Option<&ResultSet> {
        if set.session != self.session {
            return None;
        }
        self.sets.get(set.command.0).filter(|s| s.alias == set.alias)
    }

    /// Records of a set, in set order.
    pub fn records(&self, set: &SetRef) -> Vec<&Record> {
        self.set(set)
            .map(|s| s.objects.iter().filter_map(|&id| self.store.get(id)).collect())
            .unwrap_or_default()
    }

    /// Look up one object.
    pub fn record(&self, id: ObjectId) -> Option<&Record> {
        self.store.get(id)
    }

    /// The whole object graph.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Consume the output, keeping only the object graph.
    pub fn into_store(self) -> ObjectStore {
        self.store
    }
}
