//! Turning the rows of one chain into linked objects.

use tracing::{debug, trace};

use crate::error::QueryResult;
use crate::plan::{Chain, Plan};
use crate::record::{ObjectId, ObjectStore};
use crate::row::Row;

/// Hydrate the rows of `chain` into `store` and record each command's set.
///
/// Objects of every command are loaded first, so that linking always finds
/// both ends of a relationship. For a sub-chain, the source objects are
/// re-identified from their key columns; the identity map resolves them to
/// the objects loaded by the parent chain.
pub(crate) fn hydrate_chain(
    plan: &Plan,
    chain: &Chain,
    rows: &mut [Row],
    store: &mut ObjectStore,
    sets: &mut [Vec<ObjectId>],
) -> QueryResult<()> {
    let tree = plan.tree();

    if let Some(source) = chain.source() {
        let source = &tree[source];
        source.entity().object_load(rows, source.alias(), store)?;
    }

    for &id in chain.commands() {
        let command = &tree[id];
        let objects = command.entity().object_load(rows, command.alias(), store)?;
        trace!(set = command.alias(), objects = objects.len(), "set hydrated");
        sets[id.0] = objects;
    }

    for &id in chain.commands() {
        let command = &tree[id];
        let (Some(parent), Some(rel)) = (command.parent(), command.relationship()) else {
            continue;
        };
        let stats = rel.link(
            rows,
            tree[parent].alias(),
            command.alias(),
            store,
            plan.reverse(id),
            plan.config().link_conflicts,
        )?;
        debug!(
            relationship = rel.name(),
            source = tree[parent].alias(),
            target = command.alias(),
            links = stats.links,
            conflicts = stats.conflicts,
            "set linked"
        );
    }

    // Sources without any target row never show up in a sub-chain's inner
    // join; they still get their (empty) collection.
    if let Some(source) = chain.source() {
        if let Some(rel) = tree[chain.root()].relationship().filter(|r| r.is_many()) {
            for &object in &sets[source.0] {
                store.init_many(object, rel.property());
            }
        }
    }
    Ok(())
}
