//! Cycle guard for attaching shared folders.

use crate::error::{Error, Result};
use crate::store::Txn;
use crate::vertex::{FolderId, VertexRef};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Check whether any of `forbidden` is reachable from `candidates`.
///
/// Walks folder children breadth-first from the candidates (which count as
/// reachable themselves). File children are leaves and are ignored. An edge
/// to a folder that no longer exists is removed from its parent on the way.
/// `forbidden` is the ancestor chain of the folder being attached into, so a
/// hit means the attach would close a cycle.
pub fn would_create_cycle(
    txn: &Txn<'_>,
    candidates: &[FolderId],
    forbidden: &[FolderId],
    limit: usize,
) -> Result<bool> {
    let forbidden: HashSet<FolderId> = forbidden.iter().copied().collect();
    let mut queue: VecDeque<(FolderId, Option<FolderId>)> =
        candidates.iter().map(|&id| (id, None)).collect();
    let mut seen = HashSet::new();

    while let Some((id, parent)) = queue.pop_front() {
        if forbidden.contains(&id) {
            debug!(folder = %id, "Ancestor reachable from attach candidate");
            return Ok(true);
        }
        if seen.contains(&id) {
            continue;
        }

        let Some(children) = txn.children(id)? else {
            if let Some(parent) = parent {
                prune_edge(txn, parent, id)?;
            }
            continue;
        };

        seen.insert(id);
        if seen.len() > limit {
            return Err(Error::TraversalLimit { limit });
        }

        queue.extend(
            children
                .iter()
                .filter_map(VertexRef::as_folder)
                .map(|child| (child, Some(id))),
        );
    }

    Ok(false)
}

/// Drop every edge from `parent` to the missing folder `gone`.
fn prune_edge(txn: &Txn<'_>, parent: FolderId, gone: FolderId) -> Result<()> {
    let Some(mut children) = txn.children(parent)? else {
        return Ok(());
    };
    let before = children.len();
    children.retain(|c| *c != VertexRef::Folder(gone));
    if children.len() != before {
        warn!(folder = %parent, child = %gone, "Pruning edge to missing folder");
        txn.set_children(parent, &children)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaKind, NewFile};
    use crate::store::Database;
    use crate::vertex::ChatId;

    fn folder(txn: &Txn<'_>, name: &str) -> FolderId {
        txn.insert_folder(name, ChatId(1), false, 1).unwrap()
    }

    fn link(txn: &Txn<'_>, parent: FolderId, child: VertexRef) {
        let mut children = txn.children(parent).unwrap().unwrap();
        children.push(child);
        txn.set_children(parent, &children).unwrap();
    }

    #[test]
    fn test_candidate_in_forbidden() {
        let db = Database::open_in_memory().unwrap();
        db.transaction(|txn| {
            let a = folder(txn, "a");
            assert!(would_create_cycle(txn, &[a], &[a], 100)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_descendant_reaches_ancestor() {
        let db = Database::open_in_memory().unwrap();
        db.transaction(|txn| {
            let root = folder(txn, "root");
            let x = folder(txn, "x");
            let y = folder(txn, "y");
            link(txn, root, VertexRef::Folder(x));
            link(txn, x, VertexRef::Folder(y));

            // Attaching x under y (path root -> x -> y) would loop.
            assert!(would_create_cycle(txn, &[x], &[root, x, y], 100)?);
            // Attaching y under root is fine: y reaches nothing on [root].
            assert!(!would_create_cycle(txn, &[y], &[root], 100)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_files_ignored_and_stale_edges_pruned() {
        let db = Database::open_in_memory().unwrap();
        db.transaction(|txn| {
            let root = folder(txn, "root");
            let x = folder(txn, "x");
            let file = txn.insert_file(&NewFile {
                external_ref: "ext".to_string(),
                name: "pic".to_string(),
                media: MediaKind::Photo,
            })?;
            link(txn, x, VertexRef::File(file));
            link(txn, x, VertexRef::Folder(FolderId(999)));

            assert!(!would_create_cycle(txn, &[x], &[root], 100)?);
            assert_eq!(txn.children(x)?.unwrap(), vec![VertexRef::File(file)]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_traversal_limit() {
        let db = Database::open_in_memory().unwrap();
        let result = db.transaction(|txn| {
            let mut prev = folder(txn, "0");
            let first = prev;
            for i in 1..20 {
                let next = folder(txn, &i.to_string());
                link(txn, prev, VertexRef::Folder(next));
                prev = next;
            }
            would_create_cycle(txn, &[first], &[], 5)
        });
        assert!(matches!(result, Err(Error::TraversalLimit { limit: 5 })));
    }

    // Property-based tests
    use proptest::prelude::*;

    /// Reachability by plain recursion over an adjacency list.
    fn reaches(edges: &[(usize, usize)], from: usize, target: usize) -> bool {
        from == target
            || edges
                .iter()
                .filter(|(a, _)| *a == from)
                .any(|(_, b)| reaches(edges, *b, target))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// The guard reports a cycle iff some forbidden id is reachable from a candidate.
        #[test]
        fn prop_cycle_iff_reachable(
            n in 1usize..8,
            raw_edges in prop::collection::vec((0usize..8, 0usize..8), 0..16),
            candidates in prop::collection::vec(0usize..8, 1..3),
            forbidden in prop::collection::vec(0usize..8, 0..4),
        ) {
            // Keep only forward edges so the generated graph is a DAG.
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .filter(|(a, b)| a < b && *b < n)
                .collect();
            let candidates: Vec<usize> = candidates.into_iter().filter(|c| *c < n).collect();
            let forbidden: Vec<usize> = forbidden.into_iter().filter(|f| *f < n).collect();

            let expected = candidates
                .iter()
                .any(|c| forbidden.iter().any(|f| reaches(&edges, *c, *f)));

            let db = Database::open_in_memory()?;
            let actual = db.transaction(|txn| {
                let ids: Vec<FolderId> = (0..n).map(|i| folder(txn, &i.to_string())).collect();
                for (a, b) in &edges {
                    link(txn, ids[*a], VertexRef::Folder(ids[*b]));
                }
                let candidates: Vec<FolderId> = candidates.iter().map(|c| ids[*c]).collect();
                let forbidden: Vec<FolderId> = forbidden.iter().map(|f| ids[*f]).collect();
                would_create_cycle(txn, &candidates, &forbidden, 1000)
            })?;

            prop_assert_eq!(actual, expected);
        }
    }
}
