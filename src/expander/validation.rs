use crate::error::BuildError;
use crate::graph::Module;
use ahash::AHashMap;

/// Checks the structural rules of the home module before expansion:
/// every connection targets an existing node, the graph has no cycle and
/// no node has more than one parent.
pub(super) fn validate(home: &Module) -> Result<(), BuildError> {
    check_references(home)?;
    check_acyclic(home)?;
    check_single_parent(home)
}

fn check_references(home: &Module) -> Result<(), BuildError> {
    for (key, entry) in home.nodes_in_order() {
        let dangling = entry
            .targets()
            .into_iter()
            .chain(entry.parent_ids())
            .find(|id| home.node(id).is_none());
        if let Some(missing) = dangling {
            return Err(BuildError::NodeNotFound {
                missing_node_id: missing.to_string(),
                source_node_id: key.to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

fn check_acyclic(home: &Module) -> Result<(), BuildError> {
    let mut marks: AHashMap<&str, Mark> = AHashMap::new();

    for (start, _) in home.nodes_in_order() {
        if marks.contains_key(start) {
            continue;
        }
        // Iterative depth-first search; each frame holds a node and the
        // index of the next child to visit.
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::OnPath);

        while let Some((node, next_child)) = stack.last().copied() {
            let children = home.node(node).map(|e| e.targets()).unwrap_or_default();
            match children.get(next_child) {
                Some(&child) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    match marks.get(child) {
                        Some(Mark::OnPath) => {
                            return Err(BuildError::CycleDetected {
                                node_id: child.to_string(),
                            });
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::OnPath);
                            stack.push((child, 0));
                        }
                    }
                }
                None => {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

fn check_single_parent(home: &Module) -> Result<(), BuildError> {
    let mut parents: AHashMap<&str, usize> = AHashMap::new();
    for (_, entry) in home.nodes_in_order() {
        for target in entry.targets() {
            *parents.entry(target).or_default() += 1;
        }
    }

    for (key, entry) in home.nodes_in_order() {
        let declared = entry.parent_ids().count();
        let observed = parents.get(key).copied().unwrap_or(0);
        let count = declared.max(observed);
        if count > 1 {
            return Err(BuildError::JoinNotSupported {
                node_id: key.to_string(),
                parents: count,
            });
        }
    }
    Ok(())
}
