//! Connection Graph Analysis
//!
//! Cycle detection over the subtask graph induced by connections. Used as
//! an advisory check only; composites still accept cyclic wiring.

use std::collections::HashMap;

use log::debug;

use super::connection::Connection;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Finds a cycle in the graph whose nodes are `task_ids` and whose edges
/// run from each connection's source task to its target task.
///
/// Returns the cycle as a path that starts and ends on the same task, or
/// `None` when the graph is acyclic. Connections naming unknown tasks are
/// ignored. Traversal follows `task_ids` order, so the result is
/// deterministic.
pub fn find_cycle<'a>(
    task_ids: impl IntoIterator<Item = &'a str>,
    connections: &[Connection],
) -> Option<Vec<String>> {
    let nodes: Vec<&str> = task_ids.into_iter().collect();

    let mut successors: HashMap<&str, Vec<&str>> = nodes.iter().map(|id| (*id, Vec::new())).collect();
    for connection in connections {
        let to = connection.to_task.as_str();
        if !successors.contains_key(to) {
            continue;
        }
        if let Some(next) = successors.get_mut(connection.from_task.as_str()) {
            if !next.contains(&to) {
                next.push(to);
            }
        }
    }

    let mut marks: HashMap<&str, Mark> = nodes.iter().map(|id| (*id, Mark::Unvisited)).collect();
    let mut path: Vec<&str> = Vec::new();

    for &node in &nodes {
        if marks[node] == Mark::Unvisited {
            if let Some(cycle) = visit(node, &successors, &mut marks, &mut path) {
                debug!("Cycle found: {:?}", cycle);
                return Some(cycle);
            }
        }
    }

    None
}

/// Depth-first visit with three-colour marking.
fn visit<'a>(
    node: &'a str,
    successors: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    marks.insert(node, Mark::InProgress);
    path.push(node);

    for &next in successors.get(node).into_iter().flatten() {
        match marks[next] {
            Mark::InProgress => {
                let start = path.iter().position(|id| *id == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(next, successors, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }

    path.pop();
    marks.insert(node, Mark::Done);
    None
}
