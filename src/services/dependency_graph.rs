//! Directed graph over named nodes with first-cycle detection.

use std::collections::HashMap;

/// Directed graph keyed by node name.
///
/// Nodes and edges keep insertion order, so cycle detection visits them in
/// the order the input declared them and always reports the same cycle for
/// the same input. Duplicate edges are stored once.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if absent and return its index.
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.edges.push(Vec::new());
        idx
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn successors<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.index
            .get(name)
            .map(|&idx| self.edges[idx].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&next| self.nodes[next].as_str())
    }

    /// First back-edge found by depth-first search, as `(node, next)`.
    ///
    /// Search starts from each unvisited node in insertion order and stops
    /// at the first cycle anywhere in the graph. Uses an explicit stack, so
    /// deep graphs cannot overflow the call stack.
    pub fn find_cycle(&self) -> Option<(String, String)> {
        let n = self.nodes.len();
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if visited[root] {
                continue;
            }
            visited[root] = true;
            on_stack[root] = true;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let next = self.edges[node].get(frame.1).copied();
                frame.1 += 1;

                match next {
                    Some(next) if !visited[next] => {
                        visited[next] = true;
                        on_stack[next] = true;
                        stack.push((next, 0));
                    }
                    Some(next) if on_stack[next] => {
                        return Some((self.nodes[node].clone(), self.nodes[next].clone()));
                    }
                    Some(_) => {}
                    None => {
                        on_stack[node] = false;
                        stack.pop();
                    }
                }
            }
        }

        None
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for DependencyGraph {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut graph = Self::new();
        for (from, to) in iter {
            graph.add_edge(from, to);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cycle_in_chain() {
        let graph: DependencyGraph = [("a", "b"), ("b", "c"), ("a", "c")].into_iter().collect();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_two_node_cycle() {
        let graph: DependencyGraph = [("A", "B"), ("B", "A")].into_iter().collect();
        assert_eq!(graph.find_cycle(), Some(("B".to_string(), "A".to_string())));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let graph: DependencyGraph = [("a", "a")].into_iter().collect();
        assert_eq!(graph.find_cycle(), Some(("a".to_string(), "a".to_string())));
    }

    #[test]
    fn test_cycle_reached_from_later_root() {
        let graph: DependencyGraph = [("x", "y"), ("p", "q"), ("q", "r"), ("r", "p")]
            .into_iter()
            .collect();
        assert_eq!(graph.find_cycle(), Some(("r".to_string(), "p".to_string())));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let graph: DependencyGraph = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]
            .into_iter()
            .collect();
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_duplicate_edges_are_stored_once() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "b");
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.successors("a").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(graph.successors("missing").count(), 0);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let names: Vec<String> = (0..100_000).map(|i| format!("n{i}")).collect();
        let mut graph = DependencyGraph::new();
        for pair in names.windows(2) {
            graph.add_edge(&pair[0], &pair[1]);
        }
        assert!(graph.find_cycle().is_none());

        graph.add_edge("n99999", "n0");
        assert_eq!(
            graph.find_cycle(),
            Some(("n99999".to_string(), "n0".to_string()))
        );
    }
}
