//! Directed graph over node arena indices, used for cycle analysis only.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Adjacency list keyed by vertex index
#[derive(Debug, Clone, Default)]
pub struct Graph {
    edges: Vec<Vec<usize>>,
}

impl Graph {
    /// Create a graph with `vertices` unconnected vertices
    pub fn new(vertices: usize) -> Self {
        Self {
            edges: vec![Vec::new(); vertices],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.edges.len()
    }

    /// Add a directed edge; out-of-range endpoints are ignored
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if to >= self.edges.len() {
            return;
        }
        if let Some(successors) = self.edges.get_mut(from) {
            if !successors.contains(&to) {
                successors.push(to);
            }
        }
    }

    pub fn successors(&self, vertex: usize) -> &[usize] {
        self.edges.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find any cycle in the whole graph
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        self.find_cycle_in(&|_| true)
    }

    /// Find a cycle among the vertices accepted by `include`.
    ///
    /// The returned path lists the vertices in DFS encounter order and repeats
    /// the first vertex at the end.
    pub fn find_cycle_in(&self, include: &dyn Fn(usize) -> bool) -> Option<Vec<usize>> {
        let mut colors = vec![Color::White; self.edges.len()];
        let mut stack = Vec::new();

        for vertex in 0..self.edges.len() {
            if colors[vertex] == Color::White && include(vertex) {
                if let Some(cycle) = self.visit(vertex, include, &mut colors, &mut stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn visit(
        &self,
        vertex: usize,
        include: &dyn Fn(usize) -> bool,
        colors: &mut [Color],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        colors[vertex] = Color::Gray;
        stack.push(vertex);

        for &next in &self.edges[vertex] {
            if !include(next) {
                continue;
            }
            match colors[next] {
                Color::Gray => {
                    let start = stack.iter().rposition(|&v| v == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.visit(next, include, colors, stack) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        stack.pop();
        colors[vertex] = Color::Black;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_graph() {
        let mut graph = Graph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(0, 2);
        graph.add_edge(1, 3);
        graph.add_edge(2, 3);

        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_three_node_cycle() {
        let mut graph = Graph::new(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 0);

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_self_loop() {
        let mut graph = Graph::new(2);
        graph.add_edge(0, 1);
        graph.add_edge(1, 1);

        assert_eq!(graph.find_cycle().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_cycle_path_excludes_tail_leading_into_it() {
        // 0 -> 1 -> 2 -> 3 -> 1
        let mut graph = Graph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        graph.add_edge(3, 1);

        assert_eq!(graph.find_cycle().unwrap(), vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_restricted_search_skips_excluded_cycle() {
        // cycle between 2 and 3, 0 -> 1 is clean
        let mut graph = Graph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(2, 3);
        graph.add_edge(3, 2);

        assert!(graph.find_cycle().is_some());
        assert!(graph.find_cycle_in(&|v| v < 2).is_none());
        assert!(graph.find_cycle_in(&|v| v >= 2).is_some());
    }

    #[test]
    fn test_duplicate_and_out_of_range_edges() {
        let mut graph = Graph::new(2);
        graph.add_edge(0, 1);
        graph.add_edge(0, 1);
        graph.add_edge(0, 9);
        graph.add_edge(9, 0);

        assert_eq!(graph.successors(0), &[1]);
        assert_eq!(graph.vertex_count(), 2);
    }
}
