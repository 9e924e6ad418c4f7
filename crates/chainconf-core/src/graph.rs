//! Field dependency graph
//!
//! Nodes are field indices; a directed edge runs from the field that
//! provides a variable to every field that references it. The graph is
//! built once per analysis, checked for cycles, and partitioned into
//! dependency stages with a layer-by-layer Kahn sort.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::error::{Error, Result};

const UNVISITED: u8 = 0;
const VISITING: u8 = 1;
const VISITED: u8 = 2;

/// A directed graph of provider -> dependent field edges
#[derive(Debug)]
pub struct DependencyGraph {
    /// Field name per node, indexed by field position
    names: Vec<String>,
    /// Adjacency list: provider field index -> dependent field indices
    edges: HashMap<usize, Vec<usize>>,
    /// Incoming edge count per node
    in_degree: HashMap<usize, usize>,
}

impl DependencyGraph {
    /// Build the graph from reference and declaration maps.
    ///
    /// One node is created per field in `names` (fields without any
    /// interpolation still occupy a node and land in stage 0). Construction
    /// is all-or-nothing: a reference to an undeclared variable fails
    /// immediately, even though the engine has already validated references
    /// once. The duplicate check is cheap and keeps the graph
    /// self-contained.
    ///
    /// * `dependencies` - field index -> variable names it references
    /// * `providers` - variable name -> declaring field index
    /// * `names` - field name per index, for error and cycle reporting
    pub fn build(
        dependencies: &IndexMap<usize, Vec<String>>,
        providers: &IndexMap<String, usize>,
        names: &[String],
    ) -> Result<Self> {
        let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut in_degree: HashMap<usize, usize> = (0..names.len()).map(|i| (i, 0)).collect();

        for (&field, vars) in dependencies {
            for var in vars {
                let &provider = providers.get(var).ok_or_else(|| {
                    Error::dangling_reference(names[field].clone(), var.clone())
                })?;
                edges.entry(provider).or_default().push(field);
                *in_degree.entry(field).or_default() += 1;
            }
        }

        Ok(Self {
            names: names.to_vec(),
            edges,
            in_degree,
        })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Find a directed cycle, if any.
    ///
    /// Depth-first traversal with three-state marking, started from every
    /// unvisited node so disconnected components are all covered. On a back
    /// edge the cycle is reconstructed from the first occurrence of the
    /// re-entered node through the current node, closed by repeating the
    /// entry node, and rendered as field names. A self-referencing field
    /// yields the two-element path `[A, A]`.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut state = vec![UNVISITED; self.names.len()];
        let mut path: Vec<usize> = Vec::new();

        for node in 0..self.names.len() {
            if state[node] == UNVISITED {
                if let Some(cycle) = self.dfs(node, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs(&self, node: usize, state: &mut [u8], path: &mut Vec<usize>) -> Option<Vec<String>> {
        state[node] = VISITING;
        path.push(node);

        if let Some(neighbors) = self.edges.get(&node) {
            for &next in neighbors {
                if state[next] == VISITING {
                    // Back edge: the cycle runs from the first occurrence of
                    // `next` on the path through the current node
                    let start = path
                        .iter()
                        .position(|&n| n == next)
                        .expect("visiting node is on the traversal path");
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&i| self.names[i].clone()).collect();
                    cycle.push(self.names[next].clone());
                    return Some(cycle);
                }
                if state[next] == UNVISITED {
                    if let Some(cycle) = self.dfs(next, state, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        state[node] = VISITED;
        path.pop();
        None
    }

    /// Partition the nodes into dependency stages.
    ///
    /// Stage 0 holds fields with no providers; stage k holds fields whose
    /// every provider lies in an earlier stage. Runs cycle detection first
    /// even though callers already have; the Kahn loop below additionally
    /// treats an empty layer with unprocessed nodes as a structural error
    /// rather than looping forever.
    pub fn topological_sort(&self) -> Result<Vec<Vec<usize>>> {
        if let Some(cycle) = self.detect_cycle() {
            return Err(Error::cyclic_dependency(cycle));
        }

        let mut in_degree = self.in_degree.clone();
        let mut processed: HashSet<usize> = HashSet::new();
        let mut stages: Vec<Vec<usize>> = Vec::new();

        while processed.len() < self.names.len() {
            let stage: Vec<usize> = (0..self.names.len())
                .filter(|i| !processed.contains(i) && in_degree.get(i).copied().unwrap_or(0) == 0)
                .collect();

            if stage.is_empty() {
                // Unreachable after a clean cycle check
                return Err(Error::structural(
                    "topological sort",
                    "unable to complete sort: possible cycle",
                ));
            }

            for &node in &stage {
                processed.insert(node);
                if let Some(neighbors) = self.edges.get(&node) {
                    for &next in neighbors {
                        if let Some(d) = in_degree.get_mut(&next) {
                            *d = d.saturating_sub(1);
                        }
                    }
                }
            }

            stages.push(stage);
        }

        Ok(stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn providers(pairs: &[(&str, usize)]) -> IndexMap<String, usize> {
        pairs.iter().map(|(n, i)| (n.to_string(), *i)).collect()
    }

    fn dependencies(pairs: &[(usize, &[&str])]) -> IndexMap<usize, Vec<String>> {
        pairs
            .iter()
            .map(|(i, vars)| (*i, vars.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_build_rejects_undeclared_variable() {
        let err = DependencyGraph::build(
            &dependencies(&[(0, &["MISSING"])]),
            &providers(&[]),
            &names(&["DBPassword"]),
        )
        .unwrap_err();

        let display = format!("{}", err);
        assert!(display.contains("undefined variable '${MISSING}'"));
        assert!(display.contains("Field: DBPassword"));
    }

    #[test]
    fn test_linear_chain_stages() {
        // Env provides ENV; DBPassword references it
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["ENV"])]),
            &providers(&[("ENV", 0)]),
            &names(&["Env", "DBPassword"]),
        )
        .unwrap();

        assert!(graph.detect_cycle().is_none());
        assert_eq!(graph.topological_sort().unwrap(), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_three_level_chain() {
        // Env -> Region -> Secret
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["ENV"]), (2, &["ENV", "REGION"])]),
            &providers(&[("ENV", 0), ("REGION", 1)]),
            &names(&["Env", "Region", "Secret"]),
        )
        .unwrap();

        assert_eq!(
            graph.topological_sort().unwrap(),
            vec![vec![0], vec![1], vec![2]]
        );
    }

    #[test]
    fn test_independent_fields_share_stage_zero() {
        let graph = DependencyGraph::build(
            &dependencies(&[(2, &["A", "B"])]),
            &providers(&[("A", 0), ("B", 1)]),
            &names(&["FieldA", "FieldB", "FieldC"]),
        )
        .unwrap();

        assert_eq!(graph.topological_sort().unwrap(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_fields_without_interpolation_land_in_stage_zero() {
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["ENV"])]),
            &providers(&[("ENV", 0)]),
            &names(&["Env", "DBPassword", "Unrelated"]),
        )
        .unwrap();

        assert_eq!(graph.topological_sort().unwrap(), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_two_node_cycle_path_is_closed() {
        // FieldA references B (provided by FieldB); FieldB references A
        let graph = DependencyGraph::build(
            &dependencies(&[(0, &["B"]), (1, &["A"])]),
            &providers(&[("A", 0), ("B", 1)]),
            &names(&["FieldA", "FieldB"]),
        )
        .unwrap();

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"FieldA".to_string()));
        assert!(cycle.contains(&"FieldB".to_string()));

        let err = graph.topological_sort().unwrap_err();
        assert!(format!("{}", err).contains("cyclic dependency detected"));
    }

    #[test]
    fn test_self_reference_is_two_element_cycle() {
        let graph = DependencyGraph::build(
            &dependencies(&[(0, &["SELF"])]),
            &providers(&[("SELF", 0)]),
            &names(&["FieldA"]),
        )
        .unwrap();

        assert_eq!(graph.detect_cycle().unwrap(), vec!["FieldA", "FieldA"]);
    }

    #[test]
    fn test_cycle_in_second_component_is_found() {
        // Component 1 (indices 0,1) is acyclic; component 2 (2,3) cycles
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["A"]), (2, &["D"]), (3, &["C"])]),
            &providers(&[("A", 0), ("C", 2), ("D", 3)]),
            &names(&["FieldA", "FieldB", "FieldC", "FieldD"]),
        )
        .unwrap();

        let cycle = graph.detect_cycle().unwrap();
        assert!(cycle.contains(&"FieldC".to_string()));
        assert!(cycle.contains(&"FieldD".to_string()));
    }

    #[test]
    fn test_cycle_with_tail_excludes_entry_path() {
        // FieldA feeds the B<->C cycle but is not part of it
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["A", "C"]), (2, &["B"])]),
            &providers(&[("A", 0), ("B", 1), ("C", 2)]),
            &names(&["FieldA", "FieldB", "FieldC"]),
        )
        .unwrap();

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(!cycle.contains(&"FieldA".to_string()));
        assert!(cycle.contains(&"FieldB".to_string()));
        assert!(cycle.contains(&"FieldC".to_string()));
    }

    #[test]
    fn test_empty_graph() {
        let graph =
            DependencyGraph::build(&IndexMap::new(), &IndexMap::new(), &[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.detect_cycle().is_none());
        assert!(graph.topological_sort().unwrap().is_empty());
    }

    #[test]
    fn test_repeated_reference_still_sorts() {
        // The same provider referenced twice raises in-degree but must not
        // change the stage shape
        let graph = DependencyGraph::build(
            &dependencies(&[(1, &["ENV", "ENV"])]),
            &providers(&[("ENV", 0)]),
            &names(&["Env", "Path"]),
        )
        .unwrap();

        assert_eq!(graph.topological_sort().unwrap(), vec![vec![0], vec![1]]);
    }
}
