//! Pipeline dependency graph
//!
//! A directed graph over pipeline names where an edge from A to B means A
//! must reach a terminal state before B may start. Built once per loaded
//! configuration and validated before any run is created: unknown
//! `depends_on` names and cycles reject the whole configuration.

use std::collections::{HashMap, HashSet};

use petgraph::{
    Direction::Incoming,
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};

use gantry_core::domain::pipeline::PipelineDefinition;

use crate::error::EngineError;

#[derive(Debug)]
pub struct PipelineGraph {
    graph: DiGraph<String, ()>,
    name_to_idx: HashMap<String, NodeIndex>,
}

impl PipelineGraph {
    /// Builds and validates the graph for a set of pipeline definitions
    pub fn build(pipelines: &[PipelineDefinition]) -> Result<Self, EngineError> {
        let mut graph = DiGraph::new();
        let mut name_to_idx = HashMap::new();

        for pipeline in pipelines {
            let idx = graph.add_node(pipeline.name.clone());
            name_to_idx.insert(pipeline.name.clone(), idx);
        }

        for pipeline in pipelines {
            let to_idx = name_to_idx[&pipeline.name];
            for upstream in &pipeline.depends_on {
                let from_idx =
                    name_to_idx
                        .get(upstream)
                        .copied()
                        .ok_or_else(|| EngineError::DependencyUnmet {
                            from: pipeline.name.clone(),
                            to: upstream.clone(),
                        })?;
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let name = graph[cycle.node_id()].clone();
            return Err(EngineError::CyclicDependency(name));
        }

        Ok(Self { graph, name_to_idx })
    }

    /// Direct upstream pipeline names of `name`
    pub fn upstreams(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.name_to_idx.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Incoming)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Transitive upstream closure of `name` (not including `name` itself)
    ///
    /// Once a pipeline's direct upstreams are terminal, every pipeline in
    /// its closure is terminal too, so an aggregate computed over the
    /// closure is stable at dispatch time.
    pub fn upstream_closure(&self, name: &str) -> HashSet<String> {
        let mut closure = HashSet::new();
        let Some(&start) = self.name_to_idx.get(name) else {
            return closure;
        };

        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            for up in self.graph.neighbors_directed(idx, Incoming) {
                if closure.insert(self.graph[up].clone()) {
                    stack.push(up);
                }
            }
        }

        closure
    }

    /// Pipeline names in a valid topological order
    pub fn topo_order(&self) -> Vec<String> {
        // Graph was validated acyclic in build()
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|i| self.graph[i].clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(name: &str, depends_on: &[&str]) -> PipelineDefinition {
        let yaml = format!(
            "kind: pipeline\nname: {}\ndepends_on: [{}]\n",
            name,
            depends_on.join(", ")
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let pipelines = vec![pipeline("b", &["a"])];
        let err = PipelineGraph::build(&pipelines).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DependencyUnmet { ref from, ref to } if from == "b" && to == "a"
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let pipelines = vec![
            pipeline("a", &["c"]),
            pipeline("b", &["a"]),
            pipeline("c", &["b"]),
        ];
        let err = PipelineGraph::build(&pipelines).unwrap_err();
        assert!(matches!(err, EngineError::CyclicDependency(_)));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let pipelines = vec![pipeline("a", &["a"])];
        assert!(matches!(
            PipelineGraph::build(&pipelines).unwrap_err(),
            EngineError::CyclicDependency(_)
        ));
    }

    #[test]
    fn test_upstreams_and_closure() {
        let pipelines = vec![
            pipeline("checks", &[]),
            pipeline("test", &["checks"]),
            pipeline("package", &["test"]),
            pipeline("notify", &["test", "package"]),
        ];
        let graph = PipelineGraph::build(&pipelines).unwrap();

        let mut ups = graph.upstreams("notify");
        ups.sort();
        assert_eq!(ups, vec!["package", "test"]);

        let closure = graph.upstream_closure("notify");
        assert_eq!(
            closure,
            ["checks", "test", "package"]
                .into_iter()
                .map(String::from)
                .collect()
        );
        assert!(graph.upstream_closure("checks").is_empty());
    }

    #[test]
    fn test_topo_order_respects_edges() {
        let pipelines = vec![
            pipeline("package", &["test"]),
            pipeline("test", &["checks"]),
            pipeline("checks", &[]),
        ];
        let graph = PipelineGraph::build(&pipelines).unwrap();
        let order = graph.topo_order();

        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("checks") < pos("test"));
        assert!(pos("test") < pos("package"));
    }
}
