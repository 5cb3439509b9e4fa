//! Graphviz export of a manager's nodes.
//!
//! Decision nodes are grouped into one rank per level, so the picture follows
//! the manager's variable order rather than variable numbers. High edges are
//! solid, low edges dashed, and complemented edges dotted with a hollow
//! circle. Relations use [`Bdd::to_dot_labeled`] to name each variable after
//! the slot bit it encodes.
//!
//! # Examples
//!
//! ```
//! use bdd_rel::bdd::Bdd;
//!
//! let bdd = Bdd::default();
//! bdd.extend_vars(2);
//! let f = bdd.apply_and(bdd.mk_var(1), bdd.mk_var(2));
//!
//! let dot = bdd.to_dot(&[f]).unwrap();
//! assert!(dot.starts_with("graph {"));
//! // Render with: dot -Tpng out.dot -o out.png
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Shapes and edge styles of the generated graph.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for decision nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for the terminals (default: "square")
    pub terminal_shape: &'static str,
    /// Shape for root markers (default: "rect")
    pub root_shape: &'static str,
    pub high_edge_style: &'static str,
    pub low_edge_style: &'static str,
    pub negated_edge_style: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "circle",
            terminal_shape: "square",
            root_shape: "rect",
            high_edge_style: "solid",
            low_edge_style: "dashed",
            negated_edge_style: "dotted",
        }
    }
}

impl Bdd {
    /// DOT graph of everything reachable from `roots`, variables labeled `x<v>`.
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        self.to_dot_labeled(roots, &DotConfig::default(), |v| format!("x{}", v))
    }

    /// DOT graph with a custom label per variable.
    pub fn to_dot_labeled(
        &self,
        roots: &[Ref],
        config: &DotConfig,
        label: impl Fn(u32) -> String,
    ) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        writeln!(dot, "{{ rank=sink")?;
        writeln!(dot, "0 [shape={}, label=\"0\"];", config.terminal_shape)?;
        writeln!(dot, "1 [shape={}, label=\"1\"];", config.terminal_shape)?;
        writeln!(dot, "}}")?;

        let all_nodes = self.descendants(roots.iter().copied());

        let mut levels = BTreeMap::<u32, Vec<u32>>::new();
        for &id in all_nodes.iter().filter(|&&id| id != 1) {
            levels.entry(self.level(self.variable(id))).or_default().push(id);
        }

        for ids in levels.values_mut() {
            ids.sort_unstable();
            writeln!(dot, "{{ rank=same")?;
            for &id in ids.iter() {
                writeln!(dot, "{} [label=\"{}\"];", id, label(self.variable(id)))?;
            }
            writeln!(dot, "}}")?;
        }

        for ids in levels.values() {
            for &id in ids {
                let high = self.high(id);
                writeln!(dot, "{} -- {} [style={}];", id, high.index(), config.high_edge_style)?;

                let low = self.low(id);
                if low == self.zero {
                    writeln!(dot, "{} -- 0 [style={}];", id, config.low_edge_style)?;
                } else if low.is_negated() {
                    writeln!(
                        dot,
                        "{} -- {} [style={}, dir=forward, arrowhead=odot];",
                        id,
                        low.index(),
                        config.negated_edge_style
                    )?;
                } else {
                    writeln!(dot, "{} -- {} [style={}];", id, low.index(), config.low_edge_style)?;
                }
            }
        }

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape={}, label=\"{}\"];", i, config.root_shape, root)?;
        }
        writeln!(dot, "}}")?;

        for (i, &root) in roots.iter().enumerate() {
            if root == self.zero {
                writeln!(dot, "r{} -- 0;", i)?;
            } else if root.is_negated() {
                writeln!(dot, "r{} -- {} [dir=forward, arrowhead=odot];", i, root.index())?;
            } else {
                writeln!(dot, "r{} -- {};", i, root.index())?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
