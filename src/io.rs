//! Text serialization of a BDD body.
//!
//! # Format
//!
//! ```text
//! <node_count> <var_count>
//! <id> <var> <low> <high>     # one line per node, children first
//! ...
//! <root>
//! ```
//!
//! Edges are signed integers: `1` is true, `-1` is false, `±id` (with
//! `id >= 2`) points to a node listed earlier, negative meaning complemented.
//! Node variables must lie in `1..=var_count`.
//! Variable numbers are the writer's; a reader passes a remapping so that a
//! body written by one manager can be rebuilt in another whose variables are
//! numbered (and ordered) differently.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Failure while reading a serialized body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error on body line {line}: {message}")]
    Parse { line: usize, message: String },
}

fn parse_err(line: usize, message: impl Into<String>) -> BodyError {
    BodyError::Parse {
        line,
        message: message.into(),
    }
}

impl Bdd {
    /// Write the nodes reachable from `f` followed by the root edge.
    pub fn write_body<W: Write>(&self, f: Ref, out: &mut W) -> io::Result<()> {
        let mut ids: HashMap<u32, i32> = HashMap::new();
        let mut lines: Vec<(i32, u32, Ref, Ref)> = Vec::new();
        self.number_nodes(f, &mut ids, &mut lines);

        let encode = |r: Ref, ids: &HashMap<u32, i32>| -> i32 {
            let id = if self.is_terminal(r) { 1 } else { ids[&r.index()] };
            if r.is_negated() {
                -id
            } else {
                id
            }
        };

        writeln!(out, "{} {}", lines.len(), self.num_vars())?;
        for &(id, var, low, high) in &lines {
            writeln!(out, "{} {} {} {}", id, var, encode(low, &ids), encode(high, &ids))?;
        }
        writeln!(out, "{}", encode(f, &ids))?;
        Ok(())
    }

    // Children get their ids before parents.
    fn number_nodes(&self, f: Ref, ids: &mut HashMap<u32, i32>, lines: &mut Vec<(i32, u32, Ref, Ref)>) {
        if self.is_terminal(f) || ids.contains_key(&f.index()) {
            return;
        }
        let i = f.index();
        let low = self.low(i);
        let high = self.high(i);
        self.number_nodes(low, ids, lines);
        self.number_nodes(high, ids, lines);
        let id = ids.len() as i32 + 2;
        ids.insert(i, id);
        lines.push((id, self.variable(i), low, high));
    }

    /// Read a body written by [`Bdd::write_body`], translating each stored
    /// variable through `remap`. A variable `remap` rejects is an error.
    pub fn read_body<R: BufRead>(&self, input: R, remap: impl Fn(u32) -> Option<u32>) -> Result<Ref, BodyError> {
        let mut lines = input.lines().enumerate().filter_map(|(n, line)| match line {
            Ok(l) if l.trim().is_empty() => None,
            other => Some((n + 1, other)),
        });

        let (n, header) = lines.next().ok_or_else(|| parse_err(0, "missing body header"))?;
        let header = header?;
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(parse_err(n, format!("expected '<nodes> <vars>', got '{}'", header)));
        }
        let count: usize = parts[0].parse().map_err(|_| parse_err(n, "bad node count"))?;
        let var_count: u32 = parts[1].parse().map_err(|_| parse_err(n, "bad variable count"))?;

        let mut nodes: HashMap<u32, Ref> = HashMap::new();
        let decode = |edge: i32, nodes: &HashMap<u32, Ref>, n: usize| -> Result<Ref, BodyError> {
            let r = match edge.unsigned_abs() {
                0 => return Err(parse_err(n, "edge 0 is not a node")),
                1 => self.one,
                id => *nodes.get(&id).ok_or_else(|| parse_err(n, format!("edge to unknown node {}", id)))?,
            };
            Ok(if edge < 0 { -r } else { r })
        };

        for _ in 0..count {
            let (n, line) = lines.next().ok_or_else(|| parse_err(0, "unexpected end of body"))?;
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return Err(parse_err(n, format!("expected 4 fields, got {}", fields.len())));
            }
            let field = |i: usize| -> Result<i32, BodyError> {
                fields[i]
                    .parse::<i32>()
                    .map_err(|e| parse_err(n, format!("bad field '{}': {}", fields[i], e)))
            };
            let id = field(0)?;
            if id < 2 {
                return Err(parse_err(n, format!("invalid node id {}", id)));
            }
            let id = id as u32;
            if nodes.contains_key(&id) {
                return Err(parse_err(n, format!("node {} is defined twice", id)));
            }
            let var = u32::try_from(field(1)?).map_err(|_| parse_err(n, "negative variable"))?;
            if var == 0 || var > var_count {
                return Err(parse_err(n, format!("variable {} is outside 1..={}", var, var_count)));
            }
            let target = remap(var).ok_or_else(|| parse_err(n, format!("variable {} is not mapped", var)))?;
            let low = decode(field(2)?, &nodes, n)?;
            let high = decode(field(3)?, &nodes, n)?;
            let node = self.apply_ite(self.mk_var(target), high, low);
            nodes.insert(id, node);
        }

        let (n, root) = lines.next().ok_or_else(|| parse_err(0, "missing root"))?;
        let root = root?;
        let edge: i32 = root.trim().parse().map_err(|_| parse_err(n, format!("bad root '{}'", root)))?;
        decode(edge, &nodes, n)
    }
}
