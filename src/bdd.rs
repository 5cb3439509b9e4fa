//! The BDD manager.
//!
//! A [`Bdd`] owns a hash-consed node table, an operation cache and a
//! variable order. Nodes use complement edges: a [`Ref`] carries a negation
//! flag, and the high edge of a stored node is never negated, which keeps the
//! representation canonical.
//!
//! Variables are 1-indexed and each one sits at a *level*; the level order
//! decides which variable is tested first. Fresh variables are appended at
//! the bottom, and [`Bdd::set_var_order`] may rearrange them as long as no
//! decision node exists yet.
//!
//! Relations never share a manager: each one builds its own, so variable
//! numbering of one relation can never interfere with another.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::config::BddConfig;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing2, pairing3, MyHash};

/// Level reported for the terminal node: below every variable.
pub const TERMINAL_LEVEL: u32 = u32::MAX;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::ZERO,
            high: Ref::ZERO,
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(self.variable as u64, self.low.unsigned(), self.high.unsigned())
    }
}

type Storage = Table<Node>;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match self {
            OpKey::Ite(f, g, h) => pairing3(f.unsigned(), g.unsigned(), h.unsigned()),
            OpKey::Exists(f, c) => pairing2(pairing2(f.unsigned(), c.unsigned()), 1),
        }
    }
}

struct Order {
    /// `var_to_level[v]` for 1-indexed `v`; slot 0 is unused.
    var_to_level: Vec<u32>,
    level_to_var: Vec<u32>,
}

pub struct Bdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<OpKey, Ref>>,
    order: RefCell<Order>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new(storage_bits: usize, cache_bits: usize, min_free: f64) -> Self {
        assert!(storage_bits <= 31, "Storage bits should be in the range 0..=31");

        let mut storage = Storage::new(storage_bits, min_free);

        // Allocate the terminal node:
        let one = storage.add(Node::default());
        assert_eq!(one, 1); // Make sure the terminal node is (1).
        let one = Ref::positive(one as u32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            order: RefCell::new(Order {
                var_to_level: vec![TERMINAL_LEVEL],
                level_to_var: Vec::new(),
            }),
            zero,
            one,
        }
    }

    pub fn with_config(config: &BddConfig) -> Self {
        Self::new(config.node_table_bits, config.cache_bits, config.min_free)
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::with_config(&BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("size", &storage.size())
            .field("num_vars", &self.num_vars())
            .finish()
    }
}

// Variables and levels
impl Bdd {
    pub fn num_vars(&self) -> usize {
        self.order.borrow().level_to_var.len()
    }

    /// Append `count` fresh variables at the bottom of the order and return
    /// the first new variable.
    pub fn extend_vars(&self, count: usize) -> u32 {
        let mut order = self.order.borrow_mut();
        let first = order.var_to_level.len() as u32;
        for i in 0..count as u32 {
            let level = order.level_to_var.len() as u32;
            order.var_to_level.push(level);
            order.level_to_var.push(first + i);
        }
        debug!("extend_vars(count = {}) -> first = {}", count, first);
        first
    }

    /// Rearrange variables: `vars[i]` is placed at level `i`.
    ///
    /// Only allowed while the manager holds no decision nodes.
    pub fn set_var_order(&self, vars: &[u32]) {
        assert_eq!(
            self.storage.borrow().size(),
            1,
            "Variable order can only be set before any node is created"
        );
        let n = self.num_vars();
        assert_eq!(vars.len(), n, "Order must mention all {} variables", n);

        let mut var_to_level = vec![TERMINAL_LEVEL; n + 1];
        for (level, &v) in vars.iter().enumerate() {
            assert!(v >= 1 && v as usize <= n, "Unknown variable {} in order", v);
            assert_eq!(var_to_level[v as usize], TERMINAL_LEVEL, "Variable {} appears twice in order", v);
            var_to_level[v as usize] = level as u32;
        }

        let mut order = self.order.borrow_mut();
        order.var_to_level = var_to_level;
        order.level_to_var = vars.to_vec();
    }

    /// Level of variable `v`.
    pub fn level(&self, v: u32) -> u32 {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.order.borrow().var_to_level[v as usize]
    }

    /// Variable placed at `level`.
    pub fn var_at_level(&self, level: u32) -> u32 {
        self.order.borrow().level_to_var[level as usize]
    }

    /// Level of the variable tested by `node`, or [`TERMINAL_LEVEL`].
    pub fn node_level(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            TERMINAL_LEVEL
        } else {
            self.level(self.variable(node.index()))
        }
    }
}

// Nodes
impl Bdd {
    pub fn cache(&self) -> std::cell::Ref<'_, Cache<OpKey, Ref>> {
        self.cache.borrow()
    }

    /// Number of cells used in the node table (including the terminal).
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().size()
    }

    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().value(index as usize).variable
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).high
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 1
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node { variable: v, low, high });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        assert!(v as usize <= self.num_vars(), "Variable {} is not allocated", v);
        self.mk_node(v, self.zero, self.one)
    }

    /// Conjunction of literals (`v` or `-v`), built bottom-up in level order.
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        for &lit in &literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
        }
        literals.sort_by_key(|&lit| std::cmp::Reverse(self.level(lit.unsigned_abs())));
        let mut current = self.one;
        for lit in literals {
            current = if lit < 0 {
                self.mk_node(lit.unsigned_abs(), current, self.zero)
            } else {
                self.mk_node(lit as u32, self.zero, current)
            };
        }
        current
    }

    /// Positive cube over `vars`, used as a variable set for quantification.
    pub fn var_set(&self, vars: impl IntoIterator<Item = u32>) -> Ref {
        self.cube(vars.into_iter().map(|v| v as i32))
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        if self.is_terminal(node) || self.level(v) < self.node_level(node) {
            return (node, node);
        }
        assert_eq!(v, self.variable(node.index()));
        (self.low_node(node), self.high_node(node))
    }
}

// Boolean operations
impl Bdd {
    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, self.one, h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero);
        }
        if g == -f {
            return self.apply_ite(f, self.zero, h);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one);
        }

        let i = self.node_level(f);
        let j = self.node_level(g);
        let k = self.node_level(h);

        // Equivalent pairs (choose the one with the topmost variable first):
        //   ite(F,1,H) == ite(H,1,F) == F ∨ H
        //   ite(F,G,0) == ite(G,F,0) == F ∧ G
        //   ite(F,G,1) == ite(~G,~F,1) == F -> G
        //   ite(F,0,H) == ite(~H,0,~F) == ~F ∧ H
        if self.is_one(g) && k < i {
            return self.apply_ite(h, self.one, f);
        }
        if self.is_zero(h) && j < i {
            return self.apply_ite(g, f, self.zero);
        }
        if self.is_one(h) && j < i {
            return self.apply_ite(-g, -f, self.one);
        }
        if self.is_zero(g) && k < i {
            return self.apply_ite(-h, self.zero, -f);
        }

        // Make sure the first two pointers (f and g) are regular (not negated)
        let (mut f, mut g, mut h) = (f, g, h);

        // ite(~F,G,H) => ite(F,H,G)
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        // Determine the top variable:
        let m = i.min(j).min(k);
        assert_ne!(m, TERMINAL_LEVEL);
        let v = self.var_at_level(m);

        let (f0, f1) = self.top_cofactors(f, v);
        let (g0, g1) = self.top_cofactors(g, v);
        let (h0, h1) = self.top_cofactors(h, v);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);

        let res = self.mk_node(v, e, t);
        debug!("computed: apply_ite(f = {}, g = {}, h = {}) -> {}", f, g, h, res);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    /// Set difference `u ∧ ¬v`.
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(v, self.zero, u)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes.into_iter() {
            res = self.apply_and(res, node);
        }
        res
    }

    /// Existential quantification `∃vars. f`, where `vars` is a positive cube
    /// built with [`Bdd::var_set`].
    pub fn exists(&self, f: Ref, vars: Ref) -> Ref {
        debug!("exists(f = {}, vars = {})", f, vars);

        if self.is_terminal(f) || self.is_one(vars) {
            return f;
        }
        assert!(!self.is_zero(vars), "Variable set must be a positive cube");

        let lf = self.node_level(f);
        let lc = self.node_level(vars);

        if lc < lf {
            // `f` does not depend on the topmost quantified variable.
            return self.exists(f, self.high_node(vars));
        }

        let key = OpKey::Exists(f, vars);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return res;
        }

        let (f0, f1) = (self.low_node(f), self.high_node(f));
        let res = if lf == lc {
            let rest = self.high_node(vars);
            let e = self.exists(f0, rest);
            if self.is_one(e) {
                e
            } else {
                let t = self.exists(f1, rest);
                self.apply_or(e, t)
            }
        } else {
            let e = self.exists(f0, vars);
            let t = self.exists(f1, vars);
            self.mk_node(self.variable(f.index()), e, t)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Indices of all nodes reachable from `nodes`, the terminal included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        visited.insert(self.one.index());
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) {
                queue.push_back(self.low(i));
                queue.push_back(self.high(i));
            }
        }

        visited
    }

    /// Number of distinct nodes in `f`, the terminal included.
    pub fn size(&self, f: Ref) -> u64 {
        self.descendants([f]).len() as u64
    }

}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn manager(vars: usize) -> Bdd {
        let bdd = Bdd::new(10, 8, 0.0);
        bdd.extend_vars(vars);
        bdd
    }

    #[test]
    fn test_var() {
        let bdd = manager(1);

        let x = bdd.mk_var(1);

        assert_eq!(bdd.variable(x.index()), 1);
        assert_eq!(bdd.high_node(x), bdd.one);
        assert_eq!(bdd.low_node(x), bdd.zero);
    }

    #[test]
    fn test_not_var() {
        let bdd = manager(1);

        let x = bdd.mk_var(1);
        let not_x = -x;

        assert_eq!(bdd.variable(not_x.index()), 1);
        assert_eq!(bdd.high_node(not_x), bdd.zero);
        assert_eq!(bdd.low_node(not_x), bdd.one);
    }

    #[test]
    fn test_terminal() {
        let bdd = manager(0);

        assert!(bdd.is_terminal(bdd.zero));
        assert!(bdd.is_zero(bdd.zero));
        assert!(!bdd.is_one(bdd.zero));

        assert!(bdd.is_terminal(bdd.one));
        assert!(!bdd.is_zero(bdd.one));
        assert!(bdd.is_one(bdd.one));

        assert_eq!(bdd.node_level(bdd.one), TERMINAL_LEVEL);
    }

    #[test]
    #[should_panic(expected = "Variable 3 is not allocated")]
    fn test_unallocated_var() {
        let bdd = manager(2);
        bdd.mk_var(3);
    }

    #[test]
    fn test_cube() {
        let bdd = manager(3);

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let f = bdd.apply_and(bdd.apply_and(x1, x2), x3);
        assert_eq!(f, bdd.cube([1, 2, 3]));

        let f = bdd.apply_and(bdd.apply_and(x1, -x2), -x3);
        assert_eq!(f, bdd.cube([1, -2, -3]));
    }

    #[test]
    fn test_de_morgan() {
        let bdd = manager(2);

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);

        assert_eq!(-bdd.apply_and(x, y), bdd.apply_or(-x, -y));
        assert_eq!(-bdd.apply_or(x, y), bdd.apply_and(-x, -y));
    }

    #[test]
    fn test_xor_itself() {
        let bdd = manager(2);

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_and(x, y);

        assert_eq!(bdd.apply_xor(f, f), bdd.zero);
        assert_eq!(bdd.apply_xor(f, -f), bdd.one);
    }

    #[test]
    fn test_diff() {
        let bdd = manager(2);

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);

        let f = bdd.apply_diff(bdd.apply_or(x, y), y);
        assert_eq!(f, bdd.apply_and(x, -y));
        assert_eq!(bdd.apply_diff(x, x), bdd.zero);
    }

    #[test]
    fn test_var_order_changes_root() {
        let bdd = manager(2);
        bdd.set_var_order(&[2, 1]);

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_and(x1, x2);

        assert_eq!(bdd.variable(f.index()), 2);
        assert_eq!(bdd.level(2), 0);
        assert_eq!(bdd.var_at_level(1), 1);
        assert_eq!(f, bdd.cube([1, 2]));
    }

    #[test]
    #[should_panic(expected = "before any node is created")]
    fn test_var_order_after_nodes() {
        let bdd = manager(2);
        bdd.mk_var(1);
        bdd.set_var_order(&[2, 1]);
    }

    #[test]
    fn test_exists() {
        let bdd = manager(3);

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        // ∃x2. (x1 ∧ x2) ∨ (x3 ∧ ¬x2) = x1 ∨ x3
        let f = bdd.apply_or(bdd.apply_and(x1, x2), bdd.apply_and(x3, -x2));
        let g = bdd.exists(f, bdd.var_set([2]));
        assert_eq!(g, bdd.apply_or(x1, x3));

        // ∃x1,x3. x1 ∧ ¬x3 = 1
        let f = bdd.apply_and(x1, -x3);
        assert_eq!(bdd.exists(f, bdd.var_set([1, 3])), bdd.one);

        // Quantifying a variable `f` does not depend on changes nothing.
        assert_eq!(bdd.exists(x1, bdd.var_set([2, 3])), x1);
    }
}
