//! Enumeration of satisfying assignments.
//!
//! Two layers:
//!
//! - [`SatProfiles`] walks the BDD depth-first and yields one *profile* per
//!   path to the true terminal. A profile assigns every level one of
//!   [`Bit::Zero`], [`Bit::One`] or [`Bit::DontCare`]; levels a path skips
//!   over are don't-care.
//! - [`TupleCursor`] expands each profile into concrete assignments, but
//!   only over the *care* levels (the bits of the slots being decoded), by
//!   counting in binary over the don't-care bits among them. Every tuple is
//!   produced exactly once and nothing larger than one path is kept.
//!
//! # Example
//!
//! ```
//! use bdd_rel::bdd::Bdd;
//! use bdd_rel::paths::Bit;
//!
//! let bdd = Bdd::default();
//! bdd.extend_vars(2);
//! let f = bdd.apply_or(bdd.mk_var(1), bdd.mk_var(2));
//!
//! let profiles: Vec<Vec<Bit>> = bdd.sat_profiles(f).collect();
//! assert_eq!(profiles.len(), 2);
//! assert!(profiles.contains(&vec![Bit::One, Bit::DontCare]));
//! assert!(profiles.contains(&vec![Bit::Zero, Bit::One]));
//! ```

use crate::bdd::{Bdd, TERMINAL_LEVEL};
use crate::reference::Ref;
use crate::tuple::{Tuple, INDETERMINATE};

/// Value of one level in a path profile.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Bit {
    Zero,
    One,
    DontCare,
}

impl Bdd {
    /// Returns an iterator over the path profiles of `f`, indexed by level.
    pub fn sat_profiles(&self, f: Ref) -> SatProfiles<'_> {
        SatProfiles::new(self, f)
    }
}

/// Depth-first enumerator of path profiles.
///
/// The current path is kept on two stacks: nodes that were left through
/// their low branch and still owe a visit to their high branch, and nodes
/// whose high branch is being explored. Levels strictly increase along a
/// path, so whichever stack top sits deeper is the most recent node.
pub struct SatProfiles<'a> {
    bdd: &'a Bdd,
    root: Ref,
    started: bool,
    profile: Vec<Bit>,
    pending_high: Vec<Ref>,
    in_high: Vec<Ref>,
}

impl<'a> SatProfiles<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref) -> Self {
        Self {
            bdd,
            root: f,
            started: false,
            profile: vec![Bit::DontCare; bdd.num_vars()],
            pending_high: Vec::new(),
            in_high: Vec::new(),
        }
    }

    fn level_of(&self, node: Ref) -> usize {
        match self.bdd.node_level(node) {
            TERMINAL_LEVEL => self.profile.len(),
            level => level as usize,
        }
    }

    /// Mark levels in `from..level(to)` as don't-care.
    fn skip_to(&mut self, from: usize, to: Ref) {
        let to = self.level_of(to);
        for bit in &mut self.profile[from..to] {
            *bit = Bit::DontCare;
        }
    }

    /// Follow low branches (high when low is false) down to the true leaf.
    ///
    /// `node` must not be false. A non-terminal node of a reduced diagram is
    /// never constant, so whenever its low branch is false its high branch
    /// is not, and the walk always ends at true.
    fn descend(&mut self, mut node: Ref) {
        while !self.bdd.is_terminal(node) {
            let level = self.level_of(node);
            let low = self.bdd.low_node(node);
            if !self.bdd.is_zero(low) {
                self.profile[level] = Bit::Zero;
                self.pending_high.push(node);
                self.skip_to(level + 1, low);
                node = low;
            } else {
                let high = self.bdd.high_node(node);
                self.profile[level] = Bit::One;
                self.in_high.push(node);
                self.skip_to(level + 1, high);
                node = high;
            }
        }
        debug_assert!(self.bdd.is_one(node));
    }

    /// Pop finished nodes and switch the deepest pending node to its high
    /// branch. Returns the node to descend from next.
    fn backtrack(&mut self) -> Option<Ref> {
        while let Some(node) = self.pending_high.pop() {
            let level = self.level_of(node);
            while let Some(&active) = self.in_high.last() {
                if self.level_of(active) < level {
                    break;
                }
                self.in_high.pop();
            }
            let high = self.bdd.high_node(node);
            if self.bdd.is_zero(high) {
                continue;
            }
            self.profile[level] = Bit::One;
            self.in_high.push(node);
            self.skip_to(level + 1, high);
            return Some(high);
        }
        self.in_high.clear();
        None
    }

    /// Advance to the next path and borrow its profile.
    pub fn next_profile(&mut self) -> Option<&[Bit]> {
        if !self.started {
            self.started = true;
            if self.bdd.is_zero(self.root) {
                return None;
            }
            self.skip_to(0, self.root);
            self.descend(self.root);
            return Some(&self.profile);
        }
        let node = self.backtrack()?;
        self.descend(node);
        Some(&self.profile)
    }
}

impl Iterator for SatProfiles<'_> {
    type Item = Vec<Bit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_profile().map(|p| p.to_vec())
    }
}

/// Cursor over the tuples encoded by a function.
///
/// `slots` lists, for each output position, the levels of that slot's bits
/// from most to least significant. Only `care` levels are expanded; a slot
/// with a don't-care bit outside the care set decodes to [`INDETERMINATE`].
pub struct TupleCursor<'a> {
    profiles: SatProfiles<'a>,
    slots: Vec<Vec<usize>>,
    care: Vec<usize>,
    assignment: Vec<Bit>,
    /// Care levels that are don't-care in the current profile; they form
    /// the binary counter.
    free: Vec<usize>,
    loaded: bool,
}

impl<'a> TupleCursor<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref, slots: Vec<Vec<usize>>, care: Vec<usize>) -> Self {
        Self {
            profiles: SatProfiles::new(bdd, f),
            slots,
            care,
            assignment: Vec::new(),
            free: Vec::new(),
            loaded: false,
        }
    }

    /// Care set equal to every bit of every output slot.
    pub fn over_slots(bdd: &'a Bdd, f: Ref, slots: Vec<Vec<usize>>) -> Self {
        let care = slots.iter().flatten().copied().collect();
        Self::new(bdd, f, slots, care)
    }

    fn load_next_profile(&mut self) -> bool {
        let Some(profile) = self.profiles.next_profile() else {
            return false;
        };
        self.assignment.clear();
        self.assignment.extend_from_slice(profile);
        self.free.clear();
        for &level in &self.care {
            if self.assignment[level] == Bit::DontCare {
                self.assignment[level] = Bit::Zero;
                self.free.push(level);
            }
        }
        true
    }

    /// Binary increment over the free levels; false on overflow.
    fn increment(&mut self) -> bool {
        for &level in self.free.iter().rev() {
            if self.assignment[level] == Bit::Zero {
                self.assignment[level] = Bit::One;
                return true;
            }
            self.assignment[level] = Bit::Zero;
        }
        false
    }

    fn decode(&self) -> Tuple {
        let indices = self
            .slots
            .iter()
            .map(|levels| {
                let mut index: i64 = 0;
                for &level in levels {
                    index <<= 1;
                    match self.assignment[level] {
                        Bit::Zero => {}
                        Bit::One => index |= 1,
                        Bit::DontCare => return INDETERMINATE,
                    }
                }
                index
            })
            .collect();
        Tuple::new(indices)
    }
}

impl Iterator for TupleCursor<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.loaded {
            if !self.load_next_profile() {
                return None;
            }
            self.loaded = true;
        }
        let tuple = self.decode();
        if !self.increment() {
            self.loaded = false;
        }
        Some(tuple)
    }
}
