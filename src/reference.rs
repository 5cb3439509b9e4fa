use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A reference to a BDD node, possibly complemented.
///
/// The absolute value is the node index in the manager's table, the sign is
/// the complement flag. Index 1 is the terminal, so `Ref(1)` is true and
/// `Ref(-1)` is false. Index 0 is never a valid reference.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref(i32);

impl Ref {
    pub const ONE: Ref = Ref(1);
    pub const ZERO: Ref = Ref(-1);

    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// Return the index of the referenced node (without the complement flag).
    pub const fn index(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Same value as an unsigned key, distinct for `f` and `-f`.
    pub(crate) const fn unsigned(self) -> u64 {
        ((self.0.unsigned_abs() as u64) << 1) | (self.0 < 0) as u64
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}
