//! Tuples of domain indices, and typed value tuples on top of them.
//!
//! Relations store and enumerate [`Tuple`]s: one dense domain index per
//! visible slot. [`ValueTuple`] is implemented for Rust tuples of arity 1 to
//! 6 and translates between values and indices through the relation's
//! domains, so `rel.add(("main".to_string(), "helper".to_string()))` and
//! `rel.add_indices(&[1, 2])` end up in the same place.

use std::any::type_name;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::rc::Rc;

use crate::domain::{AnyDomain, Domain};
use crate::error::RelationError;

/// Decoded slot whose bits were not all fixed by the enumerated assignment.
pub const INDETERMINATE: i64 = -1;

/// A tuple of domain indices.
///
/// A position may hold [`INDETERMINATE`] when it was decoded from
/// don't-care bits outside the enumeration's care set.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Tuple(Vec<i64>);

impl Tuple {
    pub fn new(indices: Vec<i64>) -> Self {
        Self(indices)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Index at `slot`, or `None` if it is indeterminate.
    pub fn get(&self, slot: usize) -> Option<usize> {
        let raw = self.0[slot];
        (raw >= 0).then_some(raw as usize)
    }

    /// Raw value at `slot`, [`INDETERMINATE`] included.
    pub fn raw(&self, slot: usize) -> i64 {
        self.0[slot]
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn is_determinate(&self) -> bool {
        self.0.iter().all(|&i| i >= 0)
    }

    /// All indices, if none is indeterminate.
    pub fn indices(&self) -> Option<Vec<usize>> {
        self.0.iter().map(|&i| (i >= 0).then_some(i as usize)).collect()
    }
}

impl From<Vec<usize>> for Tuple {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices.into_iter().map(|i| i as i64).collect())
    }
}

impl From<&[usize]> for Tuple {
    fn from(indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| i as i64).collect())
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", x)?;
        }
        write!(f, ")")
    }
}

fn typed_domain<'d, T>(relation: &str, domains: &'d [Rc<dyn AnyDomain>], slot: usize) -> Result<&'d Domain<T>, RelationError>
where
    T: Eq + Hash + Clone + 'static,
{
    let domain = &domains[slot];
    domain
        .as_any()
        .downcast_ref::<Domain<T>>()
        .ok_or_else(|| RelationError::TypeMismatch {
            relation: relation.to_string(),
            domain: domain.name().to_string(),
            slot,
            expected: type_name::<T>(),
        })
}

/// Index of `value` in the domain at `slot`. Domains are never extended.
pub fn resolve_value<T>(relation: &str, domains: &[Rc<dyn AnyDomain>], slot: usize, value: &T) -> Result<usize, RelationError>
where
    T: Eq + Hash + Clone + Debug + 'static,
{
    let domain = typed_domain::<T>(relation, domains, slot)?;
    domain.index_of(value).ok_or_else(|| RelationError::ValueNotInDomain {
        relation: relation.to_string(),
        domain: domain.name().to_string(),
        slot,
        value: format!("{:?}", value),
    })
}

/// Check that `index` is inside the domain at `slot`.
pub fn check_index(relation: &str, domains: &[Rc<dyn AnyDomain>], slot: usize, index: usize) -> Result<usize, RelationError> {
    let domain = &domains[slot];
    if index < domain.size() {
        Ok(index)
    } else {
        Err(RelationError::IndexOutOfRange {
            relation: relation.to_string(),
            domain: domain.name().to_string(),
            slot,
            index,
            size: domain.size(),
        })
    }
}

fn value_at<T>(relation: &str, domains: &[Rc<dyn AnyDomain>], slot: usize, index: usize) -> Result<T, RelationError>
where
    T: Eq + Hash + Clone + 'static,
{
    let domain = typed_domain::<T>(relation, domains, slot)?;
    domain.try_get(index).ok_or_else(|| RelationError::IndexOutOfRange {
        relation: relation.to_string(),
        domain: domain.name().to_string(),
        slot,
        index,
        size: domain.len(),
    })
}

/// A Rust tuple of domain values, one per slot.
pub trait ValueTuple: Sized {
    const ARITY: usize;

    /// Translate values to indices through `domains`.
    fn resolve(&self, relation: &str, domains: &[Rc<dyn AnyDomain>]) -> Result<Vec<usize>, RelationError>;

    /// Translate indices back to values.
    fn decode(relation: &str, domains: &[Rc<dyn AnyDomain>], indices: &[usize]) -> Result<Self, RelationError>;
}

macro_rules! impl_value_tuple {
    ($n:expr; $($T:ident $idx:tt),+) => {
        impl<$($T),+> ValueTuple for ($($T,)+)
        where
            $($T: Eq + Hash + Clone + Debug + 'static),+
        {
            const ARITY: usize = $n;

            fn resolve(&self, relation: &str, domains: &[Rc<dyn AnyDomain>]) -> Result<Vec<usize>, RelationError> {
                Ok(vec![$(resolve_value::<$T>(relation, domains, $idx, &self.$idx)?),+])
            }

            fn decode(relation: &str, domains: &[Rc<dyn AnyDomain>], indices: &[usize]) -> Result<Self, RelationError> {
                Ok(($(value_at::<$T>(relation, domains, $idx, indices[$idx])?,)+))
            }
        }
    };
}

impl_value_tuple!(1; A 0);
impl_value_tuple!(2; A 0, B 1);
impl_value_tuple!(3; A 0, B 1, C 2);
impl_value_tuple!(4; A 0, B 1, C 2, D 3);
impl_value_tuple!(5; A 0, B 1, C 2, D 3, E 4);
impl_value_tuple!(6; A 0, B 1, C 2, D 3, E 4, F 5);
