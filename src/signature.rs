//! Relation signatures.
//!
//! A [`Signature`] names the domain role of every slot (`M0`, `M1`, `H0`,
//! ...: a kind followed by a numeral) and optionally the order in which the
//! slots' Boolean variables are laid out. In the order string `_` separates
//! groups placed one after another and `x` interleaves the bits of the slots
//! inside a group, so `M0xM1_H0` interleaves `M0` with `M1` and puts `H0`
//! below both.
//!
//! Everything is validated once, by [`Signature::new`].

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SignatureError {
    #[error("signature has no domains")]
    Empty,
    #[error("malformed domain name '{0}': expected a kind followed by a numeral, e.g. 'M0'")]
    MalformedName(String),
    #[error("domain name '{0}' appears more than once")]
    DuplicateName(String),
    #[error("malformed domain order '{order}': {reason}")]
    MalformedOrder { order: String, reason: String },
    #[error("domain order '{order}' mentions '{name}' more than once")]
    DuplicateInOrder { order: String, name: String },
    #[error("domain order '{order}' does not match domains {names:?} (missing {missing:?}, unknown {unknown:?})")]
    OrderMismatch {
        order: String,
        names: Vec<String>,
        missing: Vec<String>,
        unknown: Vec<String>,
    },
}

/// Ordered domain roles of a relation plus its variable interleaving.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signature {
    names: Vec<String>,
    order: Option<String>,
    /// Parsed order: groups of slot indices, top to bottom.
    groups: Vec<Vec<usize>>,
}

/// Split a domain name into its kind and numeral.
fn split_name(name: &str) -> Option<(&str, &str)> {
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (kind, num) = name.split_at(split);
    let valid = !kind.is_empty()
        && kind.starts_with(|c: char| c.is_ascii_alphabetic())
        && kind.chars().all(|c| c.is_ascii_alphanumeric())
        && num.chars().all(|c| c.is_ascii_digit());
    valid.then_some((kind, num))
}

/// Tokenize an order string into groups of names.
///
/// A name ends at the first non-digit after its numeral, which is where the
/// separators `x` and `_` may appear; an `x` inside a kind is not a separator.
fn parse_order(order: &str) -> Result<Vec<Vec<String>>, String> {
    let mut groups = vec![Vec::new()];
    let mut chars = order.chars().peekable();

    loop {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                break;
            }
            if !c.is_ascii_alphabetic() {
                return Err(format!("unexpected '{}'", c));
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            return Err("expected a domain name".to_string());
        }
        let mut digits = false;
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            name.push(c);
            digits = true;
            chars.next();
        }
        if !digits {
            return Err(format!("domain name '{}' has no numeral", name));
        }
        groups.last_mut().expect("at least one group").push(name);

        match chars.next() {
            None => break,
            Some('x') => {}
            Some('_') => groups.push(Vec::new()),
            Some(c) => return Err(format!("unexpected '{}' after a domain name", c)),
        }
    }

    Ok(groups)
}

impl Signature {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>, order: Option<&str>) -> Result<Self, SignatureError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(SignatureError::Empty);
        }

        let mut seen = HashSet::new();
        for name in &names {
            if split_name(name).is_none() {
                return Err(SignatureError::MalformedName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(SignatureError::DuplicateName(name.clone()));
            }
        }

        let groups = match order {
            None => (0..names.len()).map(|i| vec![i]).collect(),
            Some(order) => {
                let parsed = parse_order(order).map_err(|reason| SignatureError::MalformedOrder {
                    order: order.to_string(),
                    reason,
                })?;

                let mut mentioned = HashSet::new();
                let mut unknown = Vec::new();
                let mut groups = Vec::with_capacity(parsed.len());
                for group in parsed {
                    let mut slots = Vec::with_capacity(group.len());
                    for name in group {
                        if !mentioned.insert(name.clone()) {
                            return Err(SignatureError::DuplicateInOrder {
                                order: order.to_string(),
                                name,
                            });
                        }
                        match names.iter().position(|n| *n == name) {
                            Some(slot) => slots.push(slot),
                            None => unknown.push(name),
                        }
                    }
                    groups.push(slots);
                }
                let missing: Vec<String> = names.iter().filter(|n| !mentioned.contains(*n)).cloned().collect();
                if !missing.is_empty() || !unknown.is_empty() {
                    return Err(SignatureError::OrderMismatch {
                        order: order.to_string(),
                        names: names.clone(),
                        missing,
                        unknown,
                    });
                }
                groups
            }
        };

        Ok(Self {
            names,
            order: order.map(str::to_string),
            groups,
        })
    }

    pub fn arity(&self) -> usize {
        self.names.len()
    }

    pub fn domain_names(&self) -> &[String] {
        &self.names
    }

    pub fn domain_order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    /// Kind of the domain at `slot` (its name without the numeral).
    pub fn kind_of(&self, slot: usize) -> &str {
        split_name(&self.names[slot]).expect("validated at construction").0
    }

    /// Distinct kinds in order of first occurrence.
    pub fn domain_kinds(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        (0..self.arity())
            .map(|slot| self.kind_of(slot))
            .filter(|kind| seen.insert(*kind))
            .collect()
    }

    /// Groups of slot indices, top to bottom; slots inside a group are
    /// interleaved. Without an order every slot is its own group.
    pub fn order_groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Parse the compact text form `M0,M1:M0xM1` (order part optional).
    pub fn parse(s: &str) -> Result<Self, SignatureError> {
        let (names, order) = match s.split_once(':') {
            Some((names, order)) => (names, Some(order.trim())),
            None => (s, None),
        };
        let names: Vec<&str> = names.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
        Self::new(names, order)
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names.join(","))?;
        if let Some(order) = &self.order {
            write!(f, ":{}", order)?;
        }
        Ok(())
    }
}
