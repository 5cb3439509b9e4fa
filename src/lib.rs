//! # bdd-rel: relations over finite domains, stored as BDDs
//!
//! **`bdd-rel`** stores large n-ary relations as **Binary Decision Diagrams**.
//! It is the storage layer of Datalog-style program analyses: facts such as
//! "method `m` calls method `n`" or "variable `v` may point to allocation site `h`"
//! become tuples of dense integers, and the set of tuples becomes one Boolean
//! function.
//!
//! ## Building blocks
//!
//! - **[`Domain`][crate::domain::Domain]**: a growable bijection between values
//!   (methods, sites, ...) and indices `0..size`.
//! - **[`Signature`][crate::signature::Signature]**: the domain role of every
//!   slot (`M0`, `M1`, `H0`, ...) and how the slots' bits are interleaved.
//! - **[`Relation`][crate::relation::Relation]**: a tuple set with its own
//!   [`Bdd`][crate::bdd::Bdd] manager. Tuples are added, removed, tested,
//!   counted exactly and enumerated lazily.
//! - **[`View`][crate::view::View]**: a snapshot of a relation that can be
//!   restricted to a value or projected.
//!
//! Enumeration walks the diagram path by path ([`paths`]) and expands
//! don't-care bits with a binary counter, so memory stays proportional to one
//! path, never to the number of tuples.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use bdd_rel::domain::Domain;
//! use bdd_rel::relation::Relation;
//! use bdd_rel::signature::Signature;
//!
//! // 1. Number the values
//! let methods = Rc::new(Domain::new("M"));
//! for m in ["init", "main", "helper"] {
//!     methods.get_or_add(m.to_string());
//! }
//!
//! // 2. Describe and open a relation
//! let signature: Signature = "M0,M1:M0xM1".parse().unwrap();
//! let mut calls = Relation::bound("calls", signature, vec![methods.clone(), methods.clone()]);
//! calls.zero();
//!
//! // 3. Add tuples, by value or by index
//! calls.add(&("main".to_string(), "helper".to_string())).unwrap();
//! calls.add_indices(&[0, 1]).unwrap();
//! assert_eq!(calls.size(), 2);
//!
//! // 4. Enumerate
//! let mut edges: Vec<(String, String)> = calls
//!     .values::<(String, String)>()
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! edges.sort();
//! assert_eq!(edges[0], ("init".to_string(), "main".to_string()));
//!
//! // 5. Release
//! calls.close();
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: the manager, with ITE-based operations and quantification.
//! - **[`relation`]** and **[`view`]**: the tuple store.
//! - **[`paths`]**: satisfying-assignment enumeration.
//! - **[`io`]**: text serialization used by `.bdd` files.
//! - **[`dot`]**: Graphviz export for debugging.

pub mod bdd;
pub mod cache;
pub mod config;
pub mod domain;
pub mod dot;
pub mod error;
pub mod io;
pub mod paths;
pub mod reference;
pub mod relation;
pub mod sat;
pub mod signature;
pub mod table;
pub mod tuple;
pub mod utils;
pub mod view;
