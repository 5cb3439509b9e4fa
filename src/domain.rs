//! Domains: growable bijections between program values and dense indices.
//!
//! A [`Domain`] numbers the values of one kind (methods, allocation sites,
//! ...) in insertion order. Relations encode tuples of those numbers, so a
//! domain only ever grows: an index, once handed out, keeps naming the same
//! value for the lifetime of the domain.
//!
//! # Examples
//!
//! ```
//! use bdd_rel::domain::Domain;
//!
//! let methods = Domain::new("M");
//! assert_eq!(methods.get_or_add("init".to_string()), 0);
//! assert_eq!(methods.get_or_add("main".to_string()), 1);
//! assert_eq!(methods.get_or_add("init".to_string()), 0);
//! assert_eq!(methods.index_of(&"main".to_string()), Some(1));
//! assert_eq!(methods.get(1), "main");
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::fs;
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("cannot access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("domain {domain}: indices {first} and {second} share the canonical string '{string}'")]
    DuplicateCanonical {
        domain: String,
        first: usize,
        second: usize,
        string: String,
    },
    #[error("malformed domain file '{}': {message}", .path.display())]
    Format { path: PathBuf, message: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DomainError + '_ {
    move |source| DomainError::Io {
        path: path.to_path_buf(),
        source,
    }
}

struct Values<T> {
    list: Vec<T>,
    lookup: HashMap<T, usize>,
}

/// Growable, order-preserving bijection between values and `0..len()`.
///
/// Interior mutability lets the owner keep adding values through a shared
/// `Rc<Domain<T>>` while relations hold onto the same domain.
pub struct Domain<T> {
    name: String,
    values: RefCell<Values<T>>,
    canonicalize: Box<dyn Fn(&T) -> String>,
}

impl<T> Domain<T>
where
    T: Eq + Hash + Clone + Display + 'static,
{
    /// Create an empty domain whose map file uses `Display` for each value.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_canonicalizer(name, |v: &T| v.to_string())
    }
}

impl<T> Domain<T>
where
    T: Eq + Hash + Clone,
{
    /// Create an empty domain with a custom canonical string form.
    ///
    /// Distinct values must map to distinct strings; [`Domain::save`]
    /// refuses to write a map that breaks this.
    pub fn with_canonicalizer(name: impl Into<String>, canonicalize: impl Fn(&T) -> String + 'static) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Domain name must not be empty");
        Self {
            name,
            values: RefCell::new(Values {
                list: Vec::new(),
                lookup: HashMap::new(),
            }),
            canonicalize: Box::new(canonicalize),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.borrow().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of `value`, appending it at `len()` if it is new.
    pub fn get_or_add(&self, value: T) -> usize {
        let mut values = self.values.borrow_mut();
        if let Some(&index) = values.lookup.get(&value) {
            return index;
        }
        let index = values.list.len();
        values.list.push(value.clone());
        values.lookup.insert(value, index);
        index
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.values.borrow().lookup.get(value).copied()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn get(&self, index: usize) -> T {
        match self.try_get(index) {
            Some(value) => value,
            None => panic!(
                "Index {} is out of range for domain {} of size {}",
                index,
                self.name,
                self.len()
            ),
        }
    }

    pub fn try_get(&self, index: usize) -> Option<T> {
        self.values.borrow().list.get(index).cloned()
    }

    /// Snapshot of all values in index order.
    pub fn values(&self) -> Vec<T> {
        self.values.borrow().list.clone()
    }

    pub fn to_unique_string(&self, value: &T) -> String {
        (self.canonicalize)(value)
    }

    pub fn dom_file_name(&self) -> String {
        format!("{}.dom", self.name)
    }

    pub fn map_file_name(&self) -> String {
        format!("{}.map", self.name)
    }

    /// Write `<name>.dom` and, if `write_map`, `<name>.map` into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>, write_map: bool) -> Result<(), DomainError> {
        let dir = dir.as_ref();
        let values = self.values.borrow();

        let dom_path = dir.join(self.dom_file_name());
        fs::write(
            &dom_path,
            format!("{} {} {}\n", self.name, values.list.len(), self.map_file_name()),
        )
        .map_err(io_err(&dom_path))?;

        if write_map {
            let mut seen: HashMap<String, usize> = HashMap::with_capacity(values.list.len());
            let map_path = dir.join(self.map_file_name());
            let file = fs::File::create(&map_path).map_err(io_err(&map_path))?;
            let mut out = BufWriter::new(file);
            for (index, value) in values.list.iter().enumerate() {
                let s = self.to_unique_string(value);
                if let Some(&first) = seen.get(&s) {
                    return Err(DomainError::DuplicateCanonical {
                        domain: self.name.clone(),
                        first,
                        second: index,
                        string: s,
                    });
                }
                writeln!(out, "{}", s).map_err(io_err(&map_path))?;
                seen.insert(s, index);
            }
            out.flush().map_err(io_err(&map_path))?;
        }

        info!("Saved domain {} ({} values) to {}", self.name, values.list.len(), dir.display());
        Ok(())
    }
}

impl Domain<String> {
    /// Read back a domain saved with its map, values taken verbatim.
    pub fn load_map(dir: impl AsRef<Path>, name: &str) -> Result<Self, DomainError> {
        let dir = dir.as_ref();
        let dom_path = dir.join(format!("{}.dom", name));
        let header = fs::read_to_string(&dom_path).map_err(io_err(&dom_path))?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        let format_err = |message: String| DomainError::Format {
            path: dom_path.clone(),
            message,
        };
        if fields.len() != 3 || fields[0] != name {
            return Err(format_err(format!("expected '{} <size> <map>', got '{}'", name, header.trim())));
        }
        let size: usize = fields[1]
            .parse()
            .map_err(|_| format_err(format!("bad size '{}'", fields[1])))?;

        let map_path = dir.join(fields[2]);
        let contents = fs::read_to_string(&map_path).map_err(io_err(&map_path))?;
        let domain = Domain::new(name);
        let mut seen = HashSet::new();
        for line in contents.lines() {
            if !seen.insert(line) {
                return Err(DomainError::Format {
                    path: map_path,
                    message: format!("duplicate value '{}'", line),
                });
            }
            domain.get_or_add(line.to_string());
        }
        if domain.len() != size {
            return Err(DomainError::Format {
                path: map_path,
                message: format!("expected {} values, found {}", size, domain.len()),
            });
        }
        debug!("Loaded domain {} with {} values", name, size);
        Ok(domain)
    }
}

impl<T> Debug for Domain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("size", &self.values.borrow().list.len())
            .finish()
    }
}

/// Type-erased view of a domain, as held by relations.
pub trait AnyDomain {
    fn name(&self) -> &str;
    fn size(&self) -> usize;
    /// Canonical string of the value at `index`.
    fn unique_string(&self, index: usize) -> String;
    fn as_any(&self) -> &dyn Any;
}

impl<T> AnyDomain for Domain<T>
where
    T: Eq + Hash + Clone + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn unique_string(&self, index: usize) -> String {
        let values = self.values.borrow();
        match values.list.get(index) {
            Some(value) => self.to_unique_string(value),
            None => panic!(
                "Index {} is out of range for domain {} of size {}",
                index,
                self.name,
                values.list.len()
            ),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_indices_are_dense_and_stable() {
        let dom = Domain::new("M");
        for (i, v) in ["init", "main", "helper"].iter().enumerate() {
            assert_eq!(dom.get_or_add(v.to_string()), i);
        }
        assert_eq!(dom.get_or_add("main".to_string()), 1);
        assert_eq!(dom.len(), 3);
        for v in dom.values() {
            assert_eq!(dom.get(dom.index_of(&v).unwrap()), v);
        }
        assert_eq!(dom.index_of(&"absent".to_string()), None);
    }

    #[test]
    #[should_panic(expected = "Index 5 is out of range for domain M of size 3")]
    fn test_get_out_of_range() {
        let dom = Domain::new("M");
        for v in ["a", "b", "c"] {
            dom.get_or_add(v.to_string());
        }
        dom.get(5);
    }

    #[test]
    fn test_save_map() {
        let dir = tempfile::tempdir().unwrap();
        let dom = Domain::new("M");
        for v in ["init", "main", "helper"] {
            dom.get_or_add(v.to_string());
        }
        dom.save(dir.path(), true).unwrap();

        let header = fs::read_to_string(dir.path().join("M.dom")).unwrap();
        assert_eq!(header, "M 3 M.map\n");
        let map = fs::read_to_string(dir.path().join("M.map")).unwrap();
        assert_eq!(map.lines().collect::<Vec<_>>(), ["init", "main", "helper"]);
    }

    #[test]
    fn test_save_without_map() {
        let dir = tempfile::tempdir().unwrap();
        let dom: Domain<u32> = Domain::new("I");
        dom.get_or_add(7);
        dom.save(dir.path(), false).unwrap();
        assert!(dir.path().join("I.dom").exists());
        assert!(!dir.path().join("I.map").exists());
    }

    #[test]
    fn test_custom_canonicalizer() {
        let dom = Domain::with_canonicalizer("H", |v: &(u32, u32)| format!("{}@{}", v.0, v.1));
        dom.get_or_add((1, 10));
        assert_eq!(dom.unique_string(0), "1@10");
    }

    #[test]
    fn test_save_rejects_colliding_canonical_strings() {
        let dir = tempfile::tempdir().unwrap();
        let dom = Domain::with_canonicalizer("V", |_: &u32| "same".to_string());
        dom.get_or_add(1);
        dom.get_or_add(2);
        let err = dom.save(dir.path(), true).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateCanonical { first: 0, second: 1, .. }));
    }

    #[test]
    fn test_load_map_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dom = Domain::new("T");
        for v in ["java.lang.Object", "java.lang.String"] {
            dom.get_or_add(v.to_string());
        }
        dom.save(dir.path(), true).unwrap();

        let loaded = Domain::<String>::load_map(dir.path(), "T").unwrap();
        assert_eq!(loaded.values(), dom.values());
    }

    #[test]
    fn test_load_map_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Domain::<String>::load_map(dir.path(), "Z").unwrap_err();
        assert!(matches!(err, DomainError::Io { .. }));
    }
}
