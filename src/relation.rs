//! Relations: tuple sets stored as the characteristic function of a BDD.
//!
//! A [`Relation`] goes through a fixed lifecycle:
//!
//! ```text
//! Unbound --set_name/set_signature/set_domains--> Bound
//! Bound   --one/zero/load--> Open
//! Open    --save/print/close--> Closed
//! ```
//!
//! Opening allocates a manager owned by this relation alone, gives every slot
//! a contiguous block of variables wide enough for its domain, and lays the
//! blocks out in levels according to the signature's interleaving order.
//! A tuple is the conjunction of "slot `i` holds index `k`" constraints over
//! those blocks, most significant bit first.
//!
//! Calling an operation in the wrong state is a bug in the caller and panics.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use bdd_rel::domain::Domain;
//! use bdd_rel::relation::Relation;
//! use bdd_rel::signature::Signature;
//!
//! let methods = Rc::new(Domain::new("M"));
//! for m in ["init", "main", "helper"] {
//!     methods.get_or_add(m.to_string());
//! }
//!
//! let mut calls = Relation::bound(
//!     "calls",
//!     Signature::new(["M0", "M1"], Some("M0xM1")).unwrap(),
//!     vec![methods.clone(), methods.clone()],
//! );
//! calls.zero();
//!
//! let edge = ("main".to_string(), "helper".to_string());
//! calls.add(&edge).unwrap();
//! assert!(calls.contains(&edge).unwrap());
//! assert!(!calls.contains(&("helper".to_string(), "main".to_string())).unwrap());
//! assert_eq!(calls.size(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::bdd::Bdd;
use crate::config::BddConfig;
use crate::domain::AnyDomain;
use crate::dot::DotConfig;
use crate::error::RelationError;
use crate::paths::TupleCursor;
use crate::reference::Ref;
use crate::signature::Signature;
use crate::tuple::{check_index, Tuple, ValueTuple};
use crate::utils::bits_for;

/// Lifecycle state of a [`Relation`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Name, signature or domains are still missing.
    Unbound,
    /// Fully described but not opened yet.
    Bound,
    /// Holds a manager and a function; tuples can be read and written.
    Open,
    /// Released; never reopened.
    Closed,
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Unbound => "unbound",
            State::Bound => "bound",
            State::Open => "open",
            State::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Placement of the slots' variables in a relation manager.
#[derive(Debug)]
pub(crate) struct Layout {
    /// Per slot, its variables from most to least significant bit.
    pub(crate) slot_vars: Vec<Vec<u32>>,
    /// Per slot, the positive cube of its variables.
    pub(crate) slot_sets: Vec<Ref>,
    /// Positive cube of every slot variable.
    pub(crate) all_vars: Ref,
    /// Domain sizes at open time.
    pub(crate) sizes: Vec<usize>,
}

impl Layout {
    fn new(bdd: &Bdd, signature: &Signature, domains: &[Rc<dyn AnyDomain>], reverse: bool) -> Self {
        let sizes: Vec<usize> = domains.iter().map(|d| d.size()).collect();
        let widths: Vec<usize> = sizes.iter().map(|&s| bits_for(s)).collect();

        let slot_vars: Vec<Vec<u32>> = widths
            .iter()
            .map(|&w| {
                let first = bdd.extend_vars(w);
                (first..first + w as u32).collect()
            })
            .collect();

        // Groups go top to bottom; inside a group the slots' bits are dealt
        // round-robin, narrower slots aligned at the least significant bit.
        let mut order = Vec::with_capacity(bdd.num_vars());
        for group in signature.order_groups() {
            let width = group.iter().map(|&slot| widths[slot]).max().unwrap_or(0);
            for step in 0..width {
                for &slot in group {
                    let offset = width - widths[slot];
                    if step < offset {
                        continue;
                    }
                    let vars = &slot_vars[slot];
                    let bit = step - offset;
                    order.push(if reverse { vars[vars.len() - 1 - bit] } else { vars[bit] });
                }
            }
        }
        bdd.set_var_order(&order);

        let slot_sets = slot_vars.iter().map(|vars| bdd.var_set(vars.iter().copied())).collect();
        let all_vars = bdd.var_set(slot_vars.iter().flatten().copied());

        Self {
            slot_vars,
            slot_sets,
            all_vars,
            sizes,
        }
    }

    pub(crate) fn arity(&self) -> usize {
        self.slot_vars.len()
    }

    pub(crate) fn width(&self, slot: usize) -> usize {
        self.slot_vars[slot].len()
    }

    /// Levels of the slot's bits, most significant first.
    pub(crate) fn slot_levels(&self, bdd: &Bdd, slot: usize) -> Vec<usize> {
        self.slot_vars[slot].iter().map(|&v| bdd.level(v) as usize).collect()
    }

    /// Literals fixing `slot` to `index`.
    pub(crate) fn literals(&self, slot: usize, index: usize) -> impl Iterator<Item = i32> + '_ {
        let width = self.width(slot);
        self.slot_vars[slot].iter().enumerate().map(move |(i, &v)| {
            if (index >> (width - 1 - i)) & 1 == 1 {
                v as i32
            } else {
                -(v as i32)
            }
        })
    }

    /// Cube of a full tuple.
    fn tuple_cube(&self, bdd: &Bdd, indices: &[usize]) -> Ref {
        bdd.cube(indices.iter().enumerate().flat_map(|(slot, &index)| self.literals(slot, index)))
    }

    /// Indices `0..size` of `slot`, built from the least significant bit up.
    /// Tuples whose every slot holds an index of its domain.
    fn in_domains(&self, bdd: &Bdd) -> Ref {
        bdd.apply_and_many((0..self.arity()).map(|slot| self.in_range(bdd, slot)))
    }

    fn in_range(&self, bdd: &Bdd, slot: usize) -> Ref {
        let size = self.sizes[slot];
        let width = self.width(slot);
        if size >= 1 << width {
            return bdd.one;
        }
        let mut below = bdd.zero;
        for (i, &v) in self.slot_vars[slot].iter().enumerate().rev() {
            let x = bdd.mk_var(v);
            below = if (size >> (width - 1 - i)) & 1 == 1 {
                bdd.apply_ite(x, below, bdd.one)
            } else {
                bdd.apply_ite(x, bdd.zero, below)
            };
        }
        below
    }
}

pub(crate) struct Opened {
    pub(crate) bdd: Bdd,
    pub(crate) f: Ref,
    pub(crate) layout: Layout,
}

/// A named, typed set of tuples.
pub struct Relation {
    name: String,
    signature: Option<Signature>,
    domains: Option<Vec<Rc<dyn AnyDomain>>>,
    config: Option<BddConfig>,
    opened: Option<Opened>,
    closed: bool,
}

impl Default for Relation {
    fn default() -> Self {
        Self::new()
    }
}

// Binding
impl Relation {
    /// An unbound relation. Its manager is configured from the environment
    /// when it is opened.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            signature: None,
            domains: None,
            config: None,
            opened: None,
            closed: false,
        }
    }

    /// An unbound relation with an explicit manager configuration.
    pub fn with_config(config: BddConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::new()
        }
    }

    /// Shorthand for `new` followed by the three setters.
    pub fn bound(name: impl Into<String>, signature: Signature, domains: Vec<Rc<dyn AnyDomain>>) -> Self {
        let mut relation = Self::new();
        relation.set_name(name);
        relation.set_signature(signature);
        relation.set_domains(domains);
        relation
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        assert!(self.name.is_empty(), "Relation name is already set to {}", self.name);
        assert!(!name.is_empty(), "Relation name must not be empty");
        self.name = name;
    }

    pub fn set_signature(&mut self, signature: Signature) {
        assert!(!self.name.is_empty(), "Relation name must be set before its signature");
        assert!(
            self.signature.is_none(),
            "Signature of relation {} is already set",
            self.name
        );
        self.signature = Some(signature);
    }

    /// Attach one domain per slot; domain `i` must be named after the kind
    /// of slot `i`.
    pub fn set_domains(&mut self, domains: Vec<Rc<dyn AnyDomain>>) {
        let signature = match &self.signature {
            Some(signature) => signature,
            None => panic!("Signature of relation {} must be set before its domains", self.name),
        };
        assert!(self.domains.is_none(), "Domains of relation {} are already set", self.name);
        assert_eq!(
            domains.len(),
            signature.arity(),
            "Relation {} has {} slots but got {} domains",
            self.name,
            signature.arity(),
            domains.len()
        );
        for (slot, domain) in domains.iter().enumerate() {
            assert_eq!(
                domain.name(),
                signature.kind_of(slot),
                "Relation {}: domain {} does not match slot {} ({})",
                self.name,
                domain.name(),
                slot,
                signature.domain_names()[slot]
            );
        }
        self.domains = Some(domains);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Slot domains, empty until bound.
    pub fn domains(&self) -> &[Rc<dyn AnyDomain>] {
        self.domains.as_deref().unwrap_or(&[])
    }

    pub fn state(&self) -> State {
        if self.closed {
            State::Closed
        } else if self.opened.is_some() {
            State::Open
        } else if self.domains.is_some() {
            State::Bound
        } else {
            State::Unbound
        }
    }

    pub(crate) fn opened(&self) -> &Opened {
        match &self.opened {
            Some(opened) => opened,
            None => panic!("Relation {} is not open (state: {})", self.name, self.state()),
        }
    }

    fn opened_mut(&mut self) -> &mut Opened {
        let state = self.state();
        match &mut self.opened {
            Some(opened) => opened,
            None => panic!("Relation {} is not open (state: {})", self.name, state),
        }
    }

    fn bound_parts(&self) -> (&Signature, &[Rc<dyn AnyDomain>]) {
        match (self.state(), &self.signature, &self.domains) {
            (State::Bound, Some(signature), Some(domains)) => (signature, domains.as_slice()),
            (state, _, _) => panic!("Relation {} cannot be opened (state: {})", self.name, state),
        }
    }
}

// Opening and closing
impl Relation {
    fn new_manager(&self) -> (Bdd, Layout) {
        let (signature, domains) = self.bound_parts();
        let config = self.config.clone().unwrap_or_else(BddConfig::from_env);
        let bdd = Bdd::with_config(&config);
        let layout = Layout::new(&bdd, signature, domains, config.reverse_order);
        (bdd, layout)
    }

    fn finish_open(&mut self, bdd: Bdd, f: Ref, layout: Layout) {
        info!(
            "Opened relation {} with {} variables over domains {:?}",
            self.name,
            bdd.num_vars(),
            layout.sizes
        );
        self.opened = Some(Opened { bdd, f, layout });
    }

    /// Open as the full product of the slot domains.
    pub fn one(&mut self) {
        let (bdd, layout) = self.new_manager();
        let f = layout.in_domains(&bdd);
        self.finish_open(bdd, f, layout);
    }

    /// Open as the empty relation.
    pub fn zero(&mut self) {
        let (bdd, layout) = self.new_manager();
        let f = bdd.zero;
        self.finish_open(bdd, f, layout);
    }

    pub fn bdd_file_name(&self) -> String {
        format!("{}.bdd", self.name)
    }

    pub fn txt_file_name(&self) -> String {
        format!("{}.txt", self.name)
    }

    fn io_err(&self, path: &Path) -> impl FnOnce(io::Error) -> RelationError + '_ {
        let path = path.to_path_buf();
        move |source| RelationError::Io {
            relation: self.name.clone(),
            path,
            source,
        }
    }

    /// Open from `<dir>/<name>.bdd`.
    ///
    /// Variables recorded in the file are mapped onto this manager's slot
    /// variables, aligned at the least significant bit. A slot written with
    /// fewer bits than it now has gets its extra high bits fixed to zero.
    pub fn load(&mut self, dir: impl AsRef<Path>) -> Result<(), RelationError> {
        let path = dir.as_ref().join(self.bdd_file_name());
        let (bdd, layout) = self.new_manager();

        let file = File::open(&path).map_err(self.io_err(&path))?;
        let mut input = BufReader::new(file);
        let header = read_header(&mut input, &layout, self.signature().map(Signature::domain_names).unwrap_or(&[]))
            .map_err(|e| match e {
                HeaderError::Io(source) => RelationError::Io {
                    relation: self.name.clone(),
                    path: path.clone(),
                    source,
                },
                HeaderError::Format(message) => RelationError::Format {
                    relation: self.name.clone(),
                    path: path.clone(),
                    message,
                },
            })?;

        let mut remap = HashMap::new();
        let mut fixed = Vec::new();
        for (slot, file_vars) in header.iter().enumerate() {
            let vars = &layout.slot_vars[slot];
            let extra = vars.len() - file_vars.len();
            if extra > 0 {
                warn!(
                    "Relation {}: slot {} was saved with {} bits, widening to {}",
                    self.name,
                    slot,
                    file_vars.len(),
                    vars.len()
                );
            }
            fixed.extend(vars[..extra].iter().map(|&v| -(v as i32)));
            for (i, &v) in file_vars.iter().enumerate() {
                remap.insert(v, vars[extra + i]);
            }
        }

        let body = bdd
            .read_body(&mut input, |v| remap.get(&v).copied())
            .map_err(|source| RelationError::Body {
                relation: self.name.clone(),
                path: path.clone(),
                source,
            })?;
        let f = bdd.apply_and(body, bdd.cube(fixed));
        // Domains may have shrunk since the file was written.
        let range = layout.in_domains(&bdd);
        let in_range = bdd.apply_and(f, range);
        if in_range != f {
            warn!(
                "Relation {}: dropping tuples of {} outside the current domains",
                self.name,
                path.display()
            );
        }
        let f = in_range;

        info!("Loaded relation {} from {}", self.name, path.display());
        self.finish_open(bdd, f, layout);
        Ok(())
    }

    /// Persist to `<dir>/<name>.bdd`, keeping the relation open.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<(), RelationError> {
        let opened = self.opened();
        let path = dir.as_ref().join(self.bdd_file_name());
        let names = self.signature().map(Signature::domain_names).unwrap_or(&[]);

        let file = File::create(&path).map_err(self.io_err(&path))?;
        let mut out = BufWriter::new(file);
        let write = |out: &mut BufWriter<File>| -> io::Result<()> {
            write!(out, "#")?;
            for (slot, name) in names.iter().enumerate() {
                write!(out, " {}:{}", name, opened.layout.width(slot))?;
            }
            writeln!(out)?;
            for vars in &opened.layout.slot_vars {
                write!(out, "#")?;
                for v in vars {
                    write!(out, " {}", v)?;
                }
                writeln!(out)?;
            }
            opened.bdd.write_body(opened.f, out)?;
            out.flush()
        };
        write(&mut out).map_err(self.io_err(&path))?;

        info!("Saved relation {} ({} tuples) to {}", self.name, self.size(), path.display());
        Ok(())
    }

    /// Persist to `<dir>/<name>.bdd` and close.
    pub fn save(&mut self, dir: impl AsRef<Path>) -> Result<(), RelationError> {
        self.write_to(dir)?;
        self.close();
        Ok(())
    }

    /// Write every tuple to `<dir>/<name>.txt` as `<v0,v1,...>` using the
    /// domains' canonical strings, then close.
    pub fn print(&mut self, dir: impl AsRef<Path>) -> Result<(), RelationError> {
        let path = dir.as_ref().join(self.txt_file_name());
        let file = File::create(&path).map_err(self.io_err(&path))?;
        let mut out = BufWriter::new(file);
        let domains = self.domains();
        let write = |out: &mut BufWriter<File>| -> io::Result<()> {
            for tuple in self.tuples() {
                let fields: Vec<String> = tuple
                    .as_slice()
                    .iter()
                    .enumerate()
                    .map(|(slot, &index)| domains[slot].unique_string(index as usize))
                    .collect();
                writeln!(out, "<{}>", fields.join(","))?;
            }
            out.flush()
        };
        write(&mut out).map_err(self.io_err(&path))?;

        info!("Printed relation {} to {}", self.name, path.display());
        self.close();
        Ok(())
    }

    /// Release the manager without persisting.
    pub fn close(&mut self) {
        let opened = self.opened.take();
        match opened {
            Some(opened) => {
                let cache = opened.bdd.cache();
                debug!(
                    "Closing relation {} ({} nodes, cache hits: {}, misses: {})",
                    self.name,
                    opened.bdd.num_nodes(),
                    cache.hits(),
                    cache.misses()
                );
                self.closed = true;
            }
            None => panic!("Relation {} cannot be closed (state: {})", self.name, self.state()),
        }
    }
}

enum HeaderError {
    Io(io::Error),
    Format(String),
}

impl From<io::Error> for HeaderError {
    fn from(e: io::Error) -> Self {
        HeaderError::Io(e)
    }
}

/// Read the `.bdd` header and return, per slot of `layout`, the variables
/// the file used for it (most significant first).
fn read_header(input: &mut impl BufRead, layout: &Layout, names: &[String]) -> Result<Vec<Vec<u32>>, HeaderError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let rest = line
        .trim_end()
        .strip_prefix('#')
        .ok_or_else(|| HeaderError::Format(format!("expected '#' header, got '{}'", line.trim_end())))?;

    let mut file_slots = Vec::new();
    for field in rest.split_whitespace() {
        let (name, width) = field
            .split_once(':')
            .ok_or_else(|| HeaderError::Format(format!("expected '<domain>:<bits>', got '{}'", field)))?;
        let slot = names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| HeaderError::Format(format!("unknown domain '{}'", name)))?;
        let width: usize = width
            .parse()
            .map_err(|_| HeaderError::Format(format!("bad bit width in '{}'", field)))?;
        if file_slots.iter().any(|&(s, _)| s == slot) {
            return Err(HeaderError::Format(format!("domain '{}' appears twice", name)));
        }
        if width > layout.width(slot) {
            return Err(HeaderError::Format(format!(
                "domain '{}' was saved with {} bits but only {} are available",
                name,
                width,
                layout.width(slot)
            )));
        }
        file_slots.push((slot, width));
    }
    if file_slots.len() != layout.arity() {
        return Err(HeaderError::Format(format!(
            "expected {} domains, found {}",
            layout.arity(),
            file_slots.len()
        )));
    }

    let mut vars = vec![Vec::new(); layout.arity()];
    let mut seen = HashSet::new();
    for &(slot, width) in &file_slots {
        line.clear();
        input.read_line(&mut line)?;
        let rest = line
            .trim_end()
            .strip_prefix('#')
            .ok_or_else(|| HeaderError::Format(format!("expected variables of '{}'", names[slot])))?;
        let slot_vars: Vec<u32> = rest
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| HeaderError::Format(format!("bad variable of '{}': {}", names[slot], e)))?;
        if slot_vars.len() != width {
            return Err(HeaderError::Format(format!(
                "domain '{}' lists {} variables but has {} bits",
                names[slot],
                slot_vars.len(),
                width
            )));
        }
        if let Some(v) = slot_vars.iter().find(|&&v| !seen.insert(v)) {
            return Err(HeaderError::Format(format!("variable {} of '{}' is listed twice", v, names[slot])));
        }
        vars[slot] = slot_vars;
    }
    Ok(vars)
}

// Tuples
impl Relation {
    fn check_arity(&self, found: usize) -> Result<(), RelationError> {
        let expected = self.opened().layout.arity();
        if found == expected {
            Ok(())
        } else {
            Err(RelationError::ArityMismatch {
                relation: self.name.clone(),
                expected,
                found,
            })
        }
    }

    /// Check `index` against the domain and against the slot's width, which
    /// was fixed when the relation was opened.
    pub(crate) fn check_slot_index(&self, slot: usize, index: usize) -> Result<usize, RelationError> {
        let index = check_index(&self.name, self.domains(), slot, index)?;
        let width = self.opened().layout.width(slot);
        if index >> width == 0 {
            Ok(index)
        } else {
            Err(RelationError::IndexOutOfRange {
                relation: self.name.clone(),
                domain: self.domains()[slot].name().to_string(),
                slot,
                index,
                size: 1 << width,
            })
        }
    }

    fn resolve<T: ValueTuple>(&self, tuple: &T) -> Result<Vec<usize>, RelationError> {
        self.check_arity(T::ARITY)?;
        let indices = tuple.resolve(&self.name, self.domains())?;
        self.check_indices(&indices)
    }

    fn check_indices(&self, indices: &[usize]) -> Result<Vec<usize>, RelationError> {
        self.check_arity(indices.len())?;
        indices
            .iter()
            .enumerate()
            .map(|(slot, &index)| self.check_slot_index(slot, index))
            .collect()
    }

    fn add_checked(&mut self, indices: &[usize]) {
        let opened = self.opened_mut();
        let cube = opened.layout.tuple_cube(&opened.bdd, indices);
        opened.f = opened.bdd.apply_or(opened.f, cube);
    }

    fn remove_checked(&mut self, indices: &[usize]) {
        let opened = self.opened_mut();
        let cube = opened.layout.tuple_cube(&opened.bdd, indices);
        opened.f = opened.bdd.apply_diff(opened.f, cube);
    }

    fn contains_checked(&self, indices: &[usize]) -> bool {
        let opened = self.opened();
        let cube = opened.layout.tuple_cube(&opened.bdd, indices);
        !opened.bdd.is_zero(opened.bdd.apply_and(opened.f, cube))
    }

    pub fn add<T: ValueTuple>(&mut self, tuple: &T) -> Result<(), RelationError> {
        let indices = self.resolve(tuple)?;
        self.add_checked(&indices);
        Ok(())
    }

    pub fn remove<T: ValueTuple>(&mut self, tuple: &T) -> Result<(), RelationError> {
        let indices = self.resolve(tuple)?;
        self.remove_checked(&indices);
        Ok(())
    }

    pub fn contains<T: ValueTuple>(&self, tuple: &T) -> Result<bool, RelationError> {
        let indices = self.resolve(tuple)?;
        Ok(self.contains_checked(&indices))
    }

    pub fn add_indices(&mut self, indices: &[usize]) -> Result<(), RelationError> {
        let indices = self.check_indices(indices)?;
        self.add_checked(&indices);
        Ok(())
    }

    pub fn remove_indices(&mut self, indices: &[usize]) -> Result<(), RelationError> {
        let indices = self.check_indices(indices)?;
        self.remove_checked(&indices);
        Ok(())
    }

    pub fn contains_indices(&self, indices: &[usize]) -> Result<bool, RelationError> {
        let indices = self.check_indices(indices)?;
        Ok(self.contains_checked(&indices))
    }

    /// Exact number of tuples: the model count over the slot variables.
    pub fn size_exact(&self) -> BigUint {
        let opened = self.opened();
        // A positive cube has one node per variable, plus the terminal.
        let num_vars = opened.bdd.size(opened.layout.all_vars) as usize - 1;
        opened.bdd.sat_count(opened.f, num_vars)
    }

    /// Number of tuples, saturating at `u64::MAX`.
    pub fn size(&self) -> u64 {
        self.size_exact().to_u64().unwrap_or(u64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        let opened = self.opened();
        opened.bdd.is_zero(opened.f)
    }

    /// Cursor over all tuples, as domain indices in slot order.
    pub fn tuples(&self) -> TupleCursor<'_> {
        let opened = self.opened();
        let slots = (0..opened.layout.arity())
            .map(|slot| opened.layout.slot_levels(&opened.bdd, slot))
            .collect();
        TupleCursor::over_slots(&opened.bdd, opened.f, slots)
    }

    /// Cursor over the projection onto `slots`, in the given order.
    ///
    /// Slots not listed are quantified away, so each projected tuple is
    /// produced once.
    pub fn tuples_of(&self, slots: &[usize]) -> TupleCursor<'_> {
        let opened = self.opened();
        let arity = opened.layout.arity();
        for &slot in slots {
            assert!(slot < arity, "Relation {} has no slot {}", self.name, slot);
        }
        let hidden = (0..arity).filter(|slot| !slots.contains(slot));
        let vars = opened.bdd.var_set(hidden.flat_map(|slot| opened.layout.slot_vars[slot].iter().copied()));
        let f = opened.bdd.exists(opened.f, vars);
        let levels = slots
            .iter()
            .map(|&slot| opened.layout.slot_levels(&opened.bdd, slot))
            .collect();
        TupleCursor::over_slots(&opened.bdd, f, levels)
    }

    /// Cursor over all tuples decoded into values.
    pub fn values<T: ValueTuple>(&self) -> Result<Values<'_, T>, RelationError> {
        self.check_arity(T::ARITY)?;
        Ok(Values {
            relation: self,
            tuples: self.tuples(),
            _marker: PhantomData,
        })
    }

    fn compatible(&self, other: &Relation) -> Result<(), RelationError> {
        let incompatible = |reason: String| RelationError::Incompatible {
            relation: self.name.clone(),
            other: other.name.clone(),
            reason,
        };
        let (mine, theirs) = (&self.opened().layout, &other.opened().layout);
        if mine.arity() != theirs.arity() {
            return Err(incompatible(format!("arity {} differs from {}", mine.arity(), theirs.arity())));
        }
        for (slot, (a, b)) in self.domains().iter().zip(other.domains()).enumerate() {
            if a.name() != b.name() {
                return Err(incompatible(format!("slot {} ranges over {} and {}", slot, a.name(), b.name())));
            }
            if mine.width(slot) != theirs.width(slot) {
                return Err(incompatible(format!(
                    "slot {} has {} bits here and {} there",
                    slot,
                    mine.width(slot),
                    theirs.width(slot)
                )));
            }
        }
        Ok(())
    }

    /// Rebuild `other`'s function in this relation's manager.
    fn import(&self, other: &Relation) -> Result<Ref, RelationError> {
        self.compatible(other)?;
        let (mine, theirs) = (self.opened(), other.opened());

        let remap: HashMap<u32, u32> = theirs
            .layout
            .slot_vars
            .iter()
            .flatten()
            .zip(mine.layout.slot_vars.iter().flatten())
            .map(|(&from, &to)| (from, to))
            .collect();

        let mut body = Vec::new();
        theirs.bdd.write_body(theirs.f, &mut body).map_err(|e| RelationError::Incompatible {
            relation: self.name.clone(),
            other: other.name.clone(),
            reason: e.to_string(),
        })?;
        mine.bdd
            .read_body(body.as_slice(), |v| remap.get(&v).copied())
            .map_err(|e| RelationError::Incompatible {
                relation: self.name.clone(),
                other: other.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Add every tuple of `other`.
    pub fn union_with(&mut self, other: &Relation) -> Result<(), RelationError> {
        let g = self.import(other)?;
        let opened = self.opened_mut();
        opened.f = opened.bdd.apply_or(opened.f, g);
        Ok(())
    }

    /// Keep only tuples also in `other`.
    pub fn intersect_with(&mut self, other: &Relation) -> Result<(), RelationError> {
        let g = self.import(other)?;
        let opened = self.opened_mut();
        opened.f = opened.bdd.apply_and(opened.f, g);
        Ok(())
    }

    /// Remove every tuple of `other`.
    pub fn subtract(&mut self, other: &Relation) -> Result<(), RelationError> {
        let g = self.import(other)?;
        let opened = self.opened_mut();
        opened.f = opened.bdd.apply_diff(opened.f, g);
        Ok(())
    }

    /// Graphviz rendering of the relation's function, variables labeled
    /// `<domain>[<bit>]`.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        let opened = self.opened();
        let names = self.signature().map(Signature::domain_names).unwrap_or(&[]);
        let mut labels = HashMap::new();
        for (slot, vars) in opened.layout.slot_vars.iter().enumerate() {
            for (i, &v) in vars.iter().enumerate() {
                labels.insert(v, format!("{}[{}]", names[slot], vars.len() - 1 - i));
            }
        }
        opened
            .bdd
            .to_dot_labeled(&[opened.f], &DotConfig::default(), |v| labels[&v].clone())
    }
}

/// Cursor over a relation's tuples decoded into values, see [`Relation::values`].
pub struct Values<'a, T> {
    relation: &'a Relation,
    tuples: TupleCursor<'a>,
    _marker: PhantomData<T>,
}

impl<T: ValueTuple> Iterator for Values<'_, T> {
    type Item = Result<T, RelationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let tuple: Tuple = self.tuples.next()?;
        let indices: Vec<usize> = tuple.as_slice().iter().map(|&i| i as usize).collect();
        Some(T::decode(&self.relation.name, self.relation.domains(), &indices))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_log::test;

    use super::*;
    use crate::domain::Domain;

    fn methods(values: &[&str]) -> Rc<Domain<String>> {
        let dom = Rc::new(Domain::new("M"));
        for v in values {
            dom.get_or_add(v.to_string());
        }
        dom
    }

    fn config() -> BddConfig {
        BddConfig {
            node_table_bits: 10,
            cache_bits: 8,
            ..BddConfig::default()
        }
    }

    fn calls(m: &Rc<Domain<String>>, order: Option<&str>) -> Relation {
        let mut rel = Relation::with_config(config());
        rel.set_name("calls");
        rel.set_signature(Signature::new(["M0", "M1"], order).unwrap());
        rel.set_domains(vec![m.clone(), m.clone()]);
        rel
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_lifecycle_states() {
        let m = methods(&["a"]);
        let mut rel = Relation::new();
        assert_eq!(rel.state(), State::Unbound);
        rel.set_name("r");
        rel.set_signature(Signature::new(["M0"], None).unwrap());
        assert_eq!(rel.state(), State::Unbound);
        rel.set_domains(vec![m]);
        assert_eq!(rel.state(), State::Bound);
        rel.zero();
        assert_eq!(rel.state(), State::Open);
        rel.close();
        assert_eq!(rel.state(), State::Closed);
    }

    #[test]
    fn test_layout_interleaves() {
        let m = methods(&["a", "b", "c", "d"]);
        let mut rel = calls(&m, Some("M0xM1"));
        rel.zero();
        let opened = rel.opened();
        assert_eq!(opened.layout.slot_vars, [vec![1, 2], vec![3, 4]]);
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 0), [0, 2]);
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 1), [1, 3]);
    }

    #[test]
    fn test_layout_sequential_and_reversed() {
        let m = methods(&["a", "b", "c", "d"]);
        let mut rel = calls(&m, Some("M1_M0"));
        rel.zero();
        let opened = rel.opened();
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 0), [2, 3]);
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 1), [0, 1]);

        let mut rel = Relation::with_config(BddConfig {
            reverse_order: true,
            ..config()
        });
        rel.set_name("calls");
        rel.set_signature(Signature::new(["M0", "M1"], None).unwrap());
        rel.set_domains(vec![m.clone(), m]);
        rel.zero();
        let opened = rel.opened();
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 0), [1, 0]);
        assert_eq!(opened.layout.slot_levels(&opened.bdd, 1), [3, 2]);
    }

    #[test]
    fn test_add_contains_remove() {
        let m = methods(&["init", "main", "helper"]);
        let mut rel = calls(&m, Some("M0xM1"));
        rel.zero();
        assert!(rel.is_empty());

        rel.add(&pair("main", "helper")).unwrap();
        assert!(rel.contains(&pair("main", "helper")).unwrap());
        assert!(!rel.contains(&pair("helper", "main")).unwrap());
        assert_eq!(rel.size(), 1);

        rel.add(&pair("main", "helper")).unwrap();
        assert_eq!(rel.size(), 1);

        rel.remove(&pair("main", "helper")).unwrap();
        assert_eq!(rel.size(), 0);
        assert!(rel.is_empty());
    }

    #[test]
    fn test_one_respects_domain_sizes() {
        let m = methods(&["a", "b", "c"]);
        let mut rel = calls(&m, None);
        rel.one();
        assert_eq!(rel.size(), 9);
        assert!(rel.contains_indices(&[2, 2]).unwrap());
        let all: HashSet<Tuple> = rel.tuples().collect();
        assert_eq!(all.len(), 9);
        assert!(all.iter().all(|t| t.get(0) < Some(3) && t.get(1) < Some(3)));
    }

    #[test]
    fn test_one_with_single_value_domain() {
        let m = methods(&["only"]);
        let mut rel = Relation::bound("r", Signature::new(["M0"], None).unwrap(), vec![m]);
        rel.one();
        assert_eq!(rel.size(), 1);
        assert_eq!(rel.tuples().collect::<Vec<_>>(), vec![Tuple::new(vec![0])]);
    }

    #[test]
    fn test_value_errors() {
        let m = methods(&["init", "main"]);
        let mut rel = calls(&m, None);
        rel.zero();
        let err = rel.add(&pair("main", "missing")).unwrap_err();
        assert!(matches!(err, RelationError::ValueNotInDomain { slot: 1, .. }));
        let err = rel.add_indices(&[0, 2]).unwrap_err();
        assert!(matches!(err, RelationError::IndexOutOfRange { index: 2, size: 2, .. }));
        let err = rel.add_indices(&[0]).unwrap_err();
        assert!(matches!(err, RelationError::ArityMismatch { expected: 2, found: 1, .. }));
        let err = rel.contains(&("main".to_string(),)).unwrap_err();
        assert!(matches!(err, RelationError::ArityMismatch { .. }));
        assert!(rel.is_empty());
    }

    #[test]
    fn test_domain_growth_after_open() {
        let m = methods(&["a", "b"]);
        let mut rel = calls(&m, None);
        rel.zero();
        // One bit per slot: index 2 no longer fits.
        m.get_or_add("c".to_string());
        let err = rel.add(&pair("c", "a")).unwrap_err();
        assert!(matches!(err, RelationError::IndexOutOfRange { index: 2, size: 2, .. }));
    }

    #[test]
    fn test_tuples_of_projects() {
        let m = methods(&["a", "b", "c", "d"]);
        let mut rel = calls(&m, Some("M0xM1"));
        rel.zero();
        for t in [[0, 1], [0, 2], [3, 1]] {
            rel.add_indices(&t).unwrap();
        }
        let firsts: HashSet<Tuple> = rel.tuples_of(&[0]).collect();
        assert_eq!(firsts, HashSet::from([Tuple::from(vec![0]), Tuple::from(vec![3])]));
        let swapped: HashSet<Tuple> = rel.tuples_of(&[1, 0]).collect();
        assert!(swapped.contains(&Tuple::from(vec![2, 0])));
        assert_eq!(swapped.len(), 3);
    }

    #[test]
    fn test_values_decode() {
        let m = methods(&["init", "main"]);
        let mut rel = calls(&m, None);
        rel.zero();
        rel.add(&pair("init", "main")).unwrap();
        let values: Vec<(String, String)> = rel.values::<(String, String)>().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(values, vec![pair("init", "main")]);
        assert!(rel.values::<(String,)>().is_err());
    }

    #[test]
    fn test_set_operations() {
        let m = methods(&["a", "b", "c"]);
        let mut left = calls(&m, Some("M0xM1"));
        let mut right = calls(&m, Some("M1_M0"));
        left.zero();
        right.zero();
        left.add_indices(&[0, 1]).unwrap();
        left.add_indices(&[1, 2]).unwrap();
        right.add_indices(&[1, 2]).unwrap();
        right.add_indices(&[2, 0]).unwrap();

        let mut union = calls(&m, None);
        union.zero();
        union.union_with(&left).unwrap();
        union.union_with(&right).unwrap();
        assert_eq!(union.size(), 3);

        left.intersect_with(&right).unwrap();
        assert_eq!(left.tuples().collect::<Vec<_>>(), vec![Tuple::from(vec![1, 2])]);

        union.subtract(&right).unwrap();
        assert_eq!(union.tuples().collect::<Vec<_>>(), vec![Tuple::from(vec![0, 1])]);
    }

    #[test]
    fn test_set_operation_incompatible() {
        let m = methods(&["a", "b"]);
        let mut rel = calls(&m, None);
        rel.zero();
        let mut unary = Relation::bound("u", Signature::new(["M0"], None).unwrap(), vec![m]);
        unary.zero();
        assert!(matches!(rel.union_with(&unary), Err(RelationError::Incompatible { .. })));
    }

    #[test]
    fn test_to_dot_labels() {
        let m = methods(&["a", "b"]);
        let mut rel = calls(&m, None);
        rel.zero();
        rel.add_indices(&[1, 0]).unwrap();
        let dot = rel.to_dot().unwrap();
        assert!(dot.contains("label=\"M0[0]\""));
        assert!(dot.contains("label=\"M1[0]\""));
    }

    #[test]
    #[should_panic(expected = "Relation calls is not open (state: bound)")]
    fn test_add_before_open() {
        let m = methods(&["a"]);
        let mut rel = calls(&m, None);
        rel.add_indices(&[0, 0]).unwrap();
    }

    #[test]
    #[should_panic(expected = "Relation name is already set to calls")]
    fn test_name_twice() {
        let m = methods(&["a"]);
        let mut rel = calls(&m, None);
        rel.set_name("again");
    }

    #[test]
    #[should_panic(expected = "cannot be opened (state: closed)")]
    fn test_no_reopen() {
        let m = methods(&["a"]);
        let mut rel = calls(&m, None);
        rel.zero();
        rel.close();
        rel.one();
    }

    #[test]
    #[should_panic(expected = "does not match slot 0")]
    fn test_domain_kind_mismatch() {
        let h: Rc<Domain<u32>> = Rc::new(Domain::new("H"));
        let mut rel = Relation::new();
        rel.set_name("r");
        rel.set_signature(Signature::new(["M0"], None).unwrap());
        rel.set_domains(vec![h]);
    }
}
