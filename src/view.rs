//! Restrictable snapshots of an open relation.
//!
//! A [`View`] starts as the relation's current function and is narrowed in
//! place: [`View::select`] keeps tuples with a given value in one slot,
//! [`View::delete`] projects a slot away. The relation itself is untouched,
//! and it cannot be modified while a view borrows it.

use std::fmt::Debug;
use std::hash::Hash;

use log::debug;
use num_traits::ToPrimitive;

use crate::error::RelationError;
use crate::paths::TupleCursor;
use crate::reference::Ref;
use crate::relation::Relation;
use crate::tuple::resolve_value;

pub struct View<'a> {
    relation: &'a Relation,
    f: Ref,
    visible: Vec<bool>,
}

impl Relation {
    /// A view over the current contents of this open relation.
    pub fn view(&self) -> View<'_> {
        let opened = self.opened();
        View {
            relation: self,
            f: opened.f,
            visible: vec![true; opened.layout.arity()],
        }
    }
}

impl<'a> View<'a> {
    pub fn relation(&self) -> &'a Relation {
        self.relation
    }

    /// Slots not deleted yet, in slot order.
    pub fn visible_slots(&self) -> Vec<usize> {
        (0..self.visible.len()).filter(|&slot| self.visible[slot]).collect()
    }

    fn assert_visible(&self, slot: usize) {
        assert!(
            slot < self.visible.len(),
            "Relation {} has no slot {}",
            self.relation.name(),
            slot
        );
        assert!(
            self.visible[slot],
            "Slot {} of relation {} is already deleted from this view",
            slot,
            self.relation.name()
        );
    }

    /// Keep only tuples whose `slot` holds `value`.
    pub fn select<T>(&mut self, slot: usize, value: &T) -> Result<(), RelationError>
    where
        T: Eq + Hash + Clone + Debug + 'static,
    {
        self.assert_visible(slot);
        let index = resolve_value(self.relation.name(), self.relation.domains(), slot, value)?;
        self.select_index(slot, index)
    }

    /// Keep only tuples whose `slot` holds `index`.
    pub fn select_index(&mut self, slot: usize, index: usize) -> Result<(), RelationError> {
        self.assert_visible(slot);
        let index = self.relation.check_slot_index(slot, index)?;
        let opened = self.relation.opened();
        let cube = opened.bdd.cube(opened.layout.literals(slot, index));
        self.f = opened.bdd.apply_and(self.f, cube);
        Ok(())
    }

    /// Project `slot` away.
    pub fn delete(&mut self, slot: usize) {
        self.assert_visible(slot);
        let opened = self.relation.opened();
        self.f = opened.bdd.exists(self.f, opened.layout.slot_sets[slot]);
        self.visible[slot] = false;
    }

    pub fn select_and_delete<T>(&mut self, slot: usize, value: &T) -> Result<(), RelationError>
    where
        T: Eq + Hash + Clone + Debug + 'static,
    {
        self.select(slot, value)?;
        self.delete(slot);
        Ok(())
    }

    pub fn select_index_and_delete(&mut self, slot: usize, index: usize) -> Result<(), RelationError> {
        self.select_index(slot, index)?;
        self.delete(slot);
        Ok(())
    }

    /// Number of distinct tuples over the visible slots.
    pub fn size(&self) -> u64 {
        let opened = self.relation.opened();
        let hidden: usize = (0..self.visible.len())
            .filter(|&slot| !self.visible[slot])
            .map(|slot| opened.layout.width(slot))
            .sum();
        // Deleted slots no longer constrain their bits; divide them out.
        let count = opened.bdd.sat_count(self.f, opened.bdd.num_vars()) >> hidden;
        count.to_u64().unwrap_or(u64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.relation.opened().bdd.is_zero(self.f)
    }

    /// Membership of a tuple given over the visible slots only.
    pub fn contains_indices(&self, indices: &[usize]) -> Result<bool, RelationError> {
        let slots = self.visible_slots();
        if indices.len() != slots.len() {
            return Err(RelationError::ArityMismatch {
                relation: self.relation.name().to_string(),
                expected: slots.len(),
                found: indices.len(),
            });
        }
        let mut literals = Vec::new();
        for (&slot, &index) in slots.iter().zip(indices) {
            let index = self.relation.check_slot_index(slot, index)?;
            literals.extend(self.relation.opened().layout.literals(slot, index));
        }
        let opened = self.relation.opened();
        let cube = opened.bdd.cube(literals);
        Ok(!opened.bdd.is_zero(opened.bdd.apply_and(self.f, cube)))
    }

    /// Cursor over the tuples of the visible slots.
    pub fn tuples(&self) -> TupleCursor<'a> {
        let opened = self.relation.opened();
        let slots = self
            .visible_slots()
            .into_iter()
            .map(|slot| opened.layout.slot_levels(&opened.bdd, slot))
            .collect();
        TupleCursor::over_slots(&opened.bdd, self.f, slots)
    }

    /// Release the view.
    pub fn free(self) {
        debug!(
            "Freeing view of relation {} over slots {:?}",
            self.relation.name(),
            self.visible_slots()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::config::BddConfig;
    use crate::domain::{AnyDomain, Domain};
    use crate::signature::Signature;
    use crate::tuple::Tuple;

    fn points_to() -> Relation {
        let v: Rc<Domain<String>> = Rc::new(Domain::new("V"));
        for name in ["x", "y", "z"] {
            v.get_or_add(name.to_string());
        }
        let h: Rc<Domain<u32>> = Rc::new(Domain::new("H"));
        for site in [100u32, 200, 300, 400, 500] {
            h.get_or_add(site);
        }
        let mut rel = Relation::with_config(BddConfig {
            node_table_bits: 10,
            cache_bits: 8,
            ..BddConfig::default()
        });
        rel.set_name("vP");
        rel.set_signature(Signature::new(["V0", "H0"], Some("V0xH0")).unwrap());
        rel.set_domains(vec![v as Rc<dyn AnyDomain>, h]);
        rel.zero();
        for (var, site) in [("x", 100u32), ("x", 200), ("y", 200), ("z", 500)] {
            rel.add(&(var.to_string(), site)).unwrap();
        }
        rel
    }

    #[test]
    fn test_select_keeps_matching() {
        let rel = points_to();
        let mut view = rel.view();
        view.select(0, &"x".to_string()).unwrap();
        assert_eq!(view.size(), 2);
        let tuples: HashSet<Tuple> = view.tuples().collect();
        assert!(tuples.iter().all(|t| t.get(0) == Some(0)));
        assert_eq!(tuples.len(), 2);
        view.free();
        assert_eq!(rel.size(), 4);
    }

    #[test]
    fn test_delete_collapses_duplicates() {
        let rel = points_to();
        let mut view = rel.view();
        view.delete(0);
        assert_eq!(view.visible_slots(), [1]);
        assert_eq!(view.size(), 3);
        let sites: HashSet<Tuple> = view.tuples().collect();
        assert_eq!(
            sites,
            HashSet::from([Tuple::from(vec![0]), Tuple::from(vec![1]), Tuple::from(vec![4])])
        );
        assert!(view.contains_indices(&[1]).unwrap());
        assert!(!view.contains_indices(&[2]).unwrap());
    }

    #[test]
    fn test_select_and_delete() {
        let rel = points_to();
        let mut view = rel.view();
        view.select_and_delete(1, &200u32).unwrap();
        let vars: HashSet<Tuple> = view.tuples().collect();
        assert_eq!(vars, HashSet::from([Tuple::from(vec![0]), Tuple::from(vec![1])]));

        let mut view = rel.view();
        view.select_index_and_delete(0, 2).unwrap();
        assert_eq!(view.tuples().collect::<Vec<_>>(), vec![Tuple::from(vec![4])]);
    }

    #[test]
    fn test_select_unknown_value() {
        let rel = points_to();
        let mut view = rel.view();
        let err = view.select(1, &999u32).unwrap_err();
        assert!(matches!(err, RelationError::ValueNotInDomain { slot: 1, .. }));
        assert_eq!(view.size(), 4);
    }

    #[test]
    fn test_views_are_independent() {
        let rel = points_to();
        let mut a = rel.view();
        let b = rel.view();
        a.select_index(0, 1).unwrap();
        assert_eq!(a.size(), 1);
        assert_eq!(b.size(), 4);
    }

    #[test]
    #[should_panic(expected = "Slot 0 of relation vP is already deleted")]
    fn test_select_deleted_slot() {
        let rel = points_to();
        let mut view = rel.view();
        view.delete(0);
        view.select_index(0, 0).unwrap();
    }
}
