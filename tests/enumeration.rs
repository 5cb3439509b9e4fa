use std::collections::HashSet;
use std::rc::Rc;

use bdd_rel::config::BddConfig;
use bdd_rel::domain::{AnyDomain, Domain};
use bdd_rel::relation::Relation;
use bdd_rel::signature::Signature;
use bdd_rel::tuple::Tuple;
use test_log::test;

fn domain(name: &str, size: usize) -> Rc<Domain<u32>> {
    let dom = Rc::new(Domain::new(name));
    for i in 0..size as u32 {
        dom.get_or_add(1000 + i);
    }
    dom
}

fn ternary(order: Option<&str>, reverse_order: bool, sizes: [usize; 3]) -> Relation {
    let mut rel = Relation::with_config(BddConfig {
        node_table_bits: 12,
        cache_bits: 10,
        reverse_order,
        ..BddConfig::default()
    });
    rel.set_name("r");
    rel.set_signature(Signature::new(["V0", "H0", "V1"], order).unwrap());
    let v = domain("V", sizes[0].max(sizes[2]));
    let h = domain("H", sizes[1]);
    rel.set_domains(vec![v.clone() as Rc<dyn AnyDomain>, h, v]);
    rel
}

fn triples(count: usize, bounds: [usize; 3], seed: u64) -> Vec<[usize; 3]> {
    let mut state = seed;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % bound
    };
    (0..count).map(|_| [next(bounds[0]), next(bounds[1]), next(bounds[2])]).collect()
}

fn assert_complete(rel: &Relation, expected: &HashSet<Tuple>) {
    let all: Vec<Tuple> = rel.tuples().collect();
    let unique: HashSet<Tuple> = all.iter().cloned().collect();
    assert_eq!(unique.len(), all.len(), "duplicate tuples");
    assert_eq!(&unique, expected);
    assert_eq!(rel.size(), expected.len() as u64);
    for t in &unique {
        assert!(rel.contains_indices(&t.indices().unwrap()).unwrap());
    }
}

#[test]
fn full_product_over_uneven_domains() {
    for (order, reverse) in [(None, false), (Some("V0xV1_H0"), false), (Some("H0_V1xV0"), true)] {
        let mut rel = ternary(order, reverse, [5, 3, 5]);
        rel.one();
        let expected: HashSet<Tuple> = (0..5usize)
            .flat_map(|a| (0..3usize).flat_map(move |b| (0..5usize).map(move |c| Tuple::from(vec![a, b, c]))))
            .collect();
        assert_complete(&rel, &expected);
    }
}

#[test]
fn sparse_relation_is_enumerated_exactly() {
    for (order, reverse) in [(None, false), (Some("V0xH0xV1"), false), (Some("V1_H0xV0"), true)] {
        let mut rel = ternary(order, reverse, [7, 9, 7]);
        rel.zero();
        let mut expected = HashSet::new();
        for t in triples(60, [7, 9, 7], 11) {
            rel.add_indices(&t).unwrap();
            expected.insert(Tuple::from(t.to_vec()));
        }
        assert_complete(&rel, &expected);
    }
}

#[test]
fn iteration_is_restartable_and_read_only() {
    let mut rel = ternary(None, false, [4, 4, 4]);
    rel.zero();
    for t in triples(10, [4, 4, 4], 5) {
        rel.add_indices(&t).unwrap();
    }
    let size = rel.size();
    let first: HashSet<Tuple> = rel.tuples().collect();
    let mut a = rel.tuples();
    let mut b = rel.tuples();
    a.next();
    let second: HashSet<Tuple> = b.by_ref().collect();
    assert_eq!(first, second);
    assert_eq!(rel.size(), size);
}

#[test]
fn projection_collapses_duplicates() {
    let mut rel = ternary(Some("V0xV1_H0"), false, [6, 6, 6]);
    rel.zero();
    let tuples = triples(40, [6, 6, 6], 21);
    for t in &tuples {
        rel.add_indices(t).unwrap();
    }

    let expected: HashSet<Tuple> = tuples.iter().map(|t| Tuple::from(vec![t[2], t[0]])).collect();
    let all: Vec<Tuple> = rel.tuples_of(&[2, 0]).collect();
    let projected: HashSet<Tuple> = all.iter().cloned().collect();
    assert_eq!(projected.len(), all.len());
    assert_eq!(projected, expected);
}

#[test]
fn view_select_and_delete_laws() {
    let mut rel = ternary(Some("V0xV1_H0"), false, [6, 4, 6]);
    rel.zero();
    let tuples = triples(30, [6, 4, 6], 8);
    for t in &tuples {
        rel.add_indices(t).unwrap();
    }

    let x = tuples[0][1];
    let mut view = rel.view();
    view.select_index(1, x).unwrap();
    for t in view.tuples() {
        assert_eq!(t.get(1), Some(x));
    }

    view.delete(1);
    let expected: HashSet<Tuple> = tuples
        .iter()
        .filter(|t| t[1] == x)
        .map(|t| Tuple::from(vec![t[0], t[2]]))
        .collect();
    let got: HashSet<Tuple> = view.tuples().collect();
    assert_eq!(got, expected);
    assert_eq!(view.size(), expected.len() as u64);
    view.free();
}

#[test]
fn typed_values_of_mixed_domains() {
    let v: Rc<Domain<String>> = Rc::new(Domain::new("V"));
    let h: Rc<Domain<u32>> = Rc::new(Domain::new("H"));
    for name in ["this", "arg", "tmp"] {
        v.get_or_add(name.to_string());
    }
    for site in [7u32, 8, 9] {
        h.get_or_add(site);
    }
    let mut rel = Relation::bound(
        "store",
        Signature::new(["V0", "H0", "V1"], Some("V0xV1_H0")).unwrap(),
        vec![v.clone() as Rc<dyn AnyDomain>, h, v],
    );
    rel.zero();
    let fact = ("this".to_string(), 8u32, "tmp".to_string());
    rel.add(&fact).unwrap();

    let values: Vec<(String, u32, String)> = rel
        .values::<(String, u32, String)>()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values, vec![fact]);
}
