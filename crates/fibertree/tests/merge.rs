use fibertree::merge::{difference, intersection, union, union_all, xor};
use fibertree::metrics::{Metrics, UseRecord, ITER_TRACE};
use fibertree::{Coord, DenseArray, Fiber, LazyFiber, Payload, Tensor};
use serial_test::serial;

fn vector(values: &[f64]) -> Fiber {
    Tensor::from_uncompressed("V", &["M"], &DenseArray::from(values.to_vec()))
        .unwrap()
        .root()
        .clone()
}

fn matrix(rank_ids: &[&str], rows: Vec<Vec<f64>>) -> Fiber {
    Tensor::from_uncompressed("T", rank_ids, &DenseArray::from(rows))
        .unwrap()
        .root()
        .clone()
}

fn a1() -> Fiber {
    vector(&[1.0, 0.0, 3.0, 0.0, 5.0, 0.0, 7.0])
}

fn b1() -> Fiber {
    vector(&[2.0, 0.0, 4.0, 5.0])
}

fn c1() -> Fiber {
    vector(&[1.0, 2.0, 3.0])
}

fn a2() -> Fiber {
    matrix(
        &["M", "K"],
        vec![
            vec![1.0, 0.0, 3.0, 0.0, 5.0, 0.0, 7.0],
            vec![2.0, 2.0, 0.0, 3.0, 0.0, 0.0, 8.0],
            vec![0.0; 7],
            vec![0.0; 7],
            vec![4.0, 0.0, 5.0, 0.0, 8.0, 0.0, 9.0],
        ],
    )
}

fn b2() -> Fiber {
    matrix(
        &["M", "K"],
        vec![
            vec![2.0, 0.0, 4.0, 5.0],
            vec![0.0; 4],
            vec![3.0, 4.0, 6.0, 0.0],
            vec![0.0; 4],
            vec![1.0, 2.0, 3.0, 4.0],
        ],
    )
}

fn row(coords: &[Coord], values: &[f64]) -> Payload {
    Payload::Fiber(Fiber::new(
        coords.to_vec(),
        values.iter().map(|v| Payload::Value(*v)).collect(),
    ))
}

fn tuple(items: Vec<Payload>) -> Payload {
    Payload::Tuple(items)
}

fn masked(mask: &str, items: &[f64]) -> Payload {
    let mut flat = vec![Payload::from(mask)];
    flat.extend(items.iter().map(|v| Payload::Value(*v)));
    Payload::Tuple(flat)
}

fn collect(fiber: &LazyFiber<'_>) -> Vec<(Coord, Payload)> {
    fiber.iter_tick(false).collect()
}

#[test]
fn two_way_union_of_vectors() {
    let (a, b) = (a1(), b1());
    let expected = vec![
        (0, masked("AB", &[1.0, 2.0])),
        (2, masked("AB", &[3.0, 4.0])),
        (3, masked("B", &[0.0, 5.0])),
        (4, masked("A", &[5.0, 0.0])),
        (6, masked("A", &[7.0, 0.0])),
    ];

    for result in [&a | &b, union(&a, &b)] {
        assert_eq!(collect(&result), expected);
        assert_eq!(result.default_payload(), &masked("", &[0.0, 0.0]));
        assert_eq!(result.rank_id(), Some("M"));
    }
}

#[test]
fn two_way_union_of_matrices() {
    let (a, b) = (a2(), b2());
    let empty = Payload::Fiber(Fiber::default());

    let result = &a | &b;

    assert_eq!(
        collect(&result),
        vec![
            (
                0,
                tuple(vec![
                    "AB".into(),
                    row(&[0, 2, 4, 6], &[1.0, 3.0, 5.0, 7.0]),
                    row(&[0, 2, 3], &[2.0, 4.0, 5.0]),
                ])
            ),
            (
                1,
                tuple(vec![
                    "A".into(),
                    row(&[0, 1, 3, 6], &[2.0, 2.0, 3.0, 8.0]),
                    empty.clone(),
                ])
            ),
            (
                2,
                tuple(vec![
                    "B".into(),
                    empty.clone(),
                    row(&[0, 1, 2], &[3.0, 4.0, 6.0]),
                ])
            ),
            (
                4,
                tuple(vec![
                    "AB".into(),
                    row(&[0, 2, 4, 6], &[4.0, 5.0, 8.0, 9.0]),
                    row(&[0, 1, 2, 3], &[1.0, 2.0, 3.0, 4.0]),
                ])
            ),
        ]
    );
    assert_eq!(
        result.default_payload(),
        &tuple(vec!["".into(), empty.clone(), empty])
    );
    assert_eq!(result.rank_id(), Some("M"));
}

#[test]
fn union_of_vector_and_matrix() {
    let (a, b) = (a1(), b2());

    let result = union(&a, &b);

    assert_eq!(
        collect(&result),
        vec![
            (0, tuple(vec!["AB".into(), 1.0.into(), row(&[0, 2, 3], &[2.0, 4.0, 5.0])])),
            (2, tuple(vec!["AB".into(), 3.0.into(), row(&[0, 1, 2], &[3.0, 4.0, 6.0])])),
            (
                4,
                tuple(vec!["AB".into(), 5.0.into(), row(&[0, 1, 2, 3], &[1.0, 2.0, 3.0, 4.0])])
            ),
            (6, tuple(vec!["A".into(), 7.0.into(), Payload::Fiber(Fiber::default())])),
        ]
    );
    assert_eq!(
        result.default_payload(),
        &tuple(vec!["".into(), 0.0.into(), Payload::Fiber(Fiber::default())])
    );
}

#[test]
fn three_way_union_of_vectors() {
    let (a, b, c) = (a1(), b1(), c1());

    let result = union_all(vec![(&a).into(), (&b).into(), (&c).into()]);

    assert_eq!(
        collect(&result),
        vec![
            (0, masked("ABC", &[1.0, 2.0, 1.0])),
            (1, masked("C", &[0.0, 0.0, 2.0])),
            (2, masked("ABC", &[3.0, 4.0, 3.0])),
            (3, masked("B", &[0.0, 5.0, 0.0])),
            (4, masked("A", &[5.0, 0.0, 0.0])),
            (6, masked("A", &[7.0, 0.0, 0.0])),
        ]
    );
    assert_eq!(result.default_payload(), &masked("", &[0.0, 0.0, 0.0]));
    assert_eq!(result.rank_id(), Some("M"));
}

#[test]
fn three_way_intersection_of_vectors() {
    let (a, b, c) = (a1(), b1(), c1());

    let result = intersection(vec![(&a).into(), (&b).into(), (&c).into()]);

    assert_eq!(
        collect(&result),
        vec![
            (0, tuple(vec![1.0.into(), 2.0.into(), 1.0.into()])),
            (2, tuple(vec![3.0.into(), 4.0.into(), 3.0.into()])),
        ]
    );
}

#[test]
fn three_way_intersection_keeps_common_coordinates() {
    let a = vector(&[1.0, 0.0, 3.0, 4.0, 5.0]);
    let b = vector(&[0.0, 6.0, 7.0, 0.0, 8.0]);
    let c = vector(&[10.0, 0.0, 9.0, 0.0, 12.0]);

    let result = intersection(vec![(&a).into(), (&b).into(), (&c).into()]).materialize();

    assert_eq!(result.coords(), &[2, 4]);
    assert_eq!(
        result.payloads(),
        &[
            tuple(vec![3.0.into(), 7.0.into(), 9.0.into()]),
            tuple(vec![5.0.into(), 8.0.into(), 12.0.into()]),
        ]
    );
}

#[test]
fn difference_and_xor_keep_one_sided_elements() {
    let (a, b) = (a1(), b1());

    let only_a = difference(&a, &b).materialize();
    let either = xor(&a, &b);

    assert_eq!(only_a.coords(), &[4, 6]);
    assert_eq!(only_a.payloads(), &[Payload::Value(5.0), Payload::Value(7.0)]);
    assert_eq!(only_a.rank_id(), Some("M"));
    assert_eq!(
        collect(&either),
        vec![
            (3, masked("B", &[0.0, 5.0])),
            (4, masked("A", &[5.0, 0.0])),
            (6, masked("A", &[7.0, 0.0])),
        ]
    );
}

#[test]
fn populate_from_intersection_computes_products() {
    let (a, b) = (a1(), b1());
    let mut z = Fiber::default().with_rank_id("M");

    z.assign_with(&(&a & &b), |_, target, source| {
        let product: f64 = source
            .as_tuple()
            .map(|items| items.iter().filter_map(Payload::value).product())
            .unwrap_or_default();
        *target = Payload::Value(product);
    });

    assert_eq!(z.coords(), &[0, 2]);
    assert_eq!(z.payloads(), &[Payload::Value(2.0), Payload::Value(12.0)]);
}

#[test]
fn merged_results_feed_further_merges() {
    let (a, b, c) = (a1(), b1(), c1());

    let result = (&a & &b) - &c;

    assert!(collect(&result).is_empty());

    let result = (&a | &b) & &c;
    let coords: Vec<Coord> = collect(&result).into_iter().map(|(coord, _)| coord).collect();
    assert_eq!(coords, vec![0, 2]);
}

#[test]
#[serial]
fn nested_traversal_stamps_iterations() {
    let tensor = matrix(
        &["walk_M", "walk_K"],
        vec![vec![1.0, 0.0, 3.0], vec![0.0; 3], vec![0.0, 5.0, 0.0]],
    );

    Metrics::begin_collect(&["walk_M", "walk_K"]);
    for (_, payload) in tensor.iter() {
        if let Some(row) = payload.as_fiber() {
            for _ in row.iter() {}
        }
    }
    Metrics::end_collect();

    assert!(Metrics::is_registered("walk_M"));
    assert_eq!(Metrics::traversals("walk_M"), 1);
    assert_eq!(Metrics::traversals("walk_K"), 2);
    assert_eq!(
        Metrics::uses("walk_M", ITER_TRACE),
        vec![UseRecord::new(0, 0, vec![0, 0]), UseRecord::new(2, 1, vec![1, 0])]
    );
    assert_eq!(
        Metrics::uses("walk_K", ITER_TRACE),
        vec![
            UseRecord::new(0, 0, vec![0, 0]),
            UseRecord::new(2, 1, vec![0, 1]),
            UseRecord::new(1, 0, vec![1, 0]),
        ]
    );
}

#[test]
#[serial]
fn traversal_outside_collection_records_nothing() {
    let a = vector(&[1.0, 2.0]).with_rank_id("idle_M");

    Metrics::begin_collect(&["idle_M"]);
    Metrics::end_collect();
    for _ in a.iter() {}

    assert!(Metrics::uses("idle_M", ITER_TRACE).is_empty());
    assert_eq!(Metrics::traversals("idle_M"), 0);
}
