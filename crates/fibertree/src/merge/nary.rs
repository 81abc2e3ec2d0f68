use super::{intersect, union, Elements, LazyFiber, MergeNode, Operand, Traverse};
use crate::fiber::Payload;

struct FlatIntersection<'a> {
    nested: LazyFiber<'a>,
    arity: usize,
}

impl MergeNode for FlatIntersection<'_> {
    fn open(&self) -> Elements<'_> {
        let arity = self.arity;

        Box::new(
            self.nested
                .iter_tick(false)
                .map(move |(coord, payload)| (coord, flatten_intersection(payload, arity))),
        )
    }
}

// `((a, b), c)` becomes `(a, b, c)`: one level per operand after the first.
fn flatten_intersection(payload: Payload, arity: usize) -> Payload {
    let mut items = Vec::with_capacity(arity);
    let mut current = payload;

    for _ in 1..arity {
        let (inner, last) = current.into_pair();
        items.push(last);
        current = inner;
    }
    items.push(current);
    items.reverse();

    Payload::Tuple(items)
}

struct FlatUnion<'a> {
    nested: LazyFiber<'a>,
    arity: usize,
}

impl MergeNode for FlatUnion<'_> {
    fn open(&self) -> Elements<'_> {
        let arity = self.arity;

        Box::new(
            self.nested
                .iter_tick(true)
                .map(move |(coord, payload)| (coord, flatten_union(payload, arity))),
        )
    }
}

fn operand_letter(index: usize) -> char {
    char::from(b'A' + index as u8)
}

// `(m1, (m0, a, b), c)` becomes `(mask, a, b, c)` where the mask lists the letters of every
// operand holding the coordinate.
fn flatten_union(payload: Payload, arity: usize) -> Payload {
    let mut mask = String::new();
    let mut items = vec![Payload::Empty; arity];
    let mut current = payload;
    let mut innermost = String::new();

    for index in (1..arity).rev() {
        let (level, inner, last) = current.into_masked_pair();
        if level.contains('B') {
            mask.insert(0, operand_letter(index));
        }
        items[index] = last;
        current = inner;
        innermost = level;
    }
    if innermost.contains('A') {
        mask.insert(0, operand_letter(0));
    }
    items[0] = current;

    let mut flat = Vec::with_capacity(arity + 1);
    flat.push(Payload::Mask(mask));
    flat.extend(items);
    Payload::Tuple(flat)
}

/// Intersects any number of operands into one flat tuple per common coordinate.
///
/// Unlike chaining [intersect], the payload is `(p0, p1, ..., pn)` rather than nested pairs.
pub fn intersection<'a>(operands: Vec<Operand<'a>>) -> LazyFiber<'a> {
    assert!(
        operands.len() >= 2,
        "Intersection needs at least two operands, got {}",
        operands.len()
    );

    let arity = operands.len();
    let rank_id = operands[0].rank_id().map(str::to_string);
    let active = operands[0].active();
    let default = Payload::Tuple(
        operands
            .iter()
            .map(|operand| operand.default_payload().clone())
            .collect(),
    );

    let mut operands = operands.into_iter();
    let (first, second) = (operands.next(), operands.next());
    let nested = match (first, second) {
        (Some(first), Some(second)) => operands.fold(intersect(first, second), intersect),
        _ => unreachable!(),
    };

    LazyFiber::new(
        FlatIntersection { nested, arity },
        rank_id.as_deref(),
        default,
        active,
    )
}

/// Unions any number of operands into one flat tuple per coordinate.
///
/// The payload is `(mask, p0, p1, ..., pn)`: the mask names every operand holding the
/// coordinate by letter, "A" for the first one, and absent operands contribute their default.
/// The default payload is `("", d0, d1, ..., dn)`.
pub fn union_all<'a>(operands: Vec<Operand<'a>>) -> LazyFiber<'a> {
    assert!(
        operands.len() >= 2,
        "Union needs at least two operands, got {}",
        operands.len()
    );
    assert!(
        operands.len() <= 26,
        "Union masks name at most 26 operands, got {}",
        operands.len()
    );

    let arity = operands.len();
    let rank_id = operands[0].rank_id().map(str::to_string);
    let active = operands[0].active();
    let mut default = vec![Payload::Mask(String::new())];
    default.extend(operands.iter().map(|operand| operand.default_payload().clone()));

    let mut operands = operands.into_iter();
    let (first, second) = (operands.next(), operands.next());
    let nested = match (first, second) {
        (Some(first), Some(second)) => operands.fold(union(first, second), union),
        _ => unreachable!(),
    };

    LazyFiber::new(
        FlatUnion { nested, arity },
        rank_id.as_deref(),
        Payload::Tuple(default),
        active,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{Coord, Fiber};

    fn values(values: &[f64]) -> Fiber {
        Fiber::from_uncompressed(values).with_rank_id("K")
    }

    fn flat(mask: Option<&str>, items: &[f64]) -> Payload {
        let mut flat: Vec<Payload> = mask.map(|m| Payload::Mask(m.into())).into_iter().collect();
        flat.extend(items.iter().map(|v| Payload::Value(*v)));
        Payload::Tuple(flat)
    }

    fn collect(fiber: &LazyFiber<'_>) -> Vec<(Coord, Payload)> {
        fiber.iter_tick(false).collect()
    }

    #[test]
    fn intersection_flattens_three_operands() {
        let a = values(&[1.0, 0.0, 3.0, 4.0, 5.0]);
        let b = values(&[0.0, 6.0, 7.0, 0.0, 8.0]);
        let c = values(&[10.0, 0.0, 9.0, 0.0, 12.0]);

        let result = intersection(vec![(&a).into(), (&b).into(), (&c).into()]);

        assert_eq!(
            collect(&result),
            vec![
                (2, flat(None, &[3.0, 7.0, 9.0])),
                (4, flat(None, &[5.0, 8.0, 12.0])),
            ]
        );
        assert_eq!(result.rank_id(), Some("K"));
    }

    #[test]
    fn union_rebuilds_operand_mask() {
        let a = values(&[1.0, 0.0, 3.0, 0.0, 0.0]);
        let b = values(&[0.0, 6.0, 7.0, 0.0, 8.0]);
        let c = values(&[10.0, 0.0, 9.0, 0.0, 12.0]);

        let result = union_all(vec![(&a).into(), (&b).into(), (&c).into()]);

        assert_eq!(
            collect(&result),
            vec![
                (0, flat(Some("AC"), &[1.0, 0.0, 10.0])),
                (1, flat(Some("B"), &[0.0, 6.0, 0.0])),
                (2, flat(Some("ABC"), &[3.0, 7.0, 9.0])),
                (4, flat(Some("BC"), &[0.0, 8.0, 12.0])),
            ]
        );
        assert_eq!(result.default_payload(), &flat(Some(""), &[0.0, 0.0, 0.0]));
        assert_eq!(result.rank_id(), Some("K"));
    }

    #[test]
    fn two_way_union_matches_pairwise_union() {
        let a = values(&[1.0, 0.0, 3.0]);
        let b = values(&[0.0, 2.0]);

        let flat_result = union_all(vec![(&a).into(), (&b).into()]);
        let pairwise = &a | &b;

        assert_eq!(collect(&flat_result), collect(&pairwise));
        assert_eq!(flat_result.default_payload(), pairwise.default_payload());
    }

    #[test]
    #[should_panic = "at least two operands"]
    fn single_operand_panics() {
        let a = values(&[1.0]);

        intersection(vec![(&a).into()]);
    }
}
