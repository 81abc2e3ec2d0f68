use super::{DrainPolicy, Elements, LazyFiber, MergeCursor, MergeNode, Operand, Step, Traverse};
use crate::fiber::{Fiber, Payload};
use core::ops::{BitAnd, BitOr, BitXor, Sub};
use fibertree_metrics::Metrics;

fn opened<'s>(
    left: &'s Operand<'_>,
    right: &'s Operand<'_>,
    tick: bool,
    drain: DrainPolicy,
) -> MergeCursor<'s> {
    MergeCursor::new(left.elements(tick), right.elements(tick), drain)
}

fn checked<'a>(
    left: impl Into<Operand<'a>>,
    right: impl Into<Operand<'a>>,
) -> (Operand<'a>, Operand<'a>) {
    let (left, right) = (left.into(), right.into());
    left.check_ordered();
    right.check_ordered();
    (left, right)
}

/// Elements present in both operands, with `[left, right]` tuple payloads.
pub struct Intersection<'a> {
    left: Operand<'a>,
    right: Operand<'a>,
}

struct IntersectionTrace {
    rank: String,
    left: String,
    right: String,
    left_pos: usize,
    right_pos: usize,
}

impl IntersectionTrace {
    fn start(rank: Option<&str>) -> Option<Self> {
        let rank = rank.filter(|_| Metrics::is_collecting())?;

        Some(Self {
            rank: rank.to_string(),
            left: format!("intersect_{}", Metrics::get_label(rank)),
            right: format!("intersect_{}", Metrics::get_label(rank)),
            left_pos: 0,
            right_pos: 0,
        })
    }

    fn record(&mut self, step: &Step) {
        match step {
            Step::Both(coord, _, _) => {
                Metrics::add_use(&self.rank, *coord, self.left_pos, &self.left);
                Metrics::add_use(&self.rank, *coord, self.right_pos, &self.right);
                self.left_pos += 1;
                self.right_pos += 1;
            }
            Step::Left(coord, _) => {
                Metrics::add_use(&self.rank, *coord, self.left_pos, &self.left);
                Metrics::inc_iter(&self.rank);
                self.left_pos += 1;
            }
            Step::Right(coord, _) => {
                Metrics::add_use(&self.rank, *coord, self.right_pos, &self.right);
                Metrics::inc_iter(&self.rank);
                self.right_pos += 1;
            }
        }
    }
}

impl MergeNode for Intersection<'_> {
    fn open(&self) -> Elements<'_> {
        let mut cursor = opened(&self.left, &self.right, false, DrainPolicy::NONE);
        let mut trace = IntersectionTrace::start(self.left.rank_id());

        Box::new(core::iter::from_fn(move || loop {
            let step = cursor.next()?;
            if let Some(trace) = trace.as_mut() {
                trace.record(&step);
            }
            if let Step::Both(coord, lhs, rhs) = step {
                return Some((coord, Payload::Tuple(vec![lhs, rhs])));
            }
        }))
    }
}

/// Intersects two operands.
pub fn intersect<'a>(left: impl Into<Operand<'a>>, right: impl Into<Operand<'a>>) -> LazyFiber<'a> {
    let (left, right) = checked(left, right);
    let default = Payload::Tuple(vec![
        left.default_payload().clone(),
        right.default_payload().clone(),
    ]);
    let (rank_id, active) = (left.rank_id().map(str::to_string), left.active());

    LazyFiber::new(Intersection { left, right }, rank_id.as_deref(), default, active)
}

/// Elements present in either operand, with `[mask, left, right]` tuple payloads.
///
/// The mask names the operands holding the coordinate ("A", "B" or "AB"); the missing side
/// gets its operand's default.
pub struct Union<'a> {
    left: Operand<'a>,
    right: Operand<'a>,
}

impl MergeNode for Union<'_> {
    fn open(&self) -> Elements<'_> {
        let left_default = self.left.default_payload();
        let right_default = self.right.default_payload();

        Box::new(
            opened(&self.left, &self.right, true, DrainPolicy::BOTH).map(move |step| match step {
                Step::Both(coord, lhs, rhs) => (coord, masked("AB", lhs, rhs)),
                Step::Left(coord, lhs) => (coord, masked("A", lhs, right_default.clone())),
                Step::Right(coord, rhs) => (coord, masked("B", left_default.clone(), rhs)),
            }),
        )
    }
}

fn masked(mask: &str, left: Payload, right: Payload) -> Payload {
    Payload::Tuple(vec![Payload::Mask(mask.to_string()), left, right])
}

fn masked_default(left: &Operand<'_>, right: &Operand<'_>) -> Payload {
    masked(
        "",
        left.default_payload().clone(),
        right.default_payload().clone(),
    )
}

/// Unions two operands.
pub fn union<'a>(left: impl Into<Operand<'a>>, right: impl Into<Operand<'a>>) -> LazyFiber<'a> {
    let (left, right) = checked(left, right);
    let default = masked_default(&left, &right);
    let (rank_id, active) = (left.rank_id().map(str::to_string), left.active());

    LazyFiber::new(Union { left, right }, rank_id.as_deref(), default, active)
}

/// Elements present in exactly one operand, with union style payloads.
pub struct Xor<'a> {
    left: Operand<'a>,
    right: Operand<'a>,
}

impl MergeNode for Xor<'_> {
    fn open(&self) -> Elements<'_> {
        let left_default = self.left.default_payload();
        let right_default = self.right.default_payload();

        Box::new(
            opened(&self.left, &self.right, true, DrainPolicy::BOTH).filter_map(
                move |step| match step {
                    Step::Both(..) => None,
                    Step::Left(coord, lhs) => {
                        Some((coord, masked("A", lhs, right_default.clone())))
                    }
                    Step::Right(coord, rhs) => {
                        Some((coord, masked("B", left_default.clone(), rhs)))
                    }
                },
            ),
        )
    }
}

/// Keeps the elements present in exactly one of two operands.
pub fn xor<'a>(left: impl Into<Operand<'a>>, right: impl Into<Operand<'a>>) -> LazyFiber<'a> {
    let (left, right) = checked(left, right);
    let default = masked_default(&left, &right);
    let (rank_id, active) = (left.rank_id().map(str::to_string), left.active());

    LazyFiber::new(Xor { left, right }, rank_id.as_deref(), default, active)
}

/// Elements of the left operand absent from the right one, with the left payloads.
pub struct Difference<'a> {
    left: Operand<'a>,
    right: Operand<'a>,
}

impl MergeNode for Difference<'_> {
    fn open(&self) -> Elements<'_> {
        Box::new(
            opened(&self.left, &self.right, true, DrainPolicy::LEFT).filter_map(|step| match step {
                Step::Left(coord, lhs) => Some((coord, lhs)),
                Step::Both(..) | Step::Right(..) => None,
            }),
        )
    }
}

/// Removes the coordinates of `right` from `left`.
pub fn difference<'a>(
    left: impl Into<Operand<'a>>,
    right: impl Into<Operand<'a>>,
) -> LazyFiber<'a> {
    let (left, right) = checked(left, right);
    let default = left.default_payload().clone();
    let (rank_id, active) = (left.rank_id().map(str::to_string), left.active());

    LazyFiber::new(Difference { left, right }, rank_id.as_deref(), default, active)
}

macro_rules! merge_operator {
    ($trait:ident, $method:ident, $func:ident) => {
        impl<'a> $trait<&'a Fiber> for &'a Fiber {
            type Output = LazyFiber<'a>;

            fn $method(self, rhs: &'a Fiber) -> LazyFiber<'a> {
                $func(self, rhs)
            }
        }

        impl<'a> $trait<&'a Fiber> for LazyFiber<'a> {
            type Output = LazyFiber<'a>;

            fn $method(self, rhs: &'a Fiber) -> LazyFiber<'a> {
                $func(self, rhs)
            }
        }

        impl<'a> $trait<LazyFiber<'a>> for LazyFiber<'a> {
            type Output = LazyFiber<'a>;

            fn $method(self, rhs: LazyFiber<'a>) -> LazyFiber<'a> {
                $func(self, rhs)
            }
        }
    };
}

merge_operator!(BitAnd, bitand, intersect);
merge_operator!(BitOr, bitor, union);
merge_operator!(BitXor, bitxor, xor);
merge_operator!(Sub, sub, difference);
