use super::Elements;
use crate::fiber::{Coord, Payload};
use core::cmp::Ordering;
use core::iter::Peekable;

/// Where a two-operand merge stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Both sides have elements left; the next step compares their coordinates.
    Advancing,
    /// A step was handed out and the cursor waits to be pulled again.
    Emitting,
    /// The left side ended, the right one still has elements.
    ExhaustedLeft,
    /// The right side ended, the left one still has elements.
    ExhaustedRight,
    /// Nothing more will be produced.
    Done,
}

/// Which side keeps being read once the other one has ended.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Read the left remainder.
    pub left: bool,
    /// Read the right remainder.
    pub right: bool,
}

impl DrainPolicy {
    /// Stop as soon as either side ends.
    pub const NONE: Self = Self {
        left: false,
        right: false,
    };
    /// Keep reading the left side only.
    pub const LEFT: Self = Self {
        left: true,
        right: false,
    };
    /// Keep reading whichever side remains.
    pub const BOTH: Self = Self {
        left: true,
        right: true,
    };
}

/// One move of a [MergeCursor].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Both sides hold the coordinate; both advanced.
    Both(Coord, Payload, Payload),
    /// Only the left side holds the coordinate; it advanced.
    Left(Coord, Payload),
    /// Only the right side holds the coordinate; it advanced.
    Right(Coord, Payload),
}

impl Step {
    /// The coordinate the step is at.
    pub fn coord(&self) -> Coord {
        match self {
            Step::Both(coord, _, _) | Step::Left(coord, _) | Step::Right(coord, _) => *coord,
        }
    }
}

/// Forward sweep over two ordered operands by three-way coordinate comparison.
///
/// Every element read from either side is reported as a [Step], including the ones an
/// operator ends up dropping, so that operators can trace them.
pub struct MergeCursor<'s> {
    left: Peekable<Elements<'s>>,
    right: Peekable<Elements<'s>>,
    drain: DrainPolicy,
    state: MergeState,
}

impl<'s> MergeCursor<'s> {
    /// Creates a cursor at the first element of both sides.
    pub fn new(left: Elements<'s>, right: Elements<'s>, drain: DrainPolicy) -> Self {
        Self {
            left: left.peekable(),
            right: right.peekable(),
            drain,
            state: MergeState::Advancing,
        }
    }

    /// The current state.
    pub fn state(&self) -> MergeState {
        self.state
    }

    fn examine(&mut self) -> MergeState {
        match (self.left.peek().is_some(), self.right.peek().is_some()) {
            (true, true) => MergeState::Advancing,
            (false, true) if self.drain.right => MergeState::ExhaustedLeft,
            (true, false) if self.drain.left => MergeState::ExhaustedRight,
            _ => MergeState::Done,
        }
    }

    fn compare(&mut self) -> Option<Step> {
        let left = self.left.peek()?.0;
        let right = self.right.peek()?.0;

        let step = match left.cmp(&right) {
            Ordering::Equal => {
                let (coord, lhs) = self.left.next()?;
                let (_, rhs) = self.right.next()?;
                Step::Both(coord, lhs, rhs)
            }
            Ordering::Less => {
                let (coord, lhs) = self.left.next()?;
                Step::Left(coord, lhs)
            }
            Ordering::Greater => {
                let (coord, rhs) = self.right.next()?;
                Step::Right(coord, rhs)
            }
        };
        Some(step)
    }
}

impl Iterator for MergeCursor<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.state == MergeState::Done {
            return None;
        }
        self.state = self.examine();

        let step = match self.state {
            MergeState::Advancing => self.compare(),
            MergeState::ExhaustedRight => self
                .left
                .next()
                .map(|(coord, payload)| Step::Left(coord, payload)),
            MergeState::ExhaustedLeft => self
                .right
                .next()
                .map(|(coord, payload)| Step::Right(coord, payload)),
            MergeState::Emitting | MergeState::Done => None,
        };

        match step {
            Some(step) => {
                self.state = MergeState::Emitting;
                Some(step)
            }
            None => {
                self.state = MergeState::Done;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(coords: &[Coord]) -> Elements<'static> {
        let elements: Vec<_> = coords
            .iter()
            .map(|coord| (*coord, Payload::Value(*coord as f64)))
            .collect();
        Box::new(elements.into_iter())
    }

    fn coords(cursor: MergeCursor<'_>) -> Vec<(char, Coord)> {
        cursor
            .map(|step| match step {
                Step::Both(coord, _, _) => ('=', coord),
                Step::Left(coord, _) => ('<', coord),
                Step::Right(coord, _) => ('>', coord),
            })
            .collect()
    }

    #[test]
    fn sweeps_by_three_way_comparison() {
        let cursor = MergeCursor::new(side(&[0, 2, 3]), side(&[1, 2, 5]), DrainPolicy::BOTH);

        assert_eq!(
            coords(cursor),
            vec![('<', 0), ('>', 1), ('=', 2), ('<', 3), ('>', 5)]
        );
    }

    #[test]
    fn stops_at_first_exhaustion_without_drain() {
        let cursor = MergeCursor::new(side(&[0, 2, 3]), side(&[2]), DrainPolicy::NONE);

        assert_eq!(coords(cursor), vec![('<', 0), ('=', 2)]);
    }

    #[test]
    fn left_drain_never_reads_right_remainder() {
        let cursor = MergeCursor::new(side(&[1]), side(&[0, 4, 5]), DrainPolicy::LEFT);
        assert_eq!(coords(cursor), vec![('>', 0), ('<', 1)]);

        let cursor = MergeCursor::new(side(&[4, 6]), side(&[0]), DrainPolicy::LEFT);
        assert_eq!(coords(cursor), vec![('>', 0), ('<', 4), ('<', 6)]);
    }

    #[test]
    fn state_follows_the_sweep() {
        let mut cursor = MergeCursor::new(side(&[0]), side(&[0, 1]), DrainPolicy::BOTH);
        assert_eq!(cursor.state(), MergeState::Advancing);

        cursor.next();
        assert_eq!(cursor.state(), MergeState::Emitting);

        assert_eq!(cursor.next(), Some(Step::Right(1, Payload::Value(1.0))));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.state(), MergeState::Done);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn empty_sides_are_done_immediately() {
        let mut cursor = MergeCursor::new(side(&[]), side(&[]), DrainPolicy::BOTH);

        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.state(), MergeState::Done);
    }
}
