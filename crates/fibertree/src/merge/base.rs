use super::LazyFiber;
use crate::fiber::{Coord, Fiber, Payload};

/// Owned elements produced by one traversal of a merge operand.
pub type Elements<'s> = Box<dyn Iterator<Item = (Coord, Payload)> + 's>;

/// Something a merge can walk over: a stored fiber or the lazy result of another merge.
pub trait Traverse {
    /// Starts a fresh traversal of the non-empty elements.
    ///
    /// With `tick` set, the traversal is recorded against the rank while metrics are collected.
    fn elements(&self, tick: bool) -> Elements<'_>;

    /// The rank id, if any.
    fn rank_id(&self) -> Option<&str>;

    /// The payload reported for absent coordinates.
    fn default_payload(&self) -> &Payload;

    /// The active range `[start, end)`.
    fn active(&self) -> (Coord, Coord);

    /// Panics unless the elements come out strictly increasing.
    fn check_ordered(&self) {}
}

impl Traverse for Fiber {
    fn elements(&self, tick: bool) -> Elements<'_> {
        Box::new(
            self.iter_tick(tick)
                .map(|(coord, payload)| (coord, payload.clone())),
        )
    }

    fn rank_id(&self) -> Option<&str> {
        Fiber::rank_id(self)
    }

    fn default_payload(&self) -> &Payload {
        Fiber::default_payload(self)
    }

    fn active(&self) -> (Coord, Coord) {
        Fiber::active(self)
    }

    fn check_ordered(&self) {
        self.assert_ordered_unique();
    }
}

/// Operand of a merge, owned by the merge for as long as its result lives.
pub enum Operand<'a> {
    /// A borrowed fiber.
    Fiber(&'a Fiber),
    /// The result of another merge.
    Lazy(Box<LazyFiber<'a>>),
}

impl<'a> From<&'a Fiber> for Operand<'a> {
    fn from(fiber: &'a Fiber) -> Self {
        Operand::Fiber(fiber)
    }
}

impl<'a> From<LazyFiber<'a>> for Operand<'a> {
    fn from(fiber: LazyFiber<'a>) -> Self {
        Operand::Lazy(Box::new(fiber))
    }
}

impl Traverse for Operand<'_> {
    fn elements(&self, tick: bool) -> Elements<'_> {
        match self {
            Operand::Fiber(fiber) => fiber.elements(tick),
            Operand::Lazy(fiber) => fiber.elements(tick),
        }
    }

    fn rank_id(&self) -> Option<&str> {
        match self {
            Operand::Fiber(fiber) => Fiber::rank_id(fiber),
            Operand::Lazy(fiber) => fiber.rank_id(),
        }
    }

    fn default_payload(&self) -> &Payload {
        match self {
            Operand::Fiber(fiber) => Fiber::default_payload(fiber),
            Operand::Lazy(fiber) => fiber.default_payload(),
        }
    }

    fn active(&self) -> (Coord, Coord) {
        match self {
            Operand::Fiber(fiber) => Fiber::active(fiber),
            Operand::Lazy(fiber) => fiber.active(),
        }
    }

    fn check_ordered(&self) {
        if let Operand::Fiber(fiber) = self {
            fiber.assert_ordered_unique();
        }
    }
}

impl core::fmt::Debug for Operand<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Operand::Fiber(fiber) => f.debug_tuple("Fiber").field(fiber).finish(),
            Operand::Lazy(fiber) => f.debug_tuple("Lazy").field(fiber).finish(),
        }
    }
}
