use super::{Elements, Traverse};
use crate::fiber::{Coord, Fiber, Payload, Ticker};

/// Recipe for the elements of a lazy fiber.
///
/// Every call to [open](MergeNode::open) re-runs the recipe from the start.
pub trait MergeNode {
    /// Starts a fresh traversal.
    fn open(&self) -> Elements<'_>;
}

/// Result of a merge, computed on demand.
///
/// Traversing it twice runs the merge twice; [materialize](LazyFiber::materialize) keeps the
/// elements in an owned [Fiber].
pub struct LazyFiber<'a> {
    node: Box<dyn MergeNode + 'a>,
    rank_id: Option<String>,
    default: Payload,
    active: (Coord, Coord),
}

impl<'a> LazyFiber<'a> {
    pub(crate) fn new(
        node: impl MergeNode + 'a,
        rank_id: Option<&str>,
        default: Payload,
        active: (Coord, Coord),
    ) -> Self {
        Self {
            node: Box::new(node),
            rank_id: rank_id.map(str::to_string),
            default,
            active,
        }
    }

    /// Traverses the result, ticking the metrics counters of its rank.
    pub fn iter(&self) -> LazyIter<'_> {
        self.iter_tick(true)
    }

    /// Traverses the result.
    pub fn iter_tick(&self, tick: bool) -> LazyIter<'_> {
        LazyIter {
            inner: self.node.open(),
            pos: 0,
            ticker: Ticker::new(self.rank_id.as_deref(), tick),
        }
    }

    /// Runs the merge to completion into an owned fiber.
    pub fn materialize(&self) -> Fiber {
        let (coords, payloads) = self.iter_tick(false).unzip();

        let mut fiber = Fiber::new(coords, payloads)
            .with_default(self.default.clone())
            .with_active(self.active.0, self.active.1);
        fiber.set_rank_id(self.rank_id.clone());
        fiber
    }

    /// The rank id, inherited from the first operand.
    pub fn rank_id(&self) -> Option<&str> {
        self.rank_id.as_deref()
    }

    /// The payload reported for absent coordinates.
    pub fn default_payload(&self) -> &Payload {
        &self.default
    }

    /// The active range, inherited from the first operand.
    pub fn active(&self) -> (Coord, Coord) {
        self.active
    }
}

impl Traverse for LazyFiber<'_> {
    fn elements(&self, tick: bool) -> Elements<'_> {
        Box::new(self.iter_tick(tick))
    }

    fn rank_id(&self) -> Option<&str> {
        LazyFiber::rank_id(self)
    }

    fn default_payload(&self) -> &Payload {
        LazyFiber::default_payload(self)
    }

    fn active(&self) -> (Coord, Coord) {
        LazyFiber::active(self)
    }
}

impl core::fmt::Debug for LazyFiber<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LazyFiber")
            .field("rank_id", &self.rank_id)
            .field("default", &self.default)
            .field("active", &self.active)
            .finish()
    }
}

impl<'s> IntoIterator for &'s LazyFiber<'_> {
    type Item = (Coord, Payload);
    type IntoIter = LazyIter<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One traversal of a [LazyFiber].
pub struct LazyIter<'s> {
    inner: Elements<'s>,
    pos: usize,
    ticker: Ticker,
}

impl Iterator for LazyIter<'_> {
    type Item = (Coord, Payload);

    fn next(&mut self) -> Option<Self::Item> {
        self.ticker.settle();

        for (coord, payload) in self.inner.by_ref() {
            let pos = self.pos;
            self.pos += 1;

            if payload.is_empty() {
                continue;
            }

            self.ticker.emit(coord, Some(pos));
            return Some((coord, payload));
        }

        self.ticker.finish();
        None
    }
}
