use super::{CoordinateList, FormatKind, Uncompressed};
use crate::cache::{CacheKey, CacheOp, SharedCache};
use crate::codec::EncodeContext;
use crate::fiber::{Coord, Fiber, Payload};
use crate::stats::AccessStats;
use core::fmt::Display;
use serde::{Deserialize, Serialize};

/// Format specific access token for a position in a fiber.
pub type Handle = usize;

/// Position of a format fiber in an encoded tensor: its rank depth and its index in the rank.
#[derive(new, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiberId {
    /// Depth of the rank, zero for the outermost.
    pub depth: usize,
    /// Index of the fiber among the fibers of its rank, left to right.
    pub index: usize,
}

impl Display for FiberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}.{}", self.depth, self.index)
    }
}

/// Outcome of [insert_element](FiberFormat::insert_element).
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// Handle of the element holding the coordinate.
    pub handle: Handle,
    /// Whether the element was created by the call.
    pub created: bool,
}

/// Number of entries in a fiber or subtree.
///
/// Ranks whose children need several counters accumulate into [lanes](Occupancy::Lanes) that
/// are summed pairwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Occupancy {
    /// A single counter.
    Count(usize),
    /// Fixed width counters.
    Lanes(Vec<usize>),
}

impl Occupancy {
    /// Zero accumulator for children with the given occupancy width.
    pub fn zero(width: usize) -> Self {
        if width <= 1 {
            Occupancy::Count(0)
        } else {
            Occupancy::Lanes(vec![0; width])
        }
    }

    /// Width of the accumulator.
    pub fn width(&self) -> usize {
        match self {
            Occupancy::Count(_) => 1,
            Occupancy::Lanes(lanes) => lanes.len(),
        }
    }

    /// Adds `other` to this accumulator.
    pub fn accumulate(&self, other: &Occupancy) -> Occupancy {
        match (self, other) {
            (Occupancy::Count(lhs), Occupancy::Count(rhs)) => Occupancy::Count(lhs + rhs),
            (Occupancy::Lanes(lhs), Occupancy::Lanes(rhs)) if lhs.len() == rhs.len() => {
                Occupancy::Lanes(lhs.iter().zip(rhs.iter()).map(|(a, b)| a + b).collect())
            }
            _ => panic!(
                "Cannot accumulate occupancy of width {} into width {}",
                other.width(),
                self.width()
            ),
        }
    }

    /// The single counter, if this is one.
    pub fn count(&self) -> Option<usize> {
        match self {
            Occupancy::Count(count) => Some(*count),
            Occupancy::Lanes(_) => None,
        }
    }
}

impl Display for Occupancy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Occupancy::Count(count) => write!(f, "{count}"),
            Occupancy::Lanes(lanes) => write!(f, "{lanes:?}"),
        }
    }
}

/// Payload held by a format fiber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatPayload {
    /// Placeholder for a child that has not been allocated yet.
    Empty,
    /// Scalar of the leaf rank.
    Value(f64),
    /// Child fiber in the next rank.
    Fiber(FiberId),
}

impl FormatPayload {
    /// The scalar, if this is one.
    pub fn value(&self) -> Option<f64> {
        match self {
            FormatPayload::Value(value) => Some(*value),
            _ => None,
        }
    }

    /// The child fiber, if this is one.
    pub fn fiber(&self) -> Option<FiberId> {
        match self {
            FormatPayload::Fiber(id) => Some(*id),
            _ => None,
        }
    }
}

impl Display for FormatPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FormatPayload::Empty => f.write_str("_"),
            FormatPayload::Value(value) => write!(f, "{value}"),
            FormatPayload::Fiber(id) => write!(f, "{id}"),
        }
    }
}

/// State shared by every format.
#[derive(new, Debug)]
pub struct FormatCore {
    pub(crate) name: String,
    pub(crate) depth: usize,
    pub(crate) next: Option<FormatKind>,
    pub(crate) cache: SharedCache,
    #[new(default)]
    pub(crate) occupancies: Vec<Occupancy>,
    #[new(default)]
    pub(crate) payloads: Vec<FormatPayload>,
    #[new(default)]
    pub(crate) stats: AccessStats,
    // Index of this fiber's first child in the next rank.
    #[new(default)]
    pub(crate) occupancy_so_far: usize,
    // Bumped on every structural change; memoized lookups are keyed by it.
    #[new(default)]
    pub(crate) version: u64,
    #[new(value = "true")]
    pub(crate) count_payload_reads: bool,
}

impl FormatCore {
    /// Name of the fiber, `"{tensor}_{rank}_{index}"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Depth of the rank.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Format of the next rank, `None` at the leaf.
    pub fn next(&self) -> Option<FormatKind> {
        self.next
    }

    /// Whether this fiber belongs to the leaf rank.
    pub fn is_leaf(&self) -> bool {
        self.next.is_none()
    }

    /// Whether payloads reference child fibers by id rather than by position.
    pub fn stores_child_ids(&self) -> bool {
        self.next
            .map(|next| next.encodes_upper_payload())
            .unwrap_or(true)
    }

    /// Occupancy recorded for each child.
    pub fn occupancies(&self) -> &[Occupancy] {
        &self.occupancies
    }

    /// Stored payloads.
    pub fn payloads(&self) -> &[FormatPayload] {
        &self.payloads
    }

    /// Simulated traffic so far.
    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    /// Index of this fiber's first child in the next rank.
    pub fn occupancy_so_far(&self) -> usize {
        self.occupancy_so_far
    }

    /// Whether payload reads are charged.
    pub fn counts_payload_reads(&self) -> bool {
        self.count_payload_reads
    }

    /// Payload inserted for a new element before it is updated.
    pub(crate) fn default_payload(&self) -> FormatPayload {
        match self.next {
            None => FormatPayload::Value(0.0),
            Some(_) => FormatPayload::Empty,
        }
    }

    /// Reads and refreshes the cached coordinate at a position.
    pub(crate) fn touch_coord(&self, position: usize, coord: Coord) {
        let key = CacheKey::new(self.name.clone(), CacheOp::HandleToCoord, position);
        self.cache.borrow_mut().access(key, coord);
    }

    pub(crate) fn lookup_key(&self, coord: Coord) -> CacheKey {
        CacheKey::new(
            self.name.clone(),
            CacheOp::CoordToHandle {
                version: self.version,
            },
            coord,
        )
    }
}

/// Handle based access to one rank's fiber in a concrete layout.
pub trait FiberFormat: Display {
    /// The layout.
    fn kind(&self) -> FormatKind;

    /// Shared state.
    fn core(&self) -> &FormatCore;

    /// Shared state, mutably.
    fn core_mut(&mut self) -> &mut FormatCore;

    /// Encodes `source` into this fiber, recursing into children through `ctx`.
    ///
    /// Returns the occupancy the parent rank accumulates for this fiber.
    fn encode_fiber(&mut self, source: &Fiber, extent: usize, ctx: &mut EncodeContext<'_>)
        -> Occupancy;

    /// Upper bound of the addressable handles.
    fn slice_max_length(&self) -> usize;

    /// Handle of `coord`, or where it would be inserted; `None` when it is out of reach.
    fn coord_to_handle(&mut self, coord: Coord) -> Option<Handle>;

    /// Coordinate stored at `handle`.
    fn handle_to_coord(&self, handle: Handle) -> Option<Coord>;

    /// Makes room for `coord` unless it is already present.
    fn insert_element(&mut self, coord: Coord) -> Insertion;

    /// Writes `payload` at `handle`. An absent handle is passed through.
    fn update_payload(&mut self, handle: Option<Handle>, payload: FormatPayload) -> Option<Handle>;

    /// Size of the representation in words.
    fn size(&self) -> usize;

    /// Occupancy reported to the parent after in place updates.
    fn updated_fiber_handle(&self) -> usize;

    /// Translates a handle into payload space.
    fn handle_to_payload(&self, handle: Handle) -> Handle {
        handle
    }

    /// Translates a payload into a fiber index of the next rank.
    fn payload_to_fiber_handle(&self, payload: Handle) -> Handle {
        payload
    }

    /// Reads the payload at `handle`.
    fn payload(&mut self, handle: Handle) -> Option<FormatPayload> {
        let core = self.core_mut();
        let payload = core.payloads.get(handle).copied();

        if payload.is_some() && core.count_payload_reads {
            core.stats.payloads_read += 1;
        }
        payload
    }

    /// Child fiber reached through `handle`.
    fn child(&mut self, handle: Handle) -> Option<FiberId> {
        if self.core().stores_child_ids() {
            return self.payload(handle).and_then(|payload| payload.fiber());
        }

        let depth = self.core().depth;
        let slot = self.payload_to_fiber_handle(self.handle_to_payload(handle));
        Some(FiberId::new(depth + 1, slot))
    }

    /// Name of the fiber.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Simulated traffic so far.
    fn stats(&self) -> AccessStats {
        self.core().stats()
    }
}

pub(crate) fn leaf_value(payload: &Payload) -> f64 {
    match payload {
        Payload::Empty => 0.0,
        Payload::Value(value) => *value,
        other => panic!("Leaf rank payloads must be scalars, got {other:?}"),
    }
}

pub(crate) fn join<T: Display>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// A format fiber of any layout.
#[derive(Debug)]
pub enum FormatFiber {
    /// "C" layout.
    CoordinateList(CoordinateList),
    /// "U" layout.
    Uncompressed(Uncompressed),
}

macro_rules! dispatch {
    ($self:ident, $fiber:ident => $body:expr) => {
        match $self {
            FormatFiber::CoordinateList($fiber) => $body,
            FormatFiber::Uncompressed($fiber) => $body,
        }
    };
}

impl FormatFiber {
    /// Creates an empty fiber of the given layout.
    pub fn new(kind: FormatKind, core: FormatCore) -> Self {
        match kind {
            FormatKind::CoordinateList => FormatFiber::CoordinateList(CoordinateList::new(core)),
            FormatKind::Uncompressed => FormatFiber::Uncompressed(Uncompressed::new(core)),
        }
    }
}

impl FiberFormat for FormatFiber {
    fn kind(&self) -> FormatKind {
        dispatch!(self, fiber => fiber.kind())
    }

    fn core(&self) -> &FormatCore {
        dispatch!(self, fiber => fiber.core())
    }

    fn core_mut(&mut self) -> &mut FormatCore {
        dispatch!(self, fiber => fiber.core_mut())
    }

    fn encode_fiber(
        &mut self,
        source: &Fiber,
        extent: usize,
        ctx: &mut EncodeContext<'_>,
    ) -> Occupancy {
        dispatch!(self, fiber => fiber.encode_fiber(source, extent, ctx))
    }

    fn slice_max_length(&self) -> usize {
        dispatch!(self, fiber => fiber.slice_max_length())
    }

    fn coord_to_handle(&mut self, coord: Coord) -> Option<Handle> {
        dispatch!(self, fiber => fiber.coord_to_handle(coord))
    }

    fn handle_to_coord(&self, handle: Handle) -> Option<Coord> {
        dispatch!(self, fiber => fiber.handle_to_coord(handle))
    }

    fn insert_element(&mut self, coord: Coord) -> Insertion {
        dispatch!(self, fiber => fiber.insert_element(coord))
    }

    fn update_payload(&mut self, handle: Option<Handle>, payload: FormatPayload) -> Option<Handle> {
        dispatch!(self, fiber => fiber.update_payload(handle, payload))
    }

    fn size(&self) -> usize {
        dispatch!(self, fiber => fiber.size())
    }

    fn updated_fiber_handle(&self) -> usize {
        dispatch!(self, fiber => fiber.updated_fiber_handle())
    }

    fn handle_to_payload(&self, handle: Handle) -> Handle {
        dispatch!(self, fiber => fiber.handle_to_payload(handle))
    }

    fn payload_to_fiber_handle(&self, payload: Handle) -> Handle {
        dispatch!(self, fiber => fiber.payload_to_fiber_handle(payload))
    }
}

impl Display for FormatFiber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        dispatch!(self, fiber => Display::fmt(fiber, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_occupancy_accumulates() {
        let total = Occupancy::zero(1).accumulate(&Occupancy::Count(3));

        assert_eq!(total, Occupancy::Count(3));
        assert_eq!(total.count(), Some(3));
    }

    #[test]
    fn lanes_accumulate_pairwise() {
        let total = Occupancy::zero(2)
            .accumulate(&Occupancy::Lanes(vec![1, 2]))
            .accumulate(&Occupancy::Lanes(vec![3, 4]));

        assert_eq!(total, Occupancy::Lanes(vec![4, 6]));
        assert_eq!(total.to_string(), "[4, 6]");
    }

    #[test]
    #[should_panic = "Cannot accumulate"]
    fn width_mismatch_panics() {
        Occupancy::zero(2).accumulate(&Occupancy::Count(1));
    }

    #[test]
    fn leaf_value_treats_empty_as_zero() {
        assert_eq!(leaf_value(&Payload::Empty), 0.0);
        assert_eq!(leaf_value(&Payload::Value(2.5)), 2.5);
    }
}
