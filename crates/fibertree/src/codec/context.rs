use super::{CodecOutput, EncodedPayload};
use crate::cache::SharedCache;
use crate::config::OccupancyPolicy;
use crate::fiber::{Coord, Fiber, Payload};
use crate::format::{FiberFormat, FiberId, FormatCore, FormatDescriptor, FormatFiber, Occupancy};

/// Everything a format needs from the codec while one tensor is being encoded.
///
/// Formats never hold on to it past the [encode_fiber](FiberFormat::encode_fiber) call they
/// receive it in.
pub struct EncodeContext<'a> {
    tensor: &'a str,
    rank_ids: &'a [String],
    descriptor: &'a FormatDescriptor,
    policies: &'a [OccupancyPolicy],
    shape: &'a [usize],
    cache: &'a SharedCache,
    output: &'a mut CodecOutput,
    fibers: &'a mut [Vec<FormatFiber>],
}

impl<'a> EncodeContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tensor: &'a str,
        rank_ids: &'a [String],
        descriptor: &'a FormatDescriptor,
        policies: &'a [OccupancyPolicy],
        shape: &'a [usize],
        cache: &'a SharedCache,
        output: &'a mut CodecOutput,
        fibers: &'a mut [Vec<FormatFiber>],
    ) -> Self {
        Self {
            tensor,
            rank_ids,
            descriptor,
            policies,
            shape,
            cache,
            output,
            fibers,
        }
    }

    /// Encodes `source` as a new fiber of the rank at `depth`.
    ///
    /// The fiber is named `"{tensor}_{rank}_{index}"` and pushed to its rank once its children
    /// are encoded, so fibers of a rank are stored left to right.
    pub fn encode_rank(&mut self, depth: usize, source: &Fiber) -> (FiberId, Occupancy) {
        let kind = self.descriptor[depth];
        let index = self.fibers[depth].len();
        let name = format!("{}_{}_{}", self.tensor, self.rank_ids[depth], index);
        let extent = self.shape[depth];

        let core = FormatCore::new(
            name,
            depth,
            self.descriptor.next(depth),
            self.cache.clone(),
        );
        let mut fiber = FormatFiber::new(kind, core);
        let occupancy = fiber.encode_fiber(source, extent, self);

        log::trace!("Encoded {fiber}");
        self.fibers[depth].push(fiber);

        (FiberId::new(depth, index), occupancy)
    }

    /// Encodes the payload of a non-leaf element as a fiber of the rank at `depth`.
    ///
    /// Absent and empty payloads become empty fibers.
    pub fn encode_child(&mut self, depth: usize, payload: &Payload) -> (FiberId, Occupancy) {
        match payload {
            Payload::Fiber(child) => self.encode_rank(depth, child),
            other if other.is_empty() => self.encode_rank(depth, &Fiber::default()),
            other => panic!(
                "Rank {} expects fiber payloads, got {other:?}",
                self.rank_ids[depth - 1]
            ),
        }
    }

    /// Appends encoded coordinates of the rank at `depth`.
    pub fn push_coords(&mut self, depth: usize, coords: &[Coord]) {
        if coords.is_empty() {
            return;
        }
        self.output.extend_coords(&self.rank_ids[depth], coords);
    }

    /// Appends one encoded payload of the rank at `depth`.
    pub fn push_payload(&mut self, depth: usize, payload: EncodedPayload) {
        self.output.push_payload(&self.rank_ids[depth], payload);
    }

    /// Accumulator a fiber of the rank at `depth` starts from, sized for its children.
    pub fn start_occupancy(&self, depth: usize) -> Occupancy {
        let width = self
            .descriptor
            .next(depth)
            .map(|next| next.occupancy_width())
            .unwrap_or(1);

        Occupancy::zero(width)
    }

    /// Occupancy recorded for a child, following the policy of the rank at `depth`.
    pub fn select_occupancy(
        &self,
        depth: usize,
        cumulative: &Occupancy,
        child: &Occupancy,
    ) -> Occupancy {
        match self.policies[depth] {
            OccupancyPolicy::Cumulative => cumulative.clone(),
            OccupancyPolicy::PerFiber => child.clone(),
        }
    }

    /// Number of fibers encoded so far in the rank below `depth`.
    pub fn next_rank_len(&self, depth: usize) -> usize {
        self.fibers.get(depth + 1).map(Vec::len).unwrap_or(0)
    }
}
