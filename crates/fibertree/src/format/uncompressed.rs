use super::base::{join, leaf_value};
use super::{FiberFormat, FormatCore, FormatKind, FormatPayload, Handle, Insertion, Occupancy};
use crate::codec::{EncodeContext, EncodedPayload};
use crate::fiber::{Coord, Fiber};
use core::fmt::Display;

/// Occupancy a dense fiber reports to its parent, whatever it holds.
///
/// A dense child takes exactly one slot in its parent's running count since parents address
/// dense children by fiber index.
pub const DENSE_FIBER_OCCUPANCY: usize = 1;

/// "U" layout: one payload per coordinate of the extent, with implicit coordinates.
#[derive(Debug)]
pub struct Uncompressed {
    core: FormatCore,
    shape: usize,
}

impl Uncompressed {
    /// Creates an empty fiber.
    pub fn new(core: FormatCore) -> Self {
        Self { core, shape: 0 }
    }

    /// Declared extent.
    pub fn shape(&self) -> usize {
        self.shape
    }

    fn encode_leaf(&mut self, source: &Fiber, ctx: &mut EncodeContext<'_>) {
        let depth = self.core.depth;
        let kind = self.kind();
        let mut prev = 0;

        for (coord, payload) in source.iter_occupancy(false) {
            assert!(
                coord < self.shape,
                "Coordinate {coord} is outside the extent {} of {}",
                self.shape,
                self.core.name
            );

            for value in kind.encode_payload(prev, coord, leaf_value(payload)) {
                ctx.push_payload(depth, EncodedPayload::Value(value));
                self.core.payloads.push(FormatPayload::Value(value));
            }
            prev = coord + 1;
        }

        for value in kind.end_payloads(self.shape - prev) {
            ctx.push_payload(depth, EncodedPayload::Value(value));
            self.core.payloads.push(FormatPayload::Value(value));
        }
    }
}

impl FiberFormat for Uncompressed {
    fn kind(&self) -> FormatKind {
        FormatKind::Uncompressed
    }

    fn core(&self) -> &FormatCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FormatCore {
        &mut self.core
    }

    fn encode_fiber(
        &mut self,
        source: &Fiber,
        extent: usize,
        ctx: &mut EncodeContext<'_>,
    ) -> Occupancy {
        let depth = self.core.depth;
        self.shape = extent;
        self.core.occupancy_so_far = ctx.next_rank_len(depth);

        let Some(next) = self.core.next else {
            self.encode_leaf(source, ctx);
            return Occupancy::Count(DENSE_FIBER_OCCUPANCY);
        };

        if !next.encodes_upper_payload() {
            self.core.count_payload_reads = false;
        }

        let mut cumulative = ctx.start_occupancy(depth);
        for coord in 0..extent {
            let (child, child_occupancy) =
                ctx.encode_child(depth + 1, source.payload_or_default(coord));
            self.core.payloads.push(FormatPayload::Fiber(child));
            cumulative = cumulative.accumulate(&child_occupancy);

            if next.encodes_upper_payload() {
                let occupancy = ctx.select_occupancy(depth, &cumulative, &child_occupancy);
                ctx.push_payload(depth, EncodedPayload::Occupancy(occupancy.clone()));
                self.core.occupancies.push(occupancy);
            }
        }

        Occupancy::Count(DENSE_FIBER_OCCUPANCY)
    }

    fn slice_max_length(&self) -> usize {
        self.shape
    }

    fn coord_to_handle(&mut self, coord: Coord) -> Option<Handle> {
        (coord < self.shape).then_some(coord)
    }

    fn handle_to_coord(&self, handle: Handle) -> Option<Coord> {
        (handle < self.shape).then_some(handle)
    }

    fn insert_element(&mut self, coord: Coord) -> Insertion {
        assert!(
            coord < self.shape,
            "Coordinate {coord} is outside the extent {} of {}",
            self.shape,
            self.core.name
        );

        Insertion::new(coord, false)
    }

    fn update_payload(&mut self, handle: Option<Handle>, payload: FormatPayload) -> Option<Handle> {
        let handle = handle?;
        assert!(
            handle < self.shape,
            "Handle {handle} is outside the extent {} of {}",
            self.shape,
            self.core.name
        );

        self.core.stats.payloads_write += 1;
        self.core.payloads[handle] = payload;
        Some(handle)
    }

    fn handle_to_payload(&self, handle: Handle) -> Handle {
        if self.core.stores_child_ids() {
            handle
        } else {
            self.core.occupancy_so_far + handle
        }
    }

    fn size(&self) -> usize {
        let nested = matches!(self.core.payloads.first(), Some(FormatPayload::Fiber(_)));

        if nested {
            self.core.occupancies.len()
        } else {
            self.core.occupancies.len() + self.core.payloads.len()
        }
    }

    fn updated_fiber_handle(&self) -> usize {
        self.shape
    }
}

impl Display for Uncompressed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} :: occupancies {}, payloads {}",
            self.core.name,
            join(&self.core.occupancies),
            join(&self.core.payloads)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AccessCache;
    use crate::format::FiberId;

    fn dense(values: &[f64]) -> Uncompressed {
        let cache = AccessCache::shared(32).unwrap();
        let mut fiber = Uncompressed::new(FormatCore::new("A_K_0".into(), 0, None, cache));
        fiber.shape = values.len();
        fiber.core.payloads = values.iter().map(|v| FormatPayload::Value(*v)).collect();
        fiber
    }

    #[test]
    fn lookup_is_identity_within_extent() {
        let mut fiber = dense(&[1.0, 0.0, 3.0]);

        assert_eq!(fiber.coord_to_handle(2), Some(2));
        assert_eq!(fiber.coord_to_handle(3), None);
        assert_eq!(fiber.stats().coords_read, 0);
    }

    #[test]
    fn insertion_never_moves_data() {
        let mut fiber = dense(&[1.0, 0.0, 3.0]);

        assert_eq!(fiber.insert_element(1), Insertion::new(1, false));
        assert_eq!(fiber.stats().coords_write, 0);
    }

    #[test]
    #[should_panic = "outside the extent"]
    fn insertion_outside_extent_panics() {
        dense(&[1.0]).insert_element(1);
    }

    #[test]
    fn update_charges_one_write() {
        let mut fiber = dense(&[1.0, 0.0, 3.0]);

        fiber.update_payload(Some(1), FormatPayload::Value(2.0));

        assert_eq!(fiber.core().payloads()[1], FormatPayload::Value(2.0));
        assert_eq!(fiber.stats().payloads_write, 1);
        assert_eq!(fiber.payload(1), Some(FormatPayload::Value(2.0)));
        assert_eq!(fiber.stats().payloads_read, 1);
    }

    #[test]
    fn size_excludes_nested_payloads() {
        let mut fiber = dense(&[1.0, 0.0, 3.0]);
        assert_eq!(fiber.size(), 3);

        fiber.core.payloads = vec![
            FormatPayload::Fiber(FiberId::new(1, 0)),
            FormatPayload::Fiber(FiberId::new(1, 1)),
        ];
        fiber.core.occupancies = vec![Occupancy::Count(1), Occupancy::Count(2)];

        assert_eq!(fiber.size(), 2);
    }
}
