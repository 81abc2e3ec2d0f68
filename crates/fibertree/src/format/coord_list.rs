use super::base::{join, leaf_value};
use super::{FiberFormat, FormatCore, FormatKind, FormatPayload, Handle, Insertion, Occupancy};
use crate::codec::{EncodeContext, EncodedPayload};
use crate::fiber::{Coord, Fiber};
use core::fmt::Display;

/// "C" layout: explicit, strictly increasing coordinates next to their payloads.
///
/// Lookups binary search the coordinates, charging one coordinate read per comparison and
/// refreshing the shared cache with every visited position.
#[derive(Debug)]
pub struct CoordinateList {
    core: FormatCore,
    coords: Vec<Coord>,
}

impl CoordinateList {
    /// Creates an empty fiber.
    pub fn new(core: FormatCore) -> Self {
        Self {
            core,
            coords: Vec::new(),
        }
    }

    /// Stored coordinates.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    fn read_coord(&mut self, position: usize) -> Coord {
        let coord = self.coords[position];
        self.core.stats.coords_read += 1;
        self.core.touch_coord(position, coord);
        coord
    }

    fn binary_search(&mut self, coord: Coord) -> Handle {
        let mut lo = 0;
        let mut hi = self.coords.len() - 1;
        let mut mid = 0;

        while lo <= hi {
            // Rounds up so that `hi` never moves below the first position.
            mid = (lo + hi).div_ceil(2);
            let visited = self.read_coord(mid);

            match visited.cmp(&coord) {
                core::cmp::Ordering::Equal => return mid,
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid - 1,
            }
        }

        if coord > self.coords[mid] {
            mid += 1;
        }
        mid
    }
}

impl FiberFormat for CoordinateList {
    fn kind(&self) -> FormatKind {
        FormatKind::CoordinateList
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
        _extent: usize,
        ctx: &mut EncodeContext<'_>,
    ) -> Occupancy {
        let depth = self.core.depth;
        let kind = self.kind();
        self.core.occupancy_so_far = ctx.next_rank_len(depth);

        let mut fiber_occupancy = 0;
        let mut cumulative = ctx.start_occupancy(depth);
        let mut prev = 0;

        for (coord, payload) in source.iter_occupancy(false) {
            let coords = kind.encode_coord(prev, coord);
            ctx.push_coords(depth, &coords);
            self.coords.extend(coords);
            fiber_occupancy += 1;

            match self.core.next {
                None => {
                    let value = leaf_value(payload);
                    for value in kind.encode_payload(prev, coord, value) {
                        ctx.push_payload(depth, EncodedPayload::Value(value));
                        self.core.payloads.push(FormatPayload::Value(value));
                    }
                }
                Some(next) => {
                    let (child, child_occupancy) = ctx.encode_child(depth + 1, payload);
                    cumulative = cumulative.accumulate(&child_occupancy);

                    if next.encodes_upper_payload() {
                        let occupancy = ctx.select_occupancy(depth, &cumulative, &child_occupancy);
                        ctx.push_payload(depth, EncodedPayload::Occupancy(occupancy.clone()));
                        self.core.occupancies.push(occupancy);
                        self.core.payloads.push(FormatPayload::Fiber(child));
                    }
                }
            }

            prev = coord + 1;
        }

        Occupancy::Count(fiber_occupancy)
    }

    fn slice_max_length(&self) -> usize {
        self.coords.len()
    }

    fn coord_to_handle(&mut self, coord: Coord) -> Option<Handle> {
        let last_pos = self.coords.len().checked_sub(1)?;
        let last = self.coords[last_pos];

        if coord > last {
            self.read_coord(last_pos);
            return None;
        }
        if coord <= self.coords[0] {
            self.read_coord(0);
            return Some(0);
        }

        let key = self.core.lookup_key(coord);
        if let Some(handle) = self.core.cache.borrow_mut().get(&key) {
            return Some(handle);
        }

        let handle = self.binary_search(coord);
        self.core.cache.borrow_mut().put(key, handle);

        Some(handle)
    }

    fn handle_to_coord(&self, handle: Handle) -> Option<Coord> {
        self.coords.get(handle).copied()
    }

    fn insert_element(&mut self, coord: Coord) -> Insertion {
        let stores_payloads = self.core.stores_child_ids();
        let default = self.core.default_payload();

        let insertion = match self.coord_to_handle(coord) {
            Some(handle) if self.coords[handle] == coord => return Insertion::new(handle, false),
            Some(handle) => {
                let shifted = self.coords.len() - handle;
                self.coords.insert(handle, coord);
                if stores_payloads {
                    self.core.payloads.insert(handle, default);
                }
                self.core.stats.coords_write += shifted;

                Insertion::new(handle, true)
            }
            None => {
                self.coords.push(coord);
                if stores_payloads {
                    self.core.payloads.push(default);
                }
                self.core.stats.coords_write += 1;

                Insertion::new(self.coords.len() - 1, true)
            }
        };

        self.core.version += 1;
        insertion
    }

    fn update_payload(&mut self, handle: Option<Handle>, payload: FormatPayload) -> Option<Handle> {
        let handle = handle?;
        assert!(
            handle < self.core.payloads.len(),
            "Handle {handle} is out of bounds for {} with {} payloads",
            self.core.name,
            self.core.payloads.len()
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
        self.coords.len() + self.core.occupancies.len() + self.core.payloads.len()
    }

    fn updated_fiber_handle(&self) -> usize {
        self.coords.len()
    }
}

impl Display for CoordinateList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} :: coords: {:?}, occupancies: {}, payloads: {}",
            self.core.name,
            self.coords,
            join(&self.core.occupancies),
            join(&self.core.payloads)
        )
    }
}
