use super::{Coord, Fiber, Payload};
use crate::format::FormatKind;
use fibertree_metrics::{Metrics, ITER_TRACE};

/// Ticks the metrics counters of one rank while it is traversed.
///
/// The iteration counter is incremented when the consumer comes back for the next element,
/// not when an element is handed out.
#[derive(Debug)]
pub(crate) struct Ticker {
    rank: Option<String>,
    pending: bool,
    finished: bool,
}

impl Ticker {
    pub(crate) fn new(rank_id: Option<&str>, tick: bool) -> Self {
        let rank = match rank_id {
            Some(rank) if tick && Metrics::is_collecting() => {
                Metrics::register_rank(rank);
                Some(rank.to_string())
            }
            _ => None,
        };

        Self {
            rank,
            pending: false,
            finished: false,
        }
    }

    pub(crate) fn settle(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;

        if let Some(rank) = &self.rank {
            Metrics::inc_iter(rank);
        }
    }

    pub(crate) fn emit(&mut self, coord: Coord, pos: Option<usize>) {
        if let Some(rank) = &self.rank {
            if let Some(pos) = pos {
                Metrics::add_use(rank, coord, pos, ITER_TRACE);
            }
            self.pending = true;
        }
    }

    pub(crate) fn finish(&mut self) {
        self.settle();
        if self.finished {
            return;
        }
        self.finished = true;

        if let Some(rank) = &self.rank {
            Metrics::end_iter(rank);
        }
    }
}

/// Iterates over the non-empty elements of a fiber, optionally within `[start, end)`.
#[derive(Debug)]
pub struct FiberIter<'a> {
    fiber: &'a Fiber,
    pos: usize,
    end: Option<Coord>,
    ticker: Ticker,
}

impl<'a> Iterator for FiberIter<'a> {
    type Item = (Coord, &'a Payload);

    fn next(&mut self) -> Option<Self::Item> {
        let fiber = self.fiber;
        self.ticker.settle();

        while self.pos < fiber.len() {
            let pos = self.pos;
            let coord = fiber.coords()[pos];
            self.pos += 1;

            if matches!(self.end, Some(end) if coord >= end) {
                self.pos = fiber.len();
                break;
            }

            let payload = &fiber.payloads()[pos];
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

/// Iterates over every coordinate of `[start, end)`, reporting defaults for absent ones.
#[derive(Debug)]
pub struct ShapeIter<'a> {
    fiber: &'a Fiber,
    next: Coord,
    end: Coord,
    step: usize,
    ticker: Ticker,
}

impl<'a> Iterator for ShapeIter<'a> {
    type Item = (Coord, &'a Payload);

    fn next(&mut self) -> Option<Self::Item> {
        let fiber = self.fiber;
        self.ticker.settle();

        if self.next >= self.end {
            self.ticker.finish();
            return None;
        }

        let coord = self.next;
        self.next += self.step;
        self.ticker.emit(coord, None);

        Some((coord, fiber.payload_or_default(coord)))
    }
}

/// Iteration picked from the fiber's format: occupancy for "C", full shape for "U".
#[derive(Debug)]
pub enum FiberElements<'a> {
    /// Non-empty elements only.
    Occupancy(FiberIter<'a>),
    /// Every coordinate of the shape.
    Shape(ShapeIter<'a>),
}

impl<'a> Iterator for FiberElements<'a> {
    type Item = (Coord, &'a Payload);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FiberElements::Occupancy(iter) => iter.next(),
            FiberElements::Shape(iter) => iter.next(),
        }
    }
}

/// Iterates over every coordinate of a range, inserting default elements for absent ones.
///
/// Each call to [next_element](IterShapeRef::next_element) hands out a mutable payload, so
/// this is not an [Iterator].
#[derive(Debug)]
pub struct IterShapeRef<'a> {
    fiber: &'a mut Fiber,
    next: Coord,
    end: Coord,
    step: usize,
    ticker: Ticker,
}

impl IterShapeRef<'_> {
    /// Advances to the next coordinate of the range.
    pub fn next_element(&mut self) -> Option<(Coord, &mut Payload)> {
        self.ticker.settle();

        if self.next >= self.end {
            self.ticker.finish();
            return None;
        }

        let coord = self.next;
        self.next += self.step;
        self.ticker.emit(coord, None);

        Some((coord, self.fiber.payload_ref(coord)))
    }
}

impl Fiber {
    /// Iterates according to the fiber's format, ticking the metrics counters.
    pub fn iter(&self) -> FiberElements<'_> {
        self.iter_tick(true)
    }

    /// Iterates according to the fiber's format.
    pub fn iter_tick(&self, tick: bool) -> FiberElements<'_> {
        match self.format() {
            FormatKind::CoordinateList => FiberElements::Occupancy(self.iter_occupancy(tick)),
            FormatKind::Uncompressed => FiberElements::Shape(self.iter_shape(tick)),
        }
    }

    /// Iterates over every non-empty element.
    pub fn iter_occupancy(&self, tick: bool) -> FiberIter<'_> {
        self.iter_range(None, None, tick)
    }

    /// Iterates over the non-empty elements within `[start, end)`; `None` leaves a side open.
    pub fn iter_range(
        &self,
        start: Option<Coord>,
        end: Option<Coord>,
        tick: bool,
    ) -> FiberIter<'_> {
        let pos = start
            .map(|start| self.position(start).unwrap_or_else(|pos| pos))
            .unwrap_or(0);

        FiberIter {
            fiber: self,
            pos,
            end,
            ticker: Ticker::new(self.rank_id(), tick),
        }
    }

    /// Iterates over the non-empty elements of the active range.
    pub fn iter_active(&self, tick: bool) -> FiberIter<'_> {
        let (start, end) = self.active();
        self.iter_range(Some(start), Some(end), tick)
    }

    /// Iterates over every coordinate of the shape.
    pub fn iter_shape(&self, tick: bool) -> ShapeIter<'_> {
        self.iter_range_shape(0, self.shape(), 1, tick)
    }

    /// Iterates over every `step`-th coordinate of `[start, end)`.
    pub fn iter_range_shape(
        &self,
        start: Coord,
        end: Coord,
        step: usize,
        tick: bool,
    ) -> ShapeIter<'_> {
        assert!(step > 0, "Shape iteration step must be positive");

        ShapeIter {
            fiber: self,
            next: start,
            end,
            step,
            ticker: Ticker::new(self.rank_id(), tick),
        }
    }

    /// Iterates over every coordinate of the active range.
    pub fn iter_active_shape(&self, tick: bool) -> ShapeIter<'_> {
        let (start, end) = self.active();
        self.iter_range_shape(start, end, 1, tick)
    }

    /// Iterates over every coordinate of the shape, creating absent elements.
    pub fn iter_shape_ref(&mut self, tick: bool) -> IterShapeRef<'_> {
        let end = self.shape();
        self.iter_range_shape_ref(0, end, 1, tick)
    }

    /// Iterates over every `step`-th coordinate of `[start, end)`, creating absent elements.
    pub fn iter_range_shape_ref(
        &mut self,
        start: Coord,
        end: Coord,
        step: usize,
        tick: bool,
    ) -> IterShapeRef<'_> {
        assert!(step > 0, "Shape iteration step must be positive");
        let ticker = Ticker::new(self.rank_id(), tick);

        IterShapeRef {
            fiber: self,
            next: start,
            end,
            step,
            ticker,
        }
    }

    /// Iterates over every coordinate of the active range, creating absent elements.
    pub fn iter_active_shape_ref(&mut self, tick: bool) -> IterShapeRef<'_> {
        let (start, end) = self.active();
        self.iter_range_shape_ref(start, end, 1, tick)
    }

    /// Stored elements from last to first.
    pub fn reversed(&self) -> impl Iterator<Item = (Coord, &Payload)> + '_ {
        self.coords()
            .iter()
            .rev()
            .copied()
            .zip(self.payloads().iter().rev())
    }
}

impl<'a> IntoIterator for &'a Fiber {
    type Item = (Coord, &'a Payload);
    type IntoIter = FiberElements<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
