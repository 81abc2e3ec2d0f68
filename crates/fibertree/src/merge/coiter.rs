use super::{Elements, LazyFiber, MergeNode};
use crate::fiber::{Coord, Fiber, Payload, Ticker};

struct DenseZip<'a> {
    fibers: Vec<&'a Fiber>,
    start: Coord,
    end: Coord,
    step: usize,
}

impl MergeNode for DenseZip<'_> {
    fn open(&self) -> Elements<'_> {
        Box::new((self.start..self.end).step_by(self.step).map(move |coord| {
            let payloads = self
                .fibers
                .iter()
                .map(|fiber| fiber.payload_or_default(coord).clone())
                .collect();
            (coord, Payload::Tuple(payloads))
        }))
    }
}

/// Visits every coordinate of the first fiber's shape, pairing the payloads of all fibers.
pub fn coiter_shape<'a>(fibers: Vec<&'a Fiber>) -> LazyFiber<'a> {
    let end = first(&fibers).shape();
    coiter_range_shape(fibers, 0, end, 1)
}

/// Visits every coordinate of the first fiber's active range.
pub fn coiter_active_shape<'a>(fibers: Vec<&'a Fiber>) -> LazyFiber<'a> {
    let (start, end) = first(&fibers).active();
    coiter_range_shape(fibers, start, end, 1)
}

/// Visits every `step`-th coordinate of `[start, end)` with a tuple of the payloads of all
/// fibers, defaults standing in for absent ones.
pub fn coiter_range_shape<'a>(
    fibers: Vec<&'a Fiber>,
    start: Coord,
    end: Coord,
    step: usize,
) -> LazyFiber<'a> {
    assert!(step > 0, "Co-iteration step must be positive");
    let rank_id = first(&fibers).rank_id().map(str::to_string);
    let default = Payload::Tuple(
        fibers
            .iter()
            .map(|fiber| fiber.default_payload().clone())
            .collect(),
    );

    LazyFiber::new(
        DenseZip {
            fibers,
            start,
            end,
            step,
        },
        rank_id.as_deref(),
        default,
        (start, end),
    )
}

fn first<'f, 'a>(fibers: &'f [&'a Fiber]) -> &'a Fiber {
    fibers
        .first()
        .copied()
        .unwrap_or_else(|| panic!("Co-iteration needs at least one fiber"))
}

/// Dense co-iteration that creates default elements in every fiber for absent coordinates.
pub struct CoiterShapeRef<'a> {
    fibers: Vec<&'a mut Fiber>,
    next: Coord,
    end: Coord,
    step: usize,
    ticker: Ticker,
}

impl<'a> CoiterShapeRef<'a> {
    /// Co-iterates over the first fiber's shape.
    pub fn new(fibers: Vec<&'a mut Fiber>) -> Self {
        let end = first_mut(&fibers).shape();
        Self::with_range(fibers, 0, end, 1)
    }

    /// Co-iterates over the first fiber's active range.
    pub fn active(fibers: Vec<&'a mut Fiber>) -> Self {
        let (start, end) = first_mut(&fibers).active();
        Self::with_range(fibers, start, end, 1)
    }

    /// Co-iterates over every `step`-th coordinate of `[start, end)`.
    pub fn with_range(fibers: Vec<&'a mut Fiber>, start: Coord, end: Coord, step: usize) -> Self {
        assert!(step > 0, "Co-iteration step must be positive");
        let ticker = Ticker::new(first_mut(&fibers).rank_id(), true);

        Self {
            fibers,
            next: start,
            end,
            step,
            ticker,
        }
    }

    /// Advances to the next coordinate, handing out one payload per fiber.
    pub fn next_element(&mut self) -> Option<(Coord, Vec<&mut Payload>)> {
        self.ticker.settle();

        if self.next >= self.end {
            self.ticker.finish();
            return None;
        }

        let coord = self.next;
        self.next += self.step;
        self.ticker.emit(coord, None);

        let payloads = self
            .fibers
            .iter_mut()
            .map(|fiber| fiber.payload_ref(coord))
            .collect();
        Some((coord, payloads))
    }
}

fn first_mut<'f>(fibers: &'f [&mut Fiber]) -> &'f Fiber {
    fibers
        .first()
        .map(|fiber| &**fiber)
        .unwrap_or_else(|| panic!("Co-iteration needs at least one fiber"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_zip_reports_defaults() {
        let a = Fiber::from_uncompressed(&[1.0, 0.0, 3.0]).with_rank_id("K");
        let b = Fiber::from_uncompressed(&[0.0, 2.0]);

        let zipped: Vec<_> = coiter_shape(vec![&a, &b]).iter_tick(false).collect();

        assert_eq!(
            zipped,
            vec![
                (0, Payload::Tuple(vec![1.0.into(), 0.0.into()])),
                (1, Payload::Tuple(vec![0.0.into(), 2.0.into()])),
                (2, Payload::Tuple(vec![3.0.into(), 0.0.into()])),
            ]
        );
        assert_eq!(coiter_shape(vec![&a, &b]).rank_id(), Some("K"));
    }

    #[test]
    fn active_range_bounds_coiteration() {
        let a = Fiber::from_uncompressed(&[1.0, 2.0, 3.0, 4.0]).with_active(1, 3);
        let b = Fiber::from_uncompressed(&[5.0]);

        let coords: Vec<_> = coiter_active_shape(vec![&a, &b])
            .iter_tick(false)
            .map(|(c, _)| c)
            .collect();

        assert_eq!(coords, vec![1, 2]);
    }

    #[test]
    fn shape_ref_materializes_every_fiber() {
        let mut a = Fiber::from_uncompressed(&[1.0, 0.0, 3.0]);
        let mut b = Fiber::default().with_shape(3);

        let mut coiter = CoiterShapeRef::new(vec![&mut a, &mut b]);
        while let Some((coord, mut payloads)) = coiter.next_element() {
            *payloads[1] = Payload::Value(coord as f64 + 1.0);
        }

        assert_eq!(a.coords(), &[0, 1, 2]);
        assert_eq!(b.coords(), &[0, 1, 2]);
        assert_eq!(b.payload(2), Some(&Payload::Value(3.0)));
    }

    #[test]
    fn stepped_range_skips_coordinates() {
        let a = Fiber::from_uncompressed(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = Fiber::from_uncompressed(&[0.0, 0.0, 6.0]);

        let zipped: Vec<_> = coiter_range_shape(vec![&a, &b], 0, 5, 2)
            .iter_tick(false)
            .collect();

        assert_eq!(
            zipped,
            vec![
                (0, Payload::Tuple(vec![1.0.into(), 0.0.into()])),
                (2, Payload::Tuple(vec![3.0.into(), 6.0.into()])),
                (4, Payload::Tuple(vec![5.0.into(), 0.0.into()])),
            ]
        );
    }

    #[test]
    fn stepped_shape_ref_skips_coordinates() {
        let mut a = Fiber::default().with_shape(6);
        let mut b = Fiber::default().with_shape(6);

        let mut coiter = CoiterShapeRef::with_range(vec![&mut a, &mut b], 1, 6, 2);
        while let Some((coord, mut payloads)) = coiter.next_element() {
            *payloads[0] = Payload::Value(coord as f64);
        }

        assert_eq!(a.coords(), &[1, 3, 5]);
        assert_eq!(b.coords(), &[1, 3, 5]);
    }

    #[test]
    #[should_panic = "step must be positive"]
    fn zero_step_panics() {
        coiter_range_shape(vec![&Fiber::default()], 0, 3, 0);
    }

    #[test]
    #[should_panic = "at least one fiber"]
    fn empty_coiteration_panics() {
        coiter_shape(Vec::new());
    }
}
