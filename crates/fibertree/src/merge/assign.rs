use super::{Elements, Traverse};
use crate::fiber::{Coord, Fiber, Payload};
use crate::format::FormatKind;
use core::ops::Shl;
use fibertree_metrics::Metrics;

struct PopulateTrace {
    rank: String,
    read: String,
    write: String,
    source: String,
}

impl PopulateTrace {
    fn start(rank: Option<&str>) -> Option<Self> {
        let rank = rank.filter(|_| Metrics::is_collecting())?;
        let target = Metrics::get_label(rank);
        let source = Metrics::get_label(rank);

        Some(Self {
            rank: rank.to_string(),
            read: format!("populate_read_{target}"),
            write: format!("populate_write_{target}"),
            source: format!("populate_{source}"),
        })
    }
}

#[derive(Debug)]
struct Pending {
    coord: Coord,
    pos: usize,
    created: bool,
}

/// One-way populate of a target fiber from a source.
///
/// Each source element is paired with the target payload at the same coordinate, created
/// with the target's default when absent. A created element the consumer leaves at the default
/// is removed again before the next element is handed out.
///
/// Payloads are handed out mutably, so this is a lending cursor driven by
/// [next_element](Assign::next_element) rather than an [Iterator].
pub struct Assign<'t, 's> {
    target: &'t mut Fiber,
    source: Elements<'s>,
    source_pos: usize,
    pending: Option<Pending>,
    trace: Option<PopulateTrace>,
}

impl<'t, 's> Assign<'t, 's> {
    /// Starts populating `target` from `source`.
    ///
    /// The target takes over the active range of the source.
    pub fn new<S: Traverse + ?Sized>(target: &'t mut Fiber, source: &'s S) -> Self {
        source.check_ordered();
        target.set_active(source.active());
        let trace = PopulateTrace::start(target.rank_id());

        Self {
            target,
            source: source.elements(false),
            source_pos: 0,
            pending: None,
            trace,
        }
    }

    /// Advances to the next source element: its coordinate, the target payload to update and
    /// the source payload.
    pub fn next_element(&mut self) -> Option<(Coord, &mut Payload, Payload)> {
        self.settle();

        let (coord, payload) = self.source.next()?;
        if let Some(trace) = &self.trace {
            Metrics::add_use(&trace.rank, coord, self.source_pos, &trace.source);
        }
        self.source_pos += 1;

        let (pos, created) = match self.target.position(coord) {
            Ok(pos) => {
                if let Some(trace) = &self.trace {
                    Metrics::add_use(&trace.rank, coord, pos, &trace.read);
                }
                (pos, false)
            }
            Err(pos) => {
                let default = self.target.default_payload().clone();
                self.target.insert(pos, coord, default);
                (pos, true)
            }
        };
        self.pending = Some(Pending {
            coord,
            pos,
            created,
        });

        Some((coord, &mut self.target.payloads_mut()[pos], payload))
    }

    /// Runs the populate to completion, combining each pair of payloads with `func`.
    pub fn for_each(mut self, mut func: impl FnMut(Coord, &mut Payload, Payload)) {
        while let Some((coord, target, source)) = self.next_element() {
            func(coord, target, source);
        }
    }

    fn settle(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if pending.created && is_default(self.target, pending.pos) {
            let (coord, _) = self.target.remove_at(pending.pos);
            assert_eq!(
                coord, pending.coord,
                "Populate removed coordinate {coord} instead of {}",
                pending.coord
            );
            return;
        }

        let Some(trace) = &self.trace else {
            return;
        };
        if pending.created && self.target.format() != FormatKind::Uncompressed {
            let shifted = &self.target.coords()[pending.pos + 1..];
            for (offset, coord) in shifted.iter().enumerate().rev() {
                let pos = pending.pos + 1 + offset;
                Metrics::add_use(&trace.rank, *coord, pos - 1, &trace.read);
                Metrics::add_use(&trace.rank, *coord, pos, &trace.write);
                Metrics::inc_iter(&trace.rank);
            }
        }
        Metrics::add_use(&trace.rank, pending.coord, pending.pos, &trace.write);
        Metrics::inc_iter(&trace.rank);
    }
}

fn is_default(fiber: &Fiber, pos: usize) -> bool {
    match &fiber.payloads()[pos] {
        Payload::Fiber(child) => child.is_empty(),
        payload => payload == fiber.default_payload(),
    }
}

impl Drop for Assign<'_, '_> {
    fn drop(&mut self) {
        self.settle();
    }
}

impl<'t, 's> Shl<&'s Fiber> for &'t mut Fiber {
    type Output = Assign<'t, 's>;

    fn shl(self, source: &'s Fiber) -> Assign<'t, 's> {
        Assign::new(self, source)
    }
}

impl Fiber {
    /// Populates this fiber from `source`, combining each pair of payloads with `func`.
    pub fn assign_with<S: Traverse + ?Sized>(
        &mut self,
        source: &S,
        func: impl FnMut(Coord, &mut Payload, Payload),
    ) {
        Assign::new(self, source).for_each(func);
    }
}
