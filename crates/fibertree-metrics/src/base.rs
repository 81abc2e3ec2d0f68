use hashbrown::HashMap;
use spin::Mutex;

/// Trace label used by plain single-fiber iteration.
pub const ITER_TRACE: &str = "iter";

/// One recorded use of a coordinate.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct UseRecord {
    /// The coordinate that was touched.
    pub coord: usize,
    /// The position in the fiber the coordinate was read from or written to.
    pub pos: usize,
    /// Snapshot of the iteration counters of every rank in loop order.
    pub iteration: Vec<usize>,
}

#[derive(Debug, Default)]
struct RankCounters {
    registered: bool,
    next_label: usize,
    traversals: usize,
    traces: HashMap<String, Vec<UseRecord>>,
}

#[derive(Debug)]
struct MetricsState {
    collecting: bool,
    loop_order: Vec<String>,
    iteration: Vec<usize>,
    ranks: HashMap<String, RankCounters>,
}

impl MetricsState {
    fn new(loop_order: Vec<String>) -> Self {
        let ranks = loop_order
            .iter()
            .map(|rank| (rank.clone(), RankCounters::default()))
            .collect();

        Self {
            collecting: true,
            iteration: vec![0; loop_order.len()],
            loop_order,
            ranks,
        }
    }

    fn rank_index(&self, rank: &str) -> Option<usize> {
        self.loop_order.iter().position(|name| name == rank)
    }
}

// Single counter bank for the whole process.
static STATE: Mutex<Option<MetricsState>> = Mutex::new(None);

fn with_active<R>(func: impl FnOnce(&mut MetricsState) -> R) -> Option<R> {
    let mut state = STATE.lock();

    state.as_mut().filter(|state| state.collecting).map(func)
}

fn with_recorded<R>(func: impl FnOnce(&MetricsState) -> R) -> Option<R> {
    let state = STATE.lock();

    state.as_ref().map(func)
}

/// Entry point of the counter bank.
///
/// Only ranks named in the loop order given to [begin_collect](Metrics::begin_collect) are
/// tracked; calls naming any other rank are ignored.
#[derive(Debug)]
pub struct Metrics;

impl Metrics {
    /// Starts a fresh collection over the given loop order, outermost rank first.
    ///
    /// Anything recorded by a previous collection is discarded.
    pub fn begin_collect<S: AsRef<str>>(loop_order: &[S]) {
        let loop_order = loop_order
            .iter()
            .map(|rank| rank.as_ref().to_string())
            .collect();

        *STATE.lock() = Some(MetricsState::new(loop_order));
    }

    /// Stops recording. What was recorded so far stays readable.
    pub fn end_collect() {
        if let Some(state) = STATE.lock().as_mut() {
            state.collecting = false;
        }
    }

    /// Whether a collection is currently active.
    pub fn is_collecting() -> bool {
        STATE
            .lock()
            .as_ref()
            .map(|state| state.collecting)
            .unwrap_or(false)
    }

    /// Marks a rank as being traversed.
    pub fn register_rank(rank: &str) {
        with_active(|state| {
            if let Some(counters) = state.ranks.get_mut(rank) {
                counters.registered = true;
            }
        });
    }

    /// Records a use of `coord`, read at position `pos`, under the given trace label.
    pub fn add_use(rank: &str, coord: usize, pos: usize, trace: &str) {
        with_active(|state| {
            let iteration = state.iteration.clone();

            if let Some(counters) = state.ranks.get_mut(rank) {
                counters
                    .traces
                    .entry(trace.to_string())
                    .or_default()
                    .push(UseRecord::new(coord, pos, iteration));
            }
        });
    }

    /// Advances the iteration counter of a rank, resetting every rank nested inside it.
    pub fn inc_iter(rank: &str) {
        with_active(|state| {
            if let Some(index) = state.rank_index(rank) {
                state.iteration[index] += 1;
                for inner in state.iteration[index + 1..].iter_mut() {
                    *inner = 0;
                }
            }
        });
    }

    /// Ends one traversal of a rank.
    pub fn end_iter(rank: &str) {
        with_active(|state| {
            if let Some(index) = state.rank_index(rank) {
                state.iteration[index] = 0;
            }
            if let Some(counters) = state.ranks.get_mut(rank) {
                counters.traversals += 1;
            }
        });
    }

    /// Hands out a fresh label for a trace over the given rank.
    pub fn get_label(rank: &str) -> usize {
        with_active(|state| {
            state
                .ranks
                .get_mut(rank)
                .map(|counters| {
                    let label = counters.next_label;
                    counters.next_label += 1;
                    label
                })
                .unwrap_or(0)
        })
        .unwrap_or(0)
    }

    /// Every use recorded for a rank under a trace label, in recording order.
    pub fn uses(rank: &str, trace: &str) -> Vec<UseRecord> {
        with_recorded(|state| {
            state
                .ranks
                .get(rank)
                .and_then(|counters| counters.traces.get(trace))
                .cloned()
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Trace labels recorded for a rank, sorted.
    pub fn traces(rank: &str) -> Vec<String> {
        let mut traces = with_recorded(|state| {
            state
                .ranks
                .get(rank)
                .map(|counters| counters.traces.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        })
        .unwrap_or_default();

        traces.sort();
        traces
    }

    /// Current iteration counters, in loop order.
    pub fn iteration() -> Vec<usize> {
        with_recorded(|state| state.iteration.clone()).unwrap_or_default()
    }

    /// Whether the rank was registered by a traversal.
    pub fn is_registered(rank: &str) -> bool {
        with_recorded(|state| {
            state
                .ranks
                .get(rank)
                .map(|counters| counters.registered)
                .unwrap_or(false)
        })
        .unwrap_or(false)
    }

    /// Number of completed traversals of a rank.
    pub fn traversals(rank: &str) -> usize {
        with_recorded(|state| {
            state
                .ranks
                .get(rank)
                .map(|counters| counters.traversals)
                .unwrap_or(0)
        })
        .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn records_uses_with_iteration_stamp() {
        Metrics::begin_collect(&["M", "K"]);

        Metrics::add_use("K", 2, 0, ITER_TRACE);
        Metrics::inc_iter("K");
        Metrics::add_use("K", 4, 1, ITER_TRACE);
        Metrics::end_iter("K");
        Metrics::inc_iter("M");
        Metrics::add_use("K", 2, 0, ITER_TRACE);
        Metrics::end_collect();

        let uses = Metrics::uses("K", ITER_TRACE);
        assert_eq!(
            uses,
            vec![
                UseRecord::new(2, 0, vec![0, 0]),
                UseRecord::new(4, 1, vec![0, 1]),
                UseRecord::new(2, 0, vec![1, 0]),
            ]
        );
        assert_eq!(Metrics::traversals("K"), 1);
    }

    #[test]
    #[serial]
    fn ignores_calls_outside_collection() {
        Metrics::begin_collect(&["K"]);
        Metrics::end_collect();

        Metrics::add_use("K", 1, 0, ITER_TRACE);
        Metrics::inc_iter("K");

        assert!(!Metrics::is_collecting());
        assert!(Metrics::uses("K", ITER_TRACE).is_empty());
        assert_eq!(Metrics::iteration(), vec![0]);
    }

    #[test]
    #[serial]
    fn ignores_ranks_outside_loop_order() {
        Metrics::begin_collect(&["K"]);

        Metrics::register_rank("N");
        Metrics::add_use("N", 1, 0, ITER_TRACE);
        Metrics::end_collect();

        assert!(!Metrics::is_registered("N"));
        assert!(Metrics::traces("N").is_empty());
    }

    #[test]
    #[serial]
    fn labels_are_unique_per_rank() {
        Metrics::begin_collect(&["M", "K"]);

        assert_eq!(Metrics::get_label("K"), 0);
        assert_eq!(Metrics::get_label("K"), 1);
        assert_eq!(Metrics::get_label("M"), 0);

        Metrics::end_collect();
        assert_eq!(Metrics::get_label("K"), 0);
    }

    #[test]
    #[serial]
    fn begin_collect_discards_previous_records() {
        Metrics::begin_collect(&["K"]);
        Metrics::add_use("K", 3, 0, "intersect_0");
        Metrics::begin_collect(&["K"]);
        Metrics::end_collect();

        assert!(Metrics::uses("K", "intersect_0").is_empty());
    }
}
