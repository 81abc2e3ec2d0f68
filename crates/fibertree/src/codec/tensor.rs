use super::{CodecOutput, EncodeContext};
use crate::cache::SharedCache;
use crate::config::OccupancyPolicy;
use crate::fiber::{Coord, Fiber};
use crate::format::{FiberFormat, FiberId, FormatDescriptor, FormatFiber, FormatPayload};
use hashbrown::HashMap;

/// A tensor encoded rank by rank, with the format fibers of every rank kept in an arena.
#[derive(Debug)]
pub struct EncodedTensor {
    name: String,
    rank_ids: Vec<String>,
    descriptor: FormatDescriptor,
    policies: Vec<OccupancyPolicy>,
    shape: Vec<usize>,
    root: FiberId,
    fibers: Vec<Vec<FormatFiber>>,
    output: CodecOutput,
    cache: SharedCache,
}

impl EncodedTensor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        rank_ids: Vec<String>,
        descriptor: FormatDescriptor,
        policies: Vec<OccupancyPolicy>,
        shape: Vec<usize>,
        root: FiberId,
        fibers: Vec<Vec<FormatFiber>>,
        output: CodecOutput,
        cache: SharedCache,
    ) -> Self {
        Self {
            name,
            rank_ids,
            descriptor,
            policies,
            shape,
            root,
            fibers,
            output,
            cache,
        }
    }

    /// Name of the source tensor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rank ids, outermost first.
    pub fn rank_ids(&self) -> &[String] {
        &self.rank_ids
    }

    /// Format of every rank.
    pub fn descriptor(&self) -> &FormatDescriptor {
        &self.descriptor
    }

    /// Extent of every rank.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The top-level fiber.
    pub fn root(&self) -> FiberId {
        self.root
    }

    /// Arrays produced by the encoding.
    pub fn output(&self) -> &CodecOutput {
        &self.output
    }

    /// The cache shared by every fiber.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Fibers of the rank at `depth`, left to right.
    pub fn fibers(&self, depth: usize) -> &[FormatFiber] {
        &self.fibers[depth]
    }

    /// The fiber with the given id.
    pub fn fiber(&self, id: FiberId) -> &FormatFiber {
        &self.fibers[id.depth][id.index]
    }

    /// The fiber with the given id, mutably.
    pub fn fiber_mut(&mut self, id: FiberId) -> &mut FormatFiber {
        &mut self.fibers[id.depth][id.index]
    }

    /// Reads the scalar at `point` through handle lookups, `None` when absent.
    pub fn get(&mut self, point: &[Coord]) -> Option<f64> {
        self.check_point(point);
        let mut id = self.root;

        for (depth, coord) in point.iter().enumerate() {
            let fiber = self.fiber_mut(id);
            let handle = fiber.coord_to_handle(*coord)?;
            if fiber.handle_to_coord(handle) != Some(*coord) {
                return None;
            }

            if depth + 1 == point.len() {
                return fiber.payload(handle).and_then(|payload| payload.value());
            }
            id = fiber.child(handle)?;
        }

        None
    }

    /// Writes the scalar at `point`, creating elements and child fibers on the way.
    pub fn insert(&mut self, point: &[Coord], value: f64) {
        self.check_point(point);
        let mut id = self.root;

        for (depth, coord) in point.iter().enumerate() {
            let leaf = depth + 1 == point.len();
            let fiber = self.fiber_mut(id);
            let insertion = fiber.insert_element(*coord);

            if leaf {
                fiber.update_payload(Some(insertion.handle), FormatPayload::Value(value));
                return;
            }

            if !insertion.created {
                id = fiber.child(insertion.handle).unwrap_or_else(|| {
                    panic!("Element {coord} of rank {} has no child fiber", self.rank_ids[depth])
                });
                continue;
            }

            assert!(
                fiber.core().stores_child_ids(),
                "Cannot create a child below {}: the next rank addresses its fibers by position",
                fiber.name()
            );
            let child = self.allocate_fiber(depth + 1);
            self.fiber_mut(id)
                .update_payload(Some(insertion.handle), FormatPayload::Fiber(child));
            id = child;
        }
    }

    /// Total size of every fiber.
    pub fn size(&self) -> usize {
        self.fibers
            .iter()
            .flat_map(|rank| rank.iter())
            .map(|fiber| fiber.size())
            .sum()
    }

    /// Writes the access counters of every fiber into `output`.
    pub fn dump_stats(&self, output: &mut HashMap<String, usize>) {
        for fiber in self.fibers.iter().flat_map(|rank| rank.iter()) {
            fiber.stats().dump(fiber.name(), output);
        }
    }

    /// Writes the hit and miss counts of the shared cache into `output`.
    pub fn cache_stats(&self, name: &str, output: &mut HashMap<String, usize>) {
        self.cache.borrow().dump(name, output);
    }

    fn check_point(&self, point: &[Coord]) {
        assert_eq!(
            point.len(),
            self.rank_ids.len(),
            "Point {point:?} does not have one coordinate per rank of {}",
            self.name
        );
    }

    fn allocate_fiber(&mut self, depth: usize) -> FiberId {
        let mut scratch = CodecOutput::default();
        let mut ctx = EncodeContext::new(
            &self.name,
            &self.rank_ids,
            &self.descriptor,
            &self.policies,
            &self.shape,
            &self.cache,
            &mut scratch,
            &mut self.fibers,
        );
        let (id, _) = ctx.encode_rank(depth, &Fiber::default());

        log::debug!(
            "Allocated empty fiber {} in rank {}",
            self.fiber(id).name(),
            self.rank_ids[depth]
        );
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::fiber::{DenseArray, Tensor};
    use crate::format::FormatKind;

    fn matrix() -> Tensor {
        let data = DenseArray::from(vec![
            vec![1.0, 0.0, 3.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0, 4.0],
        ]);
        Tensor::from_uncompressed("A", &["M", "K"], &data).unwrap()
    }

    #[test]
    fn fibers_are_named_left_to_right() {
        let encoded = Codec::from_descriptor("CC").unwrap().encode(&matrix()).unwrap();

        let names: Vec<_> = encoded.fibers(1).iter().map(|f| f.name().to_string()).collect();

        assert_eq!(encoded.fiber(encoded.root()).name(), "A_M_0");
        assert_eq!(names, vec!["A_K_0", "A_K_1"]);
    }

    #[test]
    fn get_reads_through_every_rank() {
        for descriptor in ["CC", "CU", "UC", "UU"] {
            let mut encoded = Codec::from_descriptor(descriptor)
                .unwrap()
                .encode(&matrix())
                .unwrap();

            assert_eq!(encoded.get(&[0, 2]), Some(3.0), "{descriptor}");
            assert_eq!(encoded.get(&[2, 3]), Some(4.0), "{descriptor}");
        }
    }

    #[test]
    fn get_reports_absent_coordinates() {
        let mut encoded = Codec::from_descriptor("CC").unwrap().encode(&matrix()).unwrap();

        assert_eq!(encoded.get(&[1, 0]), None);
        assert_eq!(encoded.get(&[0, 1]), None);
        assert_eq!(encoded.get(&[5, 0]), None);
    }

    #[test]
    fn insert_creates_child_fibers() {
        let mut encoded = Codec::from_descriptor("CC").unwrap().encode(&matrix()).unwrap();

        encoded.insert(&[1, 2], 9.0);

        assert_eq!(encoded.fibers(1).len(), 3);
        assert_eq!(encoded.fibers(1)[2].name(), "A_K_2");
        assert_eq!(encoded.fibers(1)[2].kind(), FormatKind::CoordinateList);
        assert_eq!(encoded.get(&[1, 2]), Some(9.0));
        assert_eq!(encoded.get(&[0, 2]), Some(3.0));
        assert_eq!(encoded.get(&[2, 3]), Some(4.0));
    }

    #[test]
    fn insert_overwrites_existing_values() {
        let mut encoded = Codec::from_descriptor("UU").unwrap().encode(&matrix()).unwrap();

        encoded.insert(&[1, 1], 5.0);
        encoded.insert(&[0, 0], 6.0);

        assert_eq!(encoded.get(&[1, 1]), Some(5.0));
        assert_eq!(encoded.get(&[0, 0]), Some(6.0));
        assert_eq!(encoded.fibers(1).len(), 3);
    }

    #[test]
    #[should_panic = "addresses its fibers by position"]
    fn insert_below_positional_rank_panics() {
        let mut encoded = Codec::from_descriptor("CU").unwrap().encode(&matrix()).unwrap();

        encoded.insert(&[1, 0], 1.0);
    }

    #[test]
    fn stats_are_dumped_per_fiber() {
        let mut encoded = Codec::from_descriptor("CC").unwrap().encode(&matrix()).unwrap();
        encoded.get(&[2, 3]);

        let mut stats = HashMap::new();
        encoded.dump_stats(&mut stats);
        let mut cache = HashMap::new();
        encoded.cache_stats("A", &mut cache);

        assert_eq!(stats.len(), 4 * 3);
        assert_eq!(stats["A_M_0_coords_read"], 1);
        assert_eq!(stats["A_K_1_coords_read"], 1);
        assert_eq!(stats["A_K_1_payloads_read"], 1);
        assert_eq!(cache["A_buffer_access"], 0);
        assert_eq!(cache["A_DRAM_access"], 4);
    }
}
