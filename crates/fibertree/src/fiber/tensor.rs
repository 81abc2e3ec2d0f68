use super::{Fiber, Payload};
use crate::{FibertreeError, FibertreeResult};

/// Nested dense data, one level per rank.
#[derive(Debug, Clone, PartialEq)]
pub enum DenseArray {
    /// Values of the innermost rank.
    Values(Vec<f64>),
    /// One sub-array per coordinate of an outer rank.
    Nested(Vec<DenseArray>),
}

impl DenseArray {
    /// Number of ranks.
    pub fn depth(&self) -> usize {
        match self {
            DenseArray::Values(_) => 1,
            DenseArray::Nested(children) => {
                1 + children.iter().map(DenseArray::depth).max().unwrap_or(1)
            }
        }
    }

    fn collect_extents(&self, depth: usize, extents: &mut [usize]) {
        let len = match self {
            DenseArray::Values(values) => values.len(),
            DenseArray::Nested(children) => children.len(),
        };
        extents[depth] = extents[depth].max(len);

        if let DenseArray::Nested(children) = self {
            for child in children {
                child.collect_extents(depth + 1, extents);
            }
        }
    }

    /// Extent of every rank: the longest run found at each level.
    pub fn extents(&self) -> Vec<usize> {
        let mut extents = vec![0; self.depth()];
        self.collect_extents(0, &mut extents);
        extents
    }
}

impl From<Vec<f64>> for DenseArray {
    fn from(values: Vec<f64>) -> Self {
        DenseArray::Values(values)
    }
}

impl From<Vec<Vec<f64>>> for DenseArray {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        DenseArray::Nested(rows.into_iter().map(DenseArray::Values).collect())
    }
}

impl From<Vec<Vec<Vec<f64>>>> for DenseArray {
    fn from(planes: Vec<Vec<Vec<f64>>>) -> Self {
        DenseArray::Nested(planes.into_iter().map(DenseArray::from).collect())
    }
}

/// A named fiber tree with one rank id per level.
#[derive(new, Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    rank_ids: Vec<String>,
    root: Fiber,
    shape: Vec<usize>,
}

impl Tensor {
    /// Builds a tensor from dense data, dropping zeros and empty sub-fibers.
    pub fn from_uncompressed(
        name: impl Into<String>,
        rank_ids: &[&str],
        data: &DenseArray,
    ) -> FibertreeResult<Self> {
        let depth = data.depth();
        if depth != rank_ids.len() {
            return Err(FibertreeError::RankMismatch {
                expected: depth,
                actual: rank_ids.len(),
            });
        }

        let rank_ids: Vec<String> = rank_ids.iter().map(|rank| rank.to_string()).collect();
        let shape = data.extents();
        let root = build_fiber(data, &rank_ids, &shape);

        Ok(Self::new(name.into(), rank_ids, root, shape))
    }

    /// Name of the tensor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rank ids, outermost first.
    pub fn rank_ids(&self) -> &[String] {
        &self.rank_ids
    }

    /// Number of ranks.
    pub fn num_ranks(&self) -> usize {
        self.rank_ids.len()
    }

    /// The top-level fiber.
    pub fn root(&self) -> &Fiber {
        &self.root
    }

    /// Extent of every rank, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

fn empty_fiber(rank_ids: &[String], shape: &[usize]) -> Fiber {
    Fiber::default()
        .with_rank_id(rank_ids[0].clone())
        .with_shape(shape[0])
        .with_default(default_payload(rank_ids, shape))
}

fn default_payload(rank_ids: &[String], shape: &[usize]) -> Payload {
    if rank_ids.len() > 1 {
        Payload::Fiber(empty_fiber(&rank_ids[1..], &shape[1..]))
    } else {
        Payload::Value(0.0)
    }
}

fn build_fiber(data: &DenseArray, rank_ids: &[String], shape: &[usize]) -> Fiber {
    let (coords, payloads) = match data {
        DenseArray::Values(values) => values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0.0)
            .map(|(coord, value)| (coord, Payload::Value(*value)))
            .unzip(),
        DenseArray::Nested(children) => children
            .iter()
            .enumerate()
            .map(|(coord, child)| (coord, build_fiber(child, &rank_ids[1..], &shape[1..])))
            .filter(|(_, child)| !child.is_empty())
            .map(|(coord, child)| (coord, Payload::Fiber(child)))
            .unzip(),
    };

    Fiber::new(coords, payloads)
        .with_rank_id(rank_ids[0].clone())
        .with_shape(shape[0])
        .with_default(default_payload(rank_ids, shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_fibers() {
        let data = DenseArray::from(vec![vec![1.0, 0.0, 2.0], vec![0.0, 0.0, 0.0], vec![0.0, 3.0]]);

        let tensor = Tensor::from_uncompressed("A", &["M", "K"], &data).unwrap();

        assert_eq!(tensor.shape(), &[3, 3]);
        assert_eq!(tensor.root().coords(), &[0, 2]);
        let row = tensor.root().payload(2).and_then(Payload::as_fiber).unwrap();
        assert_eq!(row.coords(), &[1]);
        assert_eq!(row.rank_id(), Some("K"));
        assert_eq!(row.shape(), 3);
    }

    #[test]
    fn absent_rows_default_to_empty_fibers() {
        let data = DenseArray::from(vec![vec![1.0], vec![0.0]]);

        let tensor = Tensor::from_uncompressed("A", &["M", "K"], &data).unwrap();
        let missing = tensor.root().payload_or_default(1);

        assert!(missing.is_empty());
        assert_eq!(missing.as_fiber().and_then(Fiber::rank_id), Some("K"));
    }

    #[test]
    fn rank_count_must_match_data() {
        let data = DenseArray::from(vec![1.0, 2.0]);

        let result = Tensor::from_uncompressed("A", &["M", "K"], &data);

        assert!(matches!(
            result,
            Err(FibertreeError::RankMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
