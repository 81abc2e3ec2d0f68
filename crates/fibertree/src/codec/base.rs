use super::{output_keys, CodecOutput, EncodeContext, EncodedTensor};
use crate::cache::AccessCache;
use crate::config::{CodecConfig, OccupancyPolicy};
use crate::fiber::Tensor;
use crate::format::{FiberFormat, FormatDescriptor, FormatFiber};
use crate::{FibertreeError, FibertreeResult};

/// Recursive encoder owning the format of every rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    descriptor: FormatDescriptor,
    policies: Vec<OccupancyPolicy>,
    cache_size: usize,
    shape: Option<Vec<usize>>,
}

impl Codec {
    /// Creates a codec with cumulative occupancy on every rank and the default cache size.
    pub fn new(descriptor: FormatDescriptor) -> Self {
        let policies = vec![OccupancyPolicy::default(); descriptor.len()];

        Self {
            descriptor,
            policies,
            cache_size: CodecConfig::DEFAULT_CACHE_SIZE,
            shape: None,
        }
    }

    /// Creates a codec from a descriptor string such as `"CU"`.
    pub fn from_descriptor(descriptor: &str) -> FibertreeResult<Self> {
        Ok(Self::new(descriptor.parse()?))
    }

    /// Creates a codec from its config.
    pub fn from_config(config: &CodecConfig) -> FibertreeResult<Self> {
        let mut codec = Self::from_descriptor(config.descriptor())?;
        let ranks = codec.descriptor.len();

        if let Some(policies) = config.occupancy() {
            check_rank_count(ranks, policies.len())?;
            codec.policies = policies.to_vec();
        }
        if let Some(shape) = config.shape() {
            check_rank_count(ranks, shape.len())?;
            codec.shape = Some(shape.to_vec());
        }
        if config.cache_size() == 0 {
            return Err(FibertreeError::ZeroCacheCapacity);
        }
        codec.cache_size = config.cache_size();

        Ok(codec)
    }

    /// The format of every rank.
    pub fn descriptor(&self) -> &FormatDescriptor {
        &self.descriptor
    }

    /// The occupancy policy of every rank.
    pub fn policies(&self) -> &[OccupancyPolicy] {
        &self.policies
    }

    /// Keys of the coordinate and payload output arrays of a rank.
    pub fn keys(rank: &str) -> (String, String) {
        output_keys(rank)
    }

    /// Encodes a tensor, one format fiber per node of its fiber tree.
    pub fn encode(&self, tensor: &Tensor) -> FibertreeResult<EncodedTensor> {
        if self.descriptor.len() != tensor.num_ranks() {
            return Err(FibertreeError::DescriptorMismatch {
                descriptor: self.descriptor.len(),
                tensor: tensor.num_ranks(),
            });
        }
        let shape = match &self.shape {
            Some(shape) => {
                check_extents(tensor, shape)?;
                shape.clone()
            }
            None => tensor.shape().to_vec(),
        };

        log::debug!(
            "Encoding tensor {} with ranks {:?} as {}",
            tensor.name(),
            tensor.rank_ids(),
            self.descriptor
        );

        let cache = AccessCache::shared(self.cache_size)?;
        let mut output = CodecOutput::new(tensor.rank_ids());
        let mut fibers: Vec<Vec<FormatFiber>> =
            (0..self.descriptor.len()).map(|_| Vec::new()).collect();

        let mut ctx = EncodeContext::new(
            tensor.name(),
            tensor.rank_ids(),
            &self.descriptor,
            &self.policies,
            &shape,
            &cache,
            &mut output,
            &mut fibers,
        );
        let (root, occupancy) = ctx.encode_rank(0, tensor.root());

        for (rank, fibers) in tensor.rank_ids().iter().zip(fibers.iter()) {
            let size: usize = fibers.iter().map(|fiber| fiber.size()).sum();
            log::debug!("Rank {rank}: {} fibers, size {size}", fibers.len());
        }
        log::debug!("Encoded tensor {} with root occupancy {occupancy}", tensor.name());

        Ok(EncodedTensor::new(
            tensor.name().to_string(),
            tensor.rank_ids().to_vec(),
            self.descriptor.clone(),
            self.policies.clone(),
            shape,
            root,
            fibers,
            output,
            cache,
        ))
    }
}

fn check_extents(tensor: &Tensor, shape: &[usize]) -> FibertreeResult<()> {
    let ranks = tensor.rank_ids().iter().zip(shape.iter().zip(tensor.shape()));

    for (rank, (declared, required)) in ranks {
        if declared < required {
            return Err(FibertreeError::ExtentTooSmall {
                rank: rank.clone(),
                declared: *declared,
                required: *required,
            });
        }
    }
    Ok(())
}

fn check_rank_count(expected: usize, actual: usize) -> FibertreeResult<()> {
    if expected != actual {
        return Err(FibertreeError::RankMismatch { expected, actual });
    }
    Ok(())
}
