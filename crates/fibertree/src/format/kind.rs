use crate::fiber::Coord;
use crate::{FibertreeError, FibertreeResult};
use core::fmt::Display;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Storage layout of one rank, named by a single character tag.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// "C": explicit coordinates next to their payloads.
    #[default]
    CoordinateList,
    /// "U": one payload per coordinate of the extent, coordinates implied.
    Uncompressed,
}

impl FormatKind {
    /// The single character tag.
    pub fn tag(&self) -> char {
        match self {
            FormatKind::CoordinateList => 'C',
            FormatKind::Uncompressed => 'U',
        }
    }

    /// Parses a single character tag.
    pub fn from_tag(tag: char) -> FibertreeResult<Self> {
        match tag {
            'C' => Ok(FormatKind::CoordinateList),
            'U' => Ok(FormatKind::Uncompressed),
            _ => Err(FibertreeError::UnknownFormat(tag)),
        }
    }

    /// Representation of `coord` in the coordinate array, given the previous coordinate.
    pub fn encode_coord(&self, _prev: Coord, coord: Coord) -> Vec<Coord> {
        match self {
            FormatKind::CoordinateList => vec![coord],
            FormatKind::Uncompressed => Vec::new(),
        }
    }

    /// Representation of a payload at `coord` in the payload array.
    ///
    /// The uncompressed layout pads explicit zeros for every coordinate in `[prev, coord)`.
    pub fn encode_payload(&self, prev: Coord, coord: Coord, payload: f64) -> Vec<f64> {
        match self {
            FormatKind::CoordinateList => vec![payload],
            FormatKind::Uncompressed => {
                let mut encoded = vec![0.0; coord.saturating_sub(prev)];
                encoded.push(payload);
                encoded
            }
        }
    }

    /// Padding closing a payload array with `remaining` coordinates left.
    pub fn end_payloads(&self, remaining: usize) -> Vec<f64> {
        match self {
            FormatKind::CoordinateList => Vec::new(),
            FormatKind::Uncompressed => vec![0.0; remaining],
        }
    }

    /// Whether coordinates are stored explicitly.
    pub fn encodes_coords(&self) -> bool {
        match self {
            FormatKind::CoordinateList => true,
            FormatKind::Uncompressed => false,
        }
    }

    /// Whether the parent rank stores an occupancy and a fiber reference for each fiber of
    /// this layout.
    pub fn encodes_upper_payload(&self) -> bool {
        match self {
            FormatKind::CoordinateList => true,
            FormatKind::Uncompressed => false,
        }
    }

    /// Number of lanes the parent rank accumulates occupancy into for fibers of this layout.
    ///
    /// Both layouts report a single counter from `encode_fiber`, so encoding never produces
    /// [lanes](crate::format::Occupancy::Lanes). A layout with a wider occupancy must return
    /// lanes of this width, or accumulation in the parent panics.
    pub fn occupancy_width(&self) -> usize {
        1
    }
}

impl Display for FormatKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One format per rank, outermost first, written as a string of tags such as `"CU"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    formats: Vec<FormatKind>,
}

impl FormatDescriptor {
    /// Creates a descriptor from its formats.
    pub fn new(formats: Vec<FormatKind>) -> Self {
        Self { formats }
    }

    /// Number of ranks described.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether no rank is described.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// The formats, outermost first.
    pub fn formats(&self) -> &[FormatKind] {
        &self.formats
    }

    /// Format of the rank at `depth`.
    pub fn get(&self, depth: usize) -> Option<FormatKind> {
        self.formats.get(depth).copied()
    }

    /// Format of the rank below `depth`, `None` at the leaf.
    pub fn next(&self, depth: usize) -> Option<FormatKind> {
        self.get(depth + 1)
    }
}

impl FromStr for FormatDescriptor {
    type Err = FibertreeError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        descriptor
            .chars()
            .map(FormatKind::from_tag)
            .collect::<FibertreeResult<Vec<_>>>()
            .map(Self::new)
    }
}

impl Display for FormatDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for format in self.formats.iter() {
            write!(f, "{format}")?;
        }
        Ok(())
    }
}

impl core::ops::Index<usize> for FormatDescriptor {
    type Output = FormatKind;

    fn index(&self, depth: usize) -> &Self::Output {
        &self.formats[depth]
    }
}
