use super::Payload;
use crate::format::FormatKind;
use core::fmt::Display;

/// Index along one rank.
pub type Coord = usize;

/// Ordered sequence of coordinate/payload pairs for one rank of a tensor.
///
/// Coordinates are strictly increasing and unique. Operations that depend on it, such as the
/// merges in [merge](crate::merge), assert it at entry.
#[derive(Debug, Clone)]
pub struct Fiber {
    coords: Vec<Coord>,
    payloads: Vec<Payload>,
    rank_id: Option<String>,
    shape: Option<usize>,
    format: FormatKind,
    default: Box<Payload>,
    active: Option<(Coord, Coord)>,
}

impl PartialEq for Fiber {
    fn eq(&self, other: &Self) -> bool {
        self.coords == other.coords && self.payloads == other.payloads
    }
}

impl Default for Fiber {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Fiber {
    /// Creates a fiber from parallel coordinate and payload sequences.
    pub fn new(coords: Vec<Coord>, payloads: Vec<Payload>) -> Self {
        assert_eq!(
            coords.len(),
            payloads.len(),
            "Coordinates and payloads must have the same length"
        );

        Self {
            coords,
            payloads,
            rank_id: None,
            shape: None,
            format: FormatKind::CoordinateList,
            default: Box::new(Payload::Value(0.0)),
            active: None,
        }
    }

    /// Creates a fiber from dense values, dropping zeros.
    pub fn from_uncompressed(values: &[f64]) -> Self {
        let (coords, payloads) = values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0.0)
            .map(|(coord, value)| (coord, Payload::Value(*value)))
            .unzip();

        Self::new(coords, payloads).with_shape(values.len())
    }

    /// Sets the rank this fiber belongs to.
    pub fn with_rank_id(mut self, rank_id: impl Into<String>) -> Self {
        self.rank_id = Some(rank_id.into());
        self
    }

    /// Sets the extent of the rank.
    pub fn with_shape(mut self, shape: usize) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the format used to pick the default iteration.
    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.format = format;
        self
    }

    /// Sets the payload reported for absent coordinates.
    pub fn with_default(mut self, default: Payload) -> Self {
        self.default = Box::new(default);
        self
    }

    /// Restricts the active range to `[start, end)`.
    pub fn with_active(mut self, start: Coord, end: Coord) -> Self {
        self.active = Some((start, end));
        self
    }

    pub(crate) fn set_rank_id(&mut self, rank_id: Option<String>) {
        self.rank_id = rank_id;
    }

    pub(crate) fn set_active(&mut self, active: (Coord, Coord)) {
        self.active = Some(active);
    }

    /// The rank id, if any.
    pub fn rank_id(&self) -> Option<&str> {
        self.rank_id.as_deref()
    }

    /// The extent of the rank: the declared shape, or one past the last coordinate.
    pub fn shape(&self) -> usize {
        self.shape
            .unwrap_or_else(|| self.coords.last().map(|last| last + 1).unwrap_or(0))
    }

    /// The format used to pick the default iteration.
    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// The payload reported for absent coordinates.
    pub fn default_payload(&self) -> &Payload {
        &self.default
    }

    /// The active range `[start, end)`, the whole shape unless restricted.
    pub fn active(&self) -> (Coord, Coord) {
        self.active.unwrap_or((0, self.shape()))
    }

    /// The stored coordinates.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// The stored payloads.
    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub(crate) fn payloads_mut(&mut self) -> &mut [Payload] {
        &mut self.payloads
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the fiber stores no element.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Position of `coord`, or the position it would be inserted at.
    pub fn position(&self, coord: Coord) -> Result<usize, usize> {
        self.coords.binary_search(&coord)
    }

    /// The payload at `coord`, `None` when absent.
    pub fn payload(&self, coord: Coord) -> Option<&Payload> {
        self.position(coord).ok().map(|pos| &self.payloads[pos])
    }

    /// The payload at `coord`, the default when absent.
    pub fn payload_or_default(&self, coord: Coord) -> &Payload {
        self.payload(coord).unwrap_or(&self.default)
    }

    /// The payload at `coord`, inserting a default element when absent.
    pub fn payload_ref(&mut self, coord: Coord) -> &mut Payload {
        let pos = match self.position(coord) {
            Ok(pos) => pos,
            Err(pos) => {
                let default = (*self.default).clone();
                self.insert(pos, coord, default);
                pos
            }
        };

        &mut self.payloads[pos]
    }

    /// Inserts an element at `pos`.
    pub fn insert(&mut self, pos: usize, coord: Coord, payload: Payload) {
        assert!(
            pos == 0 || self.coords[pos - 1] < coord,
            "Inserting coordinate {coord} at position {pos} breaks ordering"
        );
        assert!(
            pos == self.coords.len() || coord < self.coords[pos],
            "Inserting coordinate {coord} at position {pos} breaks ordering"
        );

        self.coords.insert(pos, coord);
        self.payloads.insert(pos, payload);
    }

    /// Removes and returns the element at `pos`.
    pub fn remove_at(&mut self, pos: usize) -> (Coord, Payload) {
        (self.coords.remove(pos), self.payloads.remove(pos))
    }

    /// Whether the stored coordinates are strictly increasing.
    pub fn is_ordered_unique(&self) -> bool {
        self.coords.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Panics unless the stored coordinates are strictly increasing.
    pub fn assert_ordered_unique(&self) {
        assert!(
            self.is_ordered_unique(),
            "Fiber coordinates must be ordered and unique, got {:?}",
            self.coords
        );
    }

    /// An empty fiber sharing this fiber's rank, shape, format and default.
    pub fn empty_like(&self) -> Self {
        Self {
            coords: Vec::new(),
            payloads: Vec::new(),
            rank_id: self.rank_id.clone(),
            shape: self.shape,
            format: self.format,
            default: self.default.clone(),
            active: None,
        }
    }
}

impl Display for Fiber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(rank_id) = &self.rank_id {
            write!(f, "{rank_id}:")?;
        }
        f.write_str("[")?;
        for (i, (coord, payload)) in self.coords.iter().zip(self.payloads.iter()).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{coord}: {payload}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_uncompressed_drops_zeros() {
        let fiber = Fiber::from_uncompressed(&[1.0, 0.0, 3.0, 0.0, 5.0]);

        assert_eq!(fiber.coords(), &[0, 2, 4]);
        assert_eq!(fiber.payload(2), Some(&Payload::Value(3.0)));
        assert_eq!(fiber.payload(1), None);
        assert_eq!(fiber.payload_or_default(1), &Payload::Value(0.0));
        assert_eq!(fiber.shape(), 5);
    }

    #[test]
    fn payload_ref_materializes_default() {
        let mut fiber = Fiber::from_uncompressed(&[1.0, 0.0, 3.0]);

        *fiber.payload_ref(1) = Payload::Value(2.0);

        assert_eq!(fiber.coords(), &[0, 1, 2]);
        assert_eq!(fiber.payload(1), Some(&Payload::Value(2.0)));
    }

    #[test]
    fn fiber_default_nests_fibers() {
        let row = Fiber::new(vec![2], vec![7.0.into()]);
        let mut fiber = Fiber::default().with_default(Payload::Fiber(row.clone()));

        assert_eq!(fiber.payload_or_default(4), &Payload::Fiber(row.clone()));

        fiber.payload_ref(4);

        assert_eq!(fiber.coords(), &[4]);
        assert_eq!(fiber.payload(4).and_then(Payload::as_fiber), Some(&row));
        assert_eq!(fiber.empty_like().default_payload(), &Payload::Fiber(row));
    }

    #[test]
    fn shape_defaults_to_one_past_last_coordinate() {
        let fiber = Fiber::new(vec![1, 5], vec![1.0.into(), 2.0.into()]);

        assert_eq!(fiber.shape(), 6);
        assert_eq!(fiber.active(), (0, 6));
    }

    #[test]
    #[should_panic = "ordered and unique"]
    fn unordered_fiber_is_rejected() {
        Fiber::new(vec![3, 1], vec![1.0.into(), 2.0.into()]).assert_ordered_unique();
    }

    #[test]
    #[should_panic = "breaks ordering"]
    fn insert_out_of_order_panics() {
        let mut fiber = Fiber::new(vec![1, 5], vec![1.0.into(), 2.0.into()]);

        fiber.insert(0, 3, 4.0.into());
    }

    #[test]
    fn equality_ignores_metadata() {
        let a = Fiber::from_uncompressed(&[1.0, 2.0]).with_rank_id("K");
        let b = Fiber::new(vec![0, 1], vec![1.0.into(), 2.0.into()]);

        assert_eq!(a, b);
    }
}
