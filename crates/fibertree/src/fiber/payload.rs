use super::Fiber;
use core::fmt::Display;

/// Value stored at one coordinate of a fiber.
///
/// [Payload::Empty] marks a payload that is genuinely absent, while `Value(0.0)` is a present
/// zero. Merge results carry [tuples](Payload::Tuple) of operand payloads, and unions prefix
/// them with a [mask](Payload::Mask) naming the operands that held the coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No payload at all.
    Empty,
    /// A scalar at the leaf rank.
    Value(f64),
    /// A fiber of the next rank.
    Fiber(Fiber),
    /// Payloads combined by a merge.
    Tuple(Vec<Payload>),
    /// Presence mask of a union, such as `"AB"`.
    Mask(String),
}

impl Payload {
    /// Whether the payload counts as empty for iteration: absent, zero, a fiber with no
    /// elements or an empty mask.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Value(value) => *value == 0.0,
            Payload::Fiber(fiber) => fiber.is_empty(),
            Payload::Tuple(_) => false,
            Payload::Mask(mask) => mask.is_empty(),
        }
    }

    /// The raw scalar, if this is one.
    pub fn value(&self) -> Option<f64> {
        match self {
            Payload::Value(value) => Some(*value),
            _ => None,
        }
    }

    /// The nested fiber, if this is one.
    pub fn as_fiber(&self) -> Option<&Fiber> {
        match self {
            Payload::Fiber(fiber) => Some(fiber),
            _ => None,
        }
    }

    /// The nested fiber, mutably.
    pub fn as_fiber_mut(&mut self) -> Option<&mut Fiber> {
        match self {
            Payload::Fiber(fiber) => Some(fiber),
            _ => None,
        }
    }

    /// The combined payloads, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&[Payload]> {
        match self {
            Payload::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// The presence mask, if this is one.
    pub fn as_mask(&self) -> Option<&str> {
        match self {
            Payload::Mask(mask) => Some(mask),
            _ => None,
        }
    }

    /// Splits a two-operand merge payload.
    pub(crate) fn into_pair(self) -> (Payload, Payload) {
        match self {
            Payload::Tuple(items) => match <[Payload; 2]>::try_from(items) {
                Ok([left, right]) => (left, right),
                Err(items) => panic!("Expected a pair payload, got {} items", items.len()),
            },
            other => panic!("Expected a pair payload, got {other:?}"),
        }
    }

    /// Splits a two-operand union payload into its mask and operand payloads.
    pub(crate) fn into_masked_pair(self) -> (String, Payload, Payload) {
        match self {
            Payload::Tuple(items) => match <[Payload; 3]>::try_from(items) {
                Ok([Payload::Mask(mask), left, right]) => (mask, left, right),
                Ok([head, _, _]) => panic!("Expected a union mask, got {head:?}"),
                Err(items) => panic!("Expected a union payload, got {} items", items.len()),
            },
            other => panic!("Expected a union payload, got {other:?}"),
        }
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Value(value)
    }
}

impl From<Fiber> for Payload {
    fn from(fiber: Fiber) -> Self {
        Payload::Fiber(fiber)
    }
}

impl From<&str> for Payload {
    fn from(mask: &str) -> Self {
        Payload::Mask(mask.to_string())
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Payload::Tuple(items)
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Payload::Empty => f.write_str("<empty>"),
            Payload::Value(value) => write!(f, "{value}"),
            Payload::Fiber(fiber) => write!(f, "{fiber}"),
            Payload::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Payload::Mask(mask) => write!(f, "{mask:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_empty_but_present() {
        let zero = Payload::Value(0.0);

        assert!(zero.is_empty());
        assert_eq!(zero.value(), Some(0.0));
        assert_eq!(Payload::Empty.value(), None);
    }

    #[test]
    fn tuples_are_never_empty() {
        let tuple = Payload::Tuple(vec![Payload::Empty, Payload::Empty]);

        assert!(!tuple.is_empty());
    }

    #[test]
    fn splits_union_payload() {
        let payload = Payload::Tuple(vec!["AB".into(), 1.0.into(), 2.0.into()]);

        let (mask, left, right) = payload.into_masked_pair();

        assert_eq!(mask, "AB");
        assert_eq!(left, Payload::Value(1.0));
        assert_eq!(right, Payload::Value(2.0));
    }

    #[test]
    #[should_panic = "Expected a pair payload"]
    fn splitting_a_scalar_panics() {
        Payload::Value(3.0).into_pair();
    }
}
