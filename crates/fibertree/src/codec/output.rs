use crate::fiber::Coord;
use crate::format::Occupancy;
use crate::FibertreeResult;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// One entry of a rank's payload array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedPayload {
    /// Scalar of the leaf rank.
    Value(f64),
    /// Occupancy recorded for a child fiber.
    Occupancy(Occupancy),
}

/// Flat serialization of an encoded tensor: one coordinate array and one payload array per
/// rank, keyed by `"{rank}_coords"` and `"{rank}_payloads"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodecOutput {
    #[serde(flatten)]
    coords: HashMap<String, Vec<Coord>>,
    #[serde(flatten)]
    payloads: HashMap<String, Vec<EncodedPayload>>,
}

/// Keys of the coordinate and payload arrays of a rank.
pub fn output_keys(rank: &str) -> (String, String) {
    (format!("{rank}_coords"), format!("{rank}_payloads"))
}

impl CodecOutput {
    /// Creates empty arrays for every rank.
    pub fn new(rank_ids: &[String]) -> Self {
        let mut output = Self::default();

        for rank in rank_ids {
            let (coords_key, payloads_key) = output_keys(rank);
            output.coords.insert(coords_key, Vec::new());
            output.payloads.insert(payloads_key, Vec::new());
        }
        output
    }

    /// Coordinate array of a rank, empty for unknown ranks.
    pub fn coords(&self, rank: &str) -> &[Coord] {
        self.coords
            .get(&output_keys(rank).0)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Payload array of a rank, empty for unknown ranks.
    pub fn payloads(&self, rank: &str) -> &[EncodedPayload] {
        self.payloads
            .get(&output_keys(rank).1)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn extend_coords(&mut self, rank: &str, coords: &[Coord]) {
        self.coords
            .entry(output_keys(rank).0)
            .or_default()
            .extend_from_slice(coords);
    }

    pub(crate) fn push_payload(&mut self, rank: &str, payload: EncodedPayload) {
        self.payloads
            .entry(output_keys(rank).1)
            .or_default()
            .push(payload);
    }

    /// Serializes every array into one JSON object.
    pub fn to_json(&self) -> FibertreeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
