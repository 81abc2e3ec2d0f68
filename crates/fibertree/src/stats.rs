use hashbrown::HashMap;
use serde::Serialize;

/// Simulated memory traffic of one format fiber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessStats {
    /// Coordinates read, one per binary search comparison or short path.
    pub coords_read: usize,
    /// Coordinates written, including the ones shifted by an insertion.
    pub coords_write: usize,
    /// Payloads read.
    pub payloads_read: usize,
    /// Payloads written.
    pub payloads_write: usize,
}

impl AccessStats {
    /// Sum of every counter.
    pub fn total(&self) -> usize {
        self.coords_read + self.coords_write + self.payloads_read + self.payloads_write
    }

    /// Writes the counters into `output` under keys prefixed by the fiber name.
    pub fn dump(&self, name: &str, output: &mut HashMap<String, usize>) {
        output.insert(format!("{name}_coords_read"), self.coords_read);
        output.insert(format!("{name}_coords_write"), self.coords_write);
        output.insert(format!("{name}_payloads_read"), self.payloads_read);
        output.insert(format!("{name}_payloads_write"), self.payloads_write);
    }
}
