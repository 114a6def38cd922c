//! Device acquisition settings.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Device acquisition settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Devices {
    /// How many times a failing device is tried in one acquisition cycle
    /// before moving to the next candidate device.
    ///
    /// Defaults to `1`.
    #[default(1)]
    pub attempts_per_device: u32,
}
