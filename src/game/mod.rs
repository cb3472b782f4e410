//! Client-side motion modules

pub mod density;
pub mod entity;
pub mod input_log;
pub mod physics;
pub mod predict;
pub mod smoother;
pub mod snapshot;

pub use density::DensityField;
pub use entity::{Entity, EntityTable};
pub use input_log::{InputLog, InputRecord};
pub use predict::Predictor;
pub use smoother::Smoother;
pub use snapshot::Snapshot;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Commanded control state, as sent to the server in `ks:` messages.
    ///
    /// Opposite pairs may both be set; they cancel thrust on that axis.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Controls: u32 {
        const LEFT   = 0x01;
        const RIGHT  = 0x02;
        const UP     = 0x04;
        const DOWN   = 0x08;
        const ANCHOR = 0x10;
    }
}

impl Controls {
    /// Decode a wire bitmask, keeping unknown bits so echoes stay faithful
    pub fn from_wire(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }
}
