use std::borrow::Cow;

use crate::packet::{DEFAULT_GLOBAL, DataPacket};

/// Settings shared by every render of a [`Prerender`](crate::Prerender).
#[derive(Debug, Clone)]
pub struct Options {
    /// Name of the global variable the injected script assigns the packet
    /// to, `window.<global>`.
    pub global: Cow<'static, str>,
    /// Packet from an earlier render. Nodes found in it are rendered with
    /// its data right away and their sources are never started.
    pub seed: Option<DataPacket>,
    /// Copy the seeded entries the final markup was rendered with into the
    /// returned packet, so it can be injected and hydrated from again.
    pub carry_seed: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            global: Cow::Borrowed(DEFAULT_GLOBAL),
            seed: None,
            carry_seed: false,
        }
    }
}
