//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the orchestration engine and the
//! outside world: the relay controller, the panel bus, the wall clock and
//! whoever listens to engine events. Device propagation runs synchronously
//! inside scene tasks and report handlers, so every port is a plain
//! synchronous, object-safe trait shared as `Arc<dyn …>`.

pub mod clock;
pub mod event_bus;
pub mod hardware;

use std::sync::Arc;

pub use clock::{Clock, SystemClock};
pub use event_bus::EventPublisher;
pub use hardware::{PanelBus, RelayBus};

/// Every port the engine needs, bundled for construction.
#[derive(Clone)]
pub struct Ports {
    pub relays: Arc<dyn RelayBus>,
    pub panels: Arc<dyn PanelBus>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventPublisher>,
}
