//! GATT-style attribute service: registry, radio boundary, lifecycle state
//! machine and the broadcast refresher.

pub mod event;
pub mod refresher;
pub mod registry;
pub mod server;

pub use event::{AttStatus, ConnId, RadioEvent, RadioStack, TransId};
pub use refresher::BroadcastRefresher;
pub use registry::{Access, AttributeRegistry, AttributeRole, AttributeSpec, Handle, Uuid16};
pub use server::{AttributeServer, LinkState, ServerState};
