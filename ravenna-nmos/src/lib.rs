//! NMOS (AMWA IS-04) data models: resource versioning and the JSON
//! records served by the node API. The HTTP surface itself lives with the
//! embedder; these are the wire shapes it serializes.

mod api_version;
mod model;
mod time;

pub use api_version::ApiVersion;
pub use model::{ApiError, ClockRef, NodeApi, NodeClock, NodeEndpoint, NodeInterface, NodeSelf, NodeService};
pub use time::{Timestamp, Version};
