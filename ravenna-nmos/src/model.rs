//! The JSON records served by the node API (AMWA IS-04).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Version;

/// The node's `self` resource, `GET /x-nmos/node/{version}/self`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSelf {
    pub id: String,
    pub version: Version,
    pub label: String,
    pub description: String,
    pub tags: BTreeMap<String, Vec<String>>,
    pub href: String,
    pub caps: BTreeMap<String, serde_json::Value>,
    pub api: NodeApi,
    pub services: Vec<NodeService>,
    pub clocks: Vec<NodeClock>,
    pub interfaces: Vec<NodeInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeApi {
    pub versions: Vec<crate::ApiVersion>,
    pub endpoints: Vec<NodeEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeService {
    pub href: String,
    #[serde(rename = "type")]
    pub service_type: String,
}

/// A clock advertised by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClock {
    pub name: String,
    #[serde(flatten)]
    pub reference: ClockRef,
}

/// Clock reference variants per the IS-04 schema, discriminated by
/// `ref_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ref_type", rename_all = "lowercase")]
pub enum ClockRef {
    Internal,
    Ptp {
        traceable: bool,
        version: String,
        gmid: String,
        locked: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInterface {
    pub chassis_id: Option<String>,
    pub port_id: String,
    pub name: String,
}

/// The error payload every non-2xx node API response carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub error: String,
    pub debug: String,
}
