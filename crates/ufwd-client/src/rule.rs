//! The port-forward rule model.
//!
//! The gateway's wire format uses terse field names (`fwd`, `src`,
//! `dst_port`, …) and string-encoded port numbers, and the presence of
//! `destination_ip` is discriminated by `enabled`: enabled rules carry
//! it, disabled rules must not. Parsing is all-or-nothing — one bad
//! element fails the whole list.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Prefix for generated rule names. The random suffix keeps callers
/// from having to supply uniqueness; a collision is an acceptable
/// failure for the caller to retry with a fresh name.
pub const RULE_NAME_PREFIX: &str = "forwarding-tool-";

/// Protocols a rule can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    TcpUdp,
}

impl Protocol {
    /// The wire name, e.g. `"tcp_udp"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::TcpUdp => "tcp_udp",
        }
    }
}

/// Interfaces a rule can listen on. The gateway only ever reports `wan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceInterface {
    Wan,
}

/// Fields common to enabled and disabled rules, with wire strings
/// already mapped to integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortForwardRule {
    /// Opaque gateway-assigned id.
    pub id: String,
    pub name: String,
    pub source_interface: SourceInterface,
    /// Source match, typically `"any"`.
    pub source_address: String,
    /// Externally visible port.
    pub public_port: u16,
    /// Port on the target host.
    pub target_port: u16,
    /// IPv4 address of the target host.
    pub target_address: String,
    pub protocol: Protocol,
    pub logging_enabled: bool,
    pub site_id: String,
}

/// One rule on the gateway, tagged by its `enabled` discriminant.
///
/// Enabled rules additionally carry a destination address; disabled
/// rules legally lack it. Callers branch on the variant instead of
/// unwrapping an optional field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortForward {
    Enabled {
        rule: PortForwardRule,
        destination_address: String,
    },
    Disabled {
        rule: PortForwardRule,
    },
}

impl PortForward {
    /// The fields shared by both variants.
    pub fn rule(&self) -> &PortForwardRule {
        match self {
            PortForward::Enabled { rule, .. } => rule,
            PortForward::Disabled { rule } => rule,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PortForward::Enabled { .. })
    }

    /// The destination address, present only on enabled rules.
    pub fn destination_address(&self) -> Option<&str> {
        match self {
            PortForward::Enabled {
                destination_address,
                ..
            } => Some(destination_address),
            PortForward::Disabled { .. } => None,
        }
    }
}

/// A rule entry as the gateway sends it. Unknown fields are ignored;
/// the discriminant invariant is enforced in the conversion below.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPortForward {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "pfwd_interface")]
    source_interface: SourceInterface,
    #[serde(rename = "src")]
    source_address: String,
    dst_port: String,
    fwd_port: String,
    #[serde(rename = "fwd")]
    target_address: String,
    #[serde(rename = "proto")]
    protocol: Protocol,
    enabled: bool,
    #[serde(rename = "log")]
    logging_enabled: bool,
    site_id: String,
    destination_ip: Option<String>,
}

/// Top-level shape of the list response.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    pub(crate) meta: ResponseMeta,
    pub(crate) data: Vec<RawPortForward>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMeta {
    pub(crate) rc: String,
}

fn parse_port(field: &str, value: &str) -> GatewayResult<u16> {
    value.parse().map_err(|_| {
        GatewayError::UnexpectedShape(format!("{field} is not a port number: {value:?}"))
    })
}

impl TryFrom<RawPortForward> for PortForward {
    type Error = GatewayError;

    fn try_from(raw: RawPortForward) -> GatewayResult<Self> {
        let rule = PortForwardRule {
            public_port: parse_port("dst_port", &raw.dst_port)?,
            target_port: parse_port("fwd_port", &raw.fwd_port)?,
            id: raw.id,
            name: raw.name,
            source_interface: raw.source_interface,
            source_address: raw.source_address,
            target_address: raw.target_address,
            protocol: raw.protocol,
            logging_enabled: raw.logging_enabled,
            site_id: raw.site_id,
        };

        match (raw.enabled, raw.destination_ip) {
            (true, Some(destination_address)) => Ok(PortForward::Enabled {
                rule,
                destination_address,
            }),
            (true, None) => Err(GatewayError::UnexpectedShape(format!(
                "enabled rule {:?} is missing destination_ip",
                rule.id
            ))),
            (false, None) => Ok(PortForward::Disabled { rule }),
            (false, Some(_)) => Err(GatewayError::UnexpectedShape(format!(
                "disabled rule {:?} carries destination_ip",
                rule.id
            ))),
        }
    }
}

/// Parameters for creating a rule. Everything else in the create
/// payload is fixed by this tool.
#[derive(Debug, Clone)]
pub struct NewPortForward {
    pub public_port: u16,
    pub target_port: u16,
    /// IPv4 address traffic is forwarded to.
    pub target_address: String,
}

/// The create request body, in the gateway's wire shape.
#[derive(Debug, Serialize)]
pub(crate) struct CreatePayload {
    name: String,
    enabled: bool,
    pfwd_interface: &'static str,
    src: &'static str,
    dst_port: String,
    fwd: String,
    fwd_port: String,
    proto: Protocol,
    log: bool,
    // The gateway schema requires this field in the create payload even
    // though it only reports it back on enabled rules.
    destination_ip: &'static str,
}

impl CreatePayload {
    pub(crate) fn new(rule: &NewPortForward) -> Self {
        Self {
            name: format!("{RULE_NAME_PREFIX}{:08x}", rand::random::<u32>()),
            enabled: true,
            pfwd_interface: "wan",
            src: "any",
            dst_port: rule.public_port.to_string(),
            fwd: rule.target_address.clone(),
            fwd_port: rule.target_port.to_string(),
            proto: Protocol::TcpUdp,
            log: false,
            destination_ip: "any",
        }
    }
}
