use serde::Serialize;
use std::collections::BTreeMap;

/// Implementation status of a broker integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerStatus {
    Implemented,
    Planned,
}

/// Catalog entry describing a broker integration.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerDescriptor {
    pub name: &'static str,
    pub status: BrokerStatus,
    pub description: &'static str,
}

/// Payload of `GET /broker`.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerInfo {
    pub current_broker: String,
    pub available_brokers: BTreeMap<&'static str, BrokerDescriptor>,
    pub connected: bool,
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub message: &'static str,
    pub version: &'static str,
}
