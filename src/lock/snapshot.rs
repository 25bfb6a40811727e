use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Lock, ResourceName};
use crate::transaction::TransactionId;

/// Granted and waiting locks of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub name: ResourceName,
    /// Granted locks in acquisition order.
    pub granted: Vec<Lock>,
    /// Requested locks in queue order.
    pub waiting: Vec<Lock>,
}

/// Point-in-time copy of the whole lock table.
///
/// Resources without granted or waiting locks are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTableSnapshot {
    pub resources: Vec<ResourceSnapshot>,
    pub transactions: BTreeMap<TransactionId, Vec<Lock>>,
}

impl LockTableSnapshot {
    pub fn resource(&self, name: &ResourceName) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|resource| &resource.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
