//! Configuration types for the network correlator.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    pub max_requests_per_screen: usize,
    pub query_cap_len: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_requests_per_screen: 150,
            query_cap_len: 50,
        }
    }
}
