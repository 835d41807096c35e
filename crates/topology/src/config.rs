use serde::{Deserialize, Serialize};

/// Topology behaviour switches, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Whether topologies answer output-node collection queries. Older
    /// platform revisions report the query as unsupported.
    #[serde(default = "default_output_collections")]
    pub output_collections: bool,
}

fn default_output_collections() -> bool { true }

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            output_collections: default_output_collections(),
        }
    }
}
