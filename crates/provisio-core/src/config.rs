//! Execution config handed to every step of a run.
//!
//! The engine owns loading and validation of these documents; steps only
//! read them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for one workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The node the run operates on.
    #[serde(default)]
    pub node: NodeConfig,
    /// The cluster that owns the node.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Cloud account used to reach the provider.
    #[serde(default, rename = "awsConfig")]
    pub aws: AwsConfig,
}

/// Logical identity of a cluster node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Node name, also stored in the provider's node-name tag.
    pub name: String,
    /// Region the node was provisioned in, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Identity of the cluster a node belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
}

/// Credentials and placement for the AWS account.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfig {
    pub key_id: String,
    pub secret: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

impl AwsConfig {
    /// Returns `true` when both halves of the access key are present.
    pub fn has_credentials(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("region", &self.region)
            .field("availability_zone", &self.availability_zone)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_run_config() {
        let raw = r#"{
            "node": { "name": "worker-3", "region": "eu-west-1" },
            "cluster": { "name": "prod" },
            "awsConfig": {
                "keyId": "AKIA",
                "secret": "s3cr3t",
                "region": "eu-west-1",
                "availabilityZone": "eu-west-1a"
            }
        }"#;

        let cfg: Config = serde_json::from_str(raw).expect("valid config");
        assert_eq!(cfg.node.name, "worker-3");
        assert_eq!(cfg.cluster.name, "prod");
        assert_eq!(cfg.aws.availability_zone.as_deref(), Some("eu-west-1a"));
        assert!(cfg.aws.has_credentials());
    }

    #[test]
    fn test_missing_sections_default() {
        let cfg: Config = serde_json::from_str(r#"{"node": {"name": "n1"}}"#).expect("valid");
        assert_eq!(cfg.cluster, ClusterConfig::default());
        assert!(!cfg.aws.has_credentials());
    }

    #[test]
    fn test_secret_is_redacted() {
        let aws = AwsConfig {
            key_id: "AKIA".to_string(),
            secret: "s3cr3t".to_string(),
            region: "us-east-1".to_string(),
            availability_zone: None,
        };
        let printed = format!("{:?}", aws);
        assert!(printed.contains("AKIA"));
        assert!(!printed.contains("s3cr3t"));
    }
}
