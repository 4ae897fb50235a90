//! Build identification record

use serde::{Deserialize, Serialize};

/// Immutable build identification, attached once as constant labels on a
/// gauge set to 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub revision_id: String,
    pub build_date: String,
    pub version: String,
    pub git_hash: String,
    pub role_seeding_version: String,
}

impl BuildInfo {
    /// Constant label pairs, in a fixed order.
    pub fn const_labels(&self) -> [(&'static str, &str); 5] {
        [
            ("revision_id", self.revision_id.as_str()),
            ("build_date", self.build_date.as_str()),
            ("version", self.version.as_str()),
            ("git_hash", self.git_hash.as_str()),
            ("role_seeding_version", self.role_seeding_version.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_labels_order() {
        let info = BuildInfo {
            revision_id: "a41133".to_string(),
            build_date: "2026-10-16".to_string(),
            version: "1.1.0".to_string(),
            git_hash: "a41133".to_string(),
            role_seeding_version: "1.0.0".to_string(),
        };
        let labels = info.const_labels();
        assert_eq!(labels[0], ("revision_id", "a41133"));
        assert_eq!(labels[2], ("version", "1.1.0"));
        assert_eq!(labels[4], ("role_seeding_version", "1.0.0"));
    }

    #[test]
    fn test_build_info_deserializes_from_json() {
        let info: BuildInfo = serde_json::from_str(
            r#"{"revision_id":"r1","build_date":"d","version":"0.4.0","git_hash":"h","role_seeding_version":"s"}"#,
        )
        .unwrap();
        assert_eq!(info.version, "0.4.0");
    }
}
