//! Policy objects embedded in NanoTDF headers
//!
//! The header carries this JSON (encrypted or not):
//!
//! ```json
//! {"uuid": "...", "body": {"dataAttributes": [...], "dissem": [...]}}
//! ```

use crate::error::NanoTdfError;
use crate::kas_key::KasPublicKeyInfo;
use serde::{Deserialize, Serialize};

/// Attribute object schema version
pub const ATTRIBUTE_SCHEMA_VERSION: &str = "1.1.0";

/// A data attribute together with the KAS that guards it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeObject {
    /// Attribute FQN, e.g. `https://example.com/attr/classification/value/secret`
    pub attribute: String,
    pub is_default: bool,
    pub display_name: String,
    pub pub_key: String,
    pub kas_url: String,
    pub schema_version: String,
}

impl AttributeObject {
    pub fn new(attribute: impl Into<String>, kas: &KasPublicKeyInfo) -> Self {
        Self {
            attribute: attribute.into(),
            is_default: false,
            display_name: String::new(),
            pub_key: kas.public_key_pem.clone(),
            kas_url: kas.url.clone(),
            schema_version: ATTRIBUTE_SCHEMA_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBody {
    pub data_attributes: Vec<AttributeObject>,
    pub dissem: Vec<String>,
}

/// Policy object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub uuid: String,
    pub body: PolicyBody,
}

impl Policy {
    /// True when neither attributes nor dissemination restrict access
    pub fn is_unrestricted(&self) -> bool {
        self.body.data_attributes.is_empty() && self.body.dissem.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, NanoTdfError> {
        serde_json::to_vec(self)
            .map_err(|e| NanoTdfError::Internal(format!("policy serialization: {}", e)))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, NanoTdfError> {
        serde_json::from_slice(bytes)
            .map_err(|e| NanoTdfError::InvalidFile(format!("policy is not valid JSON: {}", e)))
    }
}

/// Builder for [`Policy`]
///
/// # Example
///
/// ```
/// use nanotdf::PolicyBuilder;
///
/// let policy = PolicyBuilder::new()
///     .dissem(["user@example.com"])
///     .build();
/// assert_eq!(policy.body.dissem, vec!["user@example.com".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    uuid: String,
    data_attributes: Vec<AttributeObject>,
    dissem: Vec<String>,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    /// Builder with a random v4 UUID
    pub fn new() -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            data_attributes: Vec::new(),
            dissem: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeObject) -> Self {
        self.data_attributes.push(attribute);
        self
    }

    /// Add entities to the dissemination list, dropping duplicates
    #[must_use]
    pub fn dissem<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for entity in entities {
            let entity = entity.into();
            if !self.dissem.contains(&entity) {
                self.dissem.push(entity);
            }
        }
        self
    }

    pub fn build(self) -> Policy {
        Policy {
            uuid: self.uuid,
            body: PolicyBody {
                data_attributes: self.data_attributes,
                dissem: self.dissem,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn kas() -> KasPublicKeyInfo {
        KasPublicKeyInfo {
            url: "https://kas.example.com/kas".to_string(),
            algorithm: "ec:secp256r1".to_string(),
            kid: Some("e1".to_string()),
            public_key_pem: "-----BEGIN PUBLIC KEY-----".to_string(),
        }
    }

    #[test]
    fn test_policy_json_shape() {
        let policy = PolicyBuilder::new()
            .id("00000000-0000-4000-8000-000000000000")
            .attribute(AttributeObject::new(
                "https://example.com/attr/classification/value/secret",
                &kas(),
            ))
            .dissem(["alice@example.com"])
            .build();

        let value: Value = serde_json::from_slice(&policy.to_json().unwrap()).unwrap();
        assert_eq!(value["uuid"], "00000000-0000-4000-8000-000000000000");
        let attribute = &value["body"]["dataAttributes"][0];
        assert_eq!(
            attribute["attribute"],
            "https://example.com/attr/classification/value/secret"
        );
        assert_eq!(attribute["kasUrl"], "https://kas.example.com/kas");
        assert_eq!(attribute["isDefault"], false);
        assert_eq!(attribute["schemaVersion"], "1.1.0");
        assert_eq!(value["body"]["dissem"][0], "alice@example.com");

        assert_eq!(Policy::from_json(&policy.to_json().unwrap()).unwrap(), policy);
    }

    #[test]
    fn test_dissem_deduplicates() {
        let policy = PolicyBuilder::new()
            .dissem(["a@example.com", "b@example.com"])
            .dissem(["a@example.com"])
            .build();
        assert_eq!(policy.body.dissem.len(), 2);
    }

    #[test]
    fn test_unrestricted() {
        assert!(PolicyBuilder::new().build().is_unrestricted());
        assert!(!PolicyBuilder::new().dissem(["x"]).build().is_unrestricted());
        assert!(uuid::Uuid::parse_str(&PolicyBuilder::new().build().uuid).is_ok());
    }
}
