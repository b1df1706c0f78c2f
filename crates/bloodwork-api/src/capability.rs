use serde::{Deserialize, Serialize};

use crate::{FHIR_JSON, JSON};

/// `GET /fhir/metadata` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    pub resource_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub kind: String,
    pub fhir_version: String,
    pub format: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest: Vec<RestCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestCapability {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<ResourceCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapability {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction: Vec<Interaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParam {
    pub name: String,
    /// string, token, reference, date
    #[serde(rename = "type")]
    pub param_type: String,
}

impl CapabilityStatement {
    /// An active FHIR R4 server instance speaking JSON only.
    pub fn server(resources: Vec<ResourceCapability>) -> Self {
        Self {
            resource_type: "CapabilityStatement".into(),
            status: "active".into(),
            date: None,
            kind: "instance".into(),
            fhir_version: "4.0.1".into(),
            format: vec![FHIR_JSON.into(), JSON.into()],
            rest: vec![RestCapability {
                mode: "server".into(),
                resource: resources,
            }],
        }
    }

    pub fn with_date(self, date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..self
        }
    }
}

impl ResourceCapability {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            interaction: Vec::new(),
            search_param: Vec::new(),
        }
    }

    pub fn with_interactions(mut self, codes: &[&str]) -> Self {
        self.interaction
            .extend(codes.iter().map(|code| Interaction { code: (*code).into() }));
        self
    }

    pub fn with_search_param(mut self, name: &str, param_type: &str) -> Self {
        self.search_param.push(SearchParam {
            name: name.into(),
            param_type: param_type.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_fhir_field_names() {
        let statement = CapabilityStatement::server(vec![
            ResourceCapability::new("Observation")
                .with_interactions(&["read", "search-type"])
                .with_search_param("code", "token")
                .with_search_param("date", "date"),
        ]);
        let j = serde_json::to_value(&statement).unwrap();
        assert_eq!(j["resourceType"], "CapabilityStatement");
        assert_eq!(j["fhirVersion"], "4.0.1");
        assert_eq!(j["format"][0], FHIR_JSON);
        assert_eq!(j["rest"][0]["mode"], "server");
        let resource = &j["rest"][0]["resource"][0];
        assert_eq!(resource["type"], "Observation");
        assert_eq!(resource["interaction"][1]["code"], "search-type");
        assert_eq!(resource["searchParam"][1]["type"], "date");
        assert!(j.get("date").is_none());
    }

    #[test]
    fn date_is_emitted_when_set() {
        let j = serde_json::to_value(CapabilityStatement::server(Vec::new()).with_date("2024-01-01")).unwrap();
        assert_eq!(j["date"], "2024-01-01");
        assert!(j["rest"][0].get("resource").is_none());
    }
}
