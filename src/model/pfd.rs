use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why the network could not provision the PFDs of an application (TS 29.122)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    Malfunction,
    ResourceLimitation,
    ShortDelay,
    AppIdDuplicated,
    OtherReason,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::Malfunction => "MALFUNCTION",
            FailureCode::ResourceLimitation => "RESOURCE_LIMITATION",
            FailureCode::ShortDelay => "SHORT_DELAY",
            FailureCode::AppIdDuplicated => "APP_ID_DUPLICATED",
            FailureCode::OtherReason => "OTHER_REASON",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single packet flow description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pfd {
    #[serde(default)]
    pub pfd_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
}

impl Pfd {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pfd_id.is_empty() {
            return Err("PFD ID missing");
        }
        if self.domain_names.is_empty() && self.flow_descriptions.is_empty() && self.urls.is_empty()
        {
            return Err("No domainNames, flowDescriptions and urls present for PFD");
        }
        Ok(())
    }
}

/// PFDs of one external application, keyed by PFD ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdData {
    #[serde(default)]
    pub external_app_id: String,
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default)]
    pub pfds: BTreeMap<String, Pfd>,
    /// Seconds the AF allows before the PFDs must be in force
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_delay: Option<u64>,
    /// Caching hint in seconds, handed to the UDR unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<u64>,
}

impl PfdData {
    /// Validate every PFD of the application
    pub fn validate_pfds(&self) -> Result<(), &'static str> {
        self.pfds.values().try_for_each(Pfd::validate)
    }
}

/// Report of applications whose PFDs failed for a common reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdReport {
    pub external_app_ids: Vec<String>,
    pub failure_code: FailureCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<u64>,
}

/// PFD management transaction resource (TS 29.122 4.4.10)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdManagement {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default)]
    pub pfd_datas: BTreeMap<String, PfdData>,
    /// Filled only on the response of the operation that produced the reports
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pfd_reports: BTreeMap<String, PfdReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supp_feat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_test_notification: bool,
}

impl PfdManagement {
    /// Check the transaction payload before any application is provisioned.
    ///
    /// Every application needs an external application ID matching its key
    /// and at least one valid PFD.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pfd_datas.is_empty() {
            return Err("Missing PFD Data");
        }

        for (app_id, app) in &self.pfd_datas {
            if app.external_app_id.is_empty() {
                return Err("Missing Application ID");
            }
            if &app.external_app_id != app_id {
                return Err("Application ID does not match its key");
            }
            if app.pfds.is_empty() {
                return Err("Missing PFD Data");
            }
            app.validate_pfds()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pfd(id: &str) -> Pfd {
        Pfd {
            pfd_id: id.to_string(),
            urls: vec!["^http://www.example.com(/\\S*)?$".to_string()],
            ..Default::default()
        }
    }

    fn app(id: &str) -> PfdData {
        PfdData {
            external_app_id: id.to_string(),
            pfds: [("p1".to_string(), pfd("p1"))].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_failure_code_wire_names() {
        assert_eq!(
            serde_json::to_value(FailureCode::AppIdDuplicated).unwrap(),
            json!("APP_ID_DUPLICATED")
        );
        assert_eq!(FailureCode::OtherReason.to_string(), "OTHER_REASON");
    }

    #[test]
    fn test_pfd_requires_id_and_content() {
        assert!(pfd("p1").validate().is_ok());
        assert_eq!(Pfd::default().validate(), Err("PFD ID missing"));

        let empty = Pfd {
            pfd_id: "p1".to_string(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_management_validation() {
        let mut trans = PfdManagement::default();
        assert_eq!(trans.validate(), Err("Missing PFD Data"));

        trans.pfd_datas.insert("app1".to_string(), app("app1"));
        assert!(trans.validate().is_ok());

        trans.pfd_datas.insert("app2".to_string(), app("other"));
        assert!(trans.validate().is_err());
    }

    #[test]
    fn test_management_rejects_app_without_pfds() {
        let mut trans = PfdManagement::default();
        let mut bare = app("app1");
        bare.pfds.clear();
        trans.pfd_datas.insert("app1".to_string(), bare);
        assert_eq!(trans.validate(), Err("Missing PFD Data"));
    }

    #[test]
    fn test_reports_omitted_when_empty() {
        let mut trans = PfdManagement::default();
        trans.pfd_datas.insert("app1".to_string(), app("app1"));
        let value = serde_json::to_value(&trans).unwrap();
        assert!(value.get("pfdReports").is_none());
        assert!(value["pfdDatas"]["app1"]["pfds"]["p1"].is_object());
    }
}
