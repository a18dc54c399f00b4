use super::Snssai;
use serde::{Deserialize, Serialize};

/// IP flow and its packet filters (TS 29.214 encoding)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowInfo {
    pub flow_id: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
}

/// Ethernet packet filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthFlowDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_mac_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_mac_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlan_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInformation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_addr: Option<String>,
    pub port_number: u32,
}

/// Traffic route towards the location of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteToLocation {
    pub dnai: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_info: Option<RouteInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_prof_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalValidity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<String>,
}

/// Traffic influence subscription as created by the AF (TS 29.522 5.4.2.1.2)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluSub {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub af_service_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub af_app_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub af_trans_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub app_relo_ind: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dnn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snssai: Option<Snssai>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub any_ue_ind: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribed_events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_test_notification: bool,
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<FlowInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<EthFlowDescription>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic_routes: Vec<RouteToLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfc_corr_ind: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temp_validities: Vec<TemporalValidity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_geo_zone_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supp_feat: Option<String>,
}

impl TrafficInfluSub {
    /// Check the attributes TS 29.522 makes mandatory on creation.
    ///
    /// Returns the problem title of the first missing attribute.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.af_trans_id.is_empty() {
            return Err("Missing AfTransID attribute");
        }

        // Without afServiceId the DNN has to identify the service
        if self.af_service_id.is_empty() && self.dnn.is_empty() {
            return Err("Missing afServiceId attribute");
        }

        if self.af_app_id.is_empty()
            && self.traffic_filters.is_none()
            && self.eth_traffic_filters.is_none()
        {
            return Err("missing one of afAppId, trafficFilters, ethTrafficFilters");
        }

        Ok(())
    }

    /// True when the request addresses one UE rather than a group or any UE
    pub fn targets_single_ue(&self) -> bool {
        self.ipv4_addr.is_some() || self.ipv6_addr.is_some() || self.mac_addr.is_some()
    }

    /// Merge a partial update into this subscription
    pub fn apply_patch(&mut self, patch: &TrafficInfluSubPatch) {
        if let Some(ind) = patch.app_relo_ind {
            self.app_relo_ind = ind;
        }
        if let Some(filters) = &patch.traffic_filters {
            self.traffic_filters = Some(filters.clone());
        }
        if let Some(filters) = &patch.eth_traffic_filters {
            self.eth_traffic_filters = Some(filters.clone());
        }
        if let Some(routes) = &patch.traffic_routes {
            self.traffic_routes = routes.clone();
        }
        if let Some(ind) = patch.tfc_corr_ind {
            self.tfc_corr_ind = Some(ind);
        }
        if let Some(validities) = &patch.temp_validities {
            self.temp_validities = validities.clone();
        }
        if let Some(zones) = &patch.valid_geo_zone_ids {
            self.valid_geo_zone_ids = zones.clone();
        }
    }
}

/// Partial update of a traffic influence subscription (PATCH body)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluSubPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_relo_ind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<FlowInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<EthFlowDescription>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_routes: Option<Vec<RouteToLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfc_corr_ind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_validities: Option<Vec<TemporalValidity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_geo_zone_ids: Option<Vec<String>>,
}
