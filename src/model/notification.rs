use super::RouteToLocation;
use serde::{Deserialize, Serialize};

/// SMF event name for a user plane path change
pub const UP_PATH_CH: &str = "UP_PATH_CH";

/// AF facing event name for a user plane path change
pub const UP_PATH_CHANGE: &str = "UP_PATH_CHANGE";

/// Nsmf_EventExposure notification sent by the SMF (TS 29.508)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsmfEventExposureNotification {
    #[serde(default)]
    pub notif_id: String,
    #[serde(default)]
    pub event_notifs: Vec<NsmfEventNotification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsmfEventNotification {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tra_routing: Option<RouteToLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tra_routing: Option<RouteToLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dnai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dnai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ue_ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ue_ipv6_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ue_ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ue_ipv6_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ue_mac: Option<String>,
}

/// Traffic influence event notification delivered to the AF (TS 29.522)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_trans_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_traffic_route: Option<RouteToLocation>,
    pub subscribed_event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_traffic_route: Option<RouteToLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dnai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dnai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ue_ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ue_ipv6_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_ue_ipv4_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_ue_ipv6_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ue_mac: Option<String>,
}

impl EventNotification {
    /// Map an SMF UP path change onto the AF notification shape
    pub fn from_up_path_change(af_trans_id: &str, ev: &NsmfEventNotification) -> Self {
        Self {
            af_trans_id: Some(af_trans_id.to_string()),
            dnai_chg_type: ev.dnai_chg_type.clone(),
            source_traffic_route: ev.source_tra_routing.clone(),
            subscribed_event: UP_PATH_CHANGE.to_string(),
            target_traffic_route: ev.target_tra_routing.clone(),
            source_dnai: ev.source_dnai.clone(),
            target_dnai: ev.target_dnai.clone(),
            gpsi: ev.gpsi.clone(),
            src_ue_ipv4_addr: ev.source_ue_ipv4_addr.clone(),
            src_ue_ipv6_prefix: ev.source_ue_ipv6_prefix.clone(),
            tgt_ue_ipv4_addr: ev.target_ue_ipv4_addr.clone(),
            tgt_ue_ipv6_prefix: ev.target_ue_ipv6_prefix.clone(),
            ue_mac: ev.ue_mac.clone(),
        }
    }
}
