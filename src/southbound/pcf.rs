use super::{read_response, SbResponse, SubscriptionContext, TrafficInfluenceSouthbound};
use crate::model::traffic_influence::TemporalValidity;
use crate::model::{RouteToLocation, Snssai, TrafficInfluSub, TrafficInfluSubPatch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Subscription to UP path change events carried in the routing requirement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpPathChgEvent {
    pub notification_uri: String,
    pub notif_corre_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
}

/// AF routing requirement (TS 29.514)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfRoutingRequirement {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub app_reloc: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route_to_locs: Vec<RouteToLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temp_vals: Vec<TemporalValidity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_path_chg_sub: Option<UpPathChgEvent>,
}

impl AfRoutingRequirement {
    fn from_subscription(ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Self {
        let wants_up_path = ti.subscribed_events.iter().any(|e| e == "UP_PATH_CHANGE");
        Self {
            app_reloc: ti.app_relo_ind,
            route_to_locs: ti.traffic_routes.clone(),
            temp_vals: ti.temp_validities.clone(),
            up_path_chg_sub: wants_up_path.then(|| UpPathChgEvent {
                notification_uri: ctx.notification_uri.clone(),
                notif_corre_id: ctx.correlation_id.clone(),
                dnai_chg_type: ti.dnai_chg_type.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSessionContextReqData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_rout_req: Option<AfRoutingRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_info: Option<Snssai>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ue_ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ue_ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ue_mac: Option<String>,
    #[serde(default)]
    pub notif_uri: String,
    #[serde(default)]
    pub supp_feat: String,
}

/// Npcf_PolicyAuthorization application session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSessionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asc_req_data: Option<AppSessionContextReqData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSessionContextUpdateData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_rout_req: Option<AfRoutingRequirement>,
}

/// Npcf_PolicyAuthorization client
pub struct PcfClient {
    client: Client,
    base_uri: String,
}

impl PcfClient {
    pub fn new(base_uri: &str, timeout: Duration) -> Self {
        Self {
            client: super::http_client(timeout),
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn sessions_url(&self) -> String {
        format!("{}/npcf-policyauthorization/v1/app-sessions", self.base_uri)
    }

    fn session_url(&self, app_session_id: &str) -> String {
        format!(
            "{}/{}",
            self.sessions_url(),
            urlencoding::encode(app_session_id)
        )
    }

    pub async fn create_app_session(
        &self,
        context: &AppSessionContext,
    ) -> Result<SbResponse<AppSessionContext>> {
        let response = self
            .client
            .post(self.sessions_url())
            .json(context)
            .send()
            .await
            .context("Failed to send app session creation request to PCF")?;
        read_response(response).await
    }

    pub async fn update_app_session(
        &self,
        app_session_id: &str,
        update: &AppSessionContextUpdateData,
    ) -> Result<SbResponse<AppSessionContext>> {
        let response = self
            .client
            .patch(self.session_url(app_session_id))
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .json(update)
            .send()
            .await
            .context("Failed to send app session update to PCF")?;
        read_response(response).await
    }

    pub async fn get_app_session(
        &self,
        app_session_id: &str,
    ) -> Result<SbResponse<AppSessionContext>> {
        let response = self
            .client
            .get(self.session_url(app_session_id))
            .send()
            .await
            .context("Failed to fetch app session from PCF")?;
        read_response(response).await
    }

    pub async fn delete_app_session(&self, app_session_id: &str) -> Result<SbResponse<()>> {
        let response = self
            .client
            .post(format!("{}/delete", self.session_url(app_session_id)))
            .send()
            .await
            .context("Failed to send app session deletion to PCF")?;
        Ok(read_response::<IgnoredAny>(response).await?.map_body(|_| ()))
    }
}

/// Single-UE traffic influence through PCF application sessions
pub struct PcfTrafficInfluence {
    pcf: Arc<PcfClient>,
}

impl PcfTrafficInfluence {
    pub fn new(pcf: Arc<PcfClient>) -> Self {
        Self { pcf }
    }
}

#[async_trait]
impl TrafficInfluenceSouthbound for PcfTrafficInfluence {
    fn name(&self) -> &'static str {
        "pcf"
    }

    async fn get(
        &self,
        ctx: &SubscriptionContext,
        current: &TrafficInfluSub,
    ) -> Result<SbResponse<TrafficInfluSub>> {
        let Some(app_session_id) = ctx.app_session_id.as_deref() else {
            return Ok(SbResponse::ok(200, Some(current.clone())));
        };

        let resp = self.pcf.get_app_session(app_session_id).await?;
        let mut ti = current.clone();
        Ok(resp.map_body(|session| {
            if let Some(req) = session.asc_req_data.and_then(|d| d.af_rout_req) {
                ti.app_relo_ind = req.app_reloc;
                if !req.route_to_locs.is_empty() {
                    ti.traffic_routes = req.route_to_locs;
                }
            }
            ti
        }))
    }

    async fn put(&self, ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Result<SbResponse<()>> {
        let rout_req = AfRoutingRequirement::from_subscription(ctx, ti);

        // A replaced subscription keeps its application session
        if let Some(app_session_id) = ctx.app_session_id.as_deref() {
            let update = AppSessionContextUpdateData {
                af_app_id: (!ti.af_app_id.is_empty()).then(|| ti.af_app_id.clone()),
                af_rout_req: Some(rout_req),
            };
            let resp = self.pcf.update_app_session(app_session_id, &update).await?;
            return Ok(resp.map_body(|_| ()));
        }

        let context = AppSessionContext {
            asc_req_data: Some(AppSessionContextReqData {
                af_app_id: (!ti.af_app_id.is_empty()).then(|| ti.af_app_id.clone()),
                af_rout_req: Some(rout_req),
                dnn: (!ti.dnn.is_empty()).then(|| ti.dnn.clone()),
                slice_info: ti.snssai.clone(),
                gpsi: ti.gpsi.clone(),
                ue_ipv4: ti.ipv4_addr.clone(),
                ue_ipv6: ti.ipv6_addr.clone(),
                ue_mac: ti.mac_addr.clone(),
                notif_uri: ctx.notification_uri.clone(),
                supp_feat: ti.supp_feat.clone().unwrap_or_default(),
            }),
        };
        let resp = self.pcf.create_app_session(&context).await?;
        if resp.is_success() && resp.resource_id().is_none() {
            tracing::warn!(
                af_id = %ctx.af_id,
                subscription_id = ctx.subscription_id,
                "Location header missing in PCF app session response"
            );
        }
        Ok(resp.map_body(|_| ()))
    }

    async fn patch(
        &self,
        ctx: &SubscriptionContext,
        patch: &TrafficInfluSubPatch,
    ) -> Result<SbResponse<()>> {
        let Some(app_session_id) = ctx.app_session_id.as_deref() else {
            return Ok(SbResponse::failed(404, None));
        };

        let update = AppSessionContextUpdateData {
            af_app_id: None,
            af_rout_req: Some(AfRoutingRequirement {
                app_reloc: patch.app_relo_ind.unwrap_or_default(),
                route_to_locs: patch.traffic_routes.clone().unwrap_or_default(),
                temp_vals: patch.temp_validities.clone().unwrap_or_default(),
                up_path_chg_sub: None,
            }),
        };
        let resp = self.pcf.update_app_session(app_session_id, &update).await?;
        Ok(resp.map_body(|_| ()))
    }

    async fn delete(&self, ctx: &SubscriptionContext) -> Result<SbResponse<()>> {
        match ctx.app_session_id.as_deref() {
            Some(app_session_id) => self.pcf.delete_app_session(app_session_id).await,
            None => {
                tracing::warn!(
                    af_id = %ctx.af_id,
                    subscription_id = ctx.subscription_id,
                    "No PCF app session recorded, nothing to delete"
                );
                Ok(SbResponse::ok(204, None))
            }
        }
    }
}
