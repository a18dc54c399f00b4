use super::{
    read_response, PfdSouthbound, SbResponse, SubscriptionContext, TrafficInfluenceSouthbound,
};
use crate::model::{
    EthFlowDescription, FlowInfo, Pfd, PfdData, RouteToLocation, Snssai, TrafficInfluSub,
    TrafficInfluSubPatch,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Application data stored in the UDR for multi-UE traffic influence (TS 29.519)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snssai: Option<Snssai>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inter_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub any_ue_ind: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<FlowInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<EthFlowDescription>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic_routes: Vec<RouteToLocation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub app_relo_ind: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfc_corr_ind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_path_chg_notif_corre_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_path_chg_notif_uri: Option<String>,
}

impl TrafficInfluData {
    pub fn from_subscription(ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Self {
        let wants_up_path = ti.subscribed_events.iter().any(|e| e == "UP_PATH_CHANGE");
        Self {
            af_app_id: non_empty(&ti.af_app_id),
            dnn: non_empty(&ti.dnn),
            snssai: ti.snssai.clone(),
            inter_group_id: ti.external_group_id.clone(),
            any_ue_ind: ti.any_ue_ind,
            traffic_filters: ti.traffic_filters.clone(),
            eth_traffic_filters: ti.eth_traffic_filters.clone(),
            traffic_routes: ti.traffic_routes.clone(),
            app_relo_ind: ti.app_relo_ind,
            tfc_corr_ind: ti.tfc_corr_ind,
            up_path_chg_notif_corre_id: Some(ctx.correlation_id.clone()),
            up_path_chg_notif_uri: wants_up_path.then(|| ctx.notification_uri.clone()),
        }
    }

    /// Overlay the UDR's view on top of the locally stored subscription
    pub fn merge_into(self, mut ti: TrafficInfluSub) -> TrafficInfluSub {
        ti.traffic_filters = self.traffic_filters.or(ti.traffic_filters);
        ti.eth_traffic_filters = self.eth_traffic_filters.or(ti.eth_traffic_filters);
        if !self.traffic_routes.is_empty() {
            ti.traffic_routes = self.traffic_routes;
        }
        ti.app_relo_ind = self.app_relo_ind;
        ti.tfc_corr_ind = self.tfc_corr_ind.or(ti.tfc_corr_ind);
        ti
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluDataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<FlowInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<EthFlowDescription>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_routes: Option<Vec<RouteToLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_relo_ind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfc_corr_ind: Option<bool>,
}

impl From<&TrafficInfluSubPatch> for TrafficInfluDataPatch {
    fn from(patch: &TrafficInfluSubPatch) -> Self {
        Self {
            traffic_filters: patch.traffic_filters.clone(),
            eth_traffic_filters: patch.eth_traffic_filters.clone(),
            traffic_routes: patch.traffic_routes.clone(),
            app_relo_ind: patch.app_relo_ind,
            tfc_corr_ind: patch.tfc_corr_ind,
        }
    }
}

/// PFDs of one application as stored in the UDR
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdDataForApp {
    pub application_id: String,
    #[serde(default)]
    pub pfds: Vec<PfdContent>,
    /// Absolute expiry of the cached PFDs (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pfd_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
}

/// Latest caching deadline handed to the UDR
const LATEST_CACHING_TIME: &str = "9999-12-31T23:59:59+00:00";

/// Absolute expiry `secs` from now, saturating at `LATEST_CACHING_TIME`
fn caching_deadline(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .filter(|at| at.year() <= 9999)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| LATEST_CACHING_TIME.to_string())
}

impl PfdDataForApp {
    pub fn from_pfd_data(app: &PfdData) -> Self {
        let caching_time = app.caching_time.map(caching_deadline);
        Self {
            application_id: app.external_app_id.clone(),
            pfds: app
                .pfds
                .values()
                .map(|pfd| PfdContent {
                    pfd_id: Some(pfd.pfd_id.clone()),
                    flow_descriptions: pfd.flow_descriptions.clone(),
                    urls: pfd.urls.clone(),
                    domain_names: pfd.domain_names.clone(),
                })
                .collect(),
            caching_time,
        }
    }

    pub fn into_pfd_data(self) -> PfdData {
        let pfds = self
            .pfds
            .into_iter()
            .enumerate()
            .map(|(idx, content)| {
                let pfd_id = content.pfd_id.unwrap_or_else(|| idx.to_string());
                let pfd = Pfd {
                    pfd_id: pfd_id.clone(),
                    flow_descriptions: content.flow_descriptions,
                    urls: content.urls,
                    domain_names: content.domain_names,
                };
                (pfd_id, pfd)
            })
            .collect();
        PfdData {
            external_app_id: self.application_id,
            pfds,
            ..Default::default()
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Nudr_DataRepository client for application data
pub struct UdrClient {
    client: Client,
    base_uri: String,
}

impl UdrClient {
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

    fn influence_url(&self, influence_id: &str) -> String {
        format!(
            "{}/nudr-dr/v1/application-data/influenceData/{}",
            self.base_uri,
            urlencoding::encode(influence_id)
        )
    }

    fn pfd_url(&self, app_id: &str) -> String {
        format!(
            "{}/nudr-dr/v1/application-data/pfds/{}",
            self.base_uri,
            urlencoding::encode(app_id)
        )
    }

    pub async fn put_influence_data(
        &self,
        influence_id: &str,
        data: &TrafficInfluData,
    ) -> Result<SbResponse<TrafficInfluData>> {
        let response = self
            .client
            .put(self.influence_url(influence_id))
            .json(data)
            .send()
            .await
            .context("Failed to send influence data to UDR")?;
        read_response(response).await
    }

    pub async fn patch_influence_data(
        &self,
        influence_id: &str,
        patch: &TrafficInfluDataPatch,
    ) -> Result<SbResponse<TrafficInfluData>> {
        let response = self
            .client
            .patch(self.influence_url(influence_id))
            .json(patch)
            .send()
            .await
            .context("Failed to send influence data patch to UDR")?;
        read_response(response).await
    }

    pub async fn get_influence_data(
        &self,
        influence_id: &str,
    ) -> Result<SbResponse<TrafficInfluData>> {
        let response = self
            .client
            .get(self.influence_url(influence_id))
            .send()
            .await
            .context("Failed to fetch influence data from UDR")?;
        read_response(response).await
    }

    pub async fn delete_influence_data(&self, influence_id: &str) -> Result<SbResponse<()>> {
        let response = self
            .client
            .delete(self.influence_url(influence_id))
            .send()
            .await
            .context("Failed to delete influence data at UDR")?;
        Ok(read_response::<IgnoredAny>(response).await?.map_body(|_| ()))
    }

    pub async fn put_pfd_data(&self, app: &PfdDataForApp) -> Result<SbResponse<PfdDataForApp>> {
        let response = self
            .client
            .put(self.pfd_url(&app.application_id))
            .json(app)
            .send()
            .await
            .context("Failed to send PFD data to UDR")?;
        read_response(response).await
    }

    pub async fn get_pfd_data(&self, app_id: &str) -> Result<SbResponse<PfdDataForApp>> {
        let response = self
            .client
            .get(self.pfd_url(app_id))
            .send()
            .await
            .context("Failed to fetch PFD data from UDR")?;
        read_response(response).await
    }

    pub async fn delete_pfd_data(&self, app_id: &str) -> Result<SbResponse<()>> {
        let response = self
            .client
            .delete(self.pfd_url(app_id))
            .send()
            .await
            .context("Failed to delete PFD data at UDR")?;
        Ok(read_response::<IgnoredAny>(response).await?.map_body(|_| ()))
    }
}

/// Multi-UE traffic influence provisioned as UDR application data
pub struct UdrTrafficInfluence {
    udr: Arc<UdrClient>,
}

impl UdrTrafficInfluence {
    pub fn new(udr: Arc<UdrClient>) -> Self {
        Self { udr }
    }
}

#[async_trait]
impl TrafficInfluenceSouthbound for UdrTrafficInfluence {
    fn name(&self) -> &'static str {
        "udr"
    }

    async fn get(
        &self,
        ctx: &SubscriptionContext,
        current: &TrafficInfluSub,
    ) -> Result<SbResponse<TrafficInfluSub>> {
        let resp = self.udr.get_influence_data(&ctx.influence_id).await?;
        let current = current.clone();
        Ok(resp.map_body(|data| data.merge_into(current)))
    }

    async fn put(&self, ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Result<SbResponse<()>> {
        let data = TrafficInfluData::from_subscription(ctx, ti);
        let resp = self.udr.put_influence_data(&ctx.influence_id, &data).await?;
        tracing::debug!(
            af_id = %ctx.af_id,
            influence_id = %ctx.influence_id,
            status = resp.status,
            "UDR influence data PUT"
        );
        Ok(resp.map_body(|_| ()))
    }

    async fn patch(
        &self,
        ctx: &SubscriptionContext,
        patch: &TrafficInfluSubPatch,
    ) -> Result<SbResponse<()>> {
        let resp = self
            .udr
            .patch_influence_data(&ctx.influence_id, &TrafficInfluDataPatch::from(patch))
            .await?;
        Ok(resp.map_body(|_| ()))
    }

    async fn delete(&self, ctx: &SubscriptionContext) -> Result<SbResponse<()>> {
        self.udr.delete_influence_data(&ctx.influence_id).await
    }
}

/// PFDs provisioned per application in the UDR
pub struct UdrPfd {
    udr: Arc<UdrClient>,
}

impl UdrPfd {
    pub fn new(udr: Arc<UdrClient>) -> Self {
        Self { udr }
    }
}

#[async_trait]
impl PfdSouthbound for UdrPfd {
    fn name(&self) -> &'static str {
        "udr"
    }

    async fn get_application(&self, app_id: &str) -> Result<SbResponse<PfdData>> {
        let resp = self.udr.get_pfd_data(app_id).await?;
        Ok(resp.map_body(PfdDataForApp::into_pfd_data))
    }

    async fn put_application(&self, app: &PfdData) -> Result<SbResponse<()>> {
        let resp = self
            .udr
            .put_pfd_data(&PfdDataForApp::from_pfd_data(app))
            .await?;
        tracing::debug!(
            app_id = %app.external_app_id,
            status = resp.status,
            "UDR PFD data PUT"
        );
        Ok(resp.map_body(|_| ()))
    }

    async fn delete_application(&self, app_id: &str) -> Result<SbResponse<()>> {
        self.udr.delete_pfd_data(app_id).await
    }
}
