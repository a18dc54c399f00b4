//! Southbound dispatch towards the UDR and PCF.
//!
//! Each subscription and PFD transaction keeps the strategy it was bound to at
//! creation, so lifecycle code never branches on the transport in use and
//! tests can hand individual entities a fault-injecting strategy.

mod emulated;
mod fault;
mod pcf;
mod udr;

pub use emulated::EmulatedSouthbound;
pub use fault::FaultInjectingPfd;
pub use pcf::{PcfClient, PcfTrafficInfluence};
pub use udr::{UdrClient, UdrPfd, UdrTrafficInfluence};

use crate::config::{SouthboundConfig, SouthboundMode};
use crate::model::{FailureCode, PfdData, ProblemDetails, TrafficInfluSub, TrafficInfluSubPatch};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one southbound request that reached the remote side
#[derive(Debug, Clone)]
pub struct SbResponse<T> {
    pub status: u16,
    pub body: Option<T>,
    pub problem: Option<ProblemDetails>,
    /// `Location` header, when the remote created a resource
    pub location: Option<String>,
    /// Explicit PFD failure reason supplied by the remote
    pub failure_code: Option<FailureCode>,
}

impl<T> SbResponse<T> {
    pub fn ok(status: u16, body: Option<T>) -> Self {
        Self {
            status,
            body,
            problem: None,
            location: None,
            failure_code: None,
        }
    }

    pub fn failed(status: u16, failure_code: Option<FailureCode>) -> Self {
        Self {
            status,
            body: None,
            problem: None,
            location: None,
            failure_code,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn map_body<U>(self, f: impl FnOnce(T) -> U) -> SbResponse<U> {
        SbResponse {
            status: self.status,
            body: self.body.map(f),
            problem: self.problem,
            location: self.location,
            failure_code: self.failure_code,
        }
    }

    /// Last path segment of the `Location` header
    pub fn resource_id(&self) -> Option<&str> {
        self.location
            .as_deref()
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Identifiers the southbound needs to address a subscription's remote state
#[derive(Debug, Clone)]
pub struct SubscriptionContext {
    pub af_id: String,
    pub subscription_id: u64,
    pub correlation_id: String,
    /// UDR influence data key (multi-UE case)
    pub influence_id: String,
    /// PCF application session (single-UE case), known after creation
    pub app_session_id: Option<String>,
    /// Where the SMF should send UP path change notifications
    pub notification_uri: String,
}

/// Traffic influence operations against the UDR or PCF
#[async_trait]
pub trait TrafficInfluenceSouthbound: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the remote view of the subscription
    async fn get(
        &self,
        ctx: &SubscriptionContext,
        current: &TrafficInfluSub,
    ) -> Result<SbResponse<TrafficInfluSub>>;

    /// Create or fully replace the remote state
    async fn put(&self, ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Result<SbResponse<()>>;

    async fn patch(
        &self,
        ctx: &SubscriptionContext,
        patch: &TrafficInfluSubPatch,
    ) -> Result<SbResponse<()>>;

    async fn delete(&self, ctx: &SubscriptionContext) -> Result<SbResponse<()>>;
}

/// PFD operations, one external application per call
#[async_trait]
pub trait PfdSouthbound: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_application(&self, app_id: &str) -> Result<SbResponse<PfdData>>;

    async fn put_application(&self, app: &PfdData) -> Result<SbResponse<()>>;

    async fn delete_application(&self, app_id: &str) -> Result<SbResponse<()>>;
}

/// Strategy selection for newly created entities
#[derive(Clone)]
pub struct Southbound {
    single_ue: Arc<dyn TrafficInfluenceSouthbound>,
    multi_ue: Arc<dyn TrafficInfluenceSouthbound>,
    pfd: Arc<dyn PfdSouthbound>,
    timeout: Duration,
}

impl Southbound {
    pub fn new(
        single_ue: Arc<dyn TrafficInfluenceSouthbound>,
        multi_ue: Arc<dyn TrafficInfluenceSouthbound>,
        pfd: Arc<dyn PfdSouthbound>,
    ) -> Self {
        Self {
            single_ue,
            multi_ue,
            pfd,
            timeout: Duration::from_secs(10),
        }
    }

    /// Same traffic influence strategy for every subscription
    pub fn uniform(
        traffic_influence: Arc<dyn TrafficInfluenceSouthbound>,
        pfd: Arc<dyn PfdSouthbound>,
    ) -> Self {
        Self::new(traffic_influence.clone(), traffic_influence, pfd)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the stack described by the configuration
    pub fn from_config(cfg: &SouthboundConfig) -> Self {
        let southbound = match cfg.mode {
            SouthboundMode::Emulated => {
                let emulated = Arc::new(EmulatedSouthbound::new());
                Self::new(emulated.clone(), emulated.clone(), emulated)
            }
            SouthboundMode::Network => {
                let udr = Arc::new(UdrClient::new(&cfg.udr_uri, cfg.timeout()));
                let pcf = Arc::new(PcfClient::new(&cfg.pcf_uri, cfg.timeout()));
                Self::new(
                    Arc::new(PcfTrafficInfluence::new(pcf)),
                    Arc::new(UdrTrafficInfluence::new(udr.clone())),
                    Arc::new(UdrPfd::new(udr)),
                )
            }
        };

        let southbound = if cfg.fault_injection.enabled {
            let fault = &cfg.fault_injection;
            let app_ids: HashSet<String> = fault.app_ids.iter().cloned().collect();
            let pfd = Arc::new(FaultInjectingPfd::new(
                southbound.pfd.clone(),
                app_ids,
                fault.failure_code,
            ));
            Self {
                pfd,
                ..southbound
            }
        } else {
            southbound
        };

        southbound.with_timeout(cfg.timeout())
    }

    /// Single-UE requests go through the PCF, the rest through the UDR
    pub fn for_subscription(&self, ti: &TrafficInfluSub) -> Arc<dyn TrafficInfluenceSouthbound> {
        if ti.targets_single_ue() {
            self.single_ue.clone()
        } else {
            self.multi_ue.clone()
        }
    }

    pub fn for_pfd(&self) -> Arc<dyn PfdSouthbound> {
        self.pfd.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Run a southbound call, turning an elapsed deadline into a transport error
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| anyhow!("southbound request timed out after {:?}", timeout))?
}

/// Convert an HTTP response into an `SbResponse`, keeping problem details on failure
pub(crate) async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<SbResponse<T>> {
    let status = response.status();
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let bytes = response
        .bytes()
        .await
        .context("Failed to read southbound response body")?;

    let mut sb = if status.is_success() {
        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(body) => Some(body),
                Err(e) => {
                    tracing::warn!(error = %e, status = status.as_u16(), "Ignoring unparsable southbound body");
                    None
                }
            }
        };
        SbResponse::ok(status.as_u16(), body)
    } else {
        let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();
        let failure_code = problem
            .as_ref()
            .and_then(|p| p.cause.clone())
            .and_then(|cause| serde_json::from_value(serde_json::Value::String(cause)).ok());
        SbResponse {
            problem,
            failure_code,
            ..SbResponse::failed(status.as_u16(), None)
        }
    };
    sb.location = location;
    Ok(sb)
}

/// Build the shared reqwest client for a southbound peer
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
