use super::{PfdSouthbound, SbResponse, SubscriptionContext, TrafficInfluenceSouthbound};
use crate::model::{PfdData, TrafficInfluSub, TrafficInfluSubPatch};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory stand-in for the UDR and PCF.
///
/// Accepts every request, which makes it the default for standalone runs and
/// the baseline strategy in tests.
#[derive(Default)]
pub struct EmulatedSouthbound {
    influence: DashMap<String, TrafficInfluSub>,
    pfds: DashMap<String, PfdData>,
    next_session: AtomicU64,
}

impl EmulatedSouthbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn influence_count(&self) -> usize {
        self.influence.len()
    }

    pub fn stored_application(&self, app_id: &str) -> Option<PfdData> {
        self.pfds.get(app_id).map(|app| app.clone())
    }

    fn key(ctx: &SubscriptionContext) -> String {
        ctx.app_session_id
            .clone()
            .unwrap_or_else(|| ctx.influence_id.clone())
    }
}

#[async_trait]
impl TrafficInfluenceSouthbound for EmulatedSouthbound {
    fn name(&self) -> &'static str {
        "emulated"
    }

    async fn get(
        &self,
        ctx: &SubscriptionContext,
        _current: &TrafficInfluSub,
    ) -> Result<SbResponse<TrafficInfluSub>> {
        Ok(match self.influence.get(&Self::key(ctx)) {
            Some(ti) => SbResponse::ok(200, Some(ti.clone())),
            None => SbResponse::failed(404, None),
        })
    }

    async fn put(&self, ctx: &SubscriptionContext, ti: &TrafficInfluSub) -> Result<SbResponse<()>> {
        if ctx.app_session_id.is_none() && ti.targets_single_ue() {
            let n = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
            let app_session_id = format!("emulated-{}", n);
            self.influence.insert(app_session_id.clone(), ti.clone());
            return Ok(SbResponse::ok(201, None)
                .with_location(format!("emulated://app-sessions/{}", app_session_id)));
        }

        let status = match self.influence.insert(Self::key(ctx), ti.clone()) {
            Some(_) => 200,
            None => 201,
        };
        Ok(SbResponse::ok(status, None))
    }

    async fn patch(
        &self,
        ctx: &SubscriptionContext,
        patch: &TrafficInfluSubPatch,
    ) -> Result<SbResponse<()>> {
        Ok(match self.influence.get_mut(&Self::key(ctx)) {
            Some(mut ti) => {
                ti.apply_patch(patch);
                SbResponse::ok(200, None)
            }
            None => SbResponse::failed(404, None),
        })
    }

    async fn delete(&self, ctx: &SubscriptionContext) -> Result<SbResponse<()>> {
        Ok(match self.influence.remove(&Self::key(ctx)) {
            Some(_) => SbResponse::ok(204, None),
            None => SbResponse::failed(404, None),
        })
    }
}

#[async_trait]
impl PfdSouthbound for EmulatedSouthbound {
    fn name(&self) -> &'static str {
        "emulated"
    }

    async fn get_application(&self, app_id: &str) -> Result<SbResponse<PfdData>> {
        Ok(match self.pfds.get(app_id) {
            Some(app) => SbResponse::ok(200, Some(app.clone())),
            None => SbResponse::failed(404, None),
        })
    }

    async fn put_application(&self, app: &PfdData) -> Result<SbResponse<()>> {
        let status = match self.pfds.insert(app.external_app_id.clone(), app.clone()) {
            Some(_) => 200,
            None => 201,
        };
        Ok(SbResponse::ok(status, None))
    }

    async fn delete_application(&self, app_id: &str) -> Result<SbResponse<()>> {
        Ok(match self.pfds.remove(app_id) {
            Some(_) => SbResponse::ok(204, None),
            None => SbResponse::failed(404, None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SubscriptionContext {
        SubscriptionContext {
            af_id: "af1".to_string(),
            subscription_id: 1,
            correlation_id: "21".to_string(),
            influence_id: "iid-1".to_string(),
            app_session_id: None,
            notification_uri: String::new(),
        }
    }

    #[tokio::test]
    async fn test_single_ue_put_creates_session() {
        let sb = EmulatedSouthbound::new();
        let ti = TrafficInfluSub {
            mac_addr: Some("00:11:22:33:44:55".to_string()),
            ..Default::default()
        };
        let resp = sb.put(&ctx(), &ti).await.unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.resource_id(), Some("emulated-1"));

        let mut ctx = ctx();
        ctx.app_session_id = Some("emulated-1".to_string());
        assert_eq!(sb.get(&ctx, &ti).await.unwrap().status, 200);
        assert_eq!(sb.delete(&ctx).await.unwrap().status, 204);
        assert_eq!(sb.influence_count(), 0);
    }

    #[tokio::test]
    async fn test_pfd_put_then_replace() {
        let sb = EmulatedSouthbound::new();
        let app = PfdData {
            external_app_id: "app1".to_string(),
            ..Default::default()
        };
        assert_eq!(sb.put_application(&app).await.unwrap().status, 201);
        assert_eq!(sb.put_application(&app).await.unwrap().status, 200);
        assert!(sb.stored_application("app1").is_some());
        assert_eq!(sb.delete_application("app1").await.unwrap().status, 204);
        assert_eq!(sb.delete_application("app1").await.unwrap().status, 404);
    }
}
