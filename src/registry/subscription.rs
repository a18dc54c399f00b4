use super::{require_success, AfEntity, AfRegistry};
use crate::error::{Capacity, NefError, Resource};
use crate::model::{TrafficInfluSub, TrafficInfluSubPatch};
use crate::southbound::{bounded, SubscriptionContext, TrafficInfluenceSouthbound};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Traffic influence subscription held by an AF
pub struct Subscription {
    pub id: u64,
    /// Registry-wide key for routing SMF notifications back to this subscription
    pub correlation_id: String,
    pub influence_id: String,
    pub app_session_id: Option<String>,
    pub ti: TrafficInfluSub,
    pub(crate) southbound: Arc<dyn TrafficInfluenceSouthbound>,
}

impl Subscription {
    fn context(&self, af_id: &str, notification_uri: &str) -> SubscriptionContext {
        SubscriptionContext {
            af_id: af_id.to_string(),
            subscription_id: self.id,
            correlation_id: self.correlation_id.clone(),
            influence_id: self.influence_id.clone(),
            app_session_id: self.app_session_id.clone(),
            notification_uri: notification_uri.to_string(),
        }
    }
}

/// Result of a correlation ID lookup
#[derive(Debug, Clone)]
pub struct CorrelatedSubscription {
    pub af_id: String,
    pub subscription_id: u64,
    pub ti: TrafficInfluSub,
}

impl AfRegistry {
    fn subscription_location(&self, af_id: &str, id: u64) -> String {
        format!(
            "{}{}/subscriptions/{}",
            self.config.location_url_prefix, af_id, id
        )
    }

    fn subscription_context(&self, af_id: &str, sub: &Subscription) -> SubscriptionContext {
        sub.context(af_id, &self.config.upf_notification_uri)
    }

    /// Create a subscription and its remote state.
    ///
    /// Returns the location and the stored subscription.
    pub async fn add_subscription(
        &self,
        af_id: &str,
        ti: TrafficInfluSub,
    ) -> Result<(String, TrafficInfluSub), NefError> {
        ti.validate().map_err(NefError::validation)?;

        let mut af = self.write_or_create(af_id).await?;
        self.create_subscription(&mut af, ti).await
    }

    async fn create_subscription(
        &self,
        af: &mut AfEntity,
        mut ti: TrafficInfluSub,
    ) -> Result<(String, TrafficInfluSub), NefError> {
        if af.subscriptions.len() >= self.config.max_subscriptions_per_af {
            return Err(NefError::CapacityExceeded(Capacity::SubscriptionsPerAf));
        }

        let mut sub = Subscription {
            id: af.allocate_subscription_id(),
            correlation_id: self.next_correlation_id(),
            influence_id: Uuid::new_v4().to_string(),
            app_session_id: None,
            ti: TrafficInfluSub::default(),
            southbound: self.southbound.for_subscription(&ti),
        };

        let ctx = self.subscription_context(&af.af_id, &sub);
        let resp = bounded(self.southbound.timeout(), sub.southbound.put(&ctx, &ti))
            .await
            .map_err(NefError::transport)?;
        let resp = require_success(resp, "traffic influence create")?;

        sub.app_session_id = resp.resource_id().map(|id| id.to_string());
        let location = self.subscription_location(&af.af_id, sub.id);
        ti.self_link = Some(location.clone());
        sub.ti = ti.clone();

        info!(
            af_id = %af.af_id,
            subscription_id = sub.id,
            correlation_id = %sub.correlation_id,
            southbound = sub.southbound.name(),
            "Subscription created"
        );

        self.correlations
            .insert(sub.correlation_id.clone(), (af.af_id.clone(), sub.id));
        af.subscriptions.insert(sub.id, sub);
        Ok((location, ti))
    }

    pub async fn get_subscription(
        &self,
        af_id: &str,
        id: u64,
    ) -> Result<TrafficInfluSub, NefError> {
        let af = self.read_existing(af_id).await?;
        let sub = af
            .subscriptions
            .get(&id)
            .ok_or(NefError::NotFound(Resource::Subscription))?;
        self.read_subscription(&af.af_id, sub).await
    }

    /// All subscriptions of an AF; an unknown AF has none
    pub async fn list_subscriptions(&self, af_id: &str) -> Result<Vec<TrafficInfluSub>, NefError> {
        let af = match self.read_existing(af_id).await {
            Ok(af) => af,
            Err(NefError::NotFound(Resource::Af)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut subs = Vec::with_capacity(af.subscriptions.len());
        for sub in af.subscriptions.values() {
            subs.push(self.read_subscription(&af.af_id, sub).await?);
        }
        Ok(subs)
    }

    /// Local copy, or the southbound's canonical view when refresh is enabled
    async fn read_subscription(
        &self,
        af_id: &str,
        sub: &Subscription,
    ) -> Result<TrafficInfluSub, NefError> {
        if !self.config.refresh_from_southbound {
            return Ok(sub.ti.clone());
        }

        let ctx = self.subscription_context(af_id, sub);
        let resp = bounded(self.southbound.timeout(), sub.southbound.get(&ctx, &sub.ti))
            .await
            .map_err(NefError::transport)?;
        let resp = require_success(resp, "traffic influence read")?;

        let mut ti = resp.body.unwrap_or_else(|| sub.ti.clone());
        ti.self_link = sub.ti.self_link.clone();
        Ok(ti)
    }

    /// Replace a subscription (PUT)
    pub async fn update_subscription(
        &self,
        af_id: &str,
        id: u64,
        mut ti: TrafficInfluSub,
    ) -> Result<TrafficInfluSub, NefError> {
        ti.validate().map_err(NefError::validation)?;

        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let sub = af
            .subscriptions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Subscription))?;

        let ctx = self.subscription_context(&af_id, sub);
        let resp = bounded(self.southbound.timeout(), sub.southbound.put(&ctx, &ti))
            .await
            .map_err(NefError::transport)?;
        require_success(resp, "traffic influence update")?;

        ti.self_link = sub.ti.self_link.clone();
        sub.ti = ti.clone();
        info!(af_id = %af_id, subscription_id = id, "Subscription replaced");
        Ok(ti)
    }

    /// Merge a partial update into a subscription (PATCH)
    pub async fn patch_subscription(
        &self,
        af_id: &str,
        id: u64,
        patch: TrafficInfluSubPatch,
    ) -> Result<TrafficInfluSub, NefError> {
        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let sub = af
            .subscriptions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Subscription))?;

        let ctx = self.subscription_context(&af_id, sub);
        let resp = bounded(self.southbound.timeout(), sub.southbound.patch(&ctx, &patch))
            .await
            .map_err(NefError::transport)?;
        require_success(resp, "traffic influence patch")?;

        sub.ti.apply_patch(&patch);
        info!(af_id = %af_id, subscription_id = id, "Subscription patched");
        Ok(sub.ti.clone())
    }

    /// Delete a subscription; the AF goes away with its last resource
    pub async fn delete_subscription(&self, af_id: &str, id: u64) -> Result<(), NefError> {
        let mut af = self.write_existing(af_id).await?;
        let sub = af
            .subscriptions
            .get(&id)
            .ok_or(NefError::NotFound(Resource::Subscription))?;

        let ctx = self.subscription_context(&af.af_id, sub);
        let resp = bounded(self.southbound.timeout(), sub.southbound.delete(&ctx))
            .await
            .map_err(NefError::transport)?;
        require_success(resp, "traffic influence delete")?;

        if let Some(sub) = af.subscriptions.remove(&id) {
            self.correlations.remove(&sub.correlation_id);
        }
        info!(af_id = %af.af_id, subscription_id = id, "Subscription deleted");
        Ok(())
    }

    /// Find the subscription a notification correlation ID belongs to
    pub async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<CorrelatedSubscription, NefError> {
        let (af_id, subscription_id) = self
            .correlations
            .get(correlation_id)
            .map(|entry| entry.value().clone())
            .ok_or(NefError::NotFound(Resource::Subscription))?;

        let af = self
            .read_existing(&af_id)
            .await
            .map_err(|_| NefError::NotFound(Resource::Subscription))?;
        let sub = af
            .subscriptions
            .get(&subscription_id)
            .filter(|sub| sub.correlation_id == correlation_id)
            .ok_or(NefError::NotFound(Resource::Subscription))?;

        Ok(CorrelatedSubscription {
            af_id,
            subscription_id,
            ti: sub.ti.clone(),
        })
    }
}
