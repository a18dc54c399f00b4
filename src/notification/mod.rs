//! Routing of SMF user plane notifications back to the subscribing AF

mod client;

pub use client::{AfNotifier, HttpAfNotifier};

use crate::error::NefError;
use crate::model::notification::UP_PATH_CH;
use crate::model::{EventNotification, NsmfEventExposureNotification};
use crate::registry::AfRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Maps SMF event exposure notifications onto the owning subscription
pub struct NotificationRouter {
    registry: Arc<AfRegistry>,
    notifier: Arc<dyn AfNotifier>,
}

impl NotificationRouter {
    pub fn new(registry: Arc<AfRegistry>, notifier: Arc<dyn AfNotifier>) -> Self {
        Self { registry, notifier }
    }

    /// Route one SMF notification.
    ///
    /// Delivery to the AF runs in the background; its outcome is only logged.
    /// Returns the delivery task, or `None` when the subscription has no
    /// notification destination.
    pub async fn route_smf_notification(
        &self,
        notification: &NsmfEventExposureNotification,
    ) -> Result<Option<JoinHandle<()>>, NefError> {
        let correlation_id = notification.notif_id.as_str();
        if correlation_id.is_empty() {
            return Err(NefError::validation("Missing notifId"));
        }
        if correlation_id.parse::<u64>().is_err() {
            return Err(NefError::validation(format!(
                "Invalid notifId {}",
                correlation_id
            )));
        }

        let event = notification
            .event_notifs
            .iter()
            .find(|ev| ev.event == UP_PATH_CH)
            .ok_or_else(|| NefError::validation("No UP_PATH_CH event in notification"))?;

        let sub = self.registry.find_by_correlation_id(correlation_id).await?;
        let af_notification = EventNotification::from_up_path_change(&sub.ti.af_trans_id, event);

        let Some(destination) = sub.ti.notification_destination.clone() else {
            warn!(
                af_id = %sub.af_id,
                subscription_id = sub.subscription_id,
                "Subscription has no notification destination, dropping event"
            );
            return Ok(None);
        };

        info!(
            af_id = %sub.af_id,
            subscription_id = sub.subscription_id,
            correlation_id = %correlation_id,
            "Forwarding UP path change to AF"
        );

        let notifier = self.notifier.clone();
        let af_id = sub.af_id;
        let handle = tokio::spawn(async move {
            if let Err(e) = notifier.notify(&destination, &af_notification).await {
                error!(af_id = %af_id, destination = %destination, error = %e, "AF notification failed");
            }
        });
        Ok(Some(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::error::Resource;
    use crate::model::{NsmfEventNotification, TrafficInfluSub};
    use crate::southbound::{EmulatedSouthbound, Southbound};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, EventNotification)>>,
        fail: bool,
    }

    #[async_trait]
    impl AfNotifier for RecordingNotifier {
        async fn notify(
            &self,
            destination: &str,
            notification: &EventNotification,
        ) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), notification.clone()));
            if self.fail {
                anyhow::bail!("AF unreachable");
            }
            Ok(())
        }
    }

    async fn setup(
        destination: Option<&str>,
        notifier: Arc<RecordingNotifier>,
    ) -> (NotificationRouter, String) {
        let emulated = Arc::new(EmulatedSouthbound::new());
        let registry = Arc::new(AfRegistry::new(
            CoreConfig::default(),
            Southbound::new(emulated.clone(), emulated.clone(), emulated),
        ));
        let ti = TrafficInfluSub {
            af_trans_id: "42".to_string(),
            af_service_id: "svc".to_string(),
            af_app_id: "app".to_string(),
            notification_destination: destination.map(|d| d.to_string()),
            ..Default::default()
        };
        registry.add_subscription("af1", ti).await.unwrap();

        // First correlation ID handed out by a default registry
        let correlation_id = (CoreConfig::default().subscription_id_start + 20).to_string();
        (NotificationRouter::new(registry, notifier), correlation_id)
    }

    fn up_path_change(notif_id: &str) -> NsmfEventExposureNotification {
        NsmfEventExposureNotification {
            notif_id: notif_id.to_string(),
            event_notifs: vec![NsmfEventNotification {
                event: UP_PATH_CH.to_string(),
                source_dnai: Some("edge-1".to_string()),
                target_dnai: Some("edge-2".to_string()),
                gpsi: Some("msisdn-1".to_string()),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_routes_to_subscription_destination() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, correlation_id) = setup(Some("http://af/notify"), notifier.clone()).await;

        let handle = router
            .route_smf_notification(&up_path_change(&correlation_id))
            .await
            .unwrap()
            .unwrap();
        handle.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (destination, event) = &sent[0];
        assert_eq!(destination, "http://af/notify");
        assert_eq!(event.af_trans_id.as_deref(), Some("42"));
        assert_eq!(event.subscribed_event, "UP_PATH_CHANGE");
        assert_eq!(event.target_dnai.as_deref(), Some("edge-2"));
        assert_eq!(event.gpsi.as_deref(), Some("msisdn-1"));
    }

    #[tokio::test]
    async fn test_rejects_malformed_notif_id() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, _) = setup(Some("http://af/notify"), notifier).await;

        for notif_id in ["", "abc", "-1"] {
            let err = router
                .route_smf_notification(&up_path_change(notif_id))
                .await
                .unwrap_err();
            assert!(matches!(err, NefError::Validation(_)), "notifId {:?}", notif_id);
        }
    }

    #[tokio::test]
    async fn test_requires_up_path_event() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, correlation_id) = setup(Some("http://af/notify"), notifier).await;

        let mut notification = up_path_change(&correlation_id);
        notification.event_notifs[0].event = "PDU_SES_REL".to_string();
        let err = router.route_smf_notification(&notification).await.unwrap_err();
        assert!(matches!(err, NefError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_correlation_is_not_found() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, _) = setup(Some("http://af/notify"), notifier).await;

        let err = router
            .route_smf_notification(&up_path_change("999"))
            .await
            .unwrap_err();
        assert!(matches!(err, NefError::NotFound(Resource::Subscription)));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_surfaced() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let (router, correlation_id) = setup(Some("http://af/notify"), notifier.clone()).await;

        let handle = router
            .route_smf_notification(&up_path_change(&correlation_id))
            .await
            .unwrap()
            .unwrap();
        handle.await.unwrap();
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_destination_is_acknowledged() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, correlation_id) = setup(None, notifier.clone()).await;

        let delivery = router
            .route_smf_notification(&up_path_change(&correlation_id))
            .await
            .unwrap();
        assert!(delivery.is_none());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
