use super::{PfdSouthbound, SbResponse};
use crate::model::{FailureCode, PfdData};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Fails PFD provisioning for selected applications.
///
/// Reads and deletes pass through to the wrapped strategy.
pub struct FaultInjectingPfd {
    inner: Arc<dyn PfdSouthbound>,
    /// Applications to fail; empty fails all of them
    app_ids: HashSet<String>,
    failure_code: FailureCode,
}

impl FaultInjectingPfd {
    pub fn new(
        inner: Arc<dyn PfdSouthbound>,
        app_ids: HashSet<String>,
        failure_code: FailureCode,
    ) -> Self {
        Self {
            inner,
            app_ids,
            failure_code,
        }
    }

    fn should_fail(&self, app_id: &str) -> bool {
        self.app_ids.is_empty() || self.app_ids.contains(app_id)
    }
}

#[async_trait]
impl PfdSouthbound for FaultInjectingPfd {
    fn name(&self) -> &'static str {
        "fault-injecting"
    }

    async fn get_application(&self, app_id: &str) -> Result<SbResponse<PfdData>> {
        self.inner.get_application(app_id).await
    }

    async fn put_application(&self, app: &PfdData) -> Result<SbResponse<()>> {
        if self.should_fail(&app.external_app_id) {
            tracing::info!(
                app_id = %app.external_app_id,
                failure_code = %self.failure_code,
                "Injecting PFD provisioning failure"
            );
            return Ok(SbResponse::failed(400, Some(self.failure_code)));
        }
        self.inner.put_application(app).await
    }

    async fn delete_application(&self, app_id: &str) -> Result<SbResponse<()>> {
        self.inner.delete_application(app_id).await
    }
}
