use super::{require_success, AfEntity, AfRegistry, AppOwner, PfdReports};
use crate::error::{Capacity, NefError, Resource};
use crate::model::{FailureCode, PfdData, PfdManagement};
use crate::southbound::{bounded, PfdSouthbound, SbResponse};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// PFD management transaction held by an AF
pub struct PfdTransaction {
    pub id: u64,
    pub self_link: String,
    pub apps: BTreeMap<String, PfdData>,
    pub supp_feat: Option<String>,
    pub notification_destination: Option<String>,
    pub(crate) southbound: Arc<dyn PfdSouthbound>,
}

impl PfdTransaction {
    fn view(&self, apps: BTreeMap<String, PfdData>, reports: &PfdReports) -> PfdManagement {
        PfdManagement {
            self_link: Some(self.self_link.clone()),
            pfd_datas: apps,
            pfd_reports: reports.to_map(),
            supp_feat: self.supp_feat.clone(),
            notification_destination: self.notification_destination.clone(),
            request_test_notification: false,
        }
    }

    fn to_view(&self) -> PfdManagement {
        self.view(self.apps.clone(), &PfdReports::default())
    }
}

/// Outcome of a transaction level write
#[derive(Debug, Clone)]
pub struct PfdOutcome {
    pub location: String,
    /// Stored transaction, with `pfdReports` filled for this response only
    pub transaction: PfdManagement,
    /// Applications that were dropped, by failure code
    pub reports: PfdReports,
}

/// Application IDs reserved by an in-flight transaction creation.
///
/// Released on drop unless committed, so failed or cancelled requests never
/// keep an ID.
struct AppIdClaims<'a> {
    index: &'a DashMap<String, AppOwner>,
    claimed: Vec<String>,
}

impl<'a> AppIdClaims<'a> {
    fn new(index: &'a DashMap<String, AppOwner>) -> Self {
        Self {
            index,
            claimed: Vec::new(),
        }
    }

    /// Reserve `app_id` for `af_id`; false if any transaction already owns it
    fn claim(&mut self, app_id: &str, af_id: &str) -> bool {
        match self.index.entry(app_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(AppOwner {
                    af_id: af_id.to_string(),
                    transaction_id: None,
                });
                self.claimed.push(app_id.to_string());
                true
            }
        }
    }

    /// Bind surviving applications to the transaction and release the rest
    fn commit(mut self, survivors: &BTreeMap<String, PfdData>, transaction_id: u64) {
        for app_id in std::mem::take(&mut self.claimed) {
            if survivors.contains_key(&app_id) {
                if let Some(mut owner) = self.index.get_mut(&app_id) {
                    owner.transaction_id = Some(transaction_id);
                }
            } else {
                self.index.remove(&app_id);
            }
        }
    }
}

impl Drop for AppIdClaims<'_> {
    fn drop(&mut self) {
        for app_id in &self.claimed {
            self.index.remove(app_id);
        }
    }
}

/// A PFD the UDR no longer holds counts as deleted
fn pfd_deleted(outcome: anyhow::Result<SbResponse<()>>) -> Result<(), NefError> {
    let resp = outcome.map_err(NefError::transport)?;
    if resp.status == 404 {
        return Ok(());
    }
    require_success(resp, "PFD delete").map(|_| ())
}

/// DELETE the given applications concurrently, one outcome per application
async fn delete_remote<'a>(
    southbound: &dyn PfdSouthbound,
    app_ids: impl Iterator<Item = &'a String>,
    timeout: Duration,
) -> Vec<(String, Result<(), NefError>)> {
    let deletes = app_ids.map(|app_id| async move {
        let outcome = bounded(timeout, southbound.delete_application(app_id)).await;
        (app_id.clone(), pfd_deleted(outcome))
    });
    join_all(deletes).await
}

/// PUT every application concurrently; returns the ones that failed
async fn provision(
    southbound: &dyn PfdSouthbound,
    apps: &BTreeMap<String, PfdData>,
    timeout: Duration,
) -> Vec<(String, FailureCode)> {
    let calls = apps.iter().map(|(app_id, app)| async move {
        let outcome = bounded(timeout, southbound.put_application(app)).await;
        (app_id, outcome)
    });

    join_all(calls)
        .await
        .into_iter()
        .filter_map(|(app_id, outcome)| match outcome {
            Ok(resp) if resp.is_success() => None,
            Ok(resp) => {
                let code = resp.failure_code.unwrap_or(FailureCode::OtherReason);
                warn!(app_id = %app_id, status = resp.status, failure_code = %code, "PFD provisioning failed");
                Some((app_id.clone(), code))
            }
            Err(e) => {
                warn!(app_id = %app_id, error = %e, "PFD provisioning request failed");
                Some((app_id.clone(), FailureCode::OtherReason))
            }
        })
        .collect()
}

impl AfRegistry {
    fn transaction_location(&self, af_id: &str, id: u64) -> String {
        format!(
            "{}{}/transactions/{}",
            self.config.location_url_prefix_pfd, af_id, id
        )
    }

    fn release_app_id(&self, app_id: &str, af_id: &str, transaction_id: u64) {
        self.app_ids.remove_if(app_id, |_, owner| {
            owner.af_id == af_id && owner.transaction_id == Some(transaction_id)
        });
    }

    /// Create a PFD transaction.
    ///
    /// Applications already owned by any transaction are dropped with
    /// `APP_ID_DUPLICATED`; applications the southbound rejects are dropped with
    /// their failure code. Fails with `AllApplicationsFailed` when nothing is
    /// left.
    pub async fn add_transaction(
        &self,
        af_id: &str,
        payload: PfdManagement,
    ) -> Result<PfdOutcome, NefError> {
        payload.validate().map_err(NefError::validation)?;

        let mut af = self.write_or_create(af_id).await?;
        self.create_transaction(&mut af, payload).await
    }

    async fn create_transaction(
        &self,
        af: &mut AfEntity,
        payload: PfdManagement,
    ) -> Result<PfdOutcome, NefError> {
        if af.transactions.len() >= self.config.max_pfd_transactions_per_af {
            return Err(NefError::CapacityExceeded(Capacity::TransactionsPerAf));
        }

        let mut reports = PfdReports::default();
        let mut claims = AppIdClaims::new(&self.app_ids);
        let mut apps = BTreeMap::new();
        for (app_id, app) in payload.pfd_datas {
            if claims.claim(&app_id, &af.af_id) {
                apps.insert(app_id, app);
            } else {
                warn!(af_id = %af.af_id, app_id = %app_id, "Duplicate external application ID");
                reports.record(FailureCode::AppIdDuplicated, app_id);
            }
        }
        if apps.is_empty() {
            return Err(NefError::AllApplicationsFailed(reports));
        }

        let id = af.allocate_transaction_id();
        let southbound = self.southbound.for_pfd();
        let failed = provision(southbound.as_ref(), &apps, self.southbound.timeout()).await;
        for (app_id, code) in failed {
            apps.remove(&app_id);
            reports.record(code, app_id);
        }
        if apps.is_empty() {
            warn!(af_id = %af.af_id, transaction_id = id, "All PFD applications failed");
            return Err(NefError::AllApplicationsFailed(reports));
        }

        let location = self.transaction_location(&af.af_id, id);
        for (app_id, app) in apps.iter_mut() {
            app.self_link = Some(format!("{}/applications/{}", location, app_id));
        }
        claims.commit(&apps, id);

        let transaction = PfdTransaction {
            id,
            self_link: location.clone(),
            apps,
            supp_feat: payload.supp_feat,
            notification_destination: payload.notification_destination,
            southbound,
        };
        let view = transaction.view(transaction.apps.clone(), &reports);

        info!(
            af_id = %af.af_id,
            transaction_id = id,
            apps = transaction.apps.len(),
            failed = reports.failed_count(),
            "PFD transaction created"
        );
        af.transactions.insert(id, transaction);

        Ok(PfdOutcome {
            location,
            transaction: view,
            reports,
        })
    }

    pub async fn get_transaction(&self, af_id: &str, id: u64) -> Result<PfdManagement, NefError> {
        let af = self.read_existing(af_id).await?;
        let transaction = af
            .transactions
            .get(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;
        self.read_transaction(transaction).await
    }

    /// All transactions of an AF; an unknown AF has none
    pub async fn list_transactions(&self, af_id: &str) -> Result<Vec<PfdManagement>, NefError> {
        let af = match self.read_existing(af_id).await {
            Ok(af) => af,
            Err(NefError::NotFound(Resource::Af)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut transactions = Vec::with_capacity(af.transactions.len());
        for transaction in af.transactions.values() {
            transactions.push(self.read_transaction(transaction).await?);
        }
        Ok(transactions)
    }

    async fn read_transaction(&self, transaction: &PfdTransaction) -> Result<PfdManagement, NefError> {
        if !self.config.refresh_from_southbound {
            return Ok(transaction.to_view());
        }

        let mut apps = BTreeMap::new();
        for (app_id, app) in &transaction.apps {
            apps.insert(app_id.clone(), self.read_application(transaction, app).await?);
        }
        Ok(transaction.view(apps, &PfdReports::default()))
    }

    async fn read_application(
        &self,
        transaction: &PfdTransaction,
        app: &PfdData,
    ) -> Result<PfdData, NefError> {
        if !self.config.refresh_from_southbound {
            return Ok(app.clone());
        }

        let resp = bounded(
            self.southbound.timeout(),
            transaction.southbound.get_application(&app.external_app_id),
        )
        .await
        .map_err(NefError::transport)?;
        let resp = require_success(resp, "PFD read")?;

        Ok(match resp.body {
            Some(remote) => PfdData {
                pfds: remote.pfds,
                ..app.clone()
            },
            None => app.clone(),
        })
    }

    /// Replace the applications of a transaction (PUT).
    ///
    /// The payload may not introduce applications the transaction does not
    /// already hold. Applications that fail southbound, or are left out of
    /// the payload, are dropped from the transaction.
    pub async fn update_transaction(
        &self,
        af_id: &str,
        id: u64,
        payload: PfdManagement,
    ) -> Result<PfdOutcome, NefError> {
        payload.validate().map_err(NefError::validation)?;

        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let transaction = af
            .transactions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;

        if let Some(app_id) = payload
            .pfd_datas
            .keys()
            .find(|app_id| !transaction.apps.contains_key(*app_id))
        {
            return Err(NefError::validation(format!(
                "Application {} is not part of transaction {}",
                app_id, id
            )));
        }

        let mut apps = payload.pfd_datas;
        let mut reports = PfdReports::default();
        let failed =
            provision(transaction.southbound.as_ref(), &apps, self.southbound.timeout()).await;
        for (app_id, code) in failed {
            apps.remove(&app_id);
            reports.record(code, app_id);
        }
        if apps.is_empty() {
            warn!(af_id = %af_id, transaction_id = id, "All PFD applications failed");
            return Err(NefError::AllApplicationsFailed(reports));
        }

        for (app_id, app) in apps.iter_mut() {
            app.self_link = transaction
                .apps
                .get(app_id)
                .and_then(|old| old.self_link.clone());
        }
        let dropped: Vec<String> = transaction
            .apps
            .keys()
            .filter(|app_id| !apps.contains_key(*app_id))
            .cloned()
            .collect();
        let removed = delete_remote(
            transaction.southbound.as_ref(),
            dropped.iter(),
            self.southbound.timeout(),
        )
        .await;
        for (app_id, result) in removed {
            // The UDR may keep PFDs it refused to delete; they are no longer tracked
            if let Err(e) = result {
                warn!(af_id = %af_id, transaction_id = id, app_id = %app_id, error = %e, "Dropped PFD application not deleted southbound");
            }
            self.release_app_id(&app_id, &af_id, id);
        }
        transaction.apps = apps;
        if payload.supp_feat.is_some() {
            transaction.supp_feat = payload.supp_feat;
        }

        info!(
            af_id = %af_id,
            transaction_id = id,
            apps = transaction.apps.len(),
            failed = reports.failed_count(),
            "PFD transaction replaced"
        );

        Ok(PfdOutcome {
            location: transaction.self_link.clone(),
            transaction: transaction.view(transaction.apps.clone(), &reports),
            reports,
        })
    }

    /// Delete a transaction and the PFDs of all its applications.
    ///
    /// Applications deleted southbound are dropped even when another delete
    /// fails, so a retry only covers what is left.
    pub async fn delete_transaction(&self, af_id: &str, id: u64) -> Result<(), NefError> {
        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let transaction = af
            .transactions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;

        let removed = delete_remote(
            transaction.southbound.as_ref(),
            transaction.apps.keys(),
            self.southbound.timeout(),
        )
        .await;

        let mut first_error = None;
        for (app_id, result) in removed {
            match result {
                Ok(()) => {
                    transaction.apps.remove(&app_id);
                    self.release_app_id(&app_id, &af_id, id);
                }
                Err(e) => {
                    warn!(af_id = %af_id, transaction_id = id, app_id = %app_id, error = %e, "PFD delete failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if transaction.apps.is_empty() {
            af.transactions.remove(&id);
            info!(af_id = %af_id, transaction_id = id, "PFD transaction deleted");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn get_application(
        &self,
        af_id: &str,
        id: u64,
        app_id: &str,
    ) -> Result<PfdData, NefError> {
        let af = self.read_existing(af_id).await?;
        let transaction = af
            .transactions
            .get(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;
        let app = transaction
            .apps
            .get(app_id)
            .ok_or(NefError::NotFound(Resource::Application))?;
        self.read_application(transaction, app).await
    }

    /// Replace the PFD set of one application (PUT)
    pub async fn update_application(
        &self,
        af_id: &str,
        id: u64,
        app_id: &str,
        app: PfdData,
    ) -> Result<PfdData, NefError> {
        check_application_payload(app_id, &app)?;
        if app.pfds.is_empty() {
            return Err(NefError::validation("Missing PFD Data"));
        }

        self.write_application(af_id, id, app_id, |current| PfdData {
            external_app_id: app_id.to_string(),
            self_link: current.self_link.clone(),
            ..app
        })
        .await
    }

    /// Upsert the PFDs named in the payload into one application (PATCH)
    pub async fn patch_application(
        &self,
        af_id: &str,
        id: u64,
        app_id: &str,
        patch: PfdData,
    ) -> Result<PfdData, NefError> {
        check_application_payload(app_id, &patch)?;

        self.write_application(af_id, id, app_id, |current| {
            let mut merged = current.clone();
            merged.pfds.extend(patch.pfds);
            if patch.allowed_delay.is_some() {
                merged.allowed_delay = patch.allowed_delay;
            }
            if patch.caching_time.is_some() {
                merged.caching_time = patch.caching_time;
            }
            merged
        })
        .await
    }

    /// Provision `build(current)` southbound and store it on success
    async fn write_application(
        &self,
        af_id: &str,
        id: u64,
        app_id: &str,
        build: impl FnOnce(&PfdData) -> PfdData,
    ) -> Result<PfdData, NefError> {
        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let transaction = af
            .transactions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;
        let current = transaction
            .apps
            .get(app_id)
            .ok_or(NefError::NotFound(Resource::Application))?;

        let next = build(current);
        let resp = bounded(
            self.southbound.timeout(),
            transaction.southbound.put_application(&next),
        )
        .await
        .map_err(NefError::transport)?;
        if !resp.is_success() {
            let code = resp.failure_code.unwrap_or(FailureCode::OtherReason);
            warn!(
                af_id = %af_id,
                transaction_id = id,
                app_id = %app_id,
                status = resp.status,
                failure_code = %code,
                "PFD application update failed"
            );
            return Err(NefError::AllApplicationsFailed(PfdReports::single(code, app_id)));
        }

        transaction.apps.insert(app_id.to_string(), next.clone());
        info!(af_id = %af_id, transaction_id = id, app_id = %app_id, "PFD application updated");
        Ok(next)
    }

    /// Delete one application; an emptied transaction is deleted with it
    pub async fn delete_application(
        &self,
        af_id: &str,
        id: u64,
        app_id: &str,
    ) -> Result<(), NefError> {
        let mut af = self.write_existing(af_id).await?;
        let af_id = af.af_id.clone();
        let transaction = af
            .transactions
            .get_mut(&id)
            .ok_or(NefError::NotFound(Resource::Transaction))?;
        if !transaction.apps.contains_key(app_id) {
            return Err(NefError::NotFound(Resource::Application));
        }

        let outcome = bounded(
            self.southbound.timeout(),
            transaction.southbound.delete_application(app_id),
        )
        .await;
        pfd_deleted(outcome)?;

        transaction.apps.remove(app_id);
        self.release_app_id(app_id, &af_id, id);
        info!(af_id = %af_id, transaction_id = id, app_id = %app_id, "PFD application deleted");

        if transaction.apps.is_empty() {
            af.transactions.remove(&id);
            info!(af_id = %af_id, transaction_id = id, "Empty PFD transaction deleted");
        }
        Ok(())
    }
}

/// Validate a single-application payload against its path
fn check_application_payload(app_id: &str, app: &PfdData) -> Result<(), NefError> {
    if !app.external_app_id.is_empty() && app.external_app_id != app_id {
        return Err(NefError::validation(format!(
            "externalAppId {} does not match application {}",
            app.external_app_id, app_id
        )));
    }
    app.validate_pfds().map_err(NefError::validation)
}
