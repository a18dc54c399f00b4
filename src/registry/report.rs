use crate::model::{FailureCode, PfdReport};
use std::collections::BTreeMap;

/// Failed applications of one PFD operation, grouped by failure code.
///
/// Built fresh for every operation and handed back with its result; it is
/// never stored on the transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PfdReports {
    by_code: BTreeMap<FailureCode, Vec<String>>,
}

impl PfdReports {
    /// Report for a single failed application
    pub fn single(code: FailureCode, app_id: impl Into<String>) -> Self {
        let mut reports = Self::default();
        reports.record(code, app_id);
        reports
    }

    /// Append an application to the report of its failure code
    pub fn record(&mut self, code: FailureCode, app_id: impl Into<String>) {
        self.by_code.entry(code).or_default().push(app_id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Number of failed applications across all codes
    pub fn failed_count(&self) -> usize {
        self.by_code.values().map(Vec::len).sum()
    }

    pub fn app_ids(&self, code: FailureCode) -> &[String] {
        self.by_code.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One wire report per failure code, in code order
    pub fn to_reports(&self) -> Vec<PfdReport> {
        self.by_code
            .iter()
            .map(|(code, app_ids)| PfdReport {
                external_app_ids: app_ids.clone(),
                failure_code: *code,
                caching_time: None,
            })
            .collect()
    }

    /// Reports keyed by failure code name, as carried in `pfdReports`
    pub fn to_map(&self) -> BTreeMap<String, PfdReport> {
        self.to_reports()
            .into_iter()
            .map(|report| (report.failure_code.to_string(), report))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_to_existing_code() {
        let mut reports = PfdReports::default();
        assert!(reports.is_empty());

        reports.record(FailureCode::OtherReason, "appA");
        reports.record(FailureCode::AppIdDuplicated, "appB");
        reports.record(FailureCode::OtherReason, "appC");

        assert_eq!(reports.failed_count(), 3);
        assert_eq!(reports.app_ids(FailureCode::OtherReason), ["appA", "appC"]);
        assert_eq!(reports.to_reports().len(), 2);
        assert!(reports.app_ids(FailureCode::Malfunction).is_empty());
    }

    #[test]
    fn test_map_is_keyed_by_code_name() {
        let reports = PfdReports::single(FailureCode::ShortDelay, "appX");
        let map = reports.to_map();
        assert_eq!(map["SHORT_DELAY"].external_app_ids, vec!["appX"]);
    }
}
