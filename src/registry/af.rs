use super::subscription::Subscription;
use super::transaction::PfdTransaction;
use crate::config::CoreConfig;
use std::collections::BTreeMap;

/// State owned by one Application Function
pub struct AfEntity {
    pub(crate) af_id: String,
    next_subscription_id: u64,
    next_transaction_id: u64,
    pub(crate) subscriptions: BTreeMap<u64, Subscription>,
    pub(crate) transactions: BTreeMap<u64, PfdTransaction>,
    /// Set once the entity has been removed from the registry map
    pub(crate) detached: bool,
}

impl AfEntity {
    pub(crate) fn new(af_id: &str, config: &CoreConfig) -> Self {
        Self {
            af_id: af_id.to_string(),
            next_subscription_id: config.subscription_id_start,
            next_transaction_id: config.transaction_id_start,
            subscriptions: BTreeMap::new(),
            transactions: BTreeMap::new(),
            detached: false,
        }
    }

    pub fn af_id(&self) -> &str {
        &self.af_id
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.transactions.is_empty()
    }

    /// IDs are consumed even when the creation later fails
    pub(crate) fn allocate_subscription_id(&mut self) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        id
    }

    pub(crate) fn allocate_transaction_id(&mut self) -> u64 {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_configured_offsets() {
        let config = CoreConfig {
            subscription_id_start: 100,
            transaction_id_start: 500,
            ..Default::default()
        };
        let mut af = AfEntity::new("af1", &config);

        assert!(af.is_empty());
        assert_eq!(af.allocate_subscription_id(), 100);
        assert_eq!(af.allocate_subscription_id(), 101);
        assert_eq!(af.allocate_transaction_id(), 500);
        assert_eq!(af.af_id(), "af1");
    }
}
