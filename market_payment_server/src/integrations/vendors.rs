use std::collections::HashMap;

use market_payment_engine::{
    db_types::CommissionPolicy,
    traits::{CollaboratorError, VendorPolicies},
};

use crate::config::VendorConfig;

/// Commission policies resolved from server configuration. Vendors without an explicit entry get the default
/// policy, so a settlement run never fails because a vendor is missing from the map.
#[derive(Clone)]
pub struct StaticVendorPolicies {
    policies: HashMap<String, CommissionPolicy>,
    default_policy: CommissionPolicy,
}

impl StaticVendorPolicies {
    pub fn new(config: &VendorConfig) -> Self {
        Self { policies: config.policies.clone(), default_policy: config.default_policy.clone() }
    }
}

impl VendorPolicies for StaticVendorPolicies {
    async fn commission_policy(&self, vendor_code: &str) -> Result<CommissionPolicy, CollaboratorError> {
        Ok(self.policies.get(vendor_code).cloned().unwrap_or_else(|| self.default_policy.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn unknown_vendors_get_the_default_policy() {
        let mut config = VendorConfig::default();
        config.policies.insert("acme".to_string(), CommissionPolicy::Fixed { amount: 5_000.into() });
        let policies = StaticVendorPolicies::new(&config);
        assert_eq!(
            policies.commission_policy("acme").await.unwrap(),
            CommissionPolicy::Fixed { amount: 5_000.into() }
        );
        assert_eq!(policies.commission_policy("globex").await.unwrap(), config.default_policy);
    }
}
