//! Public identifier generation.
//!
//! Public ids are prefixed, URL-safe and unguessable enough for their purpose. They are not security tokens;
//! access control lives in the HTTP layer, not in the id.

use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::{IntentId, OrderId, SettlementId};

const ID_LENGTH: usize = 12;

fn random_suffix() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(ID_LENGTH).map(char::from).collect()
}

pub fn new_order_id() -> OrderId {
    OrderId(format!("MP-{}", random_suffix()))
}

pub fn new_intent_id() -> IntentId {
    IntentId(format!("PI-{}", random_suffix()))
}

pub fn new_settlement_id() -> SettlementId {
    SettlementId(format!("ST-{}", random_suffix()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(new_order_id().as_str().starts_with("MP-"));
        assert!(new_intent_id().as_str().starts_with("PI-"));
        assert!(new_settlement_id().as_str().starts_with("ST-"));
        assert_eq!(new_order_id().as_str().len(), 3 + ID_LENGTH);
    }

    #[test]
    fn ids_are_distinct() {
        let a = new_order_id();
        let b = new_order_id();
        assert_ne!(a.as_str(), b.as_str());
    }
}
