mod ids;
mod webhook_signature;

pub use ids::{new_intent_id, new_order_id, new_settlement_id};
pub use webhook_signature::{sign_payload, verify_signature};
