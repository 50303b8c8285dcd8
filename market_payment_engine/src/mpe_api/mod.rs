pub mod cart_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod settlement_api;

pub use cart_api::CartApi;
pub use order_flow_api::OrderFlowApi;
pub use payment_api::PaymentApi;
pub use settlement_api::SettlementApi;
