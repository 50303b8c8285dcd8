use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mpg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------

/// The public identifier for an order, e.g. `MP-9f82jdk1x7p4`. Internal row ids never leave the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       IntentId        -------------------------------------------------------

/// The public identifier for a payment intent, e.g. `PI-x2c8va91mmd0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl From<String> for IntentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     SettlementId      -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct SettlementId(pub String);

impl From<String> for SettlementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for SettlementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SettlementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------

/// The payment track of an order. Independent of the fulfillment track: a payment failure does not cancel
/// fulfillment, and cancelling fulfillment does not touch the payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment intent has been created for the order yet.
    Pending,
    /// A payment intent exists and the provider has not reported a terminal state.
    Processing,
    /// The provider confirmed the payment via webhook.
    Paid,
    /// The provider reported the payment as failed. The buyer may retry with a new order.
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Processing => write!(f, "Processing"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------  FulfillmentStatus    -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl FulfillmentStatus {
    /// Whether the transition `self -> new` is a legal forward move. Re-applying the current status is not a
    /// transition; callers treat it as an idempotent no-op before consulting this table.
    pub fn can_transition_to(&self, new: FulfillmentStatus) -> bool {
        use FulfillmentStatus::*;
        matches!(
            (*self, new),
            (Pending, Processing) |
                (Processing, Shipped) |
                (Shipped, Completed) |
                (Pending, Cancelled) |
                (Processing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentStatus::Completed | FulfillmentStatus::Cancelled)
    }
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "Pending"),
            FulfillmentStatus::Processing => write!(f, "Processing"),
            FulfillmentStatus::Shipped => write!(f, "Shipped"),
            FulfillmentStatus::Completed => write!(f, "Completed"),
            FulfillmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid fulfillment status: {s}"))),
        }
    }
}

impl From<String> for FulfillmentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fulfillment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            FulfillmentStatus::Pending
        })
    }
}

//--------------------------------------     IntentStatus      -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    RequiresConfirmation,
    Succeeded,
    Failed,
}

impl IntentStatus {
    /// Terminal intent states are only ever reached via provider webhook confirmation. Once terminal, an intent
    /// never changes again (first terminal state wins).
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Succeeded | IntentStatus::Failed)
    }
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Created => write!(f, "Created"),
            IntentStatus::RequiresConfirmation => write!(f, "RequiresConfirmation"),
            IntentStatus::Succeeded => write!(f, "Succeeded"),
            IntentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for IntentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "RequiresConfirmation" => Ok(Self::RequiresConfirmation),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid intent status: {s}"))),
        }
    }
}

impl From<String> for IntentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid intent status: {value}. But this conversion cannot fail. Defaulting to Created");
            IntentStatus::Created
        })
    }
}

//--------------------------------------   SettlementStatus    -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Processing,
    Paid,
    Failed,
}

impl SettlementStatus {
    pub fn can_transition_to(&self, new: SettlementStatus) -> bool {
        use SettlementStatus::*;
        matches!((*self, new), (Pending, Processing) | (Processing, Paid) | (Processing, Failed))
    }
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => write!(f, "Pending"),
            SettlementStatus::Processing => write!(f, "Processing"),
            SettlementStatus::Paid => write!(f, "Paid"),
            SettlementStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for SettlementStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid settlement status: {s}"))),
        }
    }
}

impl From<String> for SettlementStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid settlement status: {value}. But this conversion cannot fail. Defaulting to Pending");
            SettlementStatus::Pending
        })
    }
}

//--------------------------------------        Role           -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Vendor,
    Admin,
}

pub type Roles = Vec<Role>;

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Vendor => write!(f, "vendor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The authenticated actor performing an operation, as established by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub roles: Roles,
}

impl Requester {
    pub fn new<S: Into<String>>(user_id: S, roles: Roles) -> Self {
        Self { user_id: user_id.into(), roles }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

//--------------------------------------   ShippingAddress     -------------------------------------------------------

fn default_country_code() -> String {
    "SA".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

impl ShippingAddress {
    pub fn new<S1: Into<String>, S2: Into<String>>(line1: S1, city: S2) -> Self {
        Self {
            line1: line1.into(),
            line2: None,
            city: city.into(),
            state: None,
            postal_code: None,
            phone: None,
            country_code: default_country_code(),
        }
    }

    /// Checks the required fields. Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.line1.trim().is_empty() {
            return Err("line1 is required".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("city is required".to_string());
        }
        Ok(())
    }
}

//--------------------------------------       CartItem        -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub vendor_code: String,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A buyer's cart. Lazily created on first add; an absent cart reads back as the empty shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub buyer_id: String,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
}

impl Cart {
    pub fn empty<S: Into<String>>(buyer_id: S) -> Self {
        Self { buyer_id: buyer_id.into(), items: Vec::new(), subtotal: Money::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//--------------------------------------        Order          -------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub currency: String,
    pub shipping_address: Json<ShippingAddress>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub vendor_code: String,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// An order as it is about to be persisted at checkout. Totals are computed once, here, and are immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub currency: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub vendor_code: String,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

impl From<CartItem> for NewOrderItem {
    fn from(item: CartItem) -> Self {
        Self { sku: item.sku, quantity: item.quantity, unit_price: item.unit_price, vendor_code: item.vendor_code }
    }
}

//--------------------------------------    PaymentIntent      -------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentIntent {
    pub id: i64,
    pub intent_id: IntentId,
    pub order_id: OrderId,
    pub provider: String,
    pub provider_ref: String,
    pub amount: Money,
    pub currency: String,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub intent_id: IntentId,
    pub order_id: OrderId,
    pub provider: String,
    pub provider_ref: String,
    pub amount: Money,
    pub currency: String,
}

//--------------------------------------    ProviderEvent      -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEventType {
    PaymentSucceeded,
    PaymentFailed,
}

impl Display for ProviderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderEventType::PaymentSucceeded => write!(f, "payment_succeeded"),
            ProviderEventType::PaymentFailed => write!(f, "payment_failed"),
        }
    }
}

/// A webhook event as delivered by the payment provider. `id` is the provider's event id and is the idempotency
/// key: redeliveries of the same id are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: ProviderEventType,
    pub provider_ref: String,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
}

//--------------------------------------      Settlement       -------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Settlement {
    pub id: i64,
    pub settlement_id: SettlementId,
    pub vendor_code: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: SettlementStatus,
    pub gross_amount: Money,
    pub commission_amount: Money,
    pub net_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One member row of a settlement: a single order's gross contribution for the settled vendor.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SettlementLine {
    pub order_id: OrderId,
    pub vendor_code: String,
    pub vendor_gross: Money,
}

//--------------------------------------  CommissionPolicy     -------------------------------------------------------

/// Per-vendor commission configuration, resolved once per settlement run through the `VendorPolicies`
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionPolicy {
    /// A percentage of gross, in basis points (250 = 2.5%). Rounds down.
    Percentage { basis_points: i64 },
    /// A fixed fee per settlement, clamped to gross so the net amount is never negative.
    Fixed { amount: Money },
}

impl CommissionPolicy {
    pub fn commission_on(&self, gross: Money) -> Money {
        match self {
            CommissionPolicy::Percentage { basis_points } => gross.take_basis_points(*basis_points),
            CommissionPolicy::Fixed { amount } => amount.clamp_to(gross),
        }
    }
}
