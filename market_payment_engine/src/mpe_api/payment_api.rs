use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{IntentId, NewPaymentIntent, Order, OrderId, PaymentIntent, PaymentStatus, ProviderEvent, ProviderEventType},
    events::{EventProducers, OrderPaidEvent, PaymentFailedEvent},
    helpers::new_intent_id,
    traits::{MarketDatabase, MarketError, PaymentProvider, WebhookOutcome},
};

/// `PaymentApi` handles the payment leg of an order: intent creation against the provider, and the webhook
/// events the provider sends back.
pub struct PaymentApi<B, P> {
    db: B,
    provider: P,
    producers: EventProducers,
}

impl<B, P> Debug for PaymentApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, P> PaymentApi<B, P> {
    pub fn new(db: B, provider: P, producers: EventProducers) -> Self {
        Self { db, provider, producers }
    }
}

impl<B, P> PaymentApi<B, P>
where
    B: MarketDatabase,
    P: PaymentProvider,
{
    /// Creates a payment intent for the order.
    ///
    /// The order must be awaiting payment before the provider is contacted, and only a successful registration
    /// is persisted. Persisting the intent moves the order's payment track to `Processing` and blocks further
    /// intents until this one reaches a terminal state.
    pub async fn create_intent(&self, order_id: &OrderId) -> Result<PaymentIntent, MarketError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
        if order.payment_status != PaymentStatus::Pending {
            // Rejecting before the provider call keeps duplicate requests from registering dangling intents
            // there. The same check runs again inside the insert transaction to catch races.
            return Err(MarketError::OrderNotPending(order_id.clone()));
        }
        let registered = self.provider.register_intent(order_id, order.total, &order.currency).await?;
        let intent = NewPaymentIntent {
            intent_id: new_intent_id(),
            order_id: order_id.clone(),
            provider: self.provider.name().to_string(),
            provider_ref: registered.provider_ref,
            amount: order.total,
            currency: order.currency.clone(),
        };
        let intent = self.db.insert_intent(intent).await?;
        info!("🔄️💳️ Intent {} created for order {order_id} ({} {})", intent.intent_id, intent.amount, intent.currency);
        Ok(intent)
    }

    pub async fn fetch_intent(&self, intent_id: &IntentId) -> Result<Option<PaymentIntent>, MarketError> {
        self.db.fetch_intent(intent_id).await
    }

    /// Applies a provider webhook event whose signature has already been verified.
    ///
    /// Never fails on redelivered, orphaned or conflicting events. Whatever the outcome, the caller should
    /// acknowledge the delivery; only the `Applied` outcome changes state and fires hooks.
    pub async fn handle_event(&self, event: &ProviderEvent) -> Result<WebhookOutcome, MarketError> {
        let outcome = self.db.apply_provider_event(event).await?;
        match &outcome {
            WebhookOutcome::Applied { order, intent } => {
                info!(
                    "🔄️💳️ Event {} applied: order {} payment is now {}",
                    event.id, order.order_id, order.payment_status
                );
                match event.event_type {
                    ProviderEventType::PaymentSucceeded => {
                        self.call_order_paid_hook(order.clone(), intent.clone()).await;
                    },
                    ProviderEventType::PaymentFailed => {
                        self.call_payment_failed_hook(order.clone(), intent.clone()).await;
                    },
                }
            },
            WebhookOutcome::Duplicate { event_id } => {
                debug!("🔄️💳️ Event {event_id} has been processed before. Ignoring redelivery.");
            },
            WebhookOutcome::Orphaned { provider_ref } => {
                warn!("🔄️💳️ Event {} references unknown provider ref {provider_ref}. Acknowledged and dropped.", event.id);
            },
            WebhookOutcome::Conflict { provider_ref, existing } => {
                warn!(
                    "🔄️💳️ Event {} conflicts with intent for {provider_ref}, already {existing}. First terminal \
                     state wins.",
                    event.id
                );
            },
        }
        Ok(outcome)
    }

    async fn call_order_paid_hook(&self, order: Order, intent: PaymentIntent) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️💳️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), intent.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_failed_hook(&self, order: Order, intent: PaymentIntent) {
        for emitter in &self.producers.payment_failed_producer {
            debug!("🔄️💳️ Notifying payment failed hook subscribers");
            let event = PaymentFailedEvent::new(order.clone(), intent.clone());
            emitter.publish_event(event).await;
        }
    }

    /// Marks the intent as succeeded without waiting for the provider, by synthesizing the webhook event the
    /// provider would have sent. Strictly a development aid; the synthetic event runs through the same
    /// idempotency and conflict machinery as a real delivery.
    pub async fn confirm_intent(&self, intent_id: &IntentId) -> Result<WebhookOutcome, MarketError> {
        let intent = self
            .db
            .fetch_intent(intent_id)
            .await?
            .ok_or_else(|| MarketError::IntentNotFound(intent_id.clone()))?;
        let event = ProviderEvent {
            id: format!("manual-{}", intent.intent_id),
            event_type: ProviderEventType::PaymentSucceeded,
            provider_ref: intent.provider_ref.clone(),
            amount: Some(intent.amount),
            currency: Some(intent.currency.clone()),
        };
        info!("🔄️💳️ Manually confirming intent {intent_id}");
        self.handle_event(&event).await
    }
}
