use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Settlement, SettlementId, SettlementLine, SettlementStatus},
    events::{EventProducers, SettlementCreatedEvent},
    helpers::new_settlement_id,
    traits::{
        CollaboratorError,
        MarketError,
        NewSettlement,
        SettlementBatchResult,
        SettlementError,
        SettlementManagement,
        VendorPolicies,
    },
};

/// `SettlementApi` groups paid, completed orders into per-vendor settlements and tracks their payout status.
pub struct SettlementApi<B, V> {
    db: B,
    vendors: V,
    producers: EventProducers,
}

impl<B, V> Debug for SettlementApi<B, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B, V> SettlementApi<B, V> {
    pub fn new(db: B, vendors: V, producers: EventProducers) -> Self {
        Self { db, vendors, producers }
    }
}

impl<B, V> SettlementApi<B, V>
where
    B: SettlementManagement,
    V: VendorPolicies,
{
    /// Runs one settlement batch over `[period_start, period_end]`.
    ///
    /// Every paid, completed order in the period contributes one line per vendor it has items from. Each vendor's
    /// commission policy is resolved once per run. An order-vendor pair can only ever belong to one settlement,
    /// so re-running the batch over an overlapping period produces no new settlements for already-settled orders.
    pub async fn run_batch(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<SettlementBatchResult, MarketError> {
        let lines = self.db.fetch_settleable_lines(period_start, period_end).await?;
        // BTreeMap so vendors are processed in a stable order
        let mut per_vendor: BTreeMap<String, Vec<SettlementLine>> = BTreeMap::new();
        for line in lines {
            per_vendor.entry(line.vendor_code.clone()).or_default().push(line);
        }
        debug!("🔄️🧾️ Settlement batch covers {} vendor(s)", per_vendor.len());
        let mut result = SettlementBatchResult::default();
        for (vendor_code, lines) in per_vendor {
            let policy = match self.vendors.commission_policy(&vendor_code).await {
                Ok(policy) => policy,
                Err(CollaboratorError::Rejected(reason)) => {
                    warn!("🔄️🧾️ No commission policy for vendor {vendor_code}: {reason}. Skipping vendor.");
                    result.orders_skipped += lines.len();
                    continue;
                },
                Err(e) => return Err(e.into()),
            };
            let candidates = lines.len();
            let settlement = NewSettlement {
                settlement_id: new_settlement_id(),
                vendor_code: vendor_code.clone(),
                period_start,
                period_end,
                policy,
                lines,
            };
            match self.db.insert_settlement(settlement).await? {
                Some(settlement) => {
                    let (_, attached) = self
                        .db
                        .fetch_settlement(&settlement.settlement_id)
                        .await?
                        .ok_or_else(|| SettlementError::SettlementNotFound(settlement.settlement_id.clone()))?;
                    result.orders_settled += attached.len();
                    result.orders_skipped += candidates - attached.len();
                    info!(
                        "🔄️🧾️ Settlement {} created for vendor {vendor_code}: {} order(s), net {}",
                        settlement.settlement_id,
                        attached.len(),
                        settlement.net_amount
                    );
                    self.call_settlement_created_hook(settlement.clone()).await;
                    result.settlements.push(settlement);
                },
                None => {
                    // A concurrent run settled every candidate first
                    debug!("🔄️🧾️ All {candidates} candidate(s) for vendor {vendor_code} were already settled");
                    result.orders_skipped += candidates;
                },
            }
        }
        Ok(result)
    }

    async fn call_settlement_created_hook(&self, settlement: Settlement) {
        for emitter in &self.producers.settlement_created_producer {
            debug!("🔄️🧾️ Notifying settlement created hook subscribers");
            let event = SettlementCreatedEvent::new(settlement.clone());
            emitter.publish_event(event).await;
        }
    }

    pub async fn fetch_settlement(
        &self,
        settlement_id: &SettlementId,
    ) -> Result<Option<(Settlement, Vec<SettlementLine>)>, MarketError> {
        let result = self.db.fetch_settlement(settlement_id).await?;
        Ok(result)
    }

    /// Renders the settlement as CSV: one row per settled order, then a summary row with the totals. Pure
    /// formatting, no side effects.
    pub async fn export_csv(&self, settlement_id: &SettlementId) -> Result<String, MarketError> {
        let (settlement, lines) = self
            .db
            .fetch_settlement(settlement_id)
            .await?
            .ok_or_else(|| SettlementError::SettlementNotFound(settlement_id.clone()))?;
        let vendor_code = csv_field(&settlement.vendor_code);
        let mut csv = String::from("settlement_id,vendor_code,period_start,period_end,status,order_id,vendor_gross,commission,net\n");
        for line in &lines {
            csv.push_str(&format!(
                "{},{vendor_code},{},{},{},{},{},,\n",
                settlement.settlement_id,
                settlement.period_start.to_rfc3339(),
                settlement.period_end.to_rfc3339(),
                settlement.status,
                csv_field(line.order_id.as_str()),
                line.vendor_gross,
            ));
        }
        csv.push_str(&format!(
            "{},{vendor_code},{},{},{},TOTAL,{},{},{}\n",
            settlement.settlement_id,
            settlement.period_start.to_rfc3339(),
            settlement.period_end.to_rfc3339(),
            settlement.status,
            settlement.gross_amount,
            settlement.commission_amount,
            settlement.net_amount,
        ));
        Ok(csv)
    }

    /// Moves the settlement along its payout track: Pending → Processing → Paid | Failed.
    pub async fn mark_settlement_status(
        &self,
        settlement_id: &SettlementId,
        new_status: SettlementStatus,
    ) -> Result<Settlement, MarketError> {
        let settlement = self.db.update_settlement_status(settlement_id, new_status).await?;
        debug!("🔄️🧾️ Settlement {settlement_id} is now {}", settlement.status);
        Ok(settlement)
    }
}

/// Quotes a CSV field that contains a delimiter, quote or newline, doubling any embedded quotes. Vendor codes
/// come from external configuration, so they cannot be trusted to be CSV-safe.
fn csv_field(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
