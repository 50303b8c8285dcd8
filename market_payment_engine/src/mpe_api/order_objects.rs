use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{FulfillmentStatus, Order, PaymentStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page: page.max(1), limit: limit.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Direction of the `(created_at, id)` sort key for order searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Search criteria for orders. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub buyer_id: Option<String>,
    pub vendor_code: Option<String>,
    /// Free-text match against the public order id and line item skus.
    pub search: Option<String>,
    pub payment_statuses: Vec<PaymentStatus>,
    pub fulfillment_statuses: Vec<FulfillmentStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl OrderQueryFilter {
    pub fn with_buyer_id<S: Into<String>>(mut self, buyer_id: S) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    pub fn with_vendor_code<S: Into<String>>(mut self, vendor_code: S) -> Self {
        self.vendor_code = Some(vendor_code.into());
        self
    }

    pub fn with_search<S: Into<String>>(mut self, search: S) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_statuses.push(status);
        self
    }

    pub fn with_fulfillment_status(mut self, status: FulfillmentStatus) -> Self {
        self.fulfillment_statuses.push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn sorted(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn paged(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.buyer_id.is_none() &&
            self.vendor_code.is_none() &&
            self.search.is_none() &&
            self.payment_statuses.is_empty() &&
            self.fulfillment_statuses.is_empty() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

/// One page of search results together with the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSearchResult {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub orders: Vec<Order>,
}
