use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    entities::payment_orders::PaymentOrderEntity,
    value_objects::{
        enums::payment_statuses::PaymentStatus, pagination::PageRequest,
        subscriptions::SubscriptionChange,
    },
};

/// Signed form the client submits to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentForm {
    pub url: String,
    pub params: BTreeMap<String, String>,
}

/// Plain-text acknowledgement the gateway expects back from the notify URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAck {
    Success,
    Fail,
}

impl CallbackAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackAck::Success => "success",
            CallbackAck::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCompletion {
    Paid {
        order: PaymentOrderEntity,
        change: SubscriptionChange,
    },
    AlreadyFinal {
        status: PaymentStatus,
    },
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFilter {
    pub page: PageRequest,
    pub status: Option<PaymentStatus>,
}

impl OrderFilter {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;

    pub fn new(page: Option<i64>, page_size: Option<i64>, status: Option<PaymentStatus>) -> Self {
        Self {
            page: PageRequest::new(page, page_size, Self::DEFAULT_PAGE_SIZE),
            status,
        }
    }
}

/// A user's orders, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub records: Vec<PaymentOrderEntity>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl OrderPage {
    pub fn new(records: Vec<PaymentOrderEntity>, total: i64, filter: &OrderFilter) -> Self {
        Self {
            records,
            total,
            page: filter.page.page,
            page_size: filter.page.page_size,
            total_pages: filter.page.total_pages(total),
        }
    }
}

/// Formats integer minor units as `major.minor` with two decimals.
pub fn format_money(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parses a gateway amount such as `29.9` or `29.90` into minor units.
pub fn parse_money(value: &str) -> Option<i64> {
    let value = value.trim();
    let (major, minor) = match value.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (value, ""),
    };
    if major.is_empty() || minor.len() > 2 || !minor.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let major: i64 = major.parse().ok()?;
    if major < 0 {
        return None;
    }
    let minor: i64 = match minor.len() {
        0 => 0,
        1 => minor.parse::<i64>().ok()? * 10,
        _ => minor.parse().ok()?,
    };

    major.checked_mul(100)?.checked_add(minor)
}
