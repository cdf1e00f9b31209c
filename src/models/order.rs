//! Order-related domain models
//!
//! Orders and their line items as returned by the remote order service.
//! All of these are read-only once fetched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single order in the customer's purchase history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: String,

    /// Numeric status code as reported by the service
    pub status_code: i32,

    /// Human-readable status label
    #[serde(default)]
    pub status_label: String,

    /// When the order window started
    pub started_at: DateTime<Utc>,

    /// When the order window ended
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Warehouse that fulfilled the order
    pub warehouse: String,

    /// Total price
    #[serde(default)]
    pub price: f64,
}

/// A line item of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product identifier
    pub product_id: String,

    /// Display name
    pub name: String,

    /// Quantity, possibly fractional (weighed goods)
    pub quantity: f64,

    /// Optional product category
    #[serde(default)]
    pub category: Option<String>,
}

/// Line items of one order together with the order timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Line items
    #[serde(default)]
    pub lines: Vec<OrderLine>,

    /// Timestamp attributed to every line of this order
    pub order_timestamp: DateTime<Utc>,
}

/// One page of the remote order list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    /// Cursor of the next page, `None` on the last page
    #[serde(default)]
    pub next_page: Option<String>,

    /// Orders on this page, in server order
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// Cached copy of a customer's complete order list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Customer the list belongs to
    pub customer_id: String,

    /// When the list was downloaded
    pub fetched_at: DateTime<Utc>,

    /// All orders in server order
    pub orders: Vec<Order>,
}

impl OrderSnapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(customer_id: impl Into<String>, orders: Vec<Order>) -> Self {
        Self {
            customer_id: customer_id.into(),
            fetched_at: Utc::now(),
            orders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Order page decodes with a terminal marker
    #[test]
    fn test_order_page_terminal() {
        let json = r#"{
            "next_page": null,
            "orders": [{
                "id": "o-1",
                "status_code": 3,
                "status_label": "delivered",
                "started_at": "2024-03-01T10:00:00Z",
                "ended_at": "2024-03-01T12:00:00Z",
                "warehouse": "W1",
                "price": 42.5
            }]
        }"#;

        let page: OrderPage = serde_json::from_str(json).expect("page should decode");
        assert!(page.next_page.is_none());
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].id, "o-1");
        assert_eq!(page.orders[0].warehouse, "W1");
        assert!(page.orders[0].ended_at.is_some());
    }

    // Test 2: Optional fields default when absent
    #[test]
    fn test_order_optional_fields() {
        let json = r#"{
            "id": "o-2",
            "status_code": 1,
            "started_at": "2024-03-01T10:00:00Z",
            "warehouse": "W2"
        }"#;

        let order: Order = serde_json::from_str(json).expect("order should decode");
        assert_eq!(order.status_label, "");
        assert!(order.ended_at.is_none());
        assert_eq!(order.price, 0.0);
    }

    // Test 3: Line without category
    #[test]
    fn test_order_detail_without_category() {
        let json = r#"{
            "lines": [{"product_id": "p-1", "name": "Milk", "quantity": 1.5}],
            "order_timestamp": "2024-03-02T08:30:00Z"
        }"#;

        let detail: OrderDetail = serde_json::from_str(json).expect("detail should decode");
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].quantity, 1.5);
        assert!(detail.lines[0].category.is_none());
    }
}
