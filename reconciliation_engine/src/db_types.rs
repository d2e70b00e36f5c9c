use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use spg_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
/// A lightweight wrapper around the opaque order identifier assigned at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
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

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been created at checkout and no successful payment signal has been observed yet.
    Pending,
    /// A successful payment has been reconciled and the order is being prepared for shipment.
    Processing,
    /// The order has been handed to the courier.
    Shipped,
    /// The order has been delivered to the customer.
    Delivered,
    /// The order was cancelled while it was still pending.
    Cancelled,
}

impl OrderStatus {
    /// The order lifecycle contract: status only moves forward along `Pending → Processing → Shipped → Delivered`,
    /// or sideways to `Cancelled` from `Pending`.
    pub fn can_transition_to(&self, new: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, new),
            (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) | (Pending, Cancelled)
        )
    }

    /// An order that is no longer `Pending` has already been reconciled (or can never be).
    pub fn is_reconciled(&self) -> bool {
        *self != OrderStatus::Pending
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub email: String,
    pub total_price: Money,
    pub status: OrderStatus,
    pub recipient_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub instructions: Option<String>,
    pub tracking_number: Option<String>,
    /// The provider-side transaction reference, set by the reconciliation handler on confirmed payment.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub email: String,
    pub total_price: Money,
    pub delivery: DeliveryDetails,
    pub items: Vec<NewLineItem>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, email: String, total_price: Money) -> Self {
        Self { order_id, customer_id, email, total_price, delivery: DeliveryDetails::default(), items: Vec::new() }
    }

    pub fn with_item(mut self, item: NewLineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryDetails) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Free-text delivery fields captured at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub recipient_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub instructions: Option<String>,
}

//--------------------------------------       LineItem        -------------------------------------------------------
/// A purchased line item. The unit price is snapshotted at order-creation time and never recalculated from the live
/// product price.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// A free-text size token, not a foreign key into a size catalog. Mismatches against the inventory table are
    /// possible and must not abort reconciliation.
    pub size: String,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: i64,
    pub quantity: i64,
    pub size: String,
    pub unit_price: Money,
}

impl NewLineItem {
    pub fn new(product_id: i64, quantity: i64, size: &str, unit_price: Money) -> Self {
        Self { product_id, quantity, size: size.to_string(), unit_price }
    }
}

//--------------------------------------       SizeStock       -------------------------------------------------------
/// Remaining inventory for a single product size. The quantity never goes negative; decrements clamp to zero.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SizeStock {
    pub id: i64,
    pub product_id: i64,
    pub size: String,
    pub quantity: i64,
}
