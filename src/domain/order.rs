use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

pub type OrderId = String;

/// A customer order as delivered by the order API.
///
/// Updates always carry a complete replacement object; only `id` is stable
/// for the lifetime of the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Human-readable order number shown to staff.
    pub order_id: String,
    pub restaurant: RestaurantRef,
    #[serde(default)]
    pub rider: Option<RiderRef>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub zone: Option<ZoneRef>,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub payment_method: String,
    #[serde(default)]
    pub delivery_charges: Decimal,
    #[serde(default)]
    pub tipping: Decimal,
    #[serde(default)]
    pub taxation_amount: Decimal,
    /// Amount the customer is charged, after any discount.
    #[serde(default)]
    pub order_amount: Decimal,
    #[serde(default)]
    pub instructions: Option<String>,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub is_picked_up: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRef {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub delivery_address: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: u32,
    pub title: String,
    pub variation: Variation,
    #[serde(default)]
    pub addons: Vec<Addon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    #[serde(default)]
    pub title: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    pub title: String,
    #[serde(default)]
    pub options: Vec<AddonOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonOption {
    pub title: String,
    pub price: Decimal,
}

impl LineItem {
    /// Unit price including every chosen add-on option.
    pub fn unit_price(&self) -> Decimal {
        let addons: Decimal = self
            .addons
            .iter()
            .flat_map(|addon| addon.options.iter())
            .map(|option| option.price)
            .sum();
        self.variation.price + addons
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }

    /// `2x Burger(Large)` style label used in order tables.
    pub fn label(&self) -> String {
        if self.variation.title.is_empty() {
            format!("{}x{}", self.quantity, self.title)
        } else {
            format!("{}x{}({})", self.quantity, self.title, self.variation.title)
        }
    }
}

/// Monetary breakdown shown on the order detail view and the printed receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub delivery_charges: Decimal,
    pub tip: Decimal,
    pub tax: Decimal,
    /// Subtotal plus fees, tip and tax.
    pub total: Decimal,
    pub discount: Option<Decimal>,
    pub amount_to_pay: Decimal,
}

impl Order {
    pub fn summary(&self) -> OrderSummary {
        let subtotal: Decimal = self.items.iter().map(LineItem::line_total).sum();
        let total = subtotal + self.delivery_charges + self.tipping + self.taxation_amount;

        let discount = Some(total - self.order_amount).filter(|d| *d > Decimal::ZERO);
        let amount_to_pay = if discount.is_some() { self.order_amount } else { total };

        OrderSummary {
            subtotal,
            delivery_charges: self.delivery_charges,
            tip: self.tipping,
            tax: self.taxation_amount,
            total,
            discount,
            amount_to_pay,
        }
    }

    /// Items rendered one per line.
    pub fn items_label(&self) -> String {
        self.items.iter().map(LineItem::label).collect::<Vec<_>>().join("\n")
    }

    /// A rider can be (re)assigned until the order is picked up or finished.
    pub fn rider_assignable(&self) -> bool {
        !self.is_picked_up && !self.order_status.is_terminal()
    }
}
