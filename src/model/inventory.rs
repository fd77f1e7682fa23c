use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::reporting::round2;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString, ToSchema,
)]
pub enum InventoryCategory {
    Steel,
    Cement,
    Timber,
    Safety,
    Electrical,
    Plumbing,
    Tools,
    Other,
}

impl InventoryCategory {
    pub const ALL: [&'static str; 8] = [
        "Steel",
        "Cement",
        "Timber",
        "Safety",
        "Electrical",
        "Plumbing",
        "Tools",
        "Other",
    ];
}

impl TryFrom<String> for InventoryCategory {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: u64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub category: InventoryCategory,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub low_stock_threshold: f64,
    pub location: String,
    pub project: Option<u64>,
    pub project_name: Option<String>,
    pub notes: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const INVENTORY_SELECT: &str = r#"
    SELECT i.id, i.name, i.category, i.quantity, i.unit, i.unit_price,
           i.low_stock_threshold, i.location, i.project_id AS project,
           p.name AS project_name, i.notes, i.created_at, i.updated_at
    FROM inventory_items i
    LEFT JOIN projects p ON p.id = i.project_id AND p.is_deleted = 0
"#;

pub fn is_low_stock(quantity: f64, threshold: f64) -> bool {
    quantity <= threshold
}

pub fn total_value(quantity: f64, unit_price: f64) -> f64 {
    round2(quantity * unit_price)
}

#[derive(Serialize)]
pub struct InventoryItemResponse<'a> {
    #[serde(flatten)]
    pub item: &'a InventoryItem,
    pub is_low_stock: bool,
    pub total_value: f64,
}

impl InventoryItem {
    pub fn response(&self) -> InventoryItemResponse<'_> {
        InventoryItemResponse {
            item: self,
            is_low_stock: is_low_stock(self.quantity, self.low_stock_threshold),
            total_value: total_value(self.quantity, self.unit_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_stock_includes_the_threshold() {
        assert!(is_low_stock(10.0, 10.0));
        assert!(is_low_stock(0.0, 10.0));
        assert!(!is_low_stock(10.5, 10.0));
    }

    #[test]
    fn total_value_rounds_to_cents() {
        assert_eq!(total_value(3.0, 19.999), 60.0);
        assert_eq!(total_value(2.5, 4.1), 10.25);
    }

    #[test]
    fn categories_keep_their_display_names() {
        for name in InventoryCategory::ALL {
            let cat: InventoryCategory = name.parse().unwrap();
            assert_eq!(cat.as_ref(), name);
        }
        assert!("steel".parse::<InventoryCategory>().is_err());
    }
}
