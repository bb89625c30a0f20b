//! Shop items and the permanent base-spin upgrade.

use serde::{Deserialize, Serialize};

/// Item id under which base-spin upgrade purchases are counted.
pub const SPIN_UPGRADE_ITEM_ID: u32 = 999;

/// Shards charged for the first base-spin upgrade.
pub const SPIN_UPGRADE_BASE_PRICE: u64 = 25;

/// Price increase for every upgrade already bought.
pub const SPIN_UPGRADE_PRICE_STEP: u64 = 10;

/// Shard price of the next base-spin upgrade after `purchases` earlier ones.
pub fn spin_upgrade_price(purchases: u32) -> u64 {
    SPIN_UPGRADE_BASE_PRICE.saturating_add(SPIN_UPGRADE_PRICE_STEP.saturating_mul(u64::from(purchases)))
}

/// Item sold for coins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    /// Stable id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form item category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Coin price per unit.
    pub price: u64,
}

/// Stack of one shop item held by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedItem {
    /// Item id.
    pub item_id: u32,
    /// Units held.
    pub quantity: u32,
}

/// Outcome of a purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Whether the purchase went through.
    pub success: bool,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
    /// Balance of the spent currency afterwards.
    #[serde(default, alias = "new_pokecoins")]
    pub balance: u64,
}

impl PurchaseReceipt {
    pub(crate) fn refused(message: impl Into<String>, balance: u64) -> Self {
        Self {
            success: false,
            message: message.into(),
            balance,
        }
    }
}

/// Items stocked by the offline backend.
pub fn default_items() -> Vec<ShopItem> {
    fn item(id: u32, name: &str, kind: &str, price: u64, description: &str) -> ShopItem {
        ShopItem {
            id,
            name: name.to_string(),
            description: Some(description.to_string()),
            kind: kind.to_string(),
            price,
        }
    }

    vec![
        item(1, "Poke Ball", "ball", 100, "A basic capsule for catching creatures."),
        item(2, "Great Ball", "ball", 250, "Better odds than a Poke Ball."),
        item(3, "Ultra Ball", "ball", 600, "A high-performance capsule."),
        item(4, "Rare Candy", "consumable", 1_000, "Raises a creature's level."),
        item(5, "Lucky Egg", "held", 1_500, "A curious egg said to bring fortune."),
    ]
}

/// Find an item by id.
pub fn find_item(items: &[ShopItem], item_id: u32) -> Option<&ShopItem> {
    items.iter().find(|item| item.id == item_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_price_grows_per_purchase() {
        assert_eq!(spin_upgrade_price(0), 25);
        assert_eq!(spin_upgrade_price(1), 35);
        assert_eq!(spin_upgrade_price(4), 65);
    }

    #[test]
    fn default_stock_has_unique_ids() {
        let items = default_items();
        assert!(find_item(&items, 4).is_some());
        assert!(find_item(&items, SPIN_UPGRADE_ITEM_ID).is_none());
        let mut ids: Vec<_> = items.iter().map(|item| item.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), items.len());
    }

    #[test]
    fn receipts_accept_remote_column_names() -> anyhow::Result<()> {
        let receipt: PurchaseReceipt = serde_json::from_str(
            r#"{"success":true,"message":"bought","new_pokecoins":400}"#,
        )?;
        assert!(receipt.success);
        assert_eq!(receipt.balance, 400);

        let item: ShopItem = serde_json::from_str(
            r#"{"id":7,"name":"Repel","description":null,"type":"consumable","price":50,
                "icon_url":null,"created_at":"2024-05-01T00:00:00Z"}"#,
        )?;
        assert_eq!(item.kind, "consumable");
        assert!(item.description.is_none());
        Ok(())
    }
}
