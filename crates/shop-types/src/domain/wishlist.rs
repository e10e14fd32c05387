use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_WISHLIST_NAME: &str = "My Wishlist";

/// A signed-in customer's saved products. One per customer; a product
/// appears at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wishlist {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub items: Vec<WishlistItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WishlistItem {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub notes: String,
    pub added_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn new(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            name: DEFAULT_WISHLIST_NAME.to_string(),
            is_public: false,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `false` when the product was already saved.
    pub fn add_item(&mut self, product_id: Uuid) -> bool {
        if self.has_product(product_id) {
            return false;
        }
        let now = Utc::now();
        self.items.push(WishlistItem {
            id: Uuid::new_v4(),
            product_id,
            notes: String::new(),
            added_at: now,
        });
        self.updated_at = now;
        true
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn has_product(&self, product_id: Uuid) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_twice_keeps_one_entry() {
        let mut list = Wishlist::new(Uuid::new_v4());
        let product = Uuid::new_v4();
        assert_eq!(list.name, DEFAULT_WISHLIST_NAME);
        assert!(list.add_item(product));
        assert!(!list.add_item(product));
        assert_eq!(list.item_count(), 1);
        assert!(list.has_product(product));
    }

    #[test]
    fn removing_reports_whether_anything_went() {
        let mut list = Wishlist::new(Uuid::new_v4());
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        list.add_item(keep);
        list.add_item(drop);

        assert!(list.remove_item(drop));
        assert!(!list.remove_item(drop));
        assert!(!list.has_product(drop));
        assert_eq!(list.item_count(), 1);
        assert_eq!(list.items[0].product_id, keep);
    }
}
