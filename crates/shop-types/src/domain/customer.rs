use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::Address;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Billing,
    Shipping,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Billing => "billing",
            AddressKind::Shipping => "shipping",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "billing" => Ok(AddressKind::Billing),
            "shipping" => Ok(AddressKind::Shipping),
            other => Err(format!("unknown address kind `{other}`")),
        }
    }
}

/// An address a customer keeps on file. Deleting one only deactivates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedAddress {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub kind: AddressKind,
    #[serde(flatten)]
    pub address: Address,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a customer submits when adding or editing an address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressInput {
    pub kind: AddressKind,
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0} not found")]
    NotFound(Uuid),
    #[error("missing address fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

fn check_required(address: &Address) -> Result<(), AddressError> {
    let missing: Vec<&'static str> = [
        ("first_name", &address.first_name),
        ("last_name", &address.last_name),
        ("address_line_1", &address.address_line_1),
        ("city", &address.city),
        ("state", &address.state),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AddressError::MissingFields(missing))
    }
}

/// Every address a customer ever saved, deactivated ones included.
///
/// While at least one address is active, exactly one active address is the
/// default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressBook {
    pub customer_id: Uuid,
    pub addresses: Vec<SavedAddress>,
}

impl AddressBook {
    pub fn new(customer_id: Uuid, addresses: Vec<SavedAddress>) -> Self {
        Self {
            customer_id,
            addresses,
        }
    }

    /// Active addresses, default first, then newest.
    pub fn active(&self) -> Vec<SavedAddress> {
        let mut active: Vec<SavedAddress> =
            self.addresses.iter().filter(|a| a.is_active).cloned().collect();
        active.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        active
    }

    pub fn get(&self, id: Uuid) -> Option<&SavedAddress> {
        self.addresses.iter().find(|a| a.id == id && a.is_active)
    }

    pub fn default_address(&self) -> Option<&SavedAddress> {
        self.addresses.iter().find(|a| a.is_active && a.is_default)
    }

    /// The first address saved always becomes the default.
    pub fn add(&mut self, input: AddressInput) -> Result<SavedAddress, AddressError> {
        check_required(&input.address)?;
        let make_default = input.is_default || self.default_address().is_none();
        if make_default {
            self.clear_default();
        }
        let now = Utc::now();
        let saved = SavedAddress {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            kind: input.kind,
            address: input.address,
            is_default: make_default,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.addresses.push(saved.clone());
        Ok(saved)
    }

    /// Replaces the fields of an active address. `is_default: true` promotes
    /// it; `false` never demotes the current default.
    pub fn update(&mut self, id: Uuid, input: AddressInput) -> Result<SavedAddress, AddressError> {
        check_required(&input.address)?;
        if self.get(id).is_none() {
            return Err(AddressError::NotFound(id));
        }
        if input.is_default {
            self.clear_default();
        }
        let entry = self
            .addresses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AddressError::NotFound(id))?;
        entry.kind = input.kind;
        entry.address = input.address;
        entry.is_default |= input.is_default;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Deactivates the address; a removed default hands over to the newest
    /// remaining one.
    pub fn remove(&mut self, id: Uuid) -> Result<(), AddressError> {
        let now = Utc::now();
        let entry = self
            .addresses
            .iter_mut()
            .find(|a| a.id == id && a.is_active)
            .ok_or(AddressError::NotFound(id))?;
        let was_default = entry.is_default;
        entry.is_active = false;
        entry.is_default = false;
        entry.updated_at = now;

        if was_default {
            let successor = self
                .addresses
                .iter_mut()
                .filter(|a| a.is_active)
                .max_by_key(|a| a.created_at);
            if let Some(next) = successor {
                next.is_default = true;
                next.updated_at = now;
            }
        }
        Ok(())
    }

    fn clear_default(&mut self) {
        for a in self.addresses.iter_mut().filter(|a| a.is_default) {
            a.is_default = false;
            a.updated_at = Utc::now();
        }
    }
}
