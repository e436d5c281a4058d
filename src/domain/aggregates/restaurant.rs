//! Restaurant and its delivery policy

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, RestaurantId};

/// Delivery terms a restaurant publishes. A missing `fee` means the platform fallback applies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPolicy {
    #[serde(default)]
    pub min_order: Money,
    pub fee: Option<Money>,
    pub estimated_minutes: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub delivery: DeliveryPolicy,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, address: impl Into<String>, delivery: DeliveryPolicy) -> Self {
        Self { id: RestaurantId::new(), name: name.into(), address: address.into(), delivery }
    }
}
