//! Capabilities the dispatch pipeline needs from the outside world.

use async_trait::async_trait;

use crate::domain::order::Order;
use crate::domain::trigger::TriggerPoint;
use crate::domain::vendor::{Coordinates, VendorProfile};
use crate::errors::ApplicationError;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the address was understood but could not be placed.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, ApplicationError>;
}

#[async_trait]
pub trait VendorDirectory: Send + Sync {
    /// Every vendor owned by `owner_id`, regardless of status or service.
    async fn vendor_pool(&self, owner_id: &str) -> Result<Vec<VendorProfile>, ApplicationError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), ApplicationError>;
}

#[async_trait]
pub trait TriggerPointSource: Send + Sync {
    /// Trigger points in the order the owner configured them.
    async fn trigger_points(&self, owner_id: &str) -> Result<Vec<TriggerPoint>, ApplicationError>;
}
