use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::CallId;
use crate::domain::vendor::{ServiceCategory, VendorId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(format!("ORD-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" | "emergency" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn value_multiplier(self) -> Decimal {
        match self {
            Self::Low => Decimal::new(10, 1),
            Self::Medium => Decimal::new(12, 1),
            Self::High => Decimal::new(15, 1),
            Self::Urgent => Decimal::new(20, 1),
        }
    }

    /// How far out the job is scheduled.
    pub fn schedule_offset(self) -> Duration {
        match self {
            Self::Urgent => Duration::hours(2),
            Self::High => Duration::days(1),
            Self::Medium => Duration::days(3),
            Self::Low => Duration::weeks(1),
        }
    }

    /// How long vendors get to respond.
    pub fn response_window(self) -> Duration {
        match self {
            Self::Urgent => Duration::minutes(15),
            Self::High => Duration::hours(1),
            Self::Medium => Duration::hours(4),
            Self::Low => Duration::hours(24),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Accepted,
    Declined,
    OnWay,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::OnWay => "on_way",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "on_way" => Some(Self::OnWay),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub call_id: Option<CallId>,
    pub owner_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub service_type: ServiceCategory,
    pub description: String,
    pub priority: Priority,
    pub status: OrderStatus,
    pub assigned_vendors: Vec<VendorId>,
    pub primary_vendor_id: VendorId,
    pub scheduled_date: DateTime<Utc>,
    pub response_deadline: DateTime<Utc>,
    pub estimated_value: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::New, OrderStatus::Accepted)
                | (OrderStatus::New, OrderStatus::Declined)
                | (OrderStatus::Accepted, OrderStatus::OnWay)
                | (OrderStatus::OnWay, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Completed)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }
}

pub fn estimated_value(service: ServiceCategory, priority: Priority) -> Decimal {
    (service.base_value() * priority.value_multiplier()).round_dp(2)
}
