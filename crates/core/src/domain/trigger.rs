use serde::{Deserialize, Serialize};

use crate::domain::analysis::CustomerIntent;
use crate::domain::order::Priority;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerPointId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ServiceRequest,
    QuoteRequest,
    Appointment,
    Emergency,
    FollowUp,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceRequest => "service_request",
            Self::QuoteRequest => "quote_request",
            Self::Appointment => "appointment",
            Self::Emergency => "emergency",
            Self::FollowUp => "follow_up",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "service_request" => Some(Self::ServiceRequest),
            "quote_request" => Some(Self::QuoteRequest),
            "appointment" => Some(Self::Appointment),
            "emergency" => Some(Self::Emergency),
            "follow_up" => Some(Self::FollowUp),
            _ => None,
        }
    }

    /// Customer intents that count as a match for this kind of trigger.
    pub fn expected_intents(self) -> &'static [CustomerIntent] {
        match self {
            Self::ServiceRequest | Self::Emergency => &[CustomerIntent::Interested],
            Self::QuoteRequest => &[CustomerIntent::Interested, CustomerIntent::Neutral],
            Self::Appointment => &[CustomerIntent::Interested, CustomerIntent::Callback],
            Self::FollowUp => &[CustomerIntent::Callback, CustomerIntent::Neutral],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConditions {
    pub require_name: bool,
    pub require_location: bool,
    pub require_contact: bool,
    pub require_service_type: bool,
    pub require_budget: bool,
    pub require_timeline: bool,
}

impl TriggerConditions {
    pub fn required_count(&self) -> usize {
        [
            self.require_name,
            self.require_location,
            self.require_contact,
            self.require_service_type,
            self.require_budget,
            self.require_timeline,
        ]
        .into_iter()
        .filter(|required| *required)
        .count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerActions {
    #[serde(default = "enabled")]
    pub send_customer_email: bool,
    #[serde(default = "enabled")]
    pub notify_vendors: bool,
    #[serde(default = "enabled")]
    pub create_order: bool,
    #[serde(default)]
    pub priority_level: Option<Priority>,
}

impl Default for TriggerActions {
    fn default() -> Self {
        Self {
            send_customer_email: true,
            notify_vendors: true,
            create_order: true,
            priority_level: None,
        }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorSelectionCriteria {
    /// Maximum customer-to-vendor distance in miles.
    pub location_radius: Option<f64>,
    pub min_rating: Option<f64>,
    pub max_vendors_to_notify: Option<usize>,
    pub prefer_available: bool,
    pub work_type_match: bool,
    /// Maximum acceptable average response time in minutes.
    pub max_response_time: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerPoint {
    pub id: TriggerPointId,
    pub owner_id: String,
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub conditions: TriggerConditions,
    #[serde(default)]
    pub actions: TriggerActions,
    #[serde(default)]
    pub vendor_selection_criteria: VendorSelectionCriteria,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use crate::domain::analysis::CustomerIntent;

    use super::{TriggerConditions, TriggerPoint, TriggerType};

    #[test]
    fn expected_intents_per_trigger_type() {
        assert_eq!(TriggerType::Emergency.expected_intents(), &[CustomerIntent::Interested]);
        assert!(TriggerType::FollowUp.expected_intents().contains(&CustomerIntent::Neutral));
        assert!(!TriggerType::ServiceRequest.expected_intents().contains(&CustomerIntent::Callback));
    }

    #[test]
    fn counts_required_conditions() {
        let conditions = TriggerConditions {
            require_name: true,
            require_contact: true,
            ..TriggerConditions::default()
        };
        assert_eq!(conditions.required_count(), 2);
        assert_eq!(TriggerConditions::default().required_count(), 0);
    }

    #[test]
    fn trigger_point_deserializes_with_defaults() {
        let trigger: TriggerPoint = serde_json::from_value(serde_json::json!({
            "id": "tp-1",
            "owner_id": "owner-1",
            "name": "Plumbing leads",
            "trigger_type": "service_request",
            "keywords": ["leak"],
            "is_active": true
        }))
        .expect("trigger point json");

        assert!(trigger.actions.create_order);
        assert_eq!(trigger.vendor_selection_criteria.max_vendors_to_notify, None);
    }
}
