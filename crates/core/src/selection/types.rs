//! Types for the Vendor Selection Engine

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{CachedConversation, CallId, ExtractedBusinessData};
use crate::domain::order::Priority;
use crate::domain::trigger::{TriggerActions, TriggerPoint, VendorSelectionCriteria};
use crate::domain::vendor::{Coordinates, ServiceCategory, VendorId};
use crate::notify::NotificationChannel;

/// Resolved criteria for one selection run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub service_type: ServiceCategory,
    pub customer_location: Coordinates,
    pub priority: Priority,
    pub max_distance_miles: f64,
    pub min_rating: f64,
    pub max_response_time_mins: f64,
    /// Further caps the per-priority selection size when set.
    #[serde(default)]
    pub max_vendors_to_notify: Option<usize>,
}

/// Everything the pipeline needs to run dispatch for a finished conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub owner_id: String,
    #[serde(default)]
    pub call_id: Option<CallId>,
    /// Concatenated customer speech.
    pub customer_text: String,
    #[serde(default)]
    pub extracted_data: ExtractedBusinessData,
    /// Location recorded on the call, used when nothing was extracted.
    #[serde(default)]
    pub fallback_location: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub trigger_reason: String,
    #[serde(default)]
    pub actions: TriggerActions,
    #[serde(default)]
    pub criteria: VendorSelectionCriteria,
}

impl DispatchRequest {
    pub fn from_conversation(
        conversation: &CachedConversation,
        extracted_data: ExtractedBusinessData,
        trigger: &TriggerPoint,
        trigger_reason: impl Into<String>,
    ) -> Self {
        let metadata = &conversation.metadata;
        Self {
            owner_id: metadata.owner_id.clone().unwrap_or_else(|| trigger.owner_id.clone()),
            call_id: Some(metadata.call_id.clone()),
            customer_text: conversation.customer_text(),
            extracted_data,
            fallback_location: metadata.location.clone(),
            customer_phone: Some(metadata.phone_number.clone())
                .filter(|phone| !phone.trim().is_empty()),
            trigger_reason: trigger_reason.into(),
            actions: trigger.actions,
            criteria: trigger.vendor_selection_criteria,
        }
    }

    pub fn customer_name(&self) -> Option<String> {
        self.extracted_data
            .contact_name
            .clone()
            .or_else(|| self.extracted_data.owner_name.clone())
            .or_else(|| self.extracted_data.business_name.clone())
    }

    pub fn customer_phone(&self) -> Option<String> {
        self.extracted_data.phone.clone().or_else(|| self.customer_phone.clone())
    }

    pub fn customer_address(&self) -> Option<String> {
        self.extracted_data.location.clone().or_else(|| self.fallback_location.clone())
    }
}

/// Per-component scores for one vendor, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub availability: f64,
    pub performance: f64,
    pub response_time: f64,
    pub experience: f64,
    /// Raw bonus before weighting: 0.2, 0.1 or 0.
    pub priority_bonus: f64,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedVendor {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub selection_score: f64,
    pub distance_miles: f64,
    pub estimated_response_time_mins: f64,
    pub selection_reason: String,
    pub notification_methods: Vec<NotificationChannel>,
    pub score_breakdown: ScoreBreakdown,
}

/// Why a vendor was excluded before scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterRejection {
    Blocked,
    ServiceMismatch,
    OutOfRange,
    AtCapacity,
    LowRating,
    SlowResponse,
    Offline,
    Idle,
}

impl FilterRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::ServiceMismatch => "service_mismatch",
            Self::OutOfRange => "out_of_range",
            Self::AtCapacity => "at_capacity",
            Self::LowRating => "low_rating",
            Self::SlowResponse => "slow_response",
            Self::Offline => "offline",
            Self::Idle => "idle",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionMetrics {
    pub vendors_considered: usize,
    pub vendors_passed_filters: usize,
    /// Vendors whose total reached the minimum score.
    pub vendors_scored: usize,
    pub vendors_selected: usize,
    pub rejections: BTreeMap<FilterRejection, usize>,
    pub below_threshold: usize,
    pub top_score: f64,
    pub average_score: f64,
    pub reasoning_steps: Vec<String>,
}

impl SelectionMetrics {
    pub fn reject(&mut self, reason: FilterRejection) {
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    pub fn step(&mut self, message: impl Into<String>) {
        self.reasoning_steps.push(message.into());
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_vendors: Vec<SelectedVendor>,
    pub primary_vendor_id: Option<VendorId>,
    pub fallback_vendor_ids: Vec<VendorId>,
    /// Mean selection score of the chosen vendors, 0 when none were chosen.
    pub confidence_score: f64,
    pub metrics: SelectionMetrics,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.selected_vendors.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsTaken {
    pub order_created: bool,
    pub customer_notified: bool,
    pub vendors_notified: u32,
    pub push_notifications_sent: u32,
}

/// Result of a dispatch run. Failures are reported here, never raised.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub triggered: bool,
    pub trigger_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub selected_vendors: Vec<SelectedVendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_vendor_id: Option<VendorId>,
    pub fallback_vendor_ids: Vec<VendorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub confidence_score: f64,
    pub actions_taken: ActionsTaken,
    pub processing_time_ms: u64,
    pub selection_metrics: SelectionMetrics,
}

impl DispatchOutcome {
    pub fn not_triggered(reason: impl Into<String>) -> Self {
        Self { success: true, triggered: false, trigger_reason: reason.into(), ..Self::default() }
    }

    pub fn failed(reason: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            triggered: false,
            trigger_reason: reason.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: SelectionResult) -> Self {
        self.selected_vendors = selection.selected_vendors;
        self.primary_vendor_id = selection.primary_vendor_id;
        self.fallback_vendor_ids = selection.fallback_vendor_ids;
        self.confidence_score = selection.confidence_score;
        self.selection_metrics = selection.metrics;
        self
    }
}
