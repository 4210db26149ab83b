use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Ai,
    Customer,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<BTreeMap<String, String>>,
    /// Spoken duration in seconds, when the telephony layer reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl ConversationTurn {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        speaker: Speaker,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            speaker,
            content: content.into(),
            confidence: None,
            intent: None,
            entities: None,
            duration_secs: None,
        }
    }

    pub fn is_customer(&self) -> bool {
        self.speaker == Speaker::Customer
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: CallStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Completed)
                | (Self::Active, Self::Failed)
                | (Self::Active, Self::Cancelled)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub call_id: CallId,
    pub phone_number: String,
    pub call_type: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between `started_at` and `ended_at`.
    #[serde(default)]
    pub duration_secs: Option<i64>,
    pub status: CallStatus,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub voice_config: Option<serde_json::Value>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub engagement_level: Option<f64>,
}

impl CallMetadata {
    pub fn new(
        call_id: impl Into<String>,
        phone_number: impl Into<String>,
        call_type: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id: CallId(call_id.into()),
            phone_number: phone_number.into(),
            call_type: call_type.into(),
            started_at,
            ended_at: None,
            duration_secs: None,
            status: CallStatus::Active,
            owner_id: None,
            business_name: None,
            contact_name: None,
            location: None,
            industry: None,
            email: None,
            website: None,
            voice_config: None,
            quality_score: None,
            sentiment_score: None,
            engagement_level: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn transition_to(&mut self, next: CallStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidCallTransition { from: self.status, to: next })
    }

    /// Shallow merge: only fields present in the patch overwrite.
    pub fn apply_patch(&mut self, patch: CallMetadataPatch) {
        if let Some(phone_number) = patch.phone_number {
            self.phone_number = phone_number;
        }
        if let Some(call_type) = patch.call_type {
            self.call_type = call_type;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = started_at;
        }
        if let Some(ended_at) = patch.ended_at {
            self.ended_at = Some(ended_at);
        }
        if let Some(duration_secs) = patch.duration_secs {
            self.duration_secs = Some(duration_secs);
        }
        if let Some(status) = patch.status {
            if self.status != status && self.transition_to(status).is_err() {
                tracing::warn!(
                    event_name = "conversation.metadata.status_rejected",
                    call_id = %self.call_id,
                    from = ?self.status,
                    to = ?status,
                    "ignoring call status change that is not allowed"
                );
            }
        }
        if let Some(owner_id) = patch.owner_id {
            self.owner_id = Some(owner_id);
        }
        if let Some(business_name) = patch.business_name {
            self.business_name = Some(business_name);
        }
        if let Some(contact_name) = patch.contact_name {
            self.contact_name = Some(contact_name);
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(industry) = patch.industry {
            self.industry = Some(industry);
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(website) = patch.website {
            self.website = Some(website);
        }
        if let Some(voice_config) = patch.voice_config {
            self.voice_config = Some(voice_config);
        }
        if let Some(quality_score) = patch.quality_score {
            self.quality_score = Some(quality_score);
        }
        if let Some(sentiment_score) = patch.sentiment_score {
            self.sentiment_score = Some(sentiment_score);
        }
        if let Some(engagement_level) = patch.engagement_level {
            self.engagement_level = Some(engagement_level);
        }
    }

    /// Copies the contact fields the cache tracks on the call record itself.
    pub fn absorb_extracted(&mut self, extracted: &ExtractedBusinessData) {
        if let Some(value) = &extracted.business_name {
            self.business_name = Some(value.clone());
        }
        if let Some(value) = &extracted.contact_name {
            self.contact_name = Some(value.clone());
        }
        if let Some(value) = &extracted.location {
            self.location = Some(value.clone());
        }
        if let Some(value) = &extracted.industry {
            self.industry = Some(value.clone());
        }
        if let Some(value) = &extracted.email {
            self.email = Some(value.clone());
        }
        if let Some(value) = &extracted.website {
            self.website = Some(value.clone());
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadataPatch {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub status: Option<CallStatus>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub voice_config: Option<serde_json::Value>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub engagement_level: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

/// Structured fields pulled out of a transcript. Best effort: a `None` field
/// was not mentioned, it is never guessed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedBusinessData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pain_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_maker: Option<bool>,
}

impl ExtractedBusinessData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_name(&self) -> bool {
        self.business_name.is_some() || self.contact_name.is_some() || self.owner_name.is_some()
    }

    pub fn has_contact_detail(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }

    /// Later matches overwrite earlier ones field by field; a field that is
    /// already set is never cleared by a newer extraction that lacks it.
    pub fn merge_from(&mut self, newer: &ExtractedBusinessData) {
        fn overwrite(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
        fn extend_unique(slot: &mut Vec<String>, values: &[String]) {
            for value in values {
                if !slot.contains(value) {
                    slot.push(value.clone());
                }
            }
        }

        overwrite(&mut self.business_name, &newer.business_name);
        overwrite(&mut self.contact_name, &newer.contact_name);
        overwrite(&mut self.owner_name, &newer.owner_name);
        overwrite(&mut self.location, &newer.location);
        overwrite(&mut self.industry, &newer.industry);
        overwrite(&mut self.email, &newer.email);
        overwrite(&mut self.website, &newer.website);
        overwrite(&mut self.phone, &newer.phone);
        overwrite(&mut self.company_size, &newer.company_size);
        overwrite(&mut self.revenue, &newer.revenue);
        overwrite(&mut self.budget_range, &newer.budget_range);
        overwrite(&mut self.timeline, &newer.timeline);
        extend_unique(&mut self.pain_points, &newer.pain_points);
        extend_unique(&mut self.interests, &newer.interests);
        if newer.decision_maker.is_some() {
            self.decision_maker = newer.decision_maker;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedConversation {
    pub metadata: CallMetadata,
    turns: Vec<ConversationTurn>,
    pub extracted_data: ExtractedBusinessData,
    pub last_updated: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl CachedConversation {
    pub fn new(metadata: CallMetadata) -> Self {
        Self {
            metadata,
            turns: Vec::new(),
            extracted_data: ExtractedBusinessData::default(),
            last_updated: Utc::now(),
            sync_status: SyncStatus::Pending,
        }
    }

    pub fn call_id(&self) -> &CallId {
        &self.metadata.call_id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Appends a turn. A late-arriving turn with an earlier timestamp is
    /// placed after every turn at or before its timestamp; existing turns are
    /// never modified.
    pub fn push_turn(&mut self, turn: ConversationTurn) {
        let position = self.turns.partition_point(|existing| existing.timestamp <= turn.timestamp);
        self.turns.insert(position, turn);
        self.touch();
    }

    pub fn customer_text(&self) -> String {
        customer_text(&self.turns)
    }

    /// Any local mutation makes the conversation pending again.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
        self.sync_status = SyncStatus::Pending;
    }

    pub fn is_active(&self) -> bool {
        self.metadata.status == CallStatus::Active
    }

    /// Marks the call completed and stamps `ended_at` and `duration_secs`.
    pub fn finalize(&mut self, ended_at: DateTime<Utc>) -> Result<(), DomainError> {
        self.metadata.transition_to(CallStatus::Completed)?;
        self.metadata.ended_at = Some(ended_at);
        self.metadata.duration_secs =
            Some((ended_at - self.metadata.started_at).num_seconds().max(0));
        self.touch();
        Ok(())
    }
}

/// Concatenation of customer-spoken content, one turn per line.
pub fn customer_text(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .filter(|turn| turn.is_customer())
        .map(|turn| turn.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
