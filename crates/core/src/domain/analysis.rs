use serde::{Deserialize, Serialize};

use crate::domain::conversation::ExtractedBusinessData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerIntent {
    Interested,
    NotInterested,
    Callback,
    Neutral,
}

impl CustomerIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
            Self::Callback => "callback",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    /// In `[-1, 1]`.
    pub sentiment_score: f64,
    /// In `[0, 1]`.
    pub engagement_level: f64,
    /// In `[0, 100]`.
    pub lead_score: u8,
    pub intent: CustomerIntent,
    pub conversion_probability: f64,
    /// In `[1, 5]`, 5 being the hottest lead.
    pub priority_level: u8,
}

impl ConversationAnalysis {
    pub fn from_scores(sentiment_score: f64, engagement_level: f64, intent: CustomerIntent) -> Self {
        let sentiment_score = clamp_finite(sentiment_score, -1.0, 1.0);
        let engagement_level = clamp_finite(engagement_level, 0.0, 1.0);
        let lead_score =
            (50.0 + 30.0 * sentiment_score + 20.0 * engagement_level).round().clamp(0.0, 100.0)
                as u8;

        Self {
            sentiment_score,
            engagement_level,
            lead_score,
            intent,
            conversion_probability: f64::from(lead_score) / 100.0,
            priority_level: priority_band(lead_score),
        }
    }
}

pub fn priority_band(lead_score: u8) -> u8 {
    match lead_score {
        80..=u8::MAX => 5,
        65..=79 => 4,
        50..=64 => 3,
        35..=49 => 2,
        _ => 1,
    }
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0_f64.clamp(min, max);
    }
    value.clamp(min, max)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetrics {
    pub customer_talk_time_secs: f64,
    pub ai_talk_time_secs: f64,
    pub total_talk_time_secs: f64,
    pub average_response_time_secs: f64,
    pub interruption_count: u32,
    pub question_count: u32,
    pub objection_count: u32,
    /// In `[0, 1]`.
    pub flow_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationReport {
    pub extracted_data: ExtractedBusinessData,
    pub analysis: ConversationAnalysis,
    pub metrics: ConversationMetrics,
}
