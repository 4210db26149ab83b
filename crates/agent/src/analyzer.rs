use async_trait::async_trait;
use tracing::debug;

use leadline_core::domain::analysis::{
    ConversationAnalysis, ConversationMetrics, ConversationReport, CustomerIntent,
};
use leadline_core::domain::conversation::{
    customer_text, CallMetadata, ConversationTurn, Speaker,
};
use leadline_core::errors::ApplicationError;
use leadline_core::extraction::BusinessDataExtractor;
use leadline_core::text::{contains_phrase, normalize};

const WORDS_PER_MINUTE: f64 = 150.0;
const SENTIMENT_STEP: f64 = 0.1;

const POSITIVE_TERMS: &[&str] = &[
    "great",
    "good",
    "excellent",
    "perfect",
    "awesome",
    "wonderful",
    "love",
    "happy",
    "glad",
    "helpful",
    "thanks",
    "thank you",
    "appreciate",
    "interested",
    "definitely",
    "sounds good",
];

const NEGATIVE_TERMS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "horrible",
    "worst",
    "hate",
    "angry",
    "upset",
    "annoyed",
    "frustrated",
    "disappointed",
    "waste",
    "too expensive",
    "ridiculous",
    "scam",
];

const NOT_INTERESTED_TERMS: &[&str] = &[
    "not interested",
    "no thanks",
    "no thank you",
    "don't call",
    "do not call",
    "stop calling",
    "remove me",
    "not for us",
    "we're all set",
    "don't need",
];

const CALLBACK_TERMS: &[&str] = &[
    "call me back",
    "call back",
    "callback",
    "call me later",
    "call later",
    "another time",
    "not a good time",
    "busy right now",
    "try again later",
    "reach me tomorrow",
];

const INTERESTED_TERMS: &[&str] = &[
    "interested",
    "sounds good",
    "sign me up",
    "let's do it",
    "tell me more",
    "how much",
    "send someone",
    "schedule",
    "book",
    "i need",
    "we need",
    "need help",
    "quote",
    "yes please",
];

const OBJECTION_TERMS: &[&str] = &[
    "too expensive",
    "too much",
    "can't afford",
    "no budget",
    "not sure",
    "need to think",
    "think about it",
    "already have",
    "not right now",
    "check with",
    "talk to my",
];

/// Produces the full report for a finished conversation. Implementations may
/// call out to a model; the built-in one is [`ConversationAnalyzer`].
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        turns: &[ConversationTurn],
        metadata: &CallMetadata,
    ) -> Result<ConversationReport, ApplicationError>;
}

/// Keyword-driven analysis. Deterministic for a given transcript.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConversationAnalyzer {
    extractor: BusinessDataExtractor,
}

impl ConversationAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, turns: &[ConversationTurn]) -> ConversationReport {
        ConversationReport {
            extracted_data: self.extractor.extract_from_turns(turns),
            analysis: self.analysis(turns),
            metrics: metrics(turns),
        }
    }

    pub fn analysis(&self, turns: &[ConversationTurn]) -> ConversationAnalysis {
        let text = normalize(&customer_text(turns));
        ConversationAnalysis::from_scores(sentiment(&text), engagement(turns), intent(&text))
    }
}

#[async_trait]
impl AnalysisProvider for ConversationAnalyzer {
    async fn analyze(
        &self,
        turns: &[ConversationTurn],
        metadata: &CallMetadata,
    ) -> Result<ConversationReport, ApplicationError> {
        let report = self.report(turns);
        debug!(
            event_name = "analysis.completed",
            call_id = %metadata.call_id,
            lead_score = report.analysis.lead_score,
            intent = report.analysis.intent.as_str(),
            turns = turns.len(),
            "conversation analyzed"
        );
        Ok(report)
    }
}

/// +0.1 for each positive term present and -0.1 for each negative one.
pub fn sentiment(normalized_text: &str) -> f64 {
    let count = |terms: &[&str]| {
        terms.iter().filter(|term| contains_phrase(normalized_text, term)).count() as f64
    };
    let score = SENTIMENT_STEP * (count(POSITIVE_TERMS) - count(NEGATIVE_TERMS));
    score.clamp(-1.0, 1.0)
}

/// Average customer turn length in characters over 100, capped at 1.
pub fn engagement(turns: &[ConversationTurn]) -> f64 {
    let lengths = turns
        .iter()
        .filter(|turn| turn.is_customer())
        .map(|turn| turn.content.trim().chars().count())
        .collect::<Vec<_>>();
    if lengths.is_empty() {
        return 0.0;
    }
    let average = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    (average / 100.0).min(1.0)
}

pub fn intent(normalized_text: &str) -> CustomerIntent {
    let mentions =
        |terms: &[&str]| terms.iter().any(|term| contains_phrase(normalized_text, term));

    if mentions(NOT_INTERESTED_TERMS) {
        CustomerIntent::NotInterested
    } else if mentions(CALLBACK_TERMS) {
        CustomerIntent::Callback
    } else if mentions(INTERESTED_TERMS) {
        CustomerIntent::Interested
    } else {
        CustomerIntent::Neutral
    }
}

pub fn metrics(turns: &[ConversationTurn]) -> ConversationMetrics {
    let mut metrics = ConversationMetrics::default();

    for turn in turns {
        let talk = estimated_talk_secs(&turn.content);
        match turn.speaker {
            Speaker::Customer => {
                metrics.customer_talk_time_secs += talk;
                if turn.content.contains('?') {
                    metrics.question_count += 1;
                }
                let content = normalize(&turn.content);
                if OBJECTION_TERMS.iter().any(|term| contains_phrase(&content, term)) {
                    metrics.objection_count += 1;
                }
            }
            Speaker::Ai => metrics.ai_talk_time_secs += talk,
            Speaker::System => {}
        }
    }
    metrics.total_talk_time_secs = metrics.customer_talk_time_secs + metrics.ai_talk_time_secs;

    let mut response_gaps = Vec::new();
    let mut alternations = 0_u32;
    for pair in turns.windows(2) {
        let [previous, next] = pair else {
            continue;
        };
        if previous.speaker == Speaker::Customer && next.speaker == Speaker::Ai {
            response_gaps.push(seconds_between(previous, next).max(0.0));
        }
        if previous.speaker != next.speaker {
            alternations += 1;
            let spoken = previous
                .duration_secs
                .filter(|duration| duration.is_finite() && *duration >= 0.0)
                .unwrap_or_else(|| estimated_talk_secs(&previous.content));
            if seconds_between(previous, next) < spoken {
                metrics.interruption_count += 1;
            }
        }
    }
    if !response_gaps.is_empty() {
        metrics.average_response_time_secs =
            response_gaps.iter().sum::<f64>() / response_gaps.len() as f64;
    }

    if turns.len() >= 2 {
        let transitions = (turns.len() - 1) as f64;
        let alternation_ratio = f64::from(alternations) / transitions;
        let interruption_ratio = f64::from(metrics.interruption_count) / transitions;
        metrics.flow_score = (alternation_ratio - 0.5 * interruption_ratio).clamp(0.0, 1.0);
    }
    metrics
}

fn estimated_talk_secs(content: &str) -> f64 {
    content.split_whitespace().count() as f64 / WORDS_PER_MINUTE * 60.0
}

fn seconds_between(previous: &ConversationTurn, next: &ConversationTurn) -> f64 {
    (next.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0
}
