use serde::Serialize;
use tracing::debug;

use leadline_core::domain::analysis::ConversationAnalysis;
use leadline_core::domain::conversation::ExtractedBusinessData;
use leadline_core::domain::trigger::{TriggerPoint, TriggerPointId, TriggerType};
use leadline_core::domain::vendor::ServiceCategory;
use leadline_core::text::{contains_phrase, normalize};

pub const TRIGGER_THRESHOLD: f64 = 0.7;
const THRESHOLD_TOLERANCE: f64 = 1e-9;

const KEYWORD_WEIGHT: f64 = 0.3;
const CONDITIONS_WEIGHT: f64 = 0.4;
const INTENT_WEIGHT: f64 = 0.3;
const UNEXPECTED_INTENT_SCORE: f64 = 0.2;

/// Score breakdown for one trigger point against one conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TriggerEvaluation {
    pub trigger_id: TriggerPointId,
    pub trigger_name: String,
    pub trigger_type: TriggerType,
    pub keyword_score: f64,
    pub conditions_score: f64,
    pub intent_score: f64,
    pub total_score: f64,
    pub matched_keywords: Vec<String>,
    pub missing_conditions: Vec<&'static str>,
    pub fired: bool,
}

/// What a trigger point is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct TriggerInput<'a> {
    pub customer_text: &'a str,
    pub extracted_data: &'a ExtractedBusinessData,
    pub analysis: &'a ConversationAnalysis,
}

#[derive(Clone, Copy, Debug)]
pub struct TriggerEvaluator {
    threshold: f64,
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self { threshold: TRIGGER_THRESHOLD }
    }
}

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&self, trigger: &TriggerPoint, input: TriggerInput<'_>) -> TriggerEvaluation {
        let text = normalize(input.customer_text);

        let matched_keywords = trigger
            .keywords
            .iter()
            .filter(|keyword| {
                let keyword = normalize(keyword);
                !keyword.is_empty() && contains_phrase(&text, &keyword)
            })
            .cloned()
            .collect::<Vec<_>>();
        let keyword_score = if trigger.keywords.is_empty() {
            0.0
        } else {
            matched_keywords.len() as f64 / trigger.keywords.len() as f64
        };

        let missing_conditions = missing_conditions(trigger, input);
        let required = trigger.conditions.required_count();
        let conditions_score = if required == 0 {
            1.0
        } else {
            (required - missing_conditions.len()) as f64 / required as f64
        };

        let intent_score = intent_score(trigger.trigger_type, input.analysis);
        let total_score = KEYWORD_WEIGHT * keyword_score
            + CONDITIONS_WEIGHT * conditions_score
            + INTENT_WEIGHT * intent_score;

        TriggerEvaluation {
            trigger_id: trigger.id.clone(),
            trigger_name: trigger.name.clone(),
            trigger_type: trigger.trigger_type,
            keyword_score,
            conditions_score,
            intent_score,
            total_score,
            matched_keywords,
            missing_conditions,
            fired: self.fires(total_score),
        }
    }

    /// Evaluates active trigger points in order and stops at the first that
    /// fires. Every evaluation made is returned.
    pub fn first_match<'t>(
        &self,
        triggers: &'t [TriggerPoint],
        input: TriggerInput<'_>,
    ) -> (Vec<TriggerEvaluation>, Option<&'t TriggerPoint>) {
        let mut evaluations = Vec::new();
        for trigger in triggers.iter().filter(|trigger| trigger.is_active) {
            let evaluation = self.evaluate(trigger, input);
            debug!(
                event_name = "trigger.evaluated",
                trigger_id = %trigger.id.0,
                total_score = evaluation.total_score,
                fired = evaluation.fired,
                "trigger point evaluated"
            );
            let fired = evaluation.fired;
            evaluations.push(evaluation);
            if fired {
                return (evaluations, Some(trigger));
            }
        }
        (evaluations, None)
    }

    pub fn fires(&self, total_score: f64) -> bool {
        total_score + THRESHOLD_TOLERANCE >= self.threshold
    }
}

fn missing_conditions(trigger: &TriggerPoint, input: TriggerInput<'_>) -> Vec<&'static str> {
    let conditions = trigger.conditions;
    let data = input.extracted_data;
    let checks = [
        (conditions.require_name, "name", data.has_name()),
        (conditions.require_location, "location", data.location.is_some()),
        (conditions.require_contact, "contact", data.has_contact_detail()),
        (
            conditions.require_service_type,
            "service_type",
            ServiceCategory::detect(input.customer_text).is_some(),
        ),
        (conditions.require_budget, "budget", data.budget_range.is_some()),
        (conditions.require_timeline, "timeline", data.timeline.is_some()),
    ];
    checks
        .into_iter()
        .filter(|(required, _, satisfied)| *required && !satisfied)
        .map(|(_, name, _)| name)
        .collect()
}

fn intent_score(trigger_type: TriggerType, analysis: &ConversationAnalysis) -> f64 {
    if trigger_type.expected_intents().contains(&analysis.intent) {
        (0.7 + 0.2 * analysis.sentiment_score + 0.1 * analysis.engagement_level).clamp(0.0, 1.0)
    } else {
        UNEXPECTED_INTENT_SCORE
    }
}

#[cfg(test)]
mod tests {
    use leadline_core::domain::analysis::{ConversationAnalysis, CustomerIntent};
    use leadline_core::domain::conversation::ExtractedBusinessData;
    use leadline_core::domain::trigger::{
        TriggerActions, TriggerConditions, TriggerPoint, TriggerPointId, TriggerType,
        VendorSelectionCriteria,
    };

    use super::{TriggerEvaluator, TriggerInput};

    fn trigger(id: &str, keywords: &[&str], conditions: TriggerConditions) -> TriggerPoint {
        TriggerPoint {
            id: TriggerPointId(id.to_string()),
            owner_id: "owner-1".to_string(),
            name: format!("Trigger {id}"),
            trigger_type: TriggerType::ServiceRequest,
            keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
            conditions,
            actions: TriggerActions::default(),
            vendor_selection_criteria: VendorSelectionCriteria::default(),
            is_active: true,
        }
    }

    fn analysis(intent: CustomerIntent, sentiment: f64, engagement: f64) -> ConversationAnalysis {
        ConversationAnalysis::from_scores(sentiment, engagement, intent)
    }

    #[test]
    fn weighted_scores_combine_keywords_conditions_and_intent() {
        let point = trigger(
            "t1",
            &["leak", "plumber", "water heater", "gas"],
            TriggerConditions {
                require_location: true,
                require_contact: true,
                ..TriggerConditions::default()
            },
        );
        let extracted = ExtractedBusinessData {
            location: Some("Boston".to_string()),
            ..ExtractedBusinessData::default()
        };
        let analysis = analysis(CustomerIntent::Interested, 0.5, 0.0);

        let evaluation = TriggerEvaluator::new().evaluate(
            &point,
            TriggerInput {
                customer_text: "I need a plumber, the water heater has a Leak",
                extracted_data: &extracted,
                analysis: &analysis,
            },
        );

        assert!((evaluation.keyword_score - 0.75).abs() < 1e-9);
        assert!((evaluation.conditions_score - 0.5).abs() < 1e-9);
        assert!((evaluation.intent_score - 0.8).abs() < 1e-9);
        assert!((evaluation.total_score - (0.225 + 0.2 + 0.24)).abs() < 1e-9);
        assert_eq!(evaluation.missing_conditions, vec!["contact"]);
        assert!(!evaluation.fired);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let evaluator = TriggerEvaluator::new();
        assert!(evaluator.fires(0.7));
        assert!(evaluator.fires(0.3 * 1.0 + 0.4 * 0.5 + 0.3 * (2.0 / 3.0)));
        assert!(!evaluator.fires(0.699999));
    }

    #[test]
    fn no_keywords_and_no_conditions_can_still_fire_on_intent() {
        let point = trigger("t1", &[], TriggerConditions::default());
        let extracted = ExtractedBusinessData::default();
        let strong = analysis(CustomerIntent::Interested, 1.0, 1.0);

        let evaluation = TriggerEvaluator::new().evaluate(
            &point,
            TriggerInput { customer_text: "", extracted_data: &extracted, analysis: &strong },
        );
        assert_eq!(evaluation.keyword_score, 0.0);
        assert_eq!(evaluation.conditions_score, 1.0);
        assert_eq!(evaluation.intent_score, 1.0);
        assert!(evaluation.fired);
    }

    #[test]
    fn unexpected_intent_scores_low() {
        let mut point = trigger("t1", &[], TriggerConditions::default());
        point.trigger_type = TriggerType::FollowUp;
        let extracted = ExtractedBusinessData::default();
        let interested = analysis(CustomerIntent::Interested, 1.0, 1.0);

        let evaluation = TriggerEvaluator::new().evaluate(
            &point,
            TriggerInput { customer_text: "", extracted_data: &extracted, analysis: &interested },
        );
        assert_eq!(evaluation.intent_score, 0.2);
        assert!(!evaluation.fired);
    }

    #[test]
    fn first_firing_active_trigger_wins() {
        let mut inactive = trigger("inactive", &["sink"], TriggerConditions::default());
        inactive.is_active = false;
        let weak = trigger(
            "weak",
            &["roof"],
            TriggerConditions { require_budget: true, ..TriggerConditions::default() },
        );
        let strong = trigger("strong", &["sink"], TriggerConditions::default());
        let also_strong = trigger("also-strong", &["sink"], TriggerConditions::default());
        let triggers = vec![inactive, weak, strong, also_strong];

        let extracted = ExtractedBusinessData::default();
        let analysis = analysis(CustomerIntent::Interested, 0.2, 0.5);
        let (evaluations, fired) = TriggerEvaluator::new().first_match(
            &triggers,
            TriggerInput {
                customer_text: "my sink is clogged",
                extracted_data: &extracted,
                analysis: &analysis,
            },
        );

        assert_eq!(evaluations.len(), 2);
        assert!(!evaluations[0].fired);
        assert_eq!(fired.map(|trigger| trigger.id.0.as_str()), Some("strong"));
    }

    #[test]
    fn service_type_condition_uses_category_vocabulary() {
        let point = trigger(
            "t1",
            &[],
            TriggerConditions { require_service_type: true, ..TriggerConditions::default() },
        );
        let extracted = ExtractedBusinessData::default();
        let neutral = analysis(CustomerIntent::Neutral, 0.0, 0.0);
        let evaluator = TriggerEvaluator::new();

        let matched = evaluator.evaluate(
            &point,
            TriggerInput {
                customer_text: "the breaker keeps tripping",
                extracted_data: &extracted,
                analysis: &neutral,
            },
        );
        let unmatched = evaluator.evaluate(
            &point,
            TriggerInput {
                customer_text: "just saying hello",
                extracted_data: &extracted,
                analysis: &neutral,
            },
        );
        assert_eq!(matched.conditions_score, 1.0);
        assert_eq!(unmatched.conditions_score, 0.0);
    }
}
