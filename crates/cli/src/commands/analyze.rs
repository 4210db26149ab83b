use leadline_agent::trigger::{TriggerEvaluation, TriggerEvaluator, TriggerInput};
use leadline_agent::ConversationAnalyzer;
use leadline_core::domain::analysis::ConversationReport;
use leadline_core::domain::conversation::{customer_text, ConversationTurn};
use leadline_core::domain::trigger::{TriggerPoint, TriggerPointId};
use serde::{Deserialize, Serialize};

use crate::commands::CommandResult;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalyzeInput {
    Transcript {
        turns: Vec<ConversationTurn>,
        #[serde(default)]
        trigger_points: Vec<TriggerPoint>,
    },
    Turns(Vec<ConversationTurn>),
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput {
    report: ConversationReport,
    trigger_evaluations: Vec<TriggerEvaluation>,
    fired_trigger_id: Option<TriggerPointId>,
}

pub fn run(input: &str) -> CommandResult {
    let (turns, trigger_points) = match serde_json::from_str(input) {
        Ok(AnalyzeInput::Transcript { turns, trigger_points }) => (turns, trigger_points),
        Ok(AnalyzeInput::Turns(turns)) => (turns, Vec::new()),
        Err(error) => {
            return CommandResult::failure(
                "analyze",
                "input",
                format!("invalid transcript: {error}"),
                2,
            );
        }
    };
    if turns.is_empty() {
        return CommandResult::failure("analyze", "input", "transcript has no turns", 2);
    }

    let report = ConversationAnalyzer::new().report(&turns);
    let text = customer_text(&turns);
    let (trigger_evaluations, fired) = TriggerEvaluator::new().first_match(
        &trigger_points,
        TriggerInput {
            customer_text: &text,
            extracted_data: &report.extracted_data,
            analysis: &report.analysis,
        },
    );
    let fired_trigger_id = fired.map(|trigger| trigger.id.clone());

    CommandResult::report(
        "analyze",
        &AnalyzeOutput { report, trigger_evaluations, fired_trigger_id },
    )
}
