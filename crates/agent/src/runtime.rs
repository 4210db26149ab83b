use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use leadline_core::cache::ConversationCompletionHook;
use leadline_core::domain::analysis::ConversationReport;
use leadline_core::domain::conversation::CachedConversation;
use leadline_core::domain::trigger::TriggerPoint;
use leadline_core::errors::ApplicationError;
use leadline_core::ports::TriggerPointSource;
use leadline_core::selection::{DispatchOutcome, DispatchRequest, DispatchService};

use crate::analyzer::AnalysisProvider;
use crate::trigger::{TriggerEvaluation, TriggerEvaluator, TriggerInput};

/// Result of running a finished conversation through analysis, trigger
/// evaluation and, when a trigger fired, dispatch.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchReport {
    pub report: ConversationReport,
    pub trigger_evaluations: Vec<TriggerEvaluation>,
    pub outcome: Option<DispatchOutcome>,
}

impl DispatchReport {
    pub fn triggered(&self) -> bool {
        self.outcome.as_ref().is_some_and(|outcome| outcome.triggered)
    }
}

#[derive(Clone)]
pub struct DispatchRuntime {
    analyzer: Arc<dyn AnalysisProvider>,
    evaluator: TriggerEvaluator,
    triggers: Arc<dyn TriggerPointSource>,
    dispatch: DispatchService,
    default_owner_id: String,
}

impl DispatchRuntime {
    pub fn new(
        analyzer: Arc<dyn AnalysisProvider>,
        triggers: Arc<dyn TriggerPointSource>,
        dispatch: DispatchService,
    ) -> Self {
        let default_owner_id = dispatch.engine().dispatch_config().default_owner_id.clone();
        Self { analyzer, evaluator: TriggerEvaluator::new(), triggers, dispatch, default_owner_id }
    }

    pub fn dispatch_service(&self) -> &DispatchService {
        &self.dispatch
    }

    /// Analysis and trigger evaluation only. Nothing is dispatched.
    pub async fn assess(
        &self,
        conversation: &CachedConversation,
    ) -> Result<DispatchReport, ApplicationError> {
        Ok(self.evaluate(conversation).await?.0)
    }

    pub async fn process(
        &self,
        conversation: &CachedConversation,
    ) -> Result<DispatchReport, ApplicationError> {
        let (mut dispatch_report, fired) = self.evaluate(conversation).await?;
        let metadata = &conversation.metadata;
        let owner_id = self.owner_id(conversation);

        let Some(trigger) = fired else {
            info!(
                event_name = "runtime.no_trigger",
                call_id = %metadata.call_id,
                owner_id = %owner_id,
                evaluated = dispatch_report.trigger_evaluations.len(),
                "no trigger point fired; skipping dispatch"
            );
            return Ok(dispatch_report);
        };

        let reason = format!("trigger point '{}' fired", trigger.name);
        let mut request = DispatchRequest::from_conversation(
            conversation,
            dispatch_report.report.extracted_data.clone(),
            &trigger,
            reason,
        );
        request.owner_id = owner_id.to_string();

        dispatch_report.outcome = Some(self.dispatch.dispatch(&request).await);
        Ok(dispatch_report)
    }

    async fn evaluate(
        &self,
        conversation: &CachedConversation,
    ) -> Result<(DispatchReport, Option<TriggerPoint>), ApplicationError> {
        let owner_id = self.owner_id(conversation);
        let report = self.analyzer.analyze(conversation.turns(), &conversation.metadata).await?;
        let triggers = self.triggers.trigger_points(owner_id).await?;
        let customer_text = conversation.customer_text();

        let (trigger_evaluations, fired) = self.evaluator.first_match(
            &triggers,
            TriggerInput {
                customer_text: &customer_text,
                extracted_data: &report.extracted_data,
                analysis: &report.analysis,
            },
        );
        let fired = fired.cloned();
        Ok((DispatchReport { report, trigger_evaluations, outcome: None }, fired))
    }

    fn owner_id<'a>(&'a self, conversation: &'a CachedConversation) -> &'a str {
        conversation.metadata.owner_id.as_deref().unwrap_or(&self.default_owner_id)
    }
}

#[async_trait]
impl ConversationCompletionHook for DispatchRuntime {
    async fn conversation_completed(&self, conversation: &CachedConversation) {
        if let Err(error) = self.process(conversation).await {
            warn!(
                event_name = "runtime.process.failed",
                call_id = %conversation.call_id(),
                error = %error,
                "post-call dispatch failed"
            );
        }
    }
}
