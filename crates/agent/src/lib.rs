//! Call-to-dispatch decision layer.
//!
//! Sits between the conversation cache and the vendor selection engine:
//! 1. **Analysis** (`analyzer`) - extracted business data, sentiment, intent,
//!    lead score and conversation metrics for a finished call
//! 2. **Trigger evaluation** (`trigger`) - keyword / condition / intent scoring
//!    against the owner's trigger points, first firing trigger wins
//! 3. **Dispatch** (`runtime`) - hands a fired trigger to the selection engine
//!
//! Everything here is deterministic keyword matching. Analysis is pluggable
//! through [`analyzer::AnalysisProvider`], but no component decides prices or
//! vendor assignments on its own; those stay in `leadline-core::selection`.

pub mod analyzer;
pub mod runtime;
pub mod trigger;

pub use analyzer::{AnalysisProvider, ConversationAnalyzer};
pub use runtime::{DispatchReport, DispatchRuntime};
pub use trigger::{TriggerEvaluation, TriggerEvaluator};
