use chrono::{DateTime, Utc};
use leadline_core::config::{AppConfig, LoadOptions};
use leadline_core::domain::vendor::VendorProfile;
use leadline_core::selection::{SelectionCriteria, VendorSelectionEngine};
use serde::Deserialize;

use crate::commands::CommandResult;

#[derive(Debug, Deserialize)]
struct SelectionInput {
    criteria: SelectionCriteria,
    vendors: Vec<VendorProfile>,
    /// Reference time for the idle filter; defaults to now.
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

pub fn run(input: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "select",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let request: SelectionInput = match serde_json::from_str(input) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(
                "select",
                "input",
                format!("invalid selection request: {error}"),
                2,
            );
        }
    };

    let engine = VendorSelectionEngine::new(config.dispatch);
    let result =
        engine.select(&request.criteria, &request.vendors, request.now.unwrap_or_else(Utc::now));
    CommandResult::report("select", &result)
}
