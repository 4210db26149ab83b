//! Vendor Selection Engine
//!
//! Turns a qualifying conversation into a ranked vendor shortlist, an order
//! and the notifications that go with it. The pure filter, score and select
//! stages live in [`VendorSelectionEngine`]; [`DispatchService`] wires them to
//! geocoding, the vendor directory, the order store and notifications.

mod dispatch;
mod engine;
mod filters;
mod order;
mod scoring;
mod types;

pub use dispatch::DispatchService;
pub use engine::{infer_priority, VendorSelectionEngine};
pub use filters::{check_vendor, FilterContext};
pub use order::build_order;
pub use scoring::{ScoreCalculator, ScoringWeights};
pub use types::*;

/// Default scoring weights
pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    distance: 0.25,
    availability: 0.20,
    performance: 0.25,
    response_time: 0.15,
    experience: 0.10,
    priority_bonus: 0.05,
};

/// Vendors scoring below this are discarded even when they pass every filter
pub const MIN_SELECTION_SCORE: f64 = 0.6;

/// Selection size for urgent requests
pub const URGENT_VENDOR_CAP: usize = 1;

/// Selection size for everything else
pub const STANDARD_VENDOR_CAP: usize = 3;
