//! Scoring for vendors that survived the hard filters

use super::types::{ScoreBreakdown, SelectionCriteria};
use crate::domain::order::Priority;
use crate::domain::vendor::VendorProfile;

/// Weights for scoring components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight for proximity (default: 0.25)
    pub distance: f64,
    /// Weight for spare capacity (default: 0.20)
    pub availability: f64,
    /// Weight for track record (default: 0.25)
    pub performance: f64,
    /// Weight for response speed (default: 0.15)
    pub response_time: f64,
    /// Weight for tenure (default: 0.10)
    pub experience: f64,
    /// Weight for the urgency bonus (default: 0.05)
    pub priority_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

/// Score calculator for vendor candidates
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCalculator {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default() }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        vendor: &VendorProfile,
        distance_miles: f64,
        criteria: &SelectionCriteria,
    ) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown {
            distance: distance_score(distance_miles, criteria.max_distance_miles),
            availability: availability_score(vendor.active_orders, vendor.max_capacity),
            performance: performance_score(vendor),
            response_time: response_time_score(
                vendor.average_response_time_mins,
                criteria.max_response_time_mins,
            ),
            experience: experience_score(vendor.membership_months),
            priority_bonus: priority_bonus(criteria.priority, vendor.average_response_time_mins),
            total: 0.0,
        };
        breakdown.total = self.total(&breakdown);
        breakdown
    }

    /// Weighted sum, clamped to `[0, 1]`. NaN collapses to 0.
    pub fn total(&self, breakdown: &ScoreBreakdown) -> f64 {
        let total = breakdown.distance * self.weights.distance
            + breakdown.availability * self.weights.availability
            + breakdown.performance * self.weights.performance
            + breakdown.response_time * self.weights.response_time
            + breakdown.experience * self.weights.experience
            + breakdown.priority_bonus * self.weights.priority_bonus;

        unit(total)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn ratio_complement(value: f64, max: f64) -> f64 {
    if !(max > 0.0) {
        return 0.0;
    }
    unit(1.0 - value / max)
}

pub fn distance_score(distance_miles: f64, max_distance_miles: f64) -> f64 {
    ratio_complement(distance_miles, max_distance_miles)
}

pub fn availability_score(active_orders: u32, max_capacity: u32) -> f64 {
    ratio_complement(f64::from(active_orders), f64::from(max_capacity))
}

pub fn performance_score(vendor: &VendorProfile) -> f64 {
    unit(
        0.4 * unit(vendor.completion_rate)
            + 0.4 * unit(vendor.rating / 5.0)
            + 0.2 * (1.0 - unit(vendor.cancellation_rate)),
    )
}

pub fn response_time_score(response_time_mins: f64, max_response_time_mins: f64) -> f64 {
    ratio_complement(response_time_mins, max_response_time_mins)
}

pub fn experience_score(membership_months: u32) -> f64 {
    (f64::from(membership_months) / 24.0).min(1.0)
}

pub fn priority_bonus(priority: Priority, response_time_mins: f64) -> f64 {
    match priority {
        Priority::Urgent if response_time_mins <= 15.0 => 0.2,
        Priority::High if response_time_mins <= 20.0 => 0.1,
        _ => 0.0,
    }
}
