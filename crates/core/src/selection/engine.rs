//! Vendor Selection Engine implementation

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::filters::{check_vendor, FilterContext};
use super::scoring::{ScoreCalculator, ScoringWeights};
use super::types::*;
use super::{MIN_SELECTION_SCORE, STANDARD_VENDOR_CAP, URGENT_VENDOR_CAP};
use crate::config::DispatchConfig;
use crate::domain::order::Priority;
use crate::domain::vendor::{Coordinates, ServiceCategory, VendorProfile};
use crate::notify::NotificationChannel;
use crate::text::contains_phrase;

const RELAXED_TERMS: &[&str] =
    &["no rush", "not urgent", "whenever", "no hurry", "sometime", "next month"];
const URGENT_TERMS: &[&str] = &[
    "emergency",
    "urgent",
    "asap",
    "as soon as possible",
    "immediately",
    "right away",
    "right now",
    "flooding",
    "flooded",
    "burst",
    "no heat",
    "no power",
    "sparking",
    "gas leak",
];
const HIGH_TERMS: &[&str] =
    &["today", "tonight", "tomorrow", "this morning", "this afternoon", "quickly", "soon"];
const MEDIUM_TERMS: &[&str] = &["this week", "this weekend", "next week", "day", "days"];

/// Reads urgency from what the customer said and the timeline they gave.
pub fn infer_priority(customer_text: &str, timeline: Option<&str>) -> Priority {
    let text = customer_text.to_lowercase();
    let timeline = timeline.map(str::to_lowercase).unwrap_or_default();
    let mentions = |terms: &[&str]| {
        terms.iter().any(|term| contains_phrase(&text, term) || contains_phrase(&timeline, term))
    };

    if mentions(RELAXED_TERMS) {
        Priority::Low
    } else if mentions(URGENT_TERMS) {
        Priority::Urgent
    } else if mentions(HIGH_TERMS) || timeline.contains("hour") {
        Priority::High
    } else if mentions(MEDIUM_TERMS) {
        Priority::Medium
    } else if timeline.contains("week") || timeline.contains("month") {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Filters, scores and ranks a vendor snapshot. Holds no I/O.
#[derive(Debug, Clone)]
pub struct VendorSelectionEngine {
    dispatch: DispatchConfig,
    calculator: ScoreCalculator,
}

impl VendorSelectionEngine {
    pub fn new(dispatch: DispatchConfig) -> Self {
        Self { dispatch, calculator: ScoreCalculator::new() }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.calculator = ScoreCalculator::with_weights(weights);
        self
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch
    }

    /// Resolves the run's criteria. Trigger settings win, config fills gaps.
    pub fn criteria_for(
        &self,
        request: &DispatchRequest,
        service_type: ServiceCategory,
        customer_location: Coordinates,
    ) -> SelectionCriteria {
        let trigger = &request.criteria;
        let priority = request.actions.priority_level.unwrap_or_else(|| {
            infer_priority(&request.customer_text, request.extracted_data.timeline.as_deref())
        });

        SelectionCriteria {
            service_type,
            customer_location,
            priority,
            max_distance_miles: trigger
                .location_radius
                .filter(|radius| *radius > 0.0)
                .unwrap_or(self.dispatch.default_radius_miles),
            min_rating: trigger.min_rating.unwrap_or(self.dispatch.min_rating),
            max_response_time_mins: trigger
                .max_response_time
                .filter(|minutes| *minutes > 0.0)
                .unwrap_or(self.dispatch.max_response_time_mins),
            max_vendors_to_notify: trigger.max_vendors_to_notify.filter(|cap| *cap > 0),
        }
    }

    pub fn select(
        &self,
        criteria: &SelectionCriteria,
        vendors: &[VendorProfile],
        now: DateTime<Utc>,
    ) -> SelectionResult {
        let mut metrics = SelectionMetrics {
            vendors_considered: vendors.len(),
            ..SelectionMetrics::default()
        };
        metrics.step(format!(
            "considering {} vendors for {} within {:.1} mi ({} priority)",
            vendors.len(),
            criteria.service_type,
            criteria.max_distance_miles,
            criteria.priority
        ));

        let context =
            FilterContext { now, vendor_idle_hours: self.dispatch.vendor_idle_hours };
        let mut passed = Vec::new();
        for vendor in vendors {
            match check_vendor(vendor, criteria, &context) {
                Ok(distance) => passed.push((vendor, distance)),
                Err(reason) => metrics.reject(reason),
            }
        }
        metrics.vendors_passed_filters = passed.len();
        metrics.step(format!(
            "{} vendors passed hard filters ({})",
            passed.len(),
            describe_rejections(&metrics)
        ));

        let mut scored = Vec::new();
        for (vendor, distance) in passed {
            let breakdown = self.calculator.score(vendor, distance, criteria);
            if breakdown.total < MIN_SELECTION_SCORE {
                metrics.below_threshold += 1;
                continue;
            }
            scored.push((vendor, distance, breakdown));
        }
        metrics.vendors_scored = scored.len();
        metrics.step(format!(
            "{} vendors scored at or above {MIN_SELECTION_SCORE:.2}, {} below",
            scored.len(),
            metrics.below_threshold
        ));

        scored.sort_by(|left, right| {
            right
                .2
                .total
                .total_cmp(&left.2.total)
                .then_with(|| left.1.partial_cmp(&right.1).unwrap_or(Ordering::Equal))
                .then_with(|| left.0.id.cmp(&right.0.id))
        });

        if !scored.is_empty() {
            metrics.top_score = scored[0].2.total;
            metrics.average_score =
                scored.iter().map(|(_, _, breakdown)| breakdown.total).sum::<f64>()
                    / scored.len() as f64;
        }

        let cap = selection_cap(criteria);
        let selected_vendors = scored
            .into_iter()
            .take(cap)
            .map(|(vendor, distance, breakdown)| SelectedVendor {
                vendor_id: vendor.id.clone(),
                vendor_name: vendor.name.clone(),
                selection_score: breakdown.total,
                distance_miles: distance,
                estimated_response_time_mins: vendor.average_response_time_mins,
                selection_reason: selection_reason(vendor, distance, &breakdown),
                notification_methods: notification_methods(vendor),
                score_breakdown: breakdown,
            })
            .collect::<Vec<_>>();

        metrics.vendors_selected = selected_vendors.len();
        metrics.step(format!("selected {} of at most {cap} vendors", selected_vendors.len()));

        let confidence_score = if selected_vendors.is_empty() {
            0.0
        } else {
            selected_vendors.iter().map(|vendor| vendor.selection_score).sum::<f64>()
                / selected_vendors.len() as f64
        };

        SelectionResult {
            primary_vendor_id: selected_vendors.first().map(|vendor| vendor.vendor_id.clone()),
            fallback_vendor_ids: selected_vendors
                .iter()
                .skip(1)
                .map(|vendor| vendor.vendor_id.clone())
                .collect(),
            selected_vendors,
            confidence_score,
            metrics,
        }
    }
}

/// Fixed per-priority cap, further restricted by the trigger's own cap.
pub(crate) fn selection_cap(criteria: &SelectionCriteria) -> usize {
    let fixed =
        if criteria.priority == Priority::Urgent { URGENT_VENDOR_CAP } else { STANDARD_VENDOR_CAP };
    criteria.max_vendors_to_notify.map_or(fixed, |cap| fixed.min(cap))
}

fn describe_rejections(metrics: &SelectionMetrics) -> String {
    if metrics.rejections.is_empty() {
        return "no rejections".to_string();
    }
    metrics
        .rejections
        .iter()
        .map(|(reason, count)| format!("{}: {count}", reason.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn selection_reason(vendor: &VendorProfile, distance: f64, breakdown: &ScoreBreakdown) -> String {
    let mut reason = format!(
        "{distance:.1} mi away, rated {:.1}, responds in ~{:.0} min, {}/{} jobs in progress",
        vendor.rating,
        vendor.average_response_time_mins,
        vendor.active_orders,
        vendor.max_capacity
    );
    if breakdown.priority_bonus > 0.0 {
        reason.push_str(", fast enough for this priority");
    }
    reason
}

fn notification_methods(vendor: &VendorProfile) -> Vec<NotificationChannel> {
    let preferences = vendor.notification_preferences;
    let mut methods = Vec::new();
    if preferences.email && vendor.email.is_some() {
        methods.push(NotificationChannel::Email);
    }
    if preferences.sms && vendor.phone.is_some() {
        methods.push(NotificationChannel::Sms);
    }
    if preferences.push && vendor.push_token.is_some() {
        methods.push(NotificationChannel::Push);
    }
    methods
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::{infer_priority, selection_cap, VendorSelectionEngine};
    use crate::config::DispatchConfig;
    use crate::domain::order::Priority;
    use crate::domain::trigger::{TriggerActions, VendorSelectionCriteria};
    use crate::domain::vendor::{
        Coordinates, NotificationPreferences, ServiceArea, ServiceCategory, VendorId,
        VendorProfile, VendorStatus,
    };
    use crate::selection::{
        check_vendor, DispatchRequest, FilterContext, FilterRejection, SelectionCriteria,
        MIN_SELECTION_SCORE,
    };

    const CUSTOMER: Coordinates = Coordinates { latitude: 42.3601, longitude: -71.0589 };

    fn engine() -> VendorSelectionEngine {
        VendorSelectionEngine::new(DispatchConfig::default())
    }

    fn criteria(priority: Priority) -> SelectionCriteria {
        SelectionCriteria {
            service_type: ServiceCategory::Plumbing,
            customer_location: CUSTOMER,
            priority,
            max_distance_miles: 25.0,
            min_rating: 4.0,
            max_response_time_mins: 60.0,
            max_vendors_to_notify: None,
        }
    }

    fn vendor(id: &str, service: &str) -> VendorProfile {
        VendorProfile {
            id: VendorId(id.to_string()),
            owner_id: "owner-1".to_string(),
            name: format!("Vendor {id}"),
            email: Some(format!("{id}@vendors.example")),
            phone: Some("+15550199".to_string()),
            push_token: None,
            status: VendorStatus::Verified,
            services: vec![service.to_string()],
            location: None,
            service_area: ServiceArea {
                latitude: CUSTOMER.latitude + 0.02,
                longitude: CUSTOMER.longitude,
                radius_miles: 20.0,
            },
            active_orders: 1,
            max_capacity: 5,
            average_response_time_mins: 15.0,
            rating: 4.8,
            is_online: true,
            completion_rate: 0.95,
            cancellation_rate: 0.02,
            membership_months: 30,
            last_seen: None,
            notification_preferences: NotificationPreferences::default(),
        }
    }

    #[test]
    fn urgent_request_selects_the_single_qualifying_plumber() {
        let mut offline = vendor("offline-plumber", "plumbing");
        offline.is_online = false;
        let painter = vendor("painter", "painting");
        let plumber = vendor("plumber", "Plumbing");

        let result =
            engine().select(&criteria(Priority::Urgent), &[offline, painter, plumber], Utc::now());

        assert_eq!(result.selected_vendors.len(), 1);
        assert_eq!(result.selected_vendors[0].vendor_id, VendorId("plumber".to_string()));
        assert!(result.selected_vendors[0].selection_score > MIN_SELECTION_SCORE);
        assert_eq!(result.primary_vendor_id, Some(VendorId("plumber".to_string())));
        assert!(result.fallback_vendor_ids.is_empty());
        assert_eq!(result.metrics.rejections.get(&FilterRejection::Offline), Some(&1));
        assert_eq!(result.metrics.rejections.get(&FilterRejection::ServiceMismatch), Some(&1));
    }

    #[test]
    fn offline_pool_selects_nobody() {
        let vendors = (0..3)
            .map(|index| {
                let mut candidate = vendor(&format!("v-{index}"), "plumbing");
                candidate.is_online = false;
                candidate
            })
            .collect::<Vec<_>>();

        let result = engine().select(&criteria(Priority::High), &vendors, Utc::now());
        assert!(result.is_empty());
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.metrics.vendors_passed_filters, 0);
    }

    #[test]
    fn ranking_breaks_ties_by_distance_then_id() {
        let mut far = vendor("a-far", "plumbing");
        far.service_area.latitude = CUSTOMER.latitude + 0.05;
        let near_b = vendor("b-near", "plumbing");
        let near_c = vendor("c-near", "plumbing");

        let mut request = criteria(Priority::Medium);
        request.max_distance_miles = 20.0;
        let result = engine().select(&request, &[near_c, far, near_b], Utc::now());

        let ids = result
            .selected_vendors
            .iter()
            .map(|vendor| vendor.vendor_id.0.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b-near", "c-near", "a-far"]);
        assert_eq!(result.fallback_vendor_ids.len(), 2);
    }

    #[test]
    fn selection_caps_follow_priority_and_trigger_limit() {
        assert_eq!(selection_cap(&criteria(Priority::Urgent)), 1);
        assert_eq!(selection_cap(&criteria(Priority::Low)), 3);
        let mut limited = criteria(Priority::High);
        limited.max_vendors_to_notify = Some(2);
        assert_eq!(selection_cap(&limited), 2);
        limited.max_vendors_to_notify = Some(10);
        assert_eq!(selection_cap(&limited), 3);
    }

    #[test]
    fn random_pools_respect_filters_and_caps() {
        let mut rng = StdRng::seed_from_u64(2024);
        let services = ["plumbing", "painting", "plumber", "roofing"];
        let now = Utc::now();
        let engine = engine();

        for round in 0..50 {
            let vendors = (0..rng.gen_range(0..12))
                .map(|index| {
                    let mut candidate = vendor(
                        &format!("r{round}-v{index}"),
                        services[rng.gen_range(0..services.len())],
                    );
                    candidate.service_area.latitude = CUSTOMER.latitude + rng.gen_range(-0.5..0.5);
                    candidate.service_area.radius_miles = rng.gen_range(1.0..40.0);
                    candidate.active_orders = rng.gen_range(0..6);
                    candidate.rating = rng.gen_range(2.0..5.0);
                    candidate.average_response_time_mins = rng.gen_range(5.0..90.0);
                    candidate.is_online = rng.gen_bool(0.8);
                    candidate.completion_rate = rng.gen_range(0.0..1.0);
                    candidate
                })
                .collect::<Vec<_>>();
            let priority = if rng.gen_bool(0.5) { Priority::Urgent } else { Priority::Medium };
            let request = criteria(priority);

            let result = engine.select(&request, &vendors, now);
            let cap = if priority == Priority::Urgent { 1 } else { 3 };
            assert!(result.selected_vendors.len() <= cap);

            let context = FilterContext { now, vendor_idle_hours: 24 };
            for selected in &result.selected_vendors {
                let profile = vendors
                    .iter()
                    .find(|vendor| vendor.id == selected.vendor_id)
                    .expect("selected vendor comes from the pool");
                assert!(check_vendor(profile, &request, &context).is_ok());
                assert!(selected.selection_score >= MIN_SELECTION_SCORE);
                assert!(selected.selection_score <= 1.0);
            }
            let scores =
                result.selected_vendors.iter().map(|v| v.selection_score).collect::<Vec<_>>();
            assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn trigger_criteria_override_config_defaults() {
        let request = DispatchRequest {
            owner_id: "owner-1".to_string(),
            call_id: None,
            customer_text: "the sink is leaking, no rush".to_string(),
            extracted_data: Default::default(),
            fallback_location: None,
            customer_phone: None,
            trigger_reason: String::new(),
            actions: TriggerActions { priority_level: None, ..TriggerActions::default() },
            criteria: VendorSelectionCriteria {
                location_radius: Some(10.0),
                min_rating: Some(4.5),
                max_vendors_to_notify: Some(2),
                ..VendorSelectionCriteria::default()
            },
        };

        let criteria = engine().criteria_for(&request, ServiceCategory::Plumbing, CUSTOMER);
        assert_eq!(criteria.max_distance_miles, 10.0);
        assert_eq!(criteria.min_rating, 4.5);
        assert_eq!(criteria.max_response_time_mins, 60.0);
        assert_eq!(criteria.max_vendors_to_notify, Some(2));
        assert_eq!(criteria.priority, Priority::Low);
    }

    #[test]
    fn priority_is_inferred_from_urgency_vocabulary() {
        assert_eq!(infer_priority("Water everywhere, it's an emergency", None), Priority::Urgent);
        assert_eq!(infer_priority("Could someone come by", Some("tomorrow")), Priority::High);
        assert_eq!(infer_priority("Sometime is fine", None), Priority::Low);
        assert_eq!(infer_priority("I'd like a quote", Some("next week")), Priority::Medium);
        assert_eq!(infer_priority("I'd like a quote", None), Priority::Medium);
    }
}
