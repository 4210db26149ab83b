//! Hard filters. A vendor failing any of them is never scored.

use chrono::{DateTime, Duration, Utc};

use super::types::{FilterRejection, SelectionCriteria};
use crate::domain::vendor::{VendorProfile, VendorStatus};
use crate::geo::haversine_miles;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterContext {
    pub now: DateTime<Utc>,
    /// Vendors not seen for longer than this are treated as idle.
    pub vendor_idle_hours: i64,
}

/// Effective reach for this vendor: its own radius, capped by the request.
pub fn effective_radius(vendor: &VendorProfile, criteria: &SelectionCriteria) -> f64 {
    vendor.service_area.radius_miles.min(criteria.max_distance_miles)
}

/// Returns the customer distance in miles when the vendor passes every filter.
pub fn check_vendor(
    vendor: &VendorProfile,
    criteria: &SelectionCriteria,
    context: &FilterContext,
) -> Result<f64, FilterRejection> {
    if vendor.status == VendorStatus::Blocked {
        return Err(FilterRejection::Blocked);
    }
    if !vendor.offers(criteria.service_type) {
        return Err(FilterRejection::ServiceMismatch);
    }

    let distance = haversine_miles(criteria.customer_location, vendor.service_area.center());
    if !distance.is_finite() || distance > effective_radius(vendor, criteria) {
        return Err(FilterRejection::OutOfRange);
    }
    if !vendor.has_capacity() {
        return Err(FilterRejection::AtCapacity);
    }
    if !(vendor.rating >= criteria.min_rating) {
        return Err(FilterRejection::LowRating);
    }
    if !(vendor.average_response_time_mins <= criteria.max_response_time_mins) {
        return Err(FilterRejection::SlowResponse);
    }
    if !vendor.is_online {
        return Err(FilterRejection::Offline);
    }
    if let Some(last_seen) = vendor.last_seen {
        if context.now - last_seen > Duration::hours(context.vendor_idle_hours) {
            return Err(FilterRejection::Idle);
        }
    }

    Ok(distance)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{check_vendor, FilterContext};
    use crate::domain::order::Priority;
    use crate::domain::vendor::{
        Coordinates, NotificationPreferences, ServiceArea, ServiceCategory, VendorId,
        VendorProfile, VendorStatus,
    };
    use crate::selection::types::{FilterRejection, SelectionCriteria};

    fn criteria() -> SelectionCriteria {
        SelectionCriteria {
            service_type: ServiceCategory::Plumbing,
            customer_location: Coordinates::new(42.3601, -71.0589),
            priority: Priority::Medium,
            max_distance_miles: 25.0,
            min_rating: 4.0,
            max_response_time_mins: 60.0,
            max_vendors_to_notify: None,
        }
    }

    fn vendor() -> VendorProfile {
        VendorProfile {
            id: VendorId("v-1".to_string()),
            owner_id: "owner-1".to_string(),
            name: "Harbor Plumbing".to_string(),
            email: Some("jobs@harbor.example".to_string()),
            phone: None,
            push_token: None,
            status: VendorStatus::Verified,
            services: vec!["Plumbing".to_string()],
            location: None,
            service_area: ServiceArea { latitude: 42.37, longitude: -71.05, radius_miles: 30.0 },
            active_orders: 1,
            max_capacity: 5,
            average_response_time_mins: 20.0,
            rating: 4.6,
            is_online: true,
            completion_rate: 0.95,
            cancellation_rate: 0.02,
            membership_months: 18,
            last_seen: None,
            notification_preferences: NotificationPreferences::default(),
        }
    }

    fn context() -> FilterContext {
        FilterContext { now: Utc::now(), vendor_idle_hours: 24 }
    }

    #[test]
    fn qualifying_vendor_passes_with_distance() {
        let distance = check_vendor(&vendor(), &criteria(), &context()).expect("passes");
        assert!(distance < 1.0);
    }

    #[test]
    fn each_hard_filter_rejects() {
        let cases: Vec<(fn(&mut VendorProfile), FilterRejection)> = vec![
            (|v| v.status = VendorStatus::Blocked, FilterRejection::Blocked),
            (|v| v.services = vec!["Painting".to_string()], FilterRejection::ServiceMismatch),
            (|v| v.service_area.latitude = 45.0, FilterRejection::OutOfRange),
            (|v| v.service_area.radius_miles = 0.1, FilterRejection::OutOfRange),
            (|v| v.active_orders = 5, FilterRejection::AtCapacity),
            (|v| v.rating = 3.9, FilterRejection::LowRating),
            (|v| v.average_response_time_mins = 61.0, FilterRejection::SlowResponse),
            (|v| v.is_online = false, FilterRejection::Offline),
            (|v| v.last_seen = Some(Utc::now() - Duration::hours(30)), FilterRejection::Idle),
        ];

        for (mutate, expected) in cases {
            let mut candidate = vendor();
            mutate(&mut candidate);
            assert_eq!(check_vendor(&candidate, &criteria(), &context()), Err(expected));
        }
    }

    #[test]
    fn synonyms_count_as_service_match() {
        let mut candidate = vendor();
        candidate.services = vec!["plumber".to_string()];
        assert!(check_vendor(&candidate, &criteria(), &context()).is_ok());
    }

    #[test]
    fn nan_rating_never_passes() {
        let mut candidate = vendor();
        candidate.rating = f64::NAN;
        assert_eq!(
            check_vendor(&candidate, &criteria(), &context()),
            Err(FilterRejection::LowRating)
        );
    }
}
