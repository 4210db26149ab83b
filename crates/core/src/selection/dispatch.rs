use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use super::engine::VendorSelectionEngine;
use super::order::build_order;
use super::types::{DispatchOutcome, DispatchRequest};
use crate::domain::vendor::ServiceCategory;
use crate::notify::{NotificationDispatcher, VendorNotice};
use crate::ports::{Geocoder, OrderStore, VendorDirectory};

const NO_SERVICE_TYPE: &str = "no recognizable service type in conversation";
const NO_LOCATION: &str = "no customer location";
const NO_VENDORS_FOUND: &str = "no vendors found";
const NO_VENDORS_MATCHED: &str = "no vendors matched criteria";

/// Runs the full dispatch pipeline: criteria, candidates, selection, order
/// and notifications. Each stage short-circuits the rest when it comes up
/// empty, so an order never exists without vendors.
#[derive(Clone)]
pub struct DispatchService {
    engine: VendorSelectionEngine,
    geocoder: Arc<dyn Geocoder>,
    vendors: Arc<dyn VendorDirectory>,
    orders: Arc<dyn OrderStore>,
    notifier: NotificationDispatcher,
}

impl DispatchService {
    pub fn new(
        engine: VendorSelectionEngine,
        geocoder: Arc<dyn Geocoder>,
        vendors: Arc<dyn VendorDirectory>,
        orders: Arc<dyn OrderStore>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { engine, geocoder, vendors, orders, notifier }
    }

    pub fn engine(&self) -> &VendorSelectionEngine {
        &self.engine
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchOutcome {
        let started = Instant::now();
        let mut outcome = self.run(request).await;
        outcome.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            event_name = "dispatch.completed",
            call_id = request.call_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
            owner_id = %request.owner_id,
            success = outcome.success,
            triggered = outcome.triggered,
            reason = %outcome.trigger_reason,
            order_id = outcome.order_id.as_deref().unwrap_or(""),
            selected = outcome.selected_vendors.len(),
            processing_time_ms = outcome.processing_time_ms,
            "dispatch run finished"
        );
        outcome
    }

    async fn run(&self, request: &DispatchRequest) -> DispatchOutcome {
        let Some(service_type) = ServiceCategory::detect(&request.customer_text) else {
            return DispatchOutcome::not_triggered(NO_SERVICE_TYPE);
        };
        let Some(address) = request.customer_address() else {
            return DispatchOutcome::not_triggered(NO_LOCATION);
        };

        let location = match self.geocoder.geocode(&address).await {
            Ok(Some(location)) if location.is_valid() => location,
            Ok(_) => return DispatchOutcome::not_triggered(NO_LOCATION),
            Err(error) => {
                warn!(
                    event_name = "dispatch.geocode.failed",
                    owner_id = %request.owner_id,
                    error = %error,
                    "geocoding customer address failed"
                );
                return DispatchOutcome::failed(NO_LOCATION, error.to_string());
            }
        };

        let criteria = self.engine.criteria_for(request, service_type, location);

        let pool = match self.vendors.vendor_pool(&request.owner_id).await {
            Ok(pool) => pool,
            Err(error) => {
                warn!(
                    event_name = "dispatch.vendor_pool.failed",
                    owner_id = %request.owner_id,
                    error = %error,
                    "fetching vendor pool failed"
                );
                return DispatchOutcome::failed(NO_VENDORS_FOUND, error.to_string());
            }
        };
        if pool.is_empty() {
            return DispatchOutcome::not_triggered(NO_VENDORS_FOUND);
        }

        let now = Utc::now();
        let selection = self.engine.select(&criteria, &pool, now);
        if selection.is_empty() {
            return DispatchOutcome::not_triggered(NO_VENDORS_MATCHED).with_selection(selection);
        }

        let reason = if request.trigger_reason.is_empty() {
            format!("{} vendor(s) selected", selection.selected_vendors.len())
        } else {
            request.trigger_reason.clone()
        };
        let order = request
            .actions
            .create_order
            .then(|| build_order(request, &criteria, &selection, now));
        let mut outcome = DispatchOutcome {
            success: true,
            triggered: true,
            trigger_reason: reason,
            ..DispatchOutcome::default()
        }
        .with_selection(selection);

        let order = match order {
            None => {
                info!(
                    event_name = "dispatch.order.skipped",
                    owner_id = %request.owner_id,
                    "trigger does not create orders; returning selection only"
                );
                return outcome;
            }
            Some(Err(error)) => {
                outcome.success = false;
                outcome.error = Some(error.to_string());
                return outcome;
            }
            Some(Ok(order)) => order,
        };

        if let Err(error) = self.orders.create(&order).await {
            warn!(
                event_name = "dispatch.order.persist_failed",
                order_id = %order.order_id,
                error = %error,
                "order persistence failed; skipping notifications"
            );
            outcome.success = false;
            outcome.error = Some(error.to_string());
            return outcome;
        }
        outcome.actions_taken.order_created = true;
        outcome.order_id = Some(order.order_id.0.clone());
        info!(
            event_name = "dispatch.order.created",
            order_id = %order.order_id,
            vendor_id = %order.primary_vendor_id,
            priority = order.priority.as_str(),
            "order created"
        );

        let primary_name = outcome
            .selected_vendors
            .first()
            .map(|vendor| vendor.vendor_name.clone())
            .unwrap_or_default();
        if request.actions.send_customer_email {
            outcome.actions_taken.customer_notified =
                self.notifier.notify_customer(&order, &primary_name).await;
        }

        if request.actions.notify_vendors {
            let notices = outcome
                .selected_vendors
                .iter()
                .filter_map(|selected| {
                    pool.iter()
                        .find(|profile| profile.id == selected.vendor_id)
                        .map(|profile| VendorNotice { selected, profile })
                })
                .collect::<Vec<_>>();
            let summary = self.notifier.notify_vendors(&order, &notices).await;
            outcome.actions_taken.vendors_notified = summary.vendors_notified;
            outcome.actions_taken.push_notifications_sent = summary.push_notifications_sent;
        }

        outcome
    }
}
