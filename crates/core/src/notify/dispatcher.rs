use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::{info, warn};

use super::templates::{
    NotificationTemplates, CUSTOMER_EMAIL, CUSTOMER_SMS, VENDOR_EMAIL, VENDOR_PUSH,
};
use super::{NotificationChannel, NotificationMessage, NotificationSender};
use crate::domain::order::Order;
use crate::domain::vendor::VendorProfile;
use crate::selection::SelectedVendor;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// A selected vendor together with the contact details needed to reach it.
#[derive(Clone, Copy, Debug)]
pub struct VendorNotice<'a> {
    pub selected: &'a SelectedVendor,
    pub profile: &'a VendorProfile,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VendorNotificationSummary {
    pub vendors_notified: u32,
    pub push_notifications_sent: u32,
}

#[derive(Serialize)]
struct CustomerView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_address: Option<&'a str>,
    service_name: &'static str,
    vendor_count: usize,
    order_id: &'a str,
    priority: &'static str,
    scheduled_date: String,
    estimated_value: f64,
    primary_vendor_name: &'a str,
}

#[derive(Serialize)]
struct VendorView<'a> {
    vendor_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_address: Option<&'a str>,
    service_name: &'static str,
    order_id: &'a str,
    priority: &'static str,
    distance_miles: f64,
    scheduled_date: String,
    response_deadline: String,
    estimated_value: f64,
    description: &'a str,
}

/// Sends confirmations and job offers over whichever channels are wired in.
/// Every recipient is attempted; a failed send is logged and skipped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    senders: HashMap<NotificationChannel, Arc<dyn NotificationSender>>,
    templates: Arc<NotificationTemplates>,
}

impl NotificationDispatcher {
    pub fn new(templates: NotificationTemplates) -> Self {
        Self { senders: HashMap::new(), templates: Arc::new(templates) }
    }

    pub fn with_sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    pub fn channels(&self) -> Vec<NotificationChannel> {
        let mut channels = self.senders.keys().copied().collect::<Vec<_>>();
        channels.sort();
        channels
    }

    /// Confirmation by email and SMS. Succeeds if either channel delivers.
    pub async fn notify_customer(&self, order: &Order, primary_vendor_name: &str) -> bool {
        let view = CustomerView {
            customer_name: order.customer_name.as_deref(),
            customer_address: order.customer_address.as_deref(),
            service_name: order.service_type.display_name(),
            vendor_count: order.assigned_vendors.len(),
            order_id: &order.order_id.0,
            priority: order.priority.as_str(),
            scheduled_date: order.scheduled_date.format(TIMESTAMP_FORMAT).to_string(),
            estimated_value: order.estimated_value.to_f64().unwrap_or(0.0),
            primary_vendor_name,
        };

        let mut delivered = false;
        if let Some(email) = order.customer_email.as_deref() {
            let subject = format!("Your {} request is booked", view.service_name);
            delivered |= self
                .deliver(NotificationChannel::Email, email, Some(subject), CUSTOMER_EMAIL, &view, order)
                .await;
        }
        if let Some(phone) = order.customer_phone.as_deref() {
            delivered |= self
                .deliver(NotificationChannel::Sms, phone, None, CUSTOMER_SMS, &view, order)
                .await;
        }

        if !delivered {
            warn!(
                event_name = "notify.customer.undelivered",
                order_id = %order.order_id,
                "customer confirmation was not delivered on any channel"
            );
        }
        delivered
    }

    /// Job offer by email to each vendor, plus push where the vendor allows it.
    pub async fn notify_vendors(
        &self,
        order: &Order,
        vendors: &[VendorNotice<'_>],
    ) -> VendorNotificationSummary {
        let mut summary = VendorNotificationSummary::default();

        for notice in vendors {
            let view = VendorView {
                vendor_name: &notice.profile.name,
                customer_address: order.customer_address.as_deref(),
                service_name: order.service_type.display_name(),
                order_id: &order.order_id.0,
                priority: order.priority.as_str(),
                distance_miles: notice.selected.distance_miles,
                scheduled_date: order.scheduled_date.format(TIMESTAMP_FORMAT).to_string(),
                response_deadline: order.response_deadline.format(TIMESTAMP_FORMAT).to_string(),
                estimated_value: order.estimated_value.to_f64().unwrap_or(0.0),
                description: &order.description,
            };
            let preferences = notice.profile.notification_preferences;

            if let Some(email) = notice.profile.email.as_deref().filter(|_| preferences.email) {
                let subject = format!(
                    "New {} job: {}",
                    view.service_name.to_lowercase(),
                    order.order_id
                );
                if self
                    .deliver(NotificationChannel::Email, email, Some(subject), VENDOR_EMAIL, &view, order)
                    .await
                {
                    summary.vendors_notified += 1;
                }
            }

            if let Some(token) = notice.profile.push_token.as_deref().filter(|_| preferences.push) {
                if self
                    .deliver(NotificationChannel::Push, token, None, VENDOR_PUSH, &view, order)
                    .await
                {
                    summary.push_notifications_sent += 1;
                }
            }
        }

        info!(
            event_name = "notify.vendors.completed",
            order_id = %order.order_id,
            vendors = vendors.len(),
            vendors_notified = summary.vendors_notified,
            push_sent = summary.push_notifications_sent,
            "vendor notifications attempted"
        );
        summary
    }

    async fn deliver(
        &self,
        channel: NotificationChannel,
        target: &str,
        subject: Option<String>,
        template: &str,
        view: &impl Serialize,
        order: &Order,
    ) -> bool {
        let Some(sender) = self.senders.get(&channel) else {
            warn!(
                event_name = "notify.channel.missing",
                channel = channel.as_str(),
                order_id = %order.order_id,
                "no sender configured for channel"
            );
            return false;
        };

        let body = match self.templates.render(template, view) {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    event_name = "notify.render.failed",
                    channel = channel.as_str(),
                    order_id = %order.order_id,
                    error = %error,
                    "failed to render notification"
                );
                return false;
            }
        };

        let delivered = sender.send(target, &NotificationMessage { subject, body }).await;
        if !delivered {
            warn!(
                event_name = "notify.send.failed",
                channel = channel.as_str(),
                order_id = %order.order_id,
                "notification send failed"
            );
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{NotificationDispatcher, VendorNotice};
    use crate::domain::order::{Order, OrderId, OrderStatus, Priority};
    use crate::domain::vendor::{
        NotificationPreferences, ServiceArea, ServiceCategory, VendorId, VendorProfile,
        VendorStatus,
    };
    use crate::notify::{
        NotificationChannel, NotificationMessage, NotificationSender, NotificationTemplates,
    };
    use crate::selection::{ScoreBreakdown, SelectedVendor};

    struct RecordingSender {
        channel: NotificationChannel,
        succeed: bool,
        sent: Mutex<Vec<(String, NotificationMessage)>>,
    }

    impl RecordingSender {
        fn new(channel: NotificationChannel, succeed: bool) -> Arc<Self> {
            Arc::new(Self { channel, succeed, sent: Mutex::new(Vec::new()) })
        }

        fn targets(&self) -> Vec<String> {
            self.sent.lock().expect("lock").iter().map(|(target, _)| target.clone()).collect()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        fn channel(&self) -> NotificationChannel {
            self.channel
        }

        async fn send(&self, target: &str, message: &NotificationMessage) -> bool {
            self.sent.lock().expect("lock").push((target.to_string(), message.clone()));
            self.succeed
        }
    }

    fn order() -> Order {
        let now = Utc::now();
        Order {
            order_id: OrderId("ORD-test".to_string()),
            call_id: None,
            owner_id: "owner-1".to_string(),
            customer_name: Some("Dana".to_string()),
            customer_phone: Some("+15550100".to_string()),
            customer_email: Some("dana@example.com".to_string()),
            customer_address: Some("42 Maple Street".to_string()),
            service_type: ServiceCategory::Plumbing,
            description: "Burst pipe in the kitchen".to_string(),
            priority: Priority::Urgent,
            status: OrderStatus::New,
            assigned_vendors: vec![VendorId("v-1".to_string()), VendorId("v-2".to_string())],
            primary_vendor_id: VendorId("v-1".to_string()),
            scheduled_date: now,
            response_deadline: now,
            estimated_value: Decimal::from(400),
            created_at: now,
        }
    }

    fn vendor(id: &str, push: bool) -> (SelectedVendor, VendorProfile) {
        let profile = VendorProfile {
            id: VendorId(id.to_string()),
            owner_id: "owner-1".to_string(),
            name: format!("Vendor {id}"),
            email: Some(format!("{id}@vendors.example")),
            phone: None,
            push_token: Some(format!("token-{id}")),
            status: VendorStatus::Verified,
            services: vec!["plumbing".to_string()],
            location: None,
            service_area: ServiceArea { latitude: 0.0, longitude: 0.0, radius_miles: 10.0 },
            active_orders: 0,
            max_capacity: 3,
            average_response_time_mins: 10.0,
            rating: 4.5,
            is_online: true,
            completion_rate: 1.0,
            cancellation_rate: 0.0,
            membership_months: 24,
            last_seen: None,
            notification_preferences: NotificationPreferences { email: true, sms: false, push },
        };
        let selected = SelectedVendor {
            vendor_id: profile.id.clone(),
            vendor_name: profile.name.clone(),
            selection_score: 0.9,
            distance_miles: 2.0,
            estimated_response_time_mins: 10.0,
            selection_reason: "test".to_string(),
            notification_methods: vec![NotificationChannel::Email],
            score_breakdown: ScoreBreakdown::default(),
        };
        (selected, profile)
    }

    #[tokio::test]
    async fn customer_is_notified_if_either_channel_succeeds() {
        let email = RecordingSender::new(NotificationChannel::Email, false);
        let sms = RecordingSender::new(NotificationChannel::Sms, true);
        let dispatcher = NotificationDispatcher::new(NotificationTemplates::embedded().expect("templates"))
            .with_sender(email.clone())
            .with_sender(sms.clone());

        assert!(dispatcher.notify_customer(&order(), "Vendor v-1").await);
        assert_eq!(email.targets(), vec!["dana@example.com".to_string()]);
        assert_eq!(sms.targets(), vec!["+15550100".to_string()]);
    }

    #[tokio::test]
    async fn customer_notification_fails_without_senders() {
        let dispatcher = NotificationDispatcher::new(NotificationTemplates::embedded().expect("templates"));
        assert!(!dispatcher.notify_customer(&order(), "Vendor v-1").await);
    }

    #[tokio::test]
    async fn vendors_get_email_and_push_per_preferences() {
        let email = RecordingSender::new(NotificationChannel::Email, true);
        let push = RecordingSender::new(NotificationChannel::Push, true);
        let dispatcher = NotificationDispatcher::new(NotificationTemplates::embedded().expect("templates"))
            .with_sender(email.clone())
            .with_sender(push.clone());

        let first = vendor("v-1", true);
        let second = vendor("v-2", false);
        let notices = vec![
            VendorNotice { selected: &first.0, profile: &first.1 },
            VendorNotice { selected: &second.0, profile: &second.1 },
        ];

        let summary = dispatcher.notify_vendors(&order(), &notices).await;
        assert_eq!(summary.vendors_notified, 2);
        assert_eq!(summary.push_notifications_sent, 1);
        assert_eq!(push.targets(), vec!["token-v-1".to_string()]);
    }
}
