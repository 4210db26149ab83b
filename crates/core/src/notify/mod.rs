//! Notification fan-out to customers and vendors.

mod dispatcher;
mod templates;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use dispatcher::{NotificationDispatcher, VendorNotice, VendorNotificationSummary};
pub use templates::{NotificationTemplates, TemplateError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

impl NotificationChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
}

/// One delivery channel. Implementations report delivery as a plain boolean
/// and log their own failures.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn send(&self, target: &str, message: &NotificationMessage) -> bool;
}
