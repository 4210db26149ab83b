use std::collections::HashMap;

use serde::Serialize;
use tera::{Context, Tera};

pub const CUSTOMER_EMAIL: &str = "customer_email.txt.tera";
pub const CUSTOMER_SMS: &str = "customer_sms.txt.tera";
pub const VENDOR_EMAIL: &str = "vendor_email.txt.tera";
pub const VENDOR_PUSH: &str = "vendor_push.txt.tera";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template error: {0}")]
    Template(String),
    #[error("render error: {0}")]
    Render(String),
}

/// Tera templates for every notification the dispatcher sends.
#[derive(Clone, Debug)]
pub struct NotificationTemplates {
    tera: Tera,
}

impl NotificationTemplates {
    pub fn embedded() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.register_filter("money", money_filter);
        tera.add_raw_templates(vec![
            (CUSTOMER_EMAIL, include_str!("../../../../templates/notifications/customer_email.txt.tera")),
            (CUSTOMER_SMS, include_str!("../../../../templates/notifications/customer_sms.txt.tera")),
            (VENDOR_EMAIL, include_str!("../../../../templates/notifications/vendor_email.txt.tera")),
            (VENDOR_PUSH, include_str!("../../../../templates/notifications/vendor_push.txt.tera")),
        ])
        .map_err(|error| TemplateError::Template(error.to_string()))?;

        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, data: &impl Serialize) -> Result<String, TemplateError> {
        let context =
            Context::from_serialize(data).map_err(|error| TemplateError::Render(error.to_string()))?;
        self.tera
            .render(name, &context)
            .map(|rendered| rendered.trim().to_string())
            .map_err(|error| TemplateError::Render(error.to_string()))
    }
}

/// Formats a number, or a numeric string, to 2 decimal places.
fn money_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{num:.2}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{NotificationTemplates, CUSTOMER_EMAIL, VENDOR_PUSH};

    #[test]
    fn renders_customer_email() {
        let templates = NotificationTemplates::embedded().expect("templates");
        let body = templates
            .render(
                CUSTOMER_EMAIL,
                &json!({
                    "customer_name": "Dana",
                    "service_name": "Plumbing",
                    "vendor_count": 1,
                    "order_id": "ORD-1",
                    "priority": "urgent",
                    "scheduled_date": "2026-01-01 10:00 UTC",
                    "estimated_value": "400",
                    "customer_address": null,
                    "primary_vendor_name": "Harbor Plumbing",
                }),
            )
            .expect("render");

        assert!(body.starts_with("Hi Dana,"));
        assert!(body.contains("1 local professional."));
        assert!(body.contains("Estimated cost: $400.00"));
        assert!(!body.contains("Service address"));
    }

    #[test]
    fn renders_vendor_push() {
        let templates = NotificationTemplates::embedded().expect("templates");
        let body = templates
            .render(
                VENDOR_PUSH,
                &json!({
                    "priority": "high",
                    "service_name": "Roofing",
                    "distance_miles": 3.456,
                    "response_deadline": "10:15 UTC",
                }),
            )
            .expect("render");

        assert_eq!(body, "New high Roofing job 3.46 mi away. Respond by 10:15 UTC.");
    }
}
