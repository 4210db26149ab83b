//! Order construction for a completed selection

use chrono::{DateTime, Utc};

use super::types::{DispatchRequest, SelectionCriteria, SelectionResult};
use crate::domain::order::{estimated_value, Order, OrderId, OrderStatus};
use crate::errors::DomainError;

const MAX_DESCRIPTION_CHARS: usize = 1000;

pub fn build_order(
    request: &DispatchRequest,
    criteria: &SelectionCriteria,
    selection: &SelectionResult,
    now: DateTime<Utc>,
) -> Result<Order, DomainError> {
    let primary_vendor_id = selection.primary_vendor_id.clone().ok_or_else(|| {
        DomainError::InvariantViolation("an order needs at least one assigned vendor".to_string())
    })?;

    Ok(Order {
        order_id: OrderId::generate(),
        call_id: request.call_id.clone(),
        owner_id: request.owner_id.clone(),
        customer_name: request.customer_name(),
        customer_phone: request.customer_phone(),
        customer_email: request.extracted_data.email.clone(),
        customer_address: request.customer_address(),
        service_type: criteria.service_type,
        description: describe(request, criteria),
        priority: criteria.priority,
        status: OrderStatus::New,
        assigned_vendors: selection
            .selected_vendors
            .iter()
            .map(|vendor| vendor.vendor_id.clone())
            .collect(),
        primary_vendor_id,
        scheduled_date: now + criteria.priority.schedule_offset(),
        response_deadline: now + criteria.priority.response_window(),
        estimated_value: estimated_value(criteria.service_type, criteria.priority),
        created_at: now,
    })
}

fn describe(request: &DispatchRequest, criteria: &SelectionCriteria) -> String {
    let text = request.customer_text.trim();
    if text.is_empty() {
        return format!("{} request", criteria.service_type.display_name());
    }
    text.chars().take(MAX_DESCRIPTION_CHARS).collect()
}
