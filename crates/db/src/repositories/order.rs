use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use leadline_core::domain::conversation::CallId;
use leadline_core::domain::order::{Order, OrderId, OrderStatus, Priority};
use leadline_core::domain::vendor::{ServiceCategory, VendorId};
use leadline_core::errors::ApplicationError;
use leadline_core::ports::OrderStore;

use super::{parse_json, parse_timestamp, to_json, RepositoryError};
use crate::DbPool;

const ORDER_COLUMNS: &str = "order_id,
    call_id,
    owner_id,
    customer_name,
    customer_phone,
    customer_email,
    customer_address,
    service_type,
    description,
    priority,
    status,
    assigned_vendors_json,
    primary_vendor_id,
    scheduled_date,
    response_deadline,
    estimated_value,
    created_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM dispatch_order WHERE order_id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(order_from_row).transpose()
    }

    pub async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM dispatch_order WHERE call_id = ? ORDER BY created_at ASC"
        ))
        .bind(call_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_from_row).collect()
    }

    pub async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO dispatch_order (
                order_id,
                call_id,
                owner_id,
                customer_name,
                customer_phone,
                customer_email,
                customer_address,
                service_type,
                description,
                priority,
                status,
                assigned_vendors_json,
                primary_vendor_id,
                scheduled_date,
                response_deadline,
                estimated_value,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.order_id.0)
        .bind(order.call_id.as_ref().map(CallId::as_str))
        .bind(&order.owner_id)
        .bind(order.customer_name.as_deref())
        .bind(order.customer_phone.as_deref())
        .bind(order.customer_email.as_deref())
        .bind(order.customer_address.as_deref())
        .bind(order.service_type.as_str())
        .bind(&order.description)
        .bind(order.priority.as_str())
        .bind(order.status.as_str())
        .bind(to_json("assigned_vendors_json", &order.assigned_vendors)?)
        .bind(&order.primary_vendor_id.0)
        .bind(order.scheduled_date.to_rfc3339())
        .bind(order.response_deadline.to_rfc3339())
        .bind(order.estimated_value.to_string())
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Applies a status change after checking it against the order lifecycle.
    pub async fn update_status(
        &self,
        id: &OrderId,
        next: OrderStatus,
    ) -> Result<Option<Order>, ApplicationError> {
        let Some(mut order) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        order.transition_to(next)?;

        sqlx::query("UPDATE dispatch_order SET status = ? WHERE order_id = ?")
            .bind(order.status.as_str())
            .bind(&order.order_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(Some(order))
    }
}

#[async_trait]
impl OrderStore for SqlOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), ApplicationError> {
        Ok(self.insert(order).await?)
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let service_raw = row.try_get::<String, _>("service_type")?;
    let service_type = ServiceCategory::from_label(&service_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown service type `{service_raw}`")))?;
    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = Priority::parse(&priority_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{priority_raw}`")))?;
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;
    let value_raw = row.try_get::<String, _>("estimated_value")?;
    let estimated_value = Decimal::from_str(&value_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid estimated_value `{value_raw}` ({error})"))
    })?;
    let assigned_raw = row.try_get::<String, _>("assigned_vendors_json")?;

    Ok(Order {
        order_id: OrderId(row.try_get("order_id")?),
        call_id: row.try_get::<Option<String>, _>("call_id")?.map(CallId),
        owner_id: row.try_get("owner_id")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_email: row.try_get("customer_email")?,
        customer_address: row.try_get("customer_address")?,
        service_type,
        description: row.try_get("description")?,
        priority,
        status,
        assigned_vendors: parse_json::<Vec<VendorId>>("assigned_vendors_json", &assigned_raw)?,
        primary_vendor_id: VendorId(row.try_get("primary_vendor_id")?),
        scheduled_date: parse_timestamp("scheduled_date", row.try_get("scheduled_date")?)?,
        response_deadline: parse_timestamp("response_deadline", row.try_get("response_deadline")?)?,
        estimated_value,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
