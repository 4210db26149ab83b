use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use leadline_core::domain::vendor::{
    NotificationPreferences, ServiceArea, VendorId, VendorProfile, VendorStatus,
};
use leadline_core::errors::ApplicationError;
use leadline_core::ports::VendorDirectory;

use super::{parse_json, parse_optional_timestamp, parse_u32, to_json, RepositoryError};
use crate::DbPool;

const VENDOR_COLUMNS: &str = "id,
    owner_id,
    name,
    email,
    phone,
    push_token,
    status,
    services_json,
    location,
    service_latitude,
    service_longitude,
    service_radius_miles,
    active_orders,
    max_capacity,
    average_response_time_mins,
    rating,
    is_online,
    completion_rate,
    cancellation_rate,
    membership_months,
    last_seen,
    notify_email,
    notify_sms,
    notify_push";

pub struct SqlVendorRepository {
    pool: DbPool,
}

impl SqlVendorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &VendorId) -> Result<Option<VendorProfile>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendor WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(vendor_from_row).transpose()
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<VendorProfile>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendor WHERE owner_id = ? ORDER BY id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(vendor_from_row).collect()
    }

    pub async fn save(&self, vendor: &VendorProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO vendor (
                id,
                owner_id,
                name,
                email,
                phone,
                push_token,
                status,
                services_json,
                location,
                service_latitude,
                service_longitude,
                service_radius_miles,
                active_orders,
                max_capacity,
                average_response_time_mins,
                rating,
                is_online,
                completion_rate,
                cancellation_rate,
                membership_months,
                last_seen,
                notify_email,
                notify_sms,
                notify_push,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                push_token = excluded.push_token,
                status = excluded.status,
                services_json = excluded.services_json,
                location = excluded.location,
                service_latitude = excluded.service_latitude,
                service_longitude = excluded.service_longitude,
                service_radius_miles = excluded.service_radius_miles,
                active_orders = excluded.active_orders,
                max_capacity = excluded.max_capacity,
                average_response_time_mins = excluded.average_response_time_mins,
                rating = excluded.rating,
                is_online = excluded.is_online,
                completion_rate = excluded.completion_rate,
                cancellation_rate = excluded.cancellation_rate,
                membership_months = excluded.membership_months,
                last_seen = excluded.last_seen,
                notify_email = excluded.notify_email,
                notify_sms = excluded.notify_sms,
                notify_push = excluded.notify_push,
                updated_at = excluded.updated_at",
        )
        .bind(&vendor.id.0)
        .bind(&vendor.owner_id)
        .bind(&vendor.name)
        .bind(vendor.email.as_deref())
        .bind(vendor.phone.as_deref())
        .bind(vendor.push_token.as_deref())
        .bind(vendor.status.as_str())
        .bind(to_json("services_json", &vendor.services)?)
        .bind(vendor.location.as_deref())
        .bind(vendor.service_area.latitude)
        .bind(vendor.service_area.longitude)
        .bind(vendor.service_area.radius_miles)
        .bind(i64::from(vendor.active_orders))
        .bind(i64::from(vendor.max_capacity))
        .bind(vendor.average_response_time_mins)
        .bind(vendor.rating)
        .bind(vendor.is_online)
        .bind(vendor.completion_rate)
        .bind(vendor.cancellation_rate)
        .bind(i64::from(vendor.membership_months))
        .bind(vendor.last_seen.map(|value| value.to_rfc3339()))
        .bind(vendor.notification_preferences.email)
        .bind(vendor.notification_preferences.sms)
        .bind(vendor.notification_preferences.push)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VendorDirectory for SqlVendorRepository {
    async fn vendor_pool(&self, owner_id: &str) -> Result<Vec<VendorProfile>, ApplicationError> {
        Ok(self.list_for_owner(owner_id).await?)
    }
}

fn vendor_from_row(row: SqliteRow) -> Result<VendorProfile, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = VendorStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown vendor status `{status_raw}`")))?;
    let services_raw = row.try_get::<String, _>("services_json")?;

    Ok(VendorProfile {
        id: VendorId(row.try_get("id")?),
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        push_token: row.try_get("push_token")?,
        status,
        services: parse_json("services_json", &services_raw)?,
        location: row.try_get("location")?,
        service_area: ServiceArea {
            latitude: row.try_get("service_latitude")?,
            longitude: row.try_get("service_longitude")?,
            radius_miles: row.try_get("service_radius_miles")?,
        },
        active_orders: parse_u32("active_orders", row.try_get("active_orders")?)?,
        max_capacity: parse_u32("max_capacity", row.try_get("max_capacity")?)?,
        average_response_time_mins: row.try_get("average_response_time_mins")?,
        rating: row.try_get("rating")?,
        is_online: row.try_get("is_online")?,
        completion_rate: row.try_get("completion_rate")?,
        cancellation_rate: row.try_get("cancellation_rate")?,
        membership_months: parse_u32("membership_months", row.try_get("membership_months")?)?,
        last_seen: parse_optional_timestamp("last_seen", row.try_get("last_seen")?)?,
        notification_preferences: NotificationPreferences {
            email: row.try_get("notify_email")?,
            sms: row.try_get("notify_sms")?,
            push: row.try_get("notify_push")?,
        },
    })
}
