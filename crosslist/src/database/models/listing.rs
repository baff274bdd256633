//! Platform listing database model.

use sqlx::FromRow;

use crate::database::time::{decimal_from_db, ms_to_datetime};
use crate::domain::{ListingStatus, Platform, PlatformListing};
use crate::{Error, Result};

#[derive(Debug, Clone, FromRow)]
pub struct PlatformListingDbModel {
    pub id: String,
    pub product_id: String,
    pub platform: String,
    pub connection_id: String,
    pub external_id: String,
    pub external_url: Option<String>,
    pub external_ref: Option<String>,
    /// ACTIVE, SOLD, REMOVED, ERROR
    pub status: String,
    pub sale_amount: Option<String>,
    pub failure_count: i64,
    pub last_error: Option<String>,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<PlatformListingDbModel> for PlatformListing {
    type Error = Error;

    fn try_from(model: PlatformListingDbModel) -> Result<Self> {
        let platform = Platform::parse(&model.platform).ok_or_else(|| {
            Error::validation(format!("unknown platform in listing row: {}", model.platform))
        })?;
        let status = ListingStatus::parse(&model.status).ok_or_else(|| {
            Error::validation(format!("unknown listing status: {}", model.status))
        })?;
        Ok(Self {
            sale_amount: decimal_from_db("sale_amount", model.sale_amount.as_deref())?,
            id: model.id,
            product_id: model.product_id,
            platform,
            connection_id: model.connection_id,
            external_id: model.external_id,
            external_url: model.external_url,
            external_ref: model.external_ref,
            status,
            failure_count: model.failure_count.max(0) as u32,
            last_error: model.last_error,
            last_synced_at: model.last_synced_at.map(ms_to_datetime),
            created_at: ms_to_datetime(model.created_at),
            updated_at: ms_to_datetime(model.updated_at),
        })
    }
}
