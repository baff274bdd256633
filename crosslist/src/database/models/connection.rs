//! Platform connection database model.

use sqlx::FromRow;

use crate::database::time::{datetime_to_ms, ms_to_datetime, now_ms};
use crate::domain::{Platform, PlatformConnection, TokenSet};
use crate::{Error, Result};

#[derive(Clone, FromRow)]
pub struct PlatformConnectionDbModel {
    pub id: String,
    pub platform: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix epoch milliseconds (UTC); NULL for non-expiring API keys.
    pub expires_at: Option<i64>,
    pub store_id: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlatformConnectionDbModel {
    pub fn new(platform: Platform, tokens: &TokenSet) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform: platform.as_str().to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.map(datetime_to_ms),
            store_id: tokens.store_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<PlatformConnectionDbModel> for PlatformConnection {
    type Error = Error;

    fn try_from(model: PlatformConnectionDbModel) -> Result<Self> {
        let platform = Platform::parse(&model.platform).ok_or_else(|| {
            Error::validation(format!("unknown platform in connection row: {}", model.platform))
        })?;
        Ok(Self {
            id: model.id,
            platform,
            access_token: model.access_token,
            refresh_token: model.refresh_token,
            expires_at: model.expires_at.map(ms_to_datetime),
            store_id: model.store_id,
            is_active: model.is_active,
            created_at: ms_to_datetime(model.created_at),
            updated_at: ms_to_datetime(model.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_model_to_domain() {
        let tokens = TokenSet {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            expires_at: Some(Utc::now()),
            store_id: Some("shop-1".into()),
        };
        let model = PlatformConnectionDbModel::new(Platform::Etsy, &tokens);
        let conn = PlatformConnection::try_from(model).unwrap();
        assert_eq!(conn.platform, Platform::Etsy);
        assert_eq!(conn.store_id.as_deref(), Some("shop-1"));
        assert!(conn.is_active);
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let mut model = PlatformConnectionDbModel::new(
            Platform::Ebay,
            &TokenSet::from_expires_in("a".into(), None, None),
        );
        model.platform = "AMAZON".into();
        assert!(PlatformConnection::try_from(model).is_err());
    }
}
