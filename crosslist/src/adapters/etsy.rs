//! Etsy adapter: draft listing, images, then activation.

use async_trait::async_trait;
use marketplaces_api::etsy::{
    self, EtsyClient, Listing, ListingState, MAX_IMAGES, NewListing, TITLE_MAX_CHARS,
};
use marketplaces_api::{MarketplaceError, RetryPolicy, with_retry, with_retry_unsent};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::{
    AttributeSet, CreatedListing, CrossListContext, EndOutcome, ListingError, PlatformAdapter,
    RemoteStatus, decimal_to_f64, push_attr,
};
use crate::credentials::AccessGrant;
use crate::domain::{ListingHandle, Platform, ProductSnapshot};

/// Coins & Money.
pub const DEFAULT_TAXONOMY_ID: i64 = 1030;
const WHO_MADE: &str = "someone_else";
const DEFAULT_WHEN_MADE: &str = "2020_2024";
const MAX_TAGS: usize = 13;
const TAG_MAX_CHARS: usize = 20;

#[derive(Debug, Clone)]
pub struct EtsyListingConfig {
    pub taxonomy_id: i64,
}

impl Default for EtsyListingConfig {
    fn default() -> Self {
        Self {
            taxonomy_id: DEFAULT_TAXONOMY_ID,
        }
    }
}

pub struct EtsyAdapter {
    client: EtsyClient,
    config: EtsyListingConfig,
    retry: RetryPolicy,
}

impl EtsyAdapter {
    pub fn new(client: EtsyClient, config: EtsyListingConfig) -> Self {
        Self {
            client,
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn new_listing(&self, product: &ProductSnapshot, shipping_profile_id: Option<i64>) -> NewListing {
        let attrs = self.map_attributes(product);
        let first = |key: &str| attrs.get(key).and_then(|v| v.first()).cloned();
        NewListing {
            title: product.title.chars().take(TITLE_MAX_CHARS).collect(),
            description: product.description.clone(),
            price: decimal_to_f64(product.price.unwrap_or_default()),
            quantity: product.quantity,
            taxonomy_id: self.config.taxonomy_id,
            who_made: first("who_made").unwrap_or_else(|| WHO_MADE.to_string()),
            when_made: first("when_made").unwrap_or_else(|| DEFAULT_WHEN_MADE.to_string()),
            is_supply: false,
            should_auto_renew: false,
            shipping_profile_id,
            tags: attrs.get("tags").cloned().unwrap_or_default(),
        }
    }

    /// Uploads images then activates. Any failure, including a single image
    /// that cannot be uploaded, leaves a draft behind for the caller to delete.
    async fn finish_draft(
        &self,
        token: &str,
        shop_id: &str,
        listing_id: &str,
        product: &ProductSnapshot,
    ) -> Result<Listing, MarketplaceError> {
        for (index, image_url) in product.image_urls.iter().take(MAX_IMAGES).enumerate() {
            let rank = index + 1;
            with_retry("etsy.upload_image", self.retry, || {
                self.client
                    .upload_image_from_url(token, shop_id, listing_id, image_url, rank)
            })
            .await
            .inspect_err(|e| warn!(listing_id, rank, error = %e, "Image upload failed"))?;
        }

        with_retry("etsy.activate_listing", self.retry, || {
            self.client
                .update_listing_state(token, shop_id, listing_id, "active")
        })
        .await
    }
}

fn api(err: MarketplaceError) -> ListingError {
    ListingError::from_marketplace(Platform::Etsy, err)
}

/// Etsy's `when_made` bucket for a production year.
pub fn when_made(year: Option<i32>) -> &'static str {
    let Some(year) = year else {
        return DEFAULT_WHEN_MADE;
    };
    match year {
        y if y >= 2020 => "2020_2024",
        y if y >= 2010 => "2010_2019",
        y if y >= 2000 => "2000_2009",
        y if y >= 1990 => "1990_1999",
        y if y >= 1980 => "1980s",
        y if y >= 1970 => "1970s",
        y if y >= 1960 => "1960s",
        y if y >= 1950 => "1950s",
        y if y >= 1940 => "1940s",
        y if y >= 1930 => "1930s",
        y if y >= 1920 => "1920s",
        y if y >= 1910 => "1910s",
        y if y >= 1900 => "1900s",
        _ => "before_1900",
    }
}

fn listing_status(listing: &Listing) -> RemoteStatus {
    match listing.state {
        ListingState::SoldOut => {
            let amount = listing.price.as_ref().and_then(|money| {
                (money.divisor > 0).then(|| Decimal::from(money.amount) / Decimal::from(money.divisor))
            });
            RemoteStatus::sold(amount)
        }
        ListingState::Expired | ListingState::Inactive | ListingState::Removed => {
            RemoteStatus::ended()
        }
        ListingState::Active | ListingState::Draft | ListingState::Edit | ListingState::Unknown => {
            RemoteStatus::active()
        }
    }
}

#[async_trait]
impl PlatformAdapter for EtsyAdapter {
    fn platform(&self) -> Platform {
        Platform::Etsy
    }

    fn map_attributes(&self, product: &ProductSnapshot) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        push_attr(&mut attrs, "who_made", Some(WHO_MADE.to_string()));
        push_attr(&mut attrs, "when_made", Some(when_made(product.year).to_string()));

        let tags: Vec<String> = [
            product.metal_type.clone(),
            product.mint.clone(),
            product.grade.clone(),
            product.certification.clone(),
            product.year.map(|y| y.to_string()),
        ]
        .into_iter()
        .flatten()
        .map(|t| t.trim().chars().take(TAG_MAX_CHARS).collect::<String>())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect();
        if !tags.is_empty() {
            attrs.insert("tags".to_string(), tags);
        }
        attrs
    }

    #[instrument(skip_all, fields(product_id = %product.id))]
    async fn create_listing(
        &self,
        product: &ProductSnapshot,
        _context: &CrossListContext,
        grant: &AccessGrant,
    ) -> Result<CreatedListing, ListingError> {
        let shop_id = grant.store_id.as_deref().ok_or_else(|| {
            ListingError::MissingPrerequisite(
                "Etsy shop id is unknown; link an account that owns a shop".into(),
            )
        })?;
        let token = grant.access_token.as_str();

        let profiles = with_retry("etsy.shipping_profiles", self.retry, || {
            self.client.shipping_profiles(token, shop_id)
        })
        .await
        .map_err(api)?;
        let shipping_profile_id = profiles.first().map(|p| p.shipping_profile_id);
        if shipping_profile_id.is_none() {
            warn!(shop_id, "Shop has no shipping profile; Etsy may reject the listing");
        }

        let request = self.new_listing(product, shipping_profile_id);
        let draft = with_retry_unsent("etsy.create_draft_listing", self.retry, || {
            self.client.create_draft_listing(token, shop_id, &request)
        })
        .await
        .map_err(api)?;
        let listing_id = draft.listing_id.to_string();

        if let Err(e) = self.finish_draft(token, shop_id, &listing_id, product).await {
            warn!(%listing_id, error = %e, "Finishing draft failed; deleting it");
            if let Err(cleanup) = self.client.delete_listing(token, &listing_id).await {
                warn!(%listing_id, error = %cleanup, "Failed to delete abandoned draft");
            }
            return Err(api(e));
        }

        info!(%listing_id, "Etsy listing activated");
        Ok(CreatedListing {
            external_url: Some(etsy::listing_url(&listing_id)),
            external_id: listing_id,
            external_ref: None,
        })
    }

    #[instrument(skip_all, fields(listing_id = %handle.external_id))]
    async fn end_listing(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<EndOutcome, ListingError> {
        let result = with_retry("etsy.delete_listing", self.retry, || {
            self.client
                .delete_listing(&grant.access_token, &handle.external_id)
        })
        .await;
        match result {
            Ok(()) => Ok(EndOutcome::Ended),
            Err(MarketplaceError::NotFound(_)) => Ok(EndOutcome::NotFound),
            Err(e) => Err(api(e)),
        }
    }

    async fn fetch_status(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<RemoteStatus, ListingError> {
        let result = with_retry("etsy.get_listing", self.retry, || {
            self.client.get_listing(&grant.access_token, &handle.external_id)
        })
        .await;
        match result {
            Ok(listing) => Ok(listing_status(&listing)),
            Err(MarketplaceError::NotFound(_)) => Ok(RemoteStatus::ended()),
            Err(e) => Err(api(e)),
        }
    }
}
