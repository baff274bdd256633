//! eBay adapter: inventory item, then offer, then publish.

use std::str::FromStr;

use async_trait::async_trait;
use marketplaces_api::ebay::{
    Amount, Availability, EbayClient, EbayEnvironment, InventoryItem, InventoryProduct,
    ListingFormat, ListingPolicies, Offer, OfferRequest, PricingSummary,
    ShipToLocationAvailability,
};
use marketplaces_api::{MarketplaceError, RetryPolicy, with_retry, with_retry_unsent};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::{
    AttributeSet, CreatedListing, CrossListContext, EndOutcome, ListingError, PlatformAdapter,
    RemoteStatus, push_attr,
};
use crate::credentials::AccessGrant;
use crate::domain::{ListingHandle, ListingType, Platform, ProductSnapshot};

pub const DEFAULT_MARKETPLACE_ID: &str = "EBAY_US";
/// Coins & Paper Money.
pub const DEFAULT_CATEGORY_ID: &str = "11116";

#[derive(Debug, Clone)]
pub struct EbayListingConfig {
    pub environment: EbayEnvironment,
    pub marketplace_id: String,
    pub category_id: String,
    pub currency: String,
    pub policies: ListingPolicies,
}

impl Default for EbayListingConfig {
    fn default() -> Self {
        Self {
            environment: EbayEnvironment::Production,
            marketplace_id: DEFAULT_MARKETPLACE_ID.to_string(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            currency: "USD".to_string(),
            policies: ListingPolicies::default(),
        }
    }
}

pub struct EbayAdapter {
    client: EbayClient,
    config: EbayListingConfig,
    retry: RetryPolicy,
}

impl EbayAdapter {
    pub fn new(client: EbayClient, config: EbayListingConfig) -> Self {
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

    fn amount(&self, value: Decimal) -> Amount {
        Amount {
            value: format!("{:.2}", value.round_dp(2)),
            currency: self.config.currency.clone(),
        }
    }

    fn inventory_item(&self, product: &ProductSnapshot) -> InventoryItem {
        InventoryItem {
            availability: Availability {
                ship_to_location_availability: ShipToLocationAvailability {
                    quantity: product.quantity,
                },
            },
            condition: map_condition(product.condition.as_deref()).to_string(),
            product: InventoryProduct {
                title: product.title.clone(),
                description: product.description.clone(),
                image_urls: product.image_urls.clone(),
                aspects: self.map_attributes(product),
            },
        }
    }

    fn offer_request(&self, product: &ProductSnapshot) -> OfferRequest {
        let terms = product.auction_terms();
        let (format, pricing_summary, listing_duration) = match product.listing_type {
            ListingType::Auction => (
                ListingFormat::Auction,
                PricingSummary {
                    price: terms
                        .and_then(|t| t.buy_now_price)
                        .map(|p| self.amount(p)),
                    auction_start_price: terms
                        .and_then(|t| t.start_price)
                        .or(product.price)
                        .map(|p| self.amount(p)),
                    auction_reserve_price: terms
                        .and_then(|t| t.reserve_price)
                        .map(|p| self.amount(p)),
                },
                Some("DAYS_7".to_string()),
            ),
            ListingType::FixedPrice => (
                ListingFormat::FixedPrice,
                PricingSummary {
                    price: Some(self.amount(product.price.unwrap_or_default())),
                    auction_start_price: None,
                    auction_reserve_price: None,
                },
                None,
            ),
        };

        OfferRequest {
            sku: product.sku.clone(),
            marketplace_id: self.config.marketplace_id.clone(),
            format,
            available_quantity: product.quantity,
            category_id: self.config.category_id.clone(),
            listing_description: product.description.clone(),
            listing_duration,
            listing_policies: self.config.policies.clone(),
            pricing_summary,
        }
    }

    async fn find_offers(&self, token: &str, sku: &str) -> Result<Vec<Offer>, ListingError> {
        with_retry("ebay.find_offers", self.retry, || {
            self.client
                .find_offers(token, sku, &self.config.marketplace_id)
        })
        .await
        .map_err(api)
    }

    /// Posts a new offer. When the outcome is unknown, the offers for the SKU
    /// are read back so a processed request is not sent twice.
    async fn create_offer(&self, token: &str, product: &ProductSnapshot) -> Result<String, ListingError> {
        let request = self.offer_request(product);
        let err = match with_retry_unsent("ebay.create_offer", self.retry, || {
            self.client.create_offer(token, &request)
        })
        .await
        {
            Ok(offer_id) => return Ok(offer_id),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(api(e)),
        };

        warn!(sku = %product.sku, error = %err, "Offer creation outcome unknown; checking for an existing offer");
        match self.find_offers(token, &product.sku).await?.into_iter().next() {
            Some(offer) => {
                info!(offer_id = %offer.offer_id, "Offer was created despite the error");
                Ok(offer.offer_id)
            }
            None => Err(api(err)),
        }
    }

    fn created(&self, listing_id: &str, offer_id: &str) -> CreatedListing {
        CreatedListing {
            external_id: listing_id.to_string(),
            external_url: Some(self.config.environment.item_url(listing_id)),
            external_ref: Some(offer_id.to_string()),
        }
    }
}

fn api(err: MarketplaceError) -> ListingError {
    ListingError::from_marketplace(Platform::Ebay, err)
}

/// Free-text condition onto eBay's condition enum.
pub fn map_condition(condition: Option<&str>) -> &'static str {
    match condition.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("new") => "NEW",
        Some("like new") => "LIKE_NEW",
        Some("very good") => "VERY_GOOD",
        Some("good") => "GOOD",
        Some("acceptable") => "ACCEPTABLE",
        _ => "USED_EXCELLENT",
    }
}

fn offer_status(offer: &Offer) -> RemoteStatus {
    let listing = offer.listing.as_ref();
    let sold = listing.and_then(|l| l.sold_quantity).unwrap_or(0) > 0;
    if sold {
        let price = offer
            .pricing_summary
            .as_ref()
            .and_then(|p| p.price.as_ref().or(p.auction_start_price.as_ref()))
            .and_then(|a| Decimal::from_str(&a.value).ok());
        return RemoteStatus::sold(price);
    }

    let listing_status = listing.and_then(|l| l.listing_status.as_deref());
    let ended = !offer.is_published() || matches!(listing_status, Some("ENDED" | "INACTIVE"));
    if ended {
        RemoteStatus::ended()
    } else {
        RemoteStatus::active()
    }
}

#[async_trait]
impl PlatformAdapter for EbayAdapter {
    fn platform(&self) -> Platform {
        Platform::Ebay
    }

    fn map_attributes(&self, product: &ProductSnapshot) -> AttributeSet {
        let mut aspects = AttributeSet::new();
        push_attr(&mut aspects, "Year", product.year.map(|y| y.to_string()));
        push_attr(&mut aspects, "Mint Location", product.mint.clone());
        push_attr(&mut aspects, "Grade", product.grade.clone());
        push_attr(&mut aspects, "Certification", product.certification.clone());
        aspects
    }

    #[instrument(skip_all, fields(product_id = %product.id, sku = %product.sku))]
    async fn create_listing(
        &self,
        product: &ProductSnapshot,
        _context: &CrossListContext,
        grant: &AccessGrant,
    ) -> Result<CreatedListing, ListingError> {
        let token = grant.access_token.as_str();
        let sku = product.sku.as_str();
        let item = self.inventory_item(product);

        with_retry("ebay.put_inventory_item", self.retry, || {
            self.client.put_inventory_item(token, sku, &item)
        })
        .await
        .map_err(api)?;

        // An earlier attempt may have left an offer behind; reuse it instead of duplicating.
        let offers = self.find_offers(token, sku).await?;
        let offer_id = match offers.first() {
            Some(offer) if offer.is_published() => {
                if let Some(listing_id) = offer.listing_id() {
                    info!(offer_id = %offer.offer_id, listing_id, "Offer already published");
                    return Ok(self.created(listing_id, &offer.offer_id));
                }
                offer.offer_id.clone()
            }
            Some(offer) => {
                debug!(offer_id = %offer.offer_id, "Reusing unpublished offer");
                let request = self.offer_request(product);
                with_retry("ebay.update_offer", self.retry, || {
                    self.client.update_offer(token, &offer.offer_id, &request)
                })
                .await
                .map_err(api)?;
                offer.offer_id.clone()
            }
            None => self.create_offer(token, product).await?,
        };

        let listing_id = with_retry("ebay.publish_offer", self.retry, || {
            self.client.publish_offer(token, &offer_id)
        })
        .await
        .map_err(api)?;

        info!(%offer_id, %listing_id, "eBay listing published");
        Ok(self.created(&listing_id, &offer_id))
    }

    #[instrument(skip_all, fields(listing_id = %handle.external_id))]
    async fn end_listing(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<EndOutcome, ListingError> {
        let offer_id = handle.external_ref.as_deref().ok_or_else(|| {
            ListingError::MissingPrerequisite("eBay offer id is unknown for this listing".into())
        })?;
        let result = with_retry("ebay.withdraw_offer", self.retry, || {
            self.client.withdraw_offer(&grant.access_token, offer_id)
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
        let offer_id = handle.external_ref.as_deref().ok_or_else(|| {
            ListingError::MissingPrerequisite("eBay offer id is unknown for this listing".into())
        })?;
        let result = with_retry("ebay.get_offer", self.retry, || {
            self.client.get_offer(&grant.access_token, offer_id)
        })
        .await;
        match result {
            Ok(offer) => Ok(offer_status(&offer)),
            Err(MarketplaceError::NotFound(_)) => Ok(RemoteStatus::ended()),
            Err(e) => Err(api(e)),
        }
    }
}
