//! AuctionFlex360 adapter: products become lots inside an auction event.
//!
//! The connection stores the API key as its access token and the company id
//! as its store id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplaces_api::auctionflex::{
    AuctionFlexClient, AuctionFlexCredentials, Category, LotResult, LotStatus, NewLot,
};
use marketplaces_api::{MarketplaceError, RetryPolicy, with_retry, with_retry_unsent};
use tracing::{info, instrument};

use super::{
    AttributeSet, CreatedListing, CrossListContext, EndOutcome, EventLotResult, ListingError,
    PlatformAdapter, RemoteStatus, decimal_to_f64, f64_to_decimal, push_attr,
};
use crate::credentials::AccessGrant;
use crate::domain::{ListingHandle, Platform, ProductSnapshot};

pub struct AuctionFlexAdapter {
    client: AuctionFlexClient,
    retry: RetryPolicy,
}

impl AuctionFlexAdapter {
    pub fn new(client: AuctionFlexClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn lot(&self, product: &ProductSnapshot) -> NewLot {
        let terms = product.auction_terms();
        let starting_bid = terms
            .and_then(|t| t.start_price)
            .or(product.price)
            .map(decimal_to_f64)
            .filter(|bid| *bid > 0.0)
            .unwrap_or(1.0);
        let attributes: BTreeMap<String, String> = self
            .map_attributes(product)
            .into_iter()
            .filter_map(|(name, mut values)| values.pop().map(|v| (name, v)))
            .collect();

        NewLot {
            lot_number: None,
            title: product.title.clone(),
            description: product.description.clone(),
            category_id: None,
            starting_bid,
            reserve_price: terms.and_then(|t| t.reserve_price).map(decimal_to_f64),
            buy_now_price: terms
                .and_then(|t| t.buy_now_price)
                .or(product.price)
                .map(decimal_to_f64),
            quantity: product.quantity,
            images: product.image_urls.clone(),
            attributes,
        }
    }

    /// Creates a timed event in draft state.
    #[instrument(skip(self, grant))]
    pub async fn create_event(
        &self,
        grant: &AccessGrant,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, ListingError> {
        if end <= start {
            return Err(ListingError::ValidationRejected(
                "event must end after it starts".into(),
            ));
        }
        let creds = credentials(grant)?;
        let event_id = self
            .client
            .create_event(&creds, name, start, end)
            .await
            .map_err(api)?;
        info!(%event_id, "AuctionFlex event created");
        Ok(event_id)
    }

    pub async fn publish_event(&self, grant: &AccessGrant, event_id: &str) -> Result<(), ListingError> {
        let creds = credentials(grant)?;
        with_retry("auctionflex.publish_event", self.retry, || {
            self.client.publish_event(&creds, event_id)
        })
        .await
        .map_err(api)
    }

    pub async fn categories(&self, grant: &AccessGrant) -> Result<Vec<Category>, ListingError> {
        let creds = credentials(grant)?;
        with_retry("auctionflex.categories", self.retry, || {
            self.client.categories(&creds)
        })
        .await
        .map_err(api)
    }
}

fn api(err: MarketplaceError) -> ListingError {
    ListingError::from_marketplace(Platform::AuctionFlex, err)
}

fn credentials(grant: &AccessGrant) -> Result<AuctionFlexCredentials, ListingError> {
    let company_id = grant.store_id.clone().ok_or_else(|| {
        ListingError::MissingPrerequisite("AuctionFlex company ID is not configured".into())
    })?;
    Ok(AuctionFlexCredentials {
        api_key: grant.access_token.clone(),
        company_id,
    })
}

fn lot_status(lot: &LotResult) -> RemoteStatus {
    match lot.status {
        LotStatus::Sold => RemoteStatus::sold(lot.winning_bid.and_then(f64_to_decimal)),
        LotStatus::Unsold | LotStatus::Passed | LotStatus::Withdrawn | LotStatus::Closed => {
            RemoteStatus::ended()
        }
        LotStatus::Open | LotStatus::Active | LotStatus::Pending | LotStatus::Unknown => {
            RemoteStatus::active()
        }
    }
}

#[async_trait]
impl PlatformAdapter for AuctionFlexAdapter {
    fn platform(&self) -> Platform {
        Platform::AuctionFlex
    }

    fn check_prerequisites(
        &self,
        _product: &ProductSnapshot,
        context: &CrossListContext,
    ) -> Result<(), ListingError> {
        match context.auction_event_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err(ListingError::MissingPrerequisite(
                "AuctionFlex event ID required".into(),
            )),
        }
    }

    fn map_attributes(&self, product: &ProductSnapshot) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        push_attr(&mut attrs, "Year", product.year.map(|y| y.to_string()));
        push_attr(&mut attrs, "Mint", product.mint.clone());
        push_attr(&mut attrs, "Grade", product.grade.clone());
        push_attr(&mut attrs, "Certification", product.certification.clone());
        push_attr(&mut attrs, "Cert Number", product.cert_number.clone());
        push_attr(&mut attrs, "Metal", product.metal_type.clone());
        push_attr(
            &mut attrs,
            "Weight",
            product.metal_weight.map(|w| format!("{} oz", w.normalize())),
        );
        push_attr(&mut attrs, "Condition", product.condition.clone());
        attrs
    }

    #[instrument(skip_all, fields(product_id = %product.id))]
    async fn create_listing(
        &self,
        product: &ProductSnapshot,
        context: &CrossListContext,
        grant: &AccessGrant,
    ) -> Result<CreatedListing, ListingError> {
        self.check_prerequisites(product, context)?;
        let event_id = context
            .auction_event_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let creds = credentials(grant)?;
        let lot = self.lot(product);

        let lot_id = with_retry_unsent("auctionflex.add_lot", self.retry, || {
            self.client.add_lot(&creds, event_id, &lot)
        })
        .await
        .map_err(api)?;

        info!(%event_id, %lot_id, "AuctionFlex lot added");
        Ok(CreatedListing {
            external_url: Some(self.client.lot_url(event_id, &lot_id)),
            external_id: lot_id,
            external_ref: Some(event_id.to_string()),
        })
    }

    #[instrument(skip_all, fields(lot_id = %handle.external_id))]
    async fn end_listing(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<EndOutcome, ListingError> {
        let creds = credentials(grant)?;
        let result = with_retry("auctionflex.remove_lot", self.retry, || {
            self.client.remove_lot(&creds, &handle.external_id)
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
        let creds = credentials(grant)?;
        let result = with_retry("auctionflex.get_lot", self.retry, || {
            self.client.get_lot(&creds, &handle.external_id)
        })
        .await;
        match result {
            Ok(lot) => Ok(lot_status(&lot)),
            Err(MarketplaceError::NotFound(_)) => Ok(RemoteStatus::ended()),
            Err(e) => Err(api(e)),
        }
    }

    async fn fetch_event_results(
        &self,
        event_id: &str,
        grant: &AccessGrant,
    ) -> Result<Vec<EventLotResult>, ListingError> {
        let creds = credentials(grant)?;
        let results = with_retry("auctionflex.event_results", self.retry, || {
            self.client.event_results(&creds, event_id)
        })
        .await
        .map_err(api)?;
        Ok(results
            .lots
            .iter()
            .map(|lot| EventLotResult {
                external_id: lot.lot_id.clone(),
                status: lot_status(lot),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuctionTerms;
    use rust_decimal_macros::dec;

    fn adapter() -> AuctionFlexAdapter {
        marketplaces_api::client::install_rustls_provider();
        AuctionFlexAdapter::new(AuctionFlexClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
        ))
    }

    fn eagle() -> ProductSnapshot {
        let mut product = ProductSnapshot::new("p1", "SKU-1", "2021 Silver Eagle");
        product.price = Some(dec!(45));
        product.metal_type = Some("SILVER".into());
        product.metal_weight = Some(dec!(1.000));
        product.cert_number = Some("12345678".into());
        product
    }

    #[test]
    fn test_event_id_is_required() {
        let adapter = adapter();
        let err = adapter
            .check_prerequisites(&eagle(), &CrossListContext::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "AuctionFlex event ID required");

        let blank = CrossListContext {
            auction_event_id: Some("  ".into()),
        };
        assert!(adapter.check_prerequisites(&eagle(), &blank).is_err());

        let ok = CrossListContext {
            auction_event_id: Some("77".into()),
        };
        assert!(adapter.check_prerequisites(&eagle(), &ok).is_ok());
    }

    #[test]
    fn test_attributes() {
        let attrs = adapter().map_attributes(&eagle());
        assert_eq!(attrs["Metal"], vec!["SILVER"]);
        assert_eq!(attrs["Weight"], vec!["1 oz"]);
        assert_eq!(attrs["Cert Number"], vec!["12345678"]);
        assert!(!attrs.contains_key("Year"));
    }

    #[test]
    fn test_lot_pricing_fallbacks() {
        let adapter = adapter();
        let lot = adapter.lot(&eagle());
        assert_eq!(lot.starting_bid, 45.0);
        assert_eq!(lot.buy_now_price, Some(45.0));
        assert_eq!(lot.reserve_price, None);
        assert_eq!(lot.attributes["Weight"], "1 oz");

        let mut auctioned = eagle();
        auctioned.auction = Some(AuctionTerms {
            start_price: Some(dec!(10)),
            reserve_price: Some(dec!(30)),
            buy_now_price: Some(dec!(60)),
        });
        let lot = adapter.lot(&auctioned);
        assert_eq!(lot.starting_bid, 10.0);
        assert_eq!(lot.reserve_price, Some(30.0));
        assert_eq!(lot.buy_now_price, Some(60.0));

        let unpriced = ProductSnapshot::new("p2", "SKU-2", "Mystery lot");
        assert_eq!(adapter.lot(&unpriced).starting_bid, 1.0);
    }

    #[test]
    fn test_lot_status_mapping() {
        let sold = LotResult {
            lot_id: "9".into(),
            status: LotStatus::Sold,
            winning_bid: Some(285.0),
        };
        assert_eq!(lot_status(&sold), RemoteStatus::sold(Some(dec!(285))));

        let passed = LotResult {
            lot_id: "9".into(),
            status: LotStatus::Passed,
            winning_bid: None,
        };
        assert_eq!(lot_status(&passed), RemoteStatus::ended());
    }
}
