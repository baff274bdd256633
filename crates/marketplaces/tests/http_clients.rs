use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use marketplaces_api::auctionflex::{AuctionFlexClient, AuctionFlexCredentials, NewLot};
use marketplaces_api::client::build_client;
use marketplaces_api::ebay::{self, EbayClient, InventoryItem};
use marketplaces_api::etsy::{EtsyClient, NewListing};
use marketplaces_api::MarketplaceError;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn sample_item() -> InventoryItem {
    serde_json::from_value(json!({
        "availability": {"shipToLocationAvailability": {"quantity": 1}},
        "condition": "USED_EXCELLENT",
        "product": {"title": "1921 Morgan Dollar", "description": "MS63", "imageUrls": [], "aspects": {"Year": ["1921"]}}
    }))
    .unwrap()
}

#[tokio::test]
async fn test_ebay_publish_sequence() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));

    let s1 = seen.clone();
    let s2 = seen.clone();
    let s3 = seen.clone();
    let router = Router::new()
        .route(
            "/sell/inventory/v1/inventory_item/{sku}",
            put(move |Path(sku): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                let seen = s1.clone();
                async move {
                    assert_eq!(header(&headers, "authorization"), "Bearer tok");
                    assert_eq!(header(&headers, "content-language"), "en-US");
                    assert_eq!(body["product"]["aspects"]["Year"][0], "1921");
                    seen.lock().unwrap().push(format!("item:{sku}"));
                    StatusCode::NO_CONTENT
                }
            }),
        )
        .route(
            "/sell/inventory/v1/offer",
            post(move |Json(body): Json<Value>| {
                let seen = s2.clone();
                async move {
                    seen.lock().unwrap().push(format!("offer:{}", body["sku"].as_str().unwrap()));
                    (StatusCode::CREATED, Json(json!({"offerId": "O-1"})))
                }
            }),
        )
        .route(
            "/sell/inventory/v1/offer/{id}/publish",
            post(move |Path(id): Path<String>| {
                let seen = s3.clone();
                async move {
                    seen.lock().unwrap().push(format!("publish:{id}"));
                    Json(json!({"listingId": "110000001"}))
                }
            }),
        );
    let base = serve(router).await;

    let client = EbayClient::with_base_url(build_client(None).unwrap(), base);
    client
        .put_inventory_item("tok", "SKU-1", &sample_item())
        .await
        .unwrap();
    let offer_id = client
        .create_offer(
            "tok",
            &ebay::OfferRequest {
                sku: "SKU-1".into(),
                marketplace_id: "EBAY_US".into(),
                format: ebay::ListingFormat::FixedPrice,
                available_quantity: 1,
                category_id: "11116".into(),
                listing_description: "MS63".into(),
                listing_duration: None,
                listing_policies: Default::default(),
                pricing_summary: ebay::PricingSummary {
                    price: Some(ebay::Amount {
                        value: "285.00".into(),
                        currency: "USD".into(),
                    }),
                    auction_start_price: None,
                    auction_reserve_price: None,
                },
            },
        )
        .await
        .unwrap();
    let listing_id = client.publish_offer("tok", &offer_id).await.unwrap();

    assert_eq!(listing_id, "110000001");
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["item:SKU-1", "offer:SKU-1", "publish:O-1"]
    );
}

#[tokio::test]
async fn test_ebay_rate_limit_and_missing_offers() {
    let router = Router::new()
        .route(
            "/sell/inventory/v1/offer/{id}",
            get(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", "7")],
                    "slow down",
                )
            }),
        )
        .route(
            "/sell/inventory/v1/offer",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({"errors": []}))) }),
        );
    let base = serve(router).await;
    let client = EbayClient::with_base_url(build_client(None).unwrap(), base);

    let err = client.get_offer("tok", "O-1").await.unwrap_err();
    match err {
        MarketplaceError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)))
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let offers = client.find_offers("tok", "SKU-1", "EBAY_US").await.unwrap();
    assert!(offers.is_empty());
}

#[tokio::test]
async fn test_etsy_draft_and_activate() {
    let router = Router::new()
        .route(
            "/application/shops/{shop}/listings",
            post(|Path(shop): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(shop, "5551");
                assert_eq!(header(&headers, "x-api-key"), "etsy-key");
                assert_eq!(body["who_made"], "someone_else");
                assert_eq!(body["when_made"], "1920s");
                Json(json!({"listing_id": 777, "state": "draft"}))
            }),
        )
        .route(
            "/application/shops/{shop}/listings/{id}",
            patch(|Path((_, id)): Path<(String, String)>, Json(body): Json<Value>| async move {
                assert_eq!(body["state"], "active");
                Json(json!({"listing_id": id.parse::<u64>().unwrap(), "state": "active"}))
            }),
        )
        .route(
            "/application/listings/{id}",
            delete(|| async { StatusCode::NO_CONTENT }),
        );
    let base = serve(router).await;
    let client = EtsyClient::with_base_url(build_client(None).unwrap(), base, "etsy-key");

    let draft = client
        .create_draft_listing(
            "tok",
            "5551",
            &NewListing {
                title: "1921 Morgan".into(),
                description: "MS63".into(),
                price: 285.0,
                quantity: 1,
                taxonomy_id: 1030,
                who_made: "someone_else".into(),
                when_made: "1920s".into(),
                is_supply: false,
                should_auto_renew: false,
                shipping_profile_id: None,
                tags: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(draft.listing_id, 777);

    let active = client
        .update_listing_state("tok", "5551", "777", "active")
        .await
        .unwrap();
    assert_eq!(active.state, marketplaces_api::etsy::ListingState::Active);

    client.delete_listing("tok", "777").await.unwrap();
}

#[tokio::test]
async fn test_auctionflex_lot_lifecycle() {
    let router = Router::new()
        .route(
            "/v1/auctions/{event}/lots",
            post(|Path(event): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(event, "EV-9");
                assert_eq!(header(&headers, "x-company-id"), "co-1");
                assert_eq!(header(&headers, "authorization"), "Bearer af-key");
                assert_eq!(body["attributes"]["Grade"], "MS63");
                Json(json!({"lot_id": 4521}))
            }),
        )
        .route(
            "/v1/lots/{id}",
            get(|| async { Json(json!({"lot_id": 4521, "status": "sold", "winning_bid": 310.5})) }),
        )
        .route("/v1/account", get(|| async { StatusCode::UNAUTHORIZED.into_response() }));
    let base = serve(router).await;
    let client = AuctionFlexClient::new(build_client(None).unwrap(), base.clone());
    let creds = AuctionFlexCredentials {
        api_key: "af-key".into(),
        company_id: "co-1".into(),
    };

    let lot_id = client
        .add_lot(
            &creds,
            "EV-9",
            &NewLot {
                lot_number: None,
                title: "1921 Morgan".into(),
                description: String::new(),
                category_id: None,
                starting_bid: 100.0,
                reserve_price: None,
                buy_now_price: Some(285.0),
                quantity: 1,
                images: vec![],
                attributes: [("Grade".to_string(), "MS63".to_string())].into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(lot_id, "4521");
    assert_eq!(
        client.lot_url("EV-9", &lot_id),
        format!("{base}/auctions/EV-9/lots/4521")
    );

    let lot = client.get_lot(&creds, &lot_id).await.unwrap();
    assert_eq!(lot.winning_bid, Some(310.5));

    assert!(!client.validate(&creds).await.unwrap());
}

#[tokio::test]
async fn test_oauth_refresh_with_basic_auth() {
    let router = Router::new().route(
        "/identity/v1/oauth2/token",
        post(|headers: HeaderMap, Form(form): Form<Vec<(String, String)>>| async move {
            assert!(header(&headers, "authorization").starts_with("Basic "));
            let get = |k: &str| {
                form.iter()
                    .find(|(key, _)| key == k)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            };
            assert_eq!(get("grant_type"), "refresh_token");
            if get("refresh_token") == "revoked" {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                );
            }
            (
                StatusCode::OK,
                Json(json!({"access_token": "fresh", "expires_in": 7200, "token_type": "User Access Token"})),
            )
        }),
    );
    let base = serve(router).await;
    let oauth = ebay::oauth_client(
        build_client(None).unwrap(),
        format!("{base}/identity/v1/oauth2/token"),
        "id",
        "secret",
    );

    let token = oauth.refresh("good", Some("scope")).await.unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.expires_in, Some(7200));

    let err = oauth.refresh("revoked", None).await.unwrap_err();
    assert!(err.is_invalid_grant());
    assert!(!err.is_transient());
}
