mod common;

use std::time::Duration;

use common::{Harness, MockAdapter, Scripted, auction_lot, silver_coin};
use crosslist::adapters::{CrossListContext, ListingErrorKind, RemoteStatus};
use crosslist::domain::{ListingStatus, Platform, ProductStatus};
use crosslist::listings::ListingRegistry;

fn no_context() -> CrossListContext {
    CrossListContext::default()
}

#[tokio::test]
async fn test_partial_success_records_only_successes() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let etsy = MockAdapter::new(Platform::Etsy);
    ebay.push_id("123");
    etsy.fail_creates(Scripted::Rejected("title contains prohibited terms".into()));

    let h = Harness::new(&[ebay.clone(), etsy.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.connect(Platform::Etsy).await;
    h.seed_product(&silver_coin("P1")).await;

    let results = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay, Platform::Etsy], no_context())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let ebay_result = results.iter().find(|r| r.platform == Platform::Ebay).unwrap();
    assert!(ebay_result.success);
    assert_eq!(ebay_result.listing_id.as_deref(), Some("123"));
    assert_eq!(ebay_result.url.as_deref(), Some("https://mock.test/123"));

    let etsy_result = results.iter().find(|r| r.platform == Platform::Etsy).unwrap();
    assert!(!etsy_result.success);
    assert_eq!(etsy_result.error_kind, Some(ListingErrorKind::ValidationRejected));
    assert!(etsy_result.listing_id.is_none());

    let rows = h.registry.list_by_product("P1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].platform, Platform::Ebay);
    assert_eq!(rows[0].status, ListingStatus::Active);
    assert_eq!(rows[0].external_id, "123");
}

#[tokio::test]
async fn test_second_cross_list_is_idempotent() {
    let ebay = MockAdapter::new(Platform::Ebay);
    ebay.push_id("123");
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    let first = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    let second = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();

    assert_eq!(first[0].listing_id, second[0].listing_id);
    assert!(!first[0].already_listed);
    assert!(second[0].already_listed);
    assert_eq!(ebay.create_calls(), 1);
}

#[tokio::test]
async fn test_one_result_per_distinct_platform() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    // Etsy has no adapter; AuctionFlex neither. eBay is requested twice.
    let results = h
        .orchestrator
        .cross_list(
            "P1",
            &[Platform::Ebay, Platform::Etsy, Platform::Ebay, Platform::AuctionFlex],
            no_context(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(ebay.create_calls(), 1);
    for result in results.iter().filter(|r| r.platform != Platform::Ebay) {
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ListingErrorKind::Unsupported));
    }
}

#[tokio::test]
async fn test_not_connected_platform_fails_alone() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let etsy = MockAdapter::new(Platform::Etsy);
    let h = Harness::new(&[ebay.clone(), etsy.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    let results = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay, Platform::Etsy], no_context())
        .await
        .unwrap();

    let etsy_result = results.iter().find(|r| r.platform == Platform::Etsy).unwrap();
    assert_eq!(etsy_result.error_kind, Some(ListingErrorKind::NotConnected));
    assert_eq!(etsy_result.error.as_deref(), Some("Etsy is not connected"));
    assert_eq!(etsy.create_calls(), 0);
    assert!(results.iter().any(|r| r.platform == Platform::Ebay && r.success));
}

#[tokio::test]
async fn test_missing_event_is_reported_without_remote_call() {
    let auctionflex = MockAdapter::new(Platform::AuctionFlex);
    let h = Harness::new(&[auctionflex.clone()]).await;
    h.connect(Platform::AuctionFlex).await;
    h.seed_product(&auction_lot("P2")).await;

    let results = h
        .orchestrator
        .cross_list("P2", &[Platform::AuctionFlex], no_context())
        .await
        .unwrap();
    assert_eq!(results[0].error_kind, Some(ListingErrorKind::MissingPrerequisite));
    assert_eq!(auctionflex.create_calls(), 0);

    let context = CrossListContext {
        auction_event_id: Some("EV-1".into()),
    };
    let results = h
        .orchestrator
        .cross_list("P2", &[Platform::AuctionFlex], context)
        .await
        .unwrap();
    assert!(results[0].success);

    let row = h
        .registry
        .find("P2", Platform::AuctionFlex)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.external_ref.as_deref(), Some("EV-1"));
}

#[tokio::test]
async fn test_concurrent_requests_create_once() {
    let ebay = MockAdapter::new(Platform::Ebay);
    ebay.set_create_delay(Duration::from_millis(50));
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    let a = h.orchestrator.cross_list("P1", &[Platform::Ebay], no_context());
    let b = h.orchestrator.cross_list("P1", &[Platform::Ebay], no_context());
    let (a, b) = tokio::join!(a, b);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(ebay.create_calls(), 1);
    assert!(a[0].success && b[0].success);
    assert_eq!(a[0].listing_id, b[0].listing_id);
    assert!(a[0].already_listed != b[0].already_listed);
}

#[tokio::test]
async fn test_sold_product_is_not_listed() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    let mut product = silver_coin("P1");
    product.status = ProductStatus::Sold;
    h.seed_product(&product).await;

    let results = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    assert_eq!(results[0].error_kind, Some(ListingErrorKind::AlreadySold));
    assert_eq!(ebay.create_calls(), 0);
}

#[tokio::test]
async fn test_unknown_product_is_an_error() {
    let h = Harness::new(&[MockAdapter::new(Platform::Ebay)]).await;
    let err = h
        .orchestrator
        .cross_list("missing", &[Platform::Ebay], no_context())
        .await
        .unwrap_err();
    assert!(matches!(err, crosslist::Error::NotFound { .. }));
}

#[tokio::test]
async fn test_errored_listing_still_live_is_reused() {
    let ebay = MockAdapter::new(Platform::Ebay);
    ebay.push_id("123");
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    h.orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    let row = h.registry.find("P1", Platform::Ebay).await.unwrap().unwrap();
    h.registry.mark_error(&row.id, "status checks failing").await.unwrap();

    let results = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    assert!(results[0].already_listed);
    assert_eq!(results[0].listing_id.as_deref(), Some("123"));
    assert_eq!(ebay.create_calls(), 1);

    let row = h.registry.get(&row.id).await.unwrap();
    assert_eq!(row.status, ListingStatus::Active);
}

#[tokio::test]
async fn test_errored_listing_gone_remotely_is_recreated() {
    let ebay = MockAdapter::new(Platform::Ebay);
    ebay.push_id("123");
    ebay.push_id("456");
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;

    h.orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    let row = h.registry.find("P1", Platform::Ebay).await.unwrap().unwrap();
    h.registry.mark_error(&row.id, "status checks failing").await.unwrap();
    ebay.set_status("123", RemoteStatus::ended());

    let results = h
        .orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();
    assert!(results[0].success);
    assert_eq!(results[0].listing_id.as_deref(), Some("456"));
    assert_eq!(ebay.create_calls(), 2);
}

#[tokio::test]
async fn test_remove_from_platform() {
    let ebay = MockAdapter::new(Platform::Ebay);
    ebay.push_id("123");
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;
    h.orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();

    let removed = h
        .orchestrator
        .remove_from_platform("P1", Platform::Ebay)
        .await
        .unwrap();
    assert_eq!(removed.status, ListingStatus::Removed);
    assert_eq!(ebay.ended(), vec!["123".to_string()]);

    // Removing again is a no-op.
    let again = h
        .orchestrator
        .remove_from_platform("P1", Platform::Ebay)
        .await
        .unwrap();
    assert_eq!(again.status, ListingStatus::Removed);
    assert_eq!(ebay.ended().len(), 1);

    let err = h
        .orchestrator
        .remove_from_platform("P9", Platform::Ebay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ListingErrorKind::NotFound);
}

#[tokio::test]
async fn test_failed_removal_keeps_listing_active() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let h = Harness::new(&[ebay.clone()]).await;
    h.connect(Platform::Ebay).await;
    h.seed_product(&silver_coin("P1")).await;
    h.orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();

    ebay.fail_ends(Some(Scripted::Transient("503".into())));
    let err = h
        .orchestrator
        .remove_from_platform("P1", Platform::Ebay)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let row = h.registry.find("P1", Platform::Ebay).await.unwrap().unwrap();
    assert_eq!(row.status, ListingStatus::Active);
}

#[tokio::test]
async fn test_listing_views_and_connections() {
    let ebay = MockAdapter::new(Platform::Ebay);
    let etsy = MockAdapter::new(Platform::Etsy);
    let h = Harness::new(&[ebay, etsy]).await;
    h.connect(Platform::Ebay).await;
    // Connected but no adapter registered: not reported.
    h.connect(Platform::AuctionFlex).await;
    h.seed_product(&silver_coin("P1")).await;
    h.orchestrator
        .cross_list("P1", &[Platform::Ebay], no_context())
        .await
        .unwrap();

    let views = h.orchestrator.product_listings("P1").await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].status, ListingStatus::Active);

    let connected = h.orchestrator.active_connections().await.unwrap();
    assert_eq!(connected, vec![Platform::Ebay]);
    assert!(h.orchestrator.product_listings("nope").await.unwrap().is_empty());
}
