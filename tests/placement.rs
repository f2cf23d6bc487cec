mod common;

use std::collections::HashSet;

use chrono::Utc;
use futures::future::join_all;
use rescue_orderservice::domain::{
    errors::OrderError,
    listing::ListingRef,
    order::{NewOrder, OrderLine},
};
use rust_decimal::Decimal;
use testresult::TestResult;

use common::{Fixture, new_order};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 3).await?;
    let listing = ListingRef::Product(product.id);

    let handles = (1..=2).map(|customer_id| {
        let marketplace = fixture.marketplace.clone();
        tokio::spawn(async move {
            marketplace
                .place_order(new_order(customer_id, merchant.id, &[(listing, 2)]), Utc::now())
                .await
        })
    });
    let results = join_all(handles).await;

    let mut placed = 0;
    for result in results {
        match result? {
            Ok(_) => placed += 1,
            Err(OrderError::InsufficientInventory {
                requested, available, ..
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(fixture.quantity(listing).await?, 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_is_conserved_under_contention() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 10).await?;
    let listing = ListingRef::Product(product.id);

    let handles = (1..=25).map(|customer_id| {
        let marketplace = fixture.marketplace.clone();
        tokio::spawn(async move {
            marketplace
                .place_order(new_order(customer_id, merchant.id, &[(listing, 1)]), Utc::now())
                .await
        })
    });

    let mut reserved = 0;
    for result in join_all(handles).await {
        if let Ok(order) = result? {
            reserved += order.items.iter().map(|item| item.quantity).sum::<i32>();
        }
    }

    assert_eq!(reserved, 10);
    assert_eq!(fixture.quantity(listing).await?, 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn confirmation_codes_are_unique() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Green Grocer").await?;
    let product = fixture.product(merchant.id, 100, 500).await?;
    let listing = ListingRef::Product(product.id);

    let handles = (1..=60).map(|customer_id| {
        let marketplace = fixture.marketplace.clone();
        tokio::spawn(async move {
            marketplace
                .place_order(new_order(customer_id, merchant.id, &[(listing, 1)]), Utc::now())
                .await
        })
    });

    let mut codes = HashSet::new();
    for result in join_all(handles).await {
        let order = result??;
        assert!(order.confirmation_code.starts_with("GR"));
        assert_eq!(order.confirmation_code.len(), 6);
        assert!(codes.insert(order.confirmation_code));
    }

    assert_eq!(codes.len(), 60);

    Ok(())
}

#[tokio::test]
async fn failed_line_leaves_every_listing_untouched() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let plenty = fixture.product(merchant.id, 250, 5).await?;
    let scarce = fixture.product(merchant.id, 300, 1).await?;

    let result = fixture
        .marketplace
        .place_order(
            new_order(
                7,
                merchant.id,
                &[
                    (ListingRef::Product(plenty.id), 2),
                    (ListingRef::Product(scarce.id), 2),
                ],
            ),
            Utc::now(),
        )
        .await;

    assert!(matches!(
        result,
        Err(OrderError::InsufficientInventory { .. })
    ));
    assert_eq!(fixture.quantity(ListingRef::Product(plenty.id)).await?, 5);
    assert_eq!(fixture.quantity(ListingRef::Product(scarce.id)).await?, 1);
    assert!(fixture.marketplace.customer_orders(7).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn listings_of_another_merchant_are_rejected() -> TestResult {
    let fixture = Fixture::new();
    let bakery = fixture.merchant("Corner Bakery").await?;
    let grocer = fixture.merchant("Green Grocer").await?;
    let foreign = fixture.product(grocer.id, 250, 5).await?;

    let result = fixture
        .marketplace
        .place_order(
            new_order(7, bakery.id, &[(ListingRef::Product(foreign.id), 1)]),
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(OrderError::OwnershipMismatch { .. })));
    assert_eq!(fixture.quantity(ListingRef::Product(foreign.id)).await?, 5);

    Ok(())
}

#[tokio::test]
async fn order_prices_survive_a_reprice() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 5).await?;
    let listing = ListingRef::Product(product.id);

    let order = fixture
        .marketplace
        .place_order(new_order(7, merchant.id, &[(listing, 2)]), Utc::now())
        .await?;
    fixture
        .marketplace
        .reprice_listing(merchant.id, listing, Decimal::new(600, 2), Decimal::new(100, 2))
        .await?;

    let stored = fixture.marketplace.customer_order(7, order.id).await?;

    assert_eq!(stored.items[0].unit_price, Decimal::new(250, 2));
    assert_eq!(stored.total_amount, Decimal::new(500, 2));

    Ok(())
}

#[tokio::test]
async fn bundles_and_products_mix_in_one_order() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 5).await?;
    let bundle = fixture.bundle(merchant.id, product.id, 2).await?;

    let order = fixture
        .marketplace
        .place_order(
            new_order(
                7,
                merchant.id,
                &[
                    (ListingRef::Product(product.id), 1),
                    (ListingRef::Bundle(bundle.id), 2),
                ],
            ),
            Utc::now(),
        )
        .await?;

    assert_eq!(order.total_amount, Decimal::new(1248, 2));
    assert_eq!(order.items.len(), 2);
    assert_eq!(fixture.quantity(ListingRef::Bundle(bundle.id)).await?, 0);

    Ok(())
}

#[tokio::test]
async fn repeated_lines_are_checked_together() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 3).await?;
    let listing = ListingRef::Product(product.id);

    let (start, end) = common::window(Utc::now());
    let order = NewOrder {
        customer_id: 7,
        merchant_id: merchant.id,
        pickup_window_start: start,
        pickup_window_end: end,
        note: Some("ring the bell".into()),
        lines: vec![
            OrderLine {
                listing,
                quantity: 2,
            },
            OrderLine {
                listing,
                quantity: 2,
            },
        ],
    };

    let result = fixture.marketplace.place_order(order, Utc::now()).await;

    assert!(matches!(
        result,
        Err(OrderError::InsufficientInventory {
            requested: 4,
            available: 3,
            ..
        })
    ));
    assert_eq!(fixture.quantity(listing).await?, 3);

    Ok(())
}

#[tokio::test]
async fn inverted_pickup_window_is_rejected() -> TestResult {
    let fixture = Fixture::new();
    let merchant = fixture.merchant("Corner Bakery").await?;
    let product = fixture.product(merchant.id, 250, 3).await?;

    let mut order = new_order(7, merchant.id, &[(ListingRef::Product(product.id), 1)]);
    std::mem::swap(&mut order.pickup_window_start, &mut order.pickup_window_end);

    let result = fixture.marketplace.place_order(order, Utc::now()).await;

    assert!(matches!(result, Err(OrderError::InvalidPickupWindow)));
    assert_eq!(fixture.quantity(ListingRef::Product(product.id)).await?, 3);

    Ok(())
}

#[tokio::test]
async fn pickup_window_is_checked_before_the_merchant() -> TestResult {
    let fixture = Fixture::new();

    let mut order = new_order(7, 999, &[(ListingRef::Product(1), 1)]);
    std::mem::swap(&mut order.pickup_window_start, &mut order.pickup_window_end);

    let result = fixture.marketplace.place_order(order, Utc::now()).await;

    assert!(matches!(result, Err(OrderError::InvalidPickupWindow)));

    Ok(())
}
