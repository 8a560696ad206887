use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::invoicing::{self, StatusKind};
use crate::models::{NewPayment, Product};
use crate::orders::workflow::{create_order, get_order, list_by_user, undo_order_creation, update_order};
use crate::store::{MemoryStore, Store};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn items(pairs: &[(i64, i32)]) -> BTreeMap<i64, i32> {
    pairs.iter().copied().collect()
}

async fn setup(stock: i32) -> (MemoryStore, Uuid, Product) {
    let store = MemoryStore::new();
    let user = store.add_user("buyer@example.com", Some("Lan Nguyen")).await;
    let product = store.add_product("Espresso beans", dec("12.50"), stock).await;
    (store, user.id, product)
}

/// Stock 5, two orders of 3: the first succeeds, the second fails and
/// leaves no trace.
#[tokio::test]
async fn test_second_order_exceeding_stock_fails_atomically() {
    let (store, user_id, product) = setup(5).await;

    let order = create_order(&store, user_id, &items(&[(product.id, 3)]), None)
        .await
        .expect("First order should succeed");
    assert_eq!(order.total, dec("37.50"));
    assert_eq!(order.status_name, "pending");
    assert_eq!(store.product(product.id).await.unwrap().quantity, 2);

    let requests = store.invoice_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].order_id, order.id);
    assert_eq!(requests[0].status_id, StatusKind::Pending.id());

    let err = create_order(&store, user_id, &items(&[(product.id, 3)]), None)
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock { product, requested, available, .. } => {
            assert_eq!(product, "Espresso beans");
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("Expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(store.product(product.id).await.unwrap().quantity, 2);
    assert_eq!(store.orders().await.len(), 1);
    assert_eq!(store.invoice_requests().await.len(), 1);
}

#[tokio::test]
async fn test_failure_on_later_line_keeps_earlier_reservations_back() {
    let (store, user_id, plenty) = setup(10).await;
    let scarce = store.add_product("Grinder", dec("80.00"), 1).await;

    let err = create_order(&store, user_id, &items(&[(plenty.id, 4), (scarce.id, 2)]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(store.product(plenty.id).await.unwrap().quantity, 10);
    assert_eq!(store.product(scarce.id).await.unwrap().quantity, 1);
    assert!(store.orders().await.is_empty());
    assert!(store.order_details().await.is_empty());
}

#[tokio::test]
async fn test_total_is_exact_sum_of_snapshots() {
    let (store, user_id, beans) = setup(10).await;
    let filter = store.add_product("Paper filter", dec("0.10"), 100).await;

    let order = create_order(&store, user_id, &items(&[(beans.id, 2), (filter.id, 3)]), None)
        .await
        .unwrap();

    assert_eq!(order.total, dec("25.30"));
    assert_eq!(order.order_details.len(), 2);
    let sum: Decimal = order.order_details.iter().map(|d| d.subtotal).sum();
    assert_eq!(sum, order.total);
    for detail in &order.order_details {
        assert_eq!(detail.subtotal, detail.price * Decimal::from(detail.quantity));
    }

    // Later price changes do not touch the snapshot.
    let mut repriced = store.product(filter.id).await.unwrap();
    repriced.price = dec("0.25");
    store.put_product(repriced).await;

    let reloaded = get_order(&store, order.id).await.unwrap();
    assert_eq!(reloaded.total, dec("25.30"));
    let filter_line = reloaded
        .order_details
        .iter()
        .find(|d| d.product_id == filter.id)
        .unwrap();
    assert_eq!(filter_line.price, dec("0.10"));
}

#[tokio::test]
async fn test_create_order_validation() {
    let (store, user_id, product) = setup(5).await;

    assert!(matches!(
        create_order(&store, user_id, &BTreeMap::new(), None).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        create_order(&store, user_id, &items(&[(product.id, 0)]), None).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        create_order(&store, Uuid::new_v4(), &items(&[(product.id, 1)]), None).await,
        Err(AppError::NotFound { entity: "user", .. })
    ));
    assert!(matches!(
        create_order(&store, user_id, &items(&[(product.id, 1)]), Some(42)).await,
        Err(AppError::NotFound { entity: "status", .. })
    ));
    assert!(matches!(
        create_order(&store, user_id, &items(&[(9999, 1)]), None).await,
        Err(AppError::NotFound { entity: "product", .. })
    ));
    assert_eq!(store.product(product.id).await.unwrap().quantity, 5);
}

#[tokio::test]
async fn test_undo_restores_stock_and_removes_everything() {
    let (store, user_id, product) = setup(5).await;
    let order = create_order(&store, user_id, &items(&[(product.id, 3)]), None)
        .await
        .unwrap();

    undo_order_creation(&store, order.id).await.expect("Undo should succeed");

    assert_eq!(store.product(product.id).await.unwrap().quantity, 5);
    assert!(store.orders().await.is_empty());
    assert!(store.order_details().await.is_empty());
    assert!(store.invoice_requests().await.is_empty());

    assert!(matches!(
        undo_order_creation(&store, order.id).await,
        Err(AppError::NotFound { entity: "order", .. })
    ));
}

#[tokio::test]
async fn test_undo_refused_after_review_or_payment() {
    let (store, user_id, product) = setup(10).await;

    let accepted = create_order(&store, user_id, &items(&[(product.id, 1)]), None)
        .await
        .unwrap();
    let request_id = store
        .invoice_requests()
        .await
        .into_iter()
        .find(|r| r.order_id == accepted.id)
        .unwrap()
        .id;
    invoicing::accept(&store, request_id).await.unwrap();

    assert!(matches!(
        undo_order_creation(&store, accepted.id).await,
        Err(AppError::InvalidTransition { action: "undo", .. })
    ));

    let paid = create_order(&store, user_id, &items(&[(product.id, 2)]), None)
        .await
        .unwrap();
    let mut uow = store.begin().await.unwrap();
    uow.insert_payment(&NewPayment {
        order_id: paid.id,
        paid_at: chrono::Utc::now(),
        amount: paid.total,
        payment_method: None,
        gateway_txn_ref: "14226112".to_string(),
    })
    .await
    .unwrap();
    uow.commit().await.unwrap();

    assert!(matches!(
        undo_order_creation(&store, paid.id).await,
        Err(AppError::InvalidTransition { .. })
    ));
    assert_eq!(store.product(product.id).await.unwrap().quantity, 7);
}

#[tokio::test]
async fn test_update_order_is_permissive() {
    let (store, user_id, product) = setup(5).await;
    let order = create_order(&store, user_id, &items(&[(product.id, 1)]), None)
        .await
        .unwrap();

    update_order(&store, order.id, StatusKind::Processing.id()).await.unwrap();
    update_order(&store, order.id, StatusKind::Pending.id()).await.unwrap();
    assert_eq!(get_order(&store, order.id).await.unwrap().status_id, StatusKind::Pending.id());

    assert!(matches!(
        update_order(&store, order.id, 77).await,
        Err(AppError::NotFound { entity: "status", .. })
    ));
    assert!(matches!(
        update_order(&store, 9999, 1).await,
        Err(AppError::NotFound { entity: "order", .. })
    ));
}

#[tokio::test]
async fn test_list_by_user() {
    let (store, user_id, product) = setup(5).await;
    let other = store.add_user("other@example.com", None).await;

    create_order(&store, user_id, &items(&[(product.id, 1)]), None).await.unwrap();
    create_order(&store, other.id, &items(&[(product.id, 1)]), None).await.unwrap();
    create_order(&store, user_id, &items(&[(product.id, 1)]), None).await.unwrap();

    let mine = list_by_user(&store, user_id).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|o| o.created_by == user_id));
    assert!(mine.iter().all(|o| o.order_details.len() == 1));
}

/// Ten buyers race for the last four units: exactly four orders go
/// through and the stock ends at zero.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_never_oversell() {
    let (store, user_id, product) = setup(4).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            let items = items(&[(product.id, 1)]);
            tokio::spawn(async move { create_order(&store, user_id, &items, None).await })
        })
        .collect();

    let mut placed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(AppError::InsufficientStock { .. }) => refused += 1,
            Err(other) => panic!("Unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 4);
    assert_eq!(refused, 6);
    assert_eq!(store.product(product.id).await.unwrap().quantity, 0);
    assert_eq!(store.orders().await.len(), 4);
    assert_eq!(store.invoice_requests().await.len(), 4);
}
