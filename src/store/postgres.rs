//! PostgreSQL store built on diesel-async.
//!
//! Placement locks every listing it touches with `SELECT ... FOR UPDATE`
//! (products, then bundles, each by id) before checking stock, so
//! concurrent placements on the same listing queue behind each other. The
//! order row is inserted inside a savepoint: a clash on the unique
//! confirmation code index rolls back only that insert and is retried.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, pooled_connection::bb8::Pool};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::{
    domain::{
        confirmation::{self, MAX_CODE_ATTEMPTS},
        discovery::{Merchant, NewMerchant},
        errors::{ListingError, OrderError, StorageError},
        listing::{self, Bundle, Listing, ListingRef, NewBundle, NewProduct, Product},
        order::{CancellationPolicy, NewOrder, Order, OrderStatus},
        placement,
    },
    models::{
        BundleEntity, BundleItemEntity, BundlePriceChangeset, CreateBundleEntity,
        CreateMerchantEntity, CreateOrderEntity, CreateOrderItemEntity, CreateProductEntity,
        MerchantEntity, OrderEntity, OrderItemEntity, ProductEntity, ProductPriceChangeset,
    },
    schema::{bundle_items, bundles, merchants, order_items, orders, products},
    store::{MarketplaceStore, StatusChange},
};

pub type DbPool = Pool<AsyncPgConnection>;

const CONFIRMATION_CODE_INDEX: &str = "index_orders_on_confirmation_code";

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    codes: Arc<Mutex<StdRng>>,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_code_rng(pool, StdRng::from_entropy())
    }

    /// Draws confirmation codes from `rng`, e.g. a seeded one for reproducible codes.
    pub fn with_code_rng(pool: DbPool, rng: StdRng) -> Self {
        Self {
            pool,
            codes: Arc::new(Mutex::new(rng)),
        }
    }
}

fn draw_code(codes: &Mutex<StdRng>, prefix: &str) -> String {
    confirmation::random_code(prefix, &mut *codes.lock())
}

fn pool_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Pool(err.to_string())
}

fn split_refs<'a>(refs: impl IntoIterator<Item = &'a ListingRef>) -> (Vec<i64>, Vec<i64>) {
    let mut product_ids = Vec::new();
    let mut bundle_ids = Vec::new();
    for listing in refs {
        match listing {
            ListingRef::Product(id) => product_ids.push(*id),
            ListingRef::Bundle(id) => bundle_ids.push(*id),
        }
    }
    (product_ids, bundle_ids)
}

async fn load_bundles(
    conn: &mut AsyncPgConnection,
    entities: Vec<BundleEntity>,
) -> Result<Vec<Bundle>, StorageError> {
    let ids: Vec<i64> = entities.iter().map(|bundle| bundle.id).collect();

    let items: Vec<BundleItemEntity> = bundle_items::table
        .filter(bundle_items::bundle_id.eq_any(&ids))
        .select(BundleItemEntity::as_select())
        .load(conn)
        .await?;

    let mut group: HashMap<i64, Vec<BundleItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.bundle_id).or_default().push(item);
    }

    Ok(entities
        .into_iter()
        .map(|bundle| {
            let items = group.remove(&bundle.id).unwrap_or_default();
            bundle.into_bundle(items)
        })
        .collect())
}

async fn load_orders(
    conn: &mut AsyncPgConnection,
    entities: Vec<OrderEntity>,
) -> Result<Vec<Order>, StorageError> {
    let ids: Vec<i64> = entities.iter().map(|order| order.id).collect();

    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&ids))
        .order_by(order_items::id)
        .select(OrderItemEntity::as_select())
        .load(conn)
        .await?;

    let mut group: HashMap<i64, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(item);
    }

    entities
        .into_iter()
        .map(|order| {
            let items = group.remove(&order.id).unwrap_or_default();
            order.into_order(items)
        })
        .collect()
}

/// Reads and row-locks the listings of a placement.
async fn lock_listings(
    conn: &mut AsyncPgConnection,
    lines: &[(ListingRef, i32)],
) -> Result<HashMap<ListingRef, Listing>, OrderError> {
    let (product_ids, bundle_ids) = split_refs(lines.iter().map(|(listing, _)| listing));
    let mut stock = HashMap::with_capacity(lines.len());

    if !product_ids.is_empty() {
        let locked: Vec<ProductEntity> = products::table
            .filter(products::id.eq_any(&product_ids))
            .order_by(products::id)
            .select(ProductEntity::as_select())
            .for_update()
            .load(conn)
            .await?;

        for entity in locked {
            let listing = Product::try_from(entity)?.to_listing();
            stock.insert(listing.listing, listing);
        }
    }

    if !bundle_ids.is_empty() {
        let locked: Vec<BundleEntity> = bundles::table
            .filter(bundles::id.eq_any(&bundle_ids))
            .order_by(bundles::id)
            .select(BundleEntity::as_select())
            .for_update()
            .load(conn)
            .await?;

        for entity in locked {
            let listing = entity.into_bundle(Vec::new()).to_listing();
            stock.insert(listing.listing, listing);
        }
    }

    Ok(stock)
}

/// Adds `delta` to a listing's available quantity.
async fn adjust_quantity(
    conn: &mut AsyncPgConnection,
    listing: ListingRef,
    delta: i32,
    now: DateTime<Utc>,
) -> Result<usize, DieselError> {
    match listing {
        ListingRef::Product(id) => {
            diesel::update(products::table.find(id))
                .set((
                    products::available_quantity.eq(products::available_quantity + delta),
                    products::updated_at.eq(now),
                ))
                .execute(conn)
                .await
        }
        ListingRef::Bundle(id) => {
            diesel::update(bundles::table.find(id))
                .set((
                    bundles::available_quantity.eq(bundles::available_quantity + delta),
                    bundles::updated_at.eq(now),
                ))
                .execute(conn)
                .await
        }
    }
}

/// Inserts the order row, drawing a fresh code whenever the unique index rejects one.
async fn insert_order(
    conn: &mut AsyncPgConnection,
    codes: &Mutex<StdRng>,
    merchant_name: &str,
    mut row: CreateOrderEntity,
) -> Result<OrderEntity, OrderError> {
    let prefix = confirmation::code_prefix(merchant_name);

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        row.confirmation_code = draw_code(codes, &prefix);
        let candidate = row.clone();

        let inserted = conn
            .transaction::<_, DieselError, _>(move |conn| {
                Box::pin(async move {
                    diesel::insert_into(orders::table)
                        .values(candidate)
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                })
            })
            .await;

        match inserted {
            Ok(order) => return Ok(order),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info))
                if info.constraint_name() == Some(CONFIRMATION_CODE_INDEX) =>
            {
                debug!(attempt, code = %row.confirmation_code, "confirmation code collision");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(OrderError::CodeGenerationExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn list_merchants(&self) -> Result<Vec<Merchant>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let merchants: Vec<MerchantEntity> = merchants::table
            .order_by(merchants::id)
            .select(MerchantEntity::as_select())
            .load(conn)
            .await?;

        Ok(merchants.into_iter().map(Merchant::from).collect())
    }

    async fn get_merchant(&self, id: i64) -> Result<Option<Merchant>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let merchant: Option<MerchantEntity> = merchants::table
            .find(id)
            .select(MerchantEntity::as_select())
            .get_result(conn)
            .await
            .optional()?;

        Ok(merchant.map(Merchant::from))
    }

    async fn available_products(&self, now: DateTime<Utc>) -> Result<Vec<Product>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let products: Vec<ProductEntity> = products::table
            .filter(products::available_quantity.gt(0))
            .filter(products::expires_at.gt(now))
            .order_by(products::expires_at)
            .select(ProductEntity::as_select())
            .load(conn)
            .await?;

        products.into_iter().map(Product::try_from).collect()
    }

    async fn available_bundles(&self, now: DateTime<Utc>) -> Result<Vec<Bundle>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let bundles: Vec<BundleEntity> = bundles::table
            .filter(bundles::available_quantity.gt(0))
            .filter(bundles::expires_at.gt(now))
            .order_by(bundles::expires_at)
            .select(BundleEntity::as_select())
            .load(conn)
            .await?;

        load_bundles(conn, bundles).await
    }

    async fn get_listings(&self, refs: &[ListingRef]) -> Result<Vec<Listing>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;
        let (product_ids, bundle_ids) = split_refs(refs);

        let found_products: Vec<ProductEntity> = products::table
            .filter(products::id.eq_any(&product_ids))
            .select(ProductEntity::as_select())
            .load(conn)
            .await?;
        let found_bundles: Vec<BundleEntity> = bundles::table
            .filter(bundles::id.eq_any(&bundle_ids))
            .select(BundleEntity::as_select())
            .load(conn)
            .await?;

        let mut by_ref: HashMap<ListingRef, Listing> = HashMap::new();
        for entity in found_products {
            let listing = Product::try_from(entity)?.to_listing();
            by_ref.insert(listing.listing, listing);
        }
        for entity in found_bundles {
            let listing = entity.into_bundle(Vec::new()).to_listing();
            by_ref.insert(listing.listing, listing);
        }

        Ok(refs.iter().filter_map(|listing| by_ref.remove(listing)).collect())
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let created: MerchantEntity = diesel::insert_into(merchants::table)
            .values(CreateMerchantEntity {
                name: merchant.name,
                address: merchant.address,
                latitude: merchant.location.latitude,
                longitude: merchant.location.longitude,
                pickup_instructions: merchant.pickup_instructions,
            })
            .returning(MerchantEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(created.into())
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, ListingError> {
        product.validate(now)?;
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let merchant_exists: i64 = merchants::table
            .find(product.merchant_id)
            .count()
            .get_result(conn)
            .await?;
        if merchant_exists == 0 {
            return Err(ListingError::MerchantNotFound(product.merchant_id));
        }

        let created: ProductEntity = diesel::insert_into(products::table)
            .values(CreateProductEntity {
                merchant_id: product.merchant_id,
                name: product.name,
                description: product.description,
                category: product.category,
                original_price: product.original_price,
                discounted_price: product.discounted_price,
                available_quantity: product.available_quantity,
                allergens: Value::from(product.allergens),
                dietary_tags: Value::from(product.dietary_tags),
                expires_at: product.expires_at,
            })
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(Product::try_from(created)?)
    }

    async fn create_bundle(
        &self,
        bundle: NewBundle,
        now: DateTime<Utc>,
    ) -> Result<Bundle, ListingError> {
        bundle.validate(now)?;
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        conn.transaction::<_, ListingError, _>(move |conn| {
            Box::pin(async move {
                let merchant_exists: i64 = merchants::table
                    .find(bundle.merchant_id)
                    .count()
                    .get_result(conn)
                    .await?;
                if merchant_exists == 0 {
                    return Err(ListingError::MerchantNotFound(bundle.merchant_id));
                }

                let product_ids: Vec<i64> =
                    bundle.items.iter().map(|item| item.product_id).collect();
                let owned: Vec<i64> = products::table
                    .filter(products::id.eq_any(&product_ids))
                    .filter(products::merchant_id.eq(bundle.merchant_id))
                    .select(products::id)
                    .load(conn)
                    .await?;
                if let Some(foreign) = product_ids.iter().find(|id| !owned.contains(*id)) {
                    return Err(ListingError::ForeignBundleItem {
                        product_id: *foreign,
                        merchant_id: bundle.merchant_id,
                    });
                }

                let created: BundleEntity = diesel::insert_into(bundles::table)
                    .values(CreateBundleEntity {
                        merchant_id: bundle.merchant_id,
                        name: bundle.name,
                        description: bundle.description,
                        total_original_price: bundle.total_original_price,
                        bundle_price: bundle.bundle_price,
                        available_quantity: bundle.available_quantity,
                        expires_at: bundle.expires_at,
                    })
                    .returning(BundleEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let items: Vec<BundleItemEntity> = bundle
                    .items
                    .iter()
                    .zip(0..)
                    .map(|(item, position)| BundleItemEntity {
                        bundle_id: created.id,
                        product_id: item.product_id,
                        position,
                        quantity: item.quantity,
                    })
                    .collect();

                let items = diesel::insert_into(bundle_items::table)
                    .values(items)
                    .returning(BundleItemEntity::as_returning())
                    .get_results(conn)
                    .await?;

                Ok(created.into_bundle(items))
            })
        })
        .await
    }

    async fn reprice_listing(
        &self,
        listing: ListingRef,
        original_price: Decimal,
        discounted_price: Decimal,
    ) -> Result<Listing, ListingError> {
        listing::validate_prices(original_price, discounted_price)?;
        let conn = &mut self.pool.get().await.map_err(pool_error)?;
        let now = Utc::now();

        let updated = match listing {
            ListingRef::Product(id) => diesel::update(products::table.find(id))
                .set(ProductPriceChangeset {
                    original_price,
                    discounted_price,
                    updated_at: now,
                })
                .returning(ProductEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .map(Product::try_from)
                .transpose()?
                .map(|product| product.to_listing()),
            ListingRef::Bundle(id) => diesel::update(bundles::table.find(id))
                .set(BundlePriceChangeset {
                    total_original_price: original_price,
                    bundle_price: discounted_price,
                    updated_at: now,
                })
                .returning(BundleEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .map(|bundle: BundleEntity| bundle.into_bundle(Vec::new()).to_listing()),
        };

        updated.ok_or(ListingError::NotFound(listing))
    }

    async fn place_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let lines = placement::check_request(&order)?;
        let codes = Arc::clone(&self.codes);
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        conn.transaction::<_, OrderError, _>(move |conn| {
            Box::pin(async move {
                let merchant: MerchantEntity = merchants::table
                    .find(order.merchant_id)
                    .select(MerchantEntity::as_select())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(OrderError::MerchantNotFound(order.merchant_id))?;

                let stock = lock_listings(conn, &lines).await?;
                let reservation = placement::reserve(&order, &stock, now)?;

                for item in &reservation.items {
                    adjust_quantity(conn, item.listing, -item.quantity, now).await?;
                }

                let placed = insert_order(
                    conn,
                    &codes,
                    &merchant.name,
                    CreateOrderEntity {
                        customer_id: order.customer_id,
                        merchant_id: order.merchant_id,
                        status: OrderStatus::Pending.as_str().into(),
                        confirmation_code: String::new(),
                        total_amount: reservation.total_amount,
                        pickup_window_start: reservation.pickup_window.start(),
                        pickup_window_end: reservation.pickup_window.end(),
                        special_instructions: order.note,
                        created_at: now,
                        updated_at: now,
                    },
                )
                .await?;

                let items: Vec<CreateOrderItemEntity> = reservation
                    .items
                    .into_iter()
                    .map(|item| CreateOrderItemEntity {
                        order_id: placed.id,
                        item_type: item.listing.kind().as_str().into(),
                        item_id: item.listing.id(),
                        name: item.name,
                        quantity: item.quantity,
                        price_at_purchase: item.unit_price,
                    })
                    .collect();

                let items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                    .values(items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await?;

                Ok(placed.into_order(items)?)
            })
        })
        .await
    }

    async fn update_order_status(
        &self,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        conn.transaction::<_, OrderError, _>(move |conn| {
            Box::pin(async move {
                let entity: OrderEntity = orders::table
                    .find(change.order_id)
                    .filter(orders::merchant_id.eq(change.merchant_id))
                    .select(OrderEntity::as_select())
                    .for_update()
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(OrderError::OrderNotFound(change.order_id))?;

                let mut order = load_orders(conn, vec![entity])
                    .await?
                    .pop()
                    .ok_or(OrderError::OrderNotFound(change.order_id))?;

                change.transitions.check(order.status, change.status)?;
                order.apply_status(change.status, now);

                diesel::update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(order.status.as_str()),
                        orders::picked_up_at.eq(order.picked_up_at),
                        orders::updated_at.eq(order.updated_at),
                    ))
                    .execute(conn)
                    .await?;

                if change.status == OrderStatus::Cancelled
                    && change.cancellation == CancellationPolicy::RestoreInventory
                {
                    for item in &order.items {
                        adjust_quantity(conn, item.listing, item.quantity, now).await?;
                    }
                }

                Ok(order)
            })
        })
        .await
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let order: Option<OrderEntity> = orders::table
            .find(id)
            .select(OrderEntity::as_select())
            .get_result(conn)
            .await
            .optional()?;

        match order {
            Some(order) => Ok(load_orders(conn, vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn customer_orders(&self, customer_id: i64) -> Result<Vec<Order>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let orders: Vec<OrderEntity> = orders::table
            .filter(orders::customer_id.eq(customer_id))
            .order_by((orders::updated_at.desc(), orders::id.desc()))
            .select(OrderEntity::as_select())
            .load(conn)
            .await?;

        load_orders(conn, orders).await
    }

    async fn merchant_orders(&self, merchant_id: i64) -> Result<Vec<Order>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let orders: Vec<OrderEntity> = orders::table
            .filter(orders::merchant_id.eq(merchant_id))
            .order_by((orders::updated_at.desc(), orders::id.desc()))
            .select(OrderEntity::as_select())
            .load(conn)
            .await?;

        load_orders(conn, orders).await
    }
}
