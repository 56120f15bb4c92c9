use crate::{
    entities::{cart_line, product, CartLine, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Cart store: per-customer line items priced live from the catalog.
///
/// Writes are best-effort single statements with no locking; concurrent
/// updates to the same (customer, product) line are last-write-wins, which is
/// acceptable for a single customer driving their own cart from one browser.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the customer's cart, incrementing the existing line
    /// if one is already present (capped at [`MAX_LINE_QUANTITY`]).
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddToCartInput,
        source_ip: Option<String>,
    ) -> Result<CartView, ServiceError> {
        validate_quantity(input.quantity)?;

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let existing = CartLine::find()
            .filter(cart_line::Column::CustomerId.eq(customer_id))
            .filter(cart_line::Column::ProductId.eq(input.product_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(line) => {
                let quantity = (line.quantity + input.quantity).min(MAX_LINE_QUANTITY);
                let mut line: cart_line::ActiveModel = line.into();
                line.quantity = Set(quantity);
                line.updated_at = Set(Utc::now());
                line.update(&*self.db).await?;
            }
            None => {
                let line = cart_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    product_id: Set(input.product_id),
                    quantity: Set(input.quantity),
                    source_ip: Set(source_ip),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                line.insert(&*self.db).await?;
            }
        }

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                customer_id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added to cart for {}: product {} ({}) x{}",
            customer_id, input.product_id, product.title, input.quantity
        );
        self.get_cart(customer_id).await
    }

    /// Sets the quantity on an existing line. Quantity 0 removes the line and
    /// is reported back as [`CartUpdate::Removed`] rather than a generic
    /// success.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartUpdate, ServiceError> {
        if quantity == 0 {
            self.remove_item(customer_id, product_id).await?;
            return Ok(CartUpdate::Removed(self.get_cart(customer_id).await?));
        }
        validate_quantity(quantity)?;

        let line = CartLine::find()
            .filter(cart_line::Column::CustomerId.eq(customer_id))
            .filter(cart_line::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No cart line for product {}", product_id))
            })?;

        let mut line: cart_line::ActiveModel = line.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        line.update(&*self.db).await?;

        Ok(CartUpdate::Updated(self.get_cart(customer_id).await?))
    }

    /// Removes one line. Removing an absent line is not an error.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        CartLine::delete_many()
            .filter(cart_line::Column::CustomerId.eq(customer_id))
            .filter(cart_line::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartLineRemoved {
                customer_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// Deletes every line for the customer. Idempotent: emptying an already
    /// empty cart succeeds.
    #[instrument(skip(self))]
    pub async fn empty_cart(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        CartLine::delete_many()
            .filter(cart_line::Column::CustomerId.eq(customer_id))
            .exec(&*self.db)
            .await?;
        self.event_sender
            .send_or_log(Event::CartCleared(customer_id))
            .await;
        info!("Emptied cart for customer {}", customer_id);
        Ok(())
    }

    /// Reads the cart with live catalog pricing. Lines whose product has been
    /// deleted or deactivated since they were added are filtered out with a
    /// warning; they never contribute to totals or checkout.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let rows: Vec<(cart_line::Model, Option<product::Model>)> = CartLine::find()
            .filter(cart_line::Column::CustomerId.eq(customer_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (line, product) in rows {
            match product.filter(|p| p.is_active) {
                Some(product) => {
                    let line_total = product.price * Decimal::from(line.quantity);
                    lines.push(PricedCartLine {
                        product_id: product.id,
                        product_title: product.title,
                        category: product.category,
                        brand: product.brand,
                        image_url: product.image_url,
                        quantity: line.quantity,
                        unit_price: product.price,
                        line_total,
                    });
                }
                None => {
                    warn!(
                        customer_id = %customer_id,
                        product_id = %line.product_id,
                        "cart line references a missing or inactive product; skipping"
                    );
                }
            }
        }

        let total = lines.iter().map(|l| l.line_total).sum();
        Ok(CartView { lines, total })
    }

    /// Cart total from live prices; the amount the checkout flow charges.
    pub async fn get_total(&self, customer_id: Uuid) -> Result<Decimal, ServiceError> {
        Ok(self.get_cart(customer_id).await?.total)
    }

    /// Number of distinct lines, for badge display.
    pub async fn item_count(&self, customer_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self.get_cart(customer_id).await?.lines.len() as u64)
    }
}

fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ServiceError::ValidationError(format!(
            "Quantity must be between 1 and {}, got {}",
            MAX_LINE_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// One cart line joined with live catalog data
#[derive(Debug, Clone, Serialize)]
pub struct PricedCartLine {
    pub product_id: Uuid,
    pub product_title: String,
    pub category: String,
    pub brand: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// The customer's cart as priced at this instant
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedCartLine>,
    pub total: Decimal,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }
}

/// Outcome of a quantity update; zero quantities report removal explicitly.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CartUpdate {
    Updated(CartView),
    Removed(CartView),
}
