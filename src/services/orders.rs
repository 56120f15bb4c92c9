use crate::{
    entities::{
        order::{self, DeliveryStatus, PaymentStatus},
        order_line, payment, Order, OrderLine, Payment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::PricedCartLine,
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Durable record of orders, order lines, and payments. Append-mostly; the
/// only mutation after creation is the admin-driven delivery-status
/// transition. Write operations take `&impl ConnectionTrait` so the checkout
/// orchestrator can run them inside a single transaction.
#[derive(Clone)]
pub struct OrderLedgerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderLedgerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Generates an invoice number unique at write time: UTC second timestamp
    /// plus a random suffix, backed by the unique index on
    /// `orders.invoice_no`. A collision fails the insert as a retryable
    /// conflict rather than silently overwriting.
    pub fn generate_invoice_number() -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
        format!("INV-{}-{:04}", Utc::now().format("%Y%m%d%H%M%S"), suffix)
    }

    /// Inserts the order row. Step one of the atomic order write.
    pub async fn insert_order(
        &self,
        conn: &impl ConnectionTrait,
        input: NewOrder<'_>,
    ) -> Result<order::Model, ServiceError> {
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_no: Set(input.invoice_no.to_string()),
            customer_id: Set(input.customer_id),
            order_status: Set(input.order_status.to_string()),
            payment_status: Set(input.payment_status),
            delivery_status: Set(DeliveryStatus::Pending),
            total_amount: Set(input.total_amount),
            currency: Set(input.currency.to_string()),
            order_date: Set(Utc::now()),
            tracking_number: Set(None),
            delivery_notes: Set(None),
            shipped_date: Set(None),
            delivered_date: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        order
            .insert(conn)
            .await
            .map_err(|e| map_unique_violation(e, "invoice number already taken"))
    }

    /// Inserts one line per cart line. Caller must roll the surrounding
    /// transaction back on failure so an order is never visible without its
    /// lines.
    pub async fn insert_order_lines(
        &self,
        conn: &impl ConnectionTrait,
        order_id: Uuid,
        lines: &[PricedCartLine],
    ) -> Result<(), ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "an order must contain at least one line".to_string(),
            ));
        }

        for line in lines {
            let row = order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_title: Set(line.product_title.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.line_total),
                created_at: Set(Utc::now()),
            };
            row.insert(conn).await?;
        }
        Ok(())
    }

    /// Records the payment for an order. The unique index on
    /// `transaction_reference` is the real idempotency guard; a duplicate
    /// insert fails with [`ServiceError::DuplicateReference`] and must never
    /// silently succeed.
    pub async fn record_payment(
        &self,
        conn: &impl ConnectionTrait,
        input: NewPayment<'_>,
    ) -> Result<payment::Model, ServiceError> {
        // Preflight for a friendlier error; the constraint still closes the
        // race between this check and the insert.
        let existing = Payment::find()
            .filter(payment::Column::TransactionReference.eq(input.transaction_reference))
            .one(conn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateReference(
                input.transaction_reference.to_string(),
            ));
        }

        let row = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(input.order_id),
            customer_id: Set(input.customer_id),
            amount: Set(input.amount),
            currency: Set(input.currency.to_string()),
            payment_date: Set(Utc::now()),
            method: Set(input.method.to_string()),
            transaction_reference: Set(input.transaction_reference.to_string()),
            authorization_code: Set(input.authorization_code.map(str::to_string)),
            channel: Set(input.channel.map(str::to_string)),
            created_at: Set(Utc::now()),
        };

        row.insert(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::DuplicateReference(input.transaction_reference.to_string())
            } else {
                ServiceError::DatabaseError(e)
            }
        })
    }

    /// Finds the payment recorded for a gateway reference, if any. Used for
    /// the idempotency short-circuit on duplicate verification calls.
    pub async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::TransactionReference.eq(reference))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_with_lines(
        &self,
        order_id: Uuid,
    ) -> Result<OrderWithLines, ServiceError> {
        let order = self.get_order(order_id).await?;
        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        let payment = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        Ok(OrderWithLines {
            order,
            lines,
            payment,
        })
    }

    /// Lists the customer's orders, newest first.
    pub async fn list_orders_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::OrderDate)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Admin-driven fulfillment transition. Validates against the transition
    /// table and stamps shipped/delivered dates.
    #[instrument(skip(self))]
    pub async fn update_delivery_status(
        &self,
        order_id: Uuid,
        next: DeliveryStatus,
        tracking_number: Option<String>,
        delivery_notes: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = current.delivery_status;
        if !old_status.can_transition_to(next) {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot move delivery status from {} to {}",
                old_status.as_str(),
                next.as_str()
            )));
        }

        let now = Utc::now();
        let mut active: order::ActiveModel = current.into();
        active.delivery_status = Set(next);
        active.updated_at = Set(Some(now));
        if let Some(tracking) = tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        if let Some(notes) = delivery_notes {
            active.delivery_notes = Set(Some(notes));
        }
        match next {
            DeliveryStatus::Shipped => active.shipped_date = Set(Some(now)),
            DeliveryStatus::Delivered => active.delivered_date = Set(Some(now)),
            _ => {}
        }

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Order {} delivery status: {} -> {}",
            order_id,
            old_status.as_str(),
            next.as_str()
        );
        self.event_sender
            .send_or_log(Event::DeliveryStatusChanged {
                order_id,
                old_status: old_status.as_str().to_string(),
                new_status: next.as_str().to_string(),
            })
            .await;

        Ok(updated)
    }
}

/// Inputs for the order insert, borrowed from the orchestrator's state.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub customer_id: Uuid,
    pub invoice_no: &'a str,
    pub order_status: &'a str,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub currency: &'a str,
}

#[derive(Debug)]
pub struct NewPayment<'a> {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: &'a str,
    pub method: &'a str,
    pub transaction_reference: &'a str,
    pub authorization_code: Option<&'a str>,
    pub channel: Option<&'a str>,
}

/// An order joined with its lines and payment record.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderWithLines {
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
    pub payment: Option<payment::Model>,
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.contains("unique") || text.contains("duplicate key")
}

fn map_unique_violation(err: sea_orm::DbErr, context: &str) -> ServiceError {
    if is_unique_violation(&err) {
        warn!("unique violation: {}", context);
        ServiceError::Conflict(context.to_string())
    } else {
        ServiceError::DatabaseError(err)
    }
}
