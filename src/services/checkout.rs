use crate::{
    auth::CustomerContext,
    entities::{
        checkout_attempt::{self, AttemptStatus},
        order::{self, PaymentStatus},
        order_line, payment, CheckoutAttempt, OrderLine,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{GatewayError, GatewayPaymentStatus, PaymentGateway},
    services::{
        cart::CartService,
        orders::{NewOrder, NewPayment, OrderLedgerService},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Maximum absolute difference between the live cart total and the amount the
/// gateway confirms before the payment is rejected. Absorbs sub-cent rounding
/// from the minor-unit conversion, nothing more.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Payment method recorded for gateway-confirmed orders.
const METHOD_ONLINE: &str = "online";
/// Payment method recorded for the direct (pay-on-delivery) path.
const METHOD_OFFLINE: &str = "offline";

/// Orchestrates the checkout flow: cart snapshot, gateway initialize, gateway
/// verify, and the single transaction that turns a verified payment into an
/// order. The gateway's verify response is the only trusted payment signal;
/// nothing client-supplied beyond the reference enters the decision.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    cart: CartService,
    ledger: OrderLedgerService,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        cart: CartService,
        ledger: OrderLedgerService,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            cart,
            ledger,
            event_sender,
            currency,
        }
    }

    /// Starts a gateway payment for the customer's current cart. No order
    /// state is written here; the only durable artifact is the checkout
    /// attempt, recorded after the gateway accepts the transaction so a
    /// failed initialize leaves nothing behind.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn initialize_payment(
        &self,
        customer: &CustomerContext,
        email_override: Option<String>,
    ) -> Result<PaymentHandle, ServiceError> {
        let cart = self.cart.get_cart(customer.id).await?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        if cart.total <= Decimal::ZERO {
            return Err(ServiceError::InvalidTotal(cart.total));
        }

        let email = email_override.unwrap_or_else(|| customer.email.clone());
        let reference = generate_reference();

        let initialized = self
            .gateway
            .initialize_transaction(cart.total, &email, &reference)
            .await
            .map_err(|e| {
                warn!("gateway initialize failed for {}: {}", customer.id, e);
                ServiceError::GatewayInit(e.to_string())
            })?;

        let now = Utc::now();
        let attempt = checkout_attempt::ActiveModel {
            reference: Set(initialized.reference.clone()),
            customer_id: Set(customer.id),
            email: Set(email),
            expected_amount: Set(cart.total),
            currency: Set(self.currency.clone()),
            status: Set(AttemptStatus::Initiated),
            created_at: Set(now),
            updated_at: Set(now),
        };
        attempt.insert(&*self.db).await?;

        info!(
            "Checkout initiated for customer {} ({} {}, ref {})",
            customer.id, cart.total, self.currency, initialized.reference
        );
        self.event_sender
            .send_or_log(Event::CheckoutInitiated {
                customer_id: customer.id,
                reference: initialized.reference.clone(),
            })
            .await;

        Ok(PaymentHandle {
            authorization_url: initialized.authorization_url,
            access_code: initialized.access_code,
            reference: initialized.reference,
            amount: cart.total,
            currency: self.currency.clone(),
        })
    }

    /// Confirms a gateway payment and converts the cart into an order.
    /// Safe to call multiple times with the same reference: once a payment
    /// row exists for it, the call returns the original order instead of
    /// writing anything.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn verify_payment(
        &self,
        customer: &CustomerContext,
        reference: &str,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ServiceError::MissingReference);
        }

        // Idempotency short-circuit before any gateway traffic.
        if let Some(existing) = self.ledger.find_payment_by_reference(reference).await? {
            if existing.customer_id != customer.id {
                return Err(ServiceError::NotFound(format!(
                    "Payment reference {} not found",
                    reference
                )));
            }
            info!("Reference {} already processed; returning order", reference);
            return self.confirmation_for_payment(existing).await;
        }

        let attempt = CheckoutAttempt::find_by_id(reference)
            .one(&*self.db)
            .await?
            .filter(|a| a.customer_id == customer.id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment reference {} not found", reference))
            })?;

        let verified = self
            .gateway
            .verify_transaction(reference)
            .await
            .map_err(|e| match e {
                GatewayError::Declined(msg) => ServiceError::VerificationUnavailable(msg),
                other => {
                    warn!("gateway verify failed for {}: {}", reference, other);
                    ServiceError::VerificationUnavailable(other.to_string())
                }
            })?;

        if verified.status != GatewayPaymentStatus::Success {
            self.mark_attempt_rejected(&attempt).await;
            return Err(ServiceError::PaymentNotSuccessful(
                verified.status.as_str().to_string(),
            ));
        }
        if !verified.currency.eq_ignore_ascii_case(&attempt.currency) {
            warn!(
                "currency mismatch on {}: expected {}, gateway reported {}",
                reference, attempt.currency, verified.currency
            );
        }

        // Price against the cart as it stands now, not the snapshot from
        // initialization time.
        let cart = self.cart.get_cart(customer.id).await?;
        if cart.is_empty() {
            // A concurrent verify may have consumed the cart already.
            if let Some(existing) = self.ledger.find_payment_by_reference(reference).await? {
                return self.confirmation_for_payment(existing).await;
            }
            return Err(ServiceError::EmptyCart);
        }

        // The cart, not the snapshot, decides the charge; the snapshot only
        // flags that the customer edited the cart mid-checkout.
        if (cart.total - attempt.expected_amount).abs() > AMOUNT_TOLERANCE {
            warn!(
                "cart changed since initialization for {}: initialized at {}, now {}",
                reference, attempt.expected_amount, cart.total
            );
        }

        let difference = (cart.total - verified.amount).abs();
        if difference > AMOUNT_TOLERANCE {
            warn!(
                "amount mismatch on {}: cart {}, gateway {}",
                reference, cart.total, verified.amount
            );
            self.mark_attempt_rejected(&attempt).await;
            return Err(ServiceError::AmountMismatch {
                expected: cart.total,
                paid: verified.amount,
            });
        }

        let txn = self.db.begin().await?;

        let invoice_no = OrderLedgerService::generate_invoice_number();
        // Any sub-step failure in here must surface as OrderPersistence, with
        // a duplicate payment reference as the one exception (a concurrent
        // verify beat us to the write).
        let write_result: Result<(order::Model, payment::Model), ServiceError> = async {
            let order = self
                .ledger
                .insert_order(
                    &txn,
                    NewOrder {
                        customer_id: customer.id,
                        invoice_no: &invoice_no,
                        order_status: "Paid",
                        payment_status: PaymentStatus::Completed,
                        total_amount: cart.total,
                        currency: &attempt.currency,
                    },
                )
                .await?;
            self.ledger
                .insert_order_lines(&txn, order.id, &cart.lines)
                .await?;
            let payment = self
                .ledger
                .record_payment(
                    &txn,
                    NewPayment {
                        order_id: order.id,
                        customer_id: customer.id,
                        amount: verified.amount,
                        currency: &attempt.currency,
                        method: METHOD_ONLINE,
                        transaction_reference: reference,
                        authorization_code: verified.authorization_code.as_deref(),
                        channel: verified.channel.as_deref(),
                    },
                )
                .await?;

            let mut attempt_update: checkout_attempt::ActiveModel = attempt.into();
            attempt_update.status = Set(AttemptStatus::Completed);
            attempt_update.updated_at = Set(Utc::now());
            attempt_update.update(&txn).await?;

            Ok((order, payment))
        }
        .await;

        let (order, payment) = match write_result {
            Ok(pair) => pair,
            Err(ServiceError::DuplicateReference(_)) => {
                // Lost the race to a concurrent verify. Drop our half-built
                // order and hand back the one that won.
                txn.rollback().await?;
                let existing = self
                    .ledger
                    .find_payment_by_reference(reference)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::OrderPersistence(format!(
                            "reference {} reported duplicate but no payment found",
                            reference
                        ))
                    })?;
                return self.confirmation_for_payment(existing).await;
            }
            Err(e) => {
                txn.rollback().await?;
                error!("order write failed for {}: {}", reference, e);
                return Err(ServiceError::OrderPersistence(e.to_string()));
            }
        };

        txn.commit()
            .await
            .map_err(|e| ServiceError::OrderPersistence(e.to_string()))?;

        info!(
            "Order {} ({}) created for customer {}, payment ref {}",
            order.id, invoice_no, customer.id, reference
        );
        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                order_id: order.id,
                reference: reference.to_string(),
            })
            .await;

        // The order is committed; a cart that refuses to clear must not fail
        // the checkout. Flag it so the client can reconcile.
        let cart_cleared = match self.cart.empty_cart(customer.id).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "cart cleanup failed for customer {} after order {}: {}",
                    customer.id, order.id, e
                );
                false
            }
        };

        Ok(CheckoutConfirmation {
            order_id: order.id,
            invoice_no,
            order_date: order.order_date,
            total_amount: order.total_amount,
            currency: order.currency,
            items_count: cart.lines.len() as u64,
            payment_reference: payment.transaction_reference,
            payment_method: payment.method,
            already_processed: false,
            cart_cleared,
        })
    }

    /// Creates an order directly from the cart without any gateway traffic.
    /// Payment is recorded as offline and the order stays pending until it is
    /// settled out of band.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn direct_checkout(
        &self,
        customer: &CustomerContext,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let cart = self.cart.get_cart(customer.id).await?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        if cart.total <= Decimal::ZERO {
            return Err(ServiceError::InvalidTotal(cart.total));
        }

        let reference = format!("DIRECT-{}", Uuid::new_v4().simple());
        let invoice_no = OrderLedgerService::generate_invoice_number();

        let txn = self.db.begin().await?;
        let write_result: Result<(order::Model, payment::Model), ServiceError> = async {
            let order = self
                .ledger
                .insert_order(
                    &txn,
                    NewOrder {
                        customer_id: customer.id,
                        invoice_no: &invoice_no,
                        order_status: "Pending",
                        payment_status: PaymentStatus::Pending,
                        total_amount: cart.total,
                        currency: &self.currency,
                    },
                )
                .await?;
            self.ledger
                .insert_order_lines(&txn, order.id, &cart.lines)
                .await?;
            let payment = self
                .ledger
                .record_payment(
                    &txn,
                    NewPayment {
                        order_id: order.id,
                        customer_id: customer.id,
                        amount: cart.total,
                        currency: &self.currency,
                        method: METHOD_OFFLINE,
                        transaction_reference: &reference,
                        authorization_code: None,
                        channel: Some(METHOD_OFFLINE),
                    },
                )
                .await?;
            Ok((order, payment))
        }
        .await;

        let (order, payment) = match write_result {
            Ok(pair) => pair,
            Err(e) => {
                txn.rollback().await?;
                error!("order write failed for {}: {}", reference, e);
                return Err(ServiceError::OrderPersistence(e.to_string()));
            }
        };
        txn.commit()
            .await
            .map_err(|e| ServiceError::OrderPersistence(e.to_string()))?;

        info!(
            "Direct order {} ({}) created for customer {}",
            order.id, invoice_no, customer.id
        );
        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;

        let cart_cleared = match self.cart.empty_cart(customer.id).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "cart cleanup failed for customer {} after order {}: {}",
                    customer.id, order.id, e
                );
                false
            }
        };

        Ok(CheckoutConfirmation {
            order_id: order.id,
            invoice_no,
            order_date: order.order_date,
            total_amount: order.total_amount,
            currency: order.currency,
            items_count: cart.lines.len() as u64,
            payment_reference: payment.transaction_reference,
            payment_method: payment.method,
            already_processed: false,
            cart_cleared,
        })
    }

    /// Builds the confirmation for a payment that already exists, used by
    /// both the idempotency short-circuit and duplicate-race resolution.
    async fn confirmation_for_payment(
        &self,
        payment: payment::Model,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let order = self.ledger.get_order(payment.order_id).await?;
        let items_count = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order.id))
            .count(&*self.db)
            .await?;
        // Report the cart as it stands now; the original verify may have
        // failed to clear it, or the customer may have refilled it since.
        let cart_cleared = self.cart.item_count(payment.customer_id).await? == 0;

        Ok(CheckoutConfirmation {
            order_id: order.id,
            invoice_no: order.invoice_no,
            order_date: order.order_date,
            total_amount: order.total_amount,
            currency: order.currency,
            items_count,
            payment_reference: payment.transaction_reference,
            payment_method: payment.method,
            already_processed: true,
            cart_cleared,
        })
    }

    /// Best-effort status update on the attempt; the caller's error is the
    /// one that matters.
    async fn mark_attempt_rejected(&self, attempt: &checkout_attempt::Model) {
        let mut active: checkout_attempt::ActiveModel = attempt.clone().into();
        active.status = Set(AttemptStatus::Rejected);
        active.updated_at = Set(Utc::now());
        if let Err(e) = active.update(&*self.db).await {
            warn!(
                "could not mark attempt {} rejected: {}",
                attempt.reference, e
            );
        }
    }
}

fn generate_reference() -> String {
    format!("PAY-{}", Uuid::new_v4().simple())
}

/// Handle returned by payment initialization: everything the client needs to
/// complete the gateway redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Result of a successful (or already-finished) checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfirmation {
    pub order_id: Uuid,
    pub invoice_no: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub currency: String,
    pub items_count: u64,
    pub payment_reference: String,
    pub payment_method: String,
    /// True when this reference was verified before and the original order is
    /// being returned instead of a new one.
    pub already_processed: bool,
    /// False when the customer's cart still holds lines: either the
    /// post-commit clear failed, or the cart was refilled before a repeat
    /// verification.
    pub cart_cleared: bool,
}
