use crate::services::{CartService, CheckoutService, OrderLedgerService};

pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payments;

/// Service handles shared by all request handlers. Cloning is cheap; each
/// service holds `Arc`s internally.
#[derive(Clone)]
pub struct AppServices {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderLedgerService,
}
