pub mod cart;
pub mod checkout;
pub mod orders;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use orders::OrderLedgerService;
