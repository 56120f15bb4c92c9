pub mod cart_line;
pub mod checkout_attempt;
pub mod order;
pub mod order_line;
pub mod payment;
pub mod product;

pub use cart_line::Entity as CartLine;
pub use checkout_attempt::Entity as CheckoutAttempt;
pub use order::Entity as Order;
pub use order_line::Entity as OrderLine;
pub use payment::Entity as Payment;
pub use product::Entity as Product;

pub use cart_line::Model as CartLineModel;
pub use checkout_attempt::Model as CheckoutAttemptModel;
pub use order::Model as OrderModel;
pub use order_line::Model as OrderLineModel;
pub use payment::Model as PaymentModel;
pub use product::Model as ProductModel;
