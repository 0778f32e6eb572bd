pub mod cart;
pub mod checkout;
pub mod models;
pub mod references;
pub mod service;
pub mod settlement;
pub mod store;

#[cfg(test)]
pub(crate) mod fakes;

pub use cart::{CartLine, CartReview, CartValidator, LineRejection, LineVerdict};
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService};
pub use models::{
    CustomerDetails, InvoiceDetails, ItemStatus, Order, OrderItem, OrderStatus, PaymentRecord,
};
pub use service::{OrderService, OrderView};
pub use settlement::{SettlementOutcome, SettlementReconciler};
pub use store::{CheckoutTx, OrderStore, SettlementTx};
