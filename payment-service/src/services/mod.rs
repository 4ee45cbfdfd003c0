pub mod database;
pub mod factory;
pub mod gateway;
pub mod metrics;
pub mod razorpay;
pub mod store;
pub mod stripe;

pub use database::Database;
pub use factory::{GatewaySettings, PaymentGatewayFactory, RazorpayGateway, StripeGateway};
pub use gateway::{Gateway, PaymentGateway, ProviderApi};
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use store::{InMemoryPaymentStore, PaymentStore};
pub use stripe::StripeClient;
