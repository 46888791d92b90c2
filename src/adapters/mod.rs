pub mod api_handler;
pub mod health_handler;
pub mod home_client;
pub mod metrics_handler;
