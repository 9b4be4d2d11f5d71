pub mod account_routes;
pub mod api_routes;
pub mod channel_routes;
pub mod outlet_routes;
