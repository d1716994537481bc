pub mod activation;
pub mod bind_code;
pub mod client_identity;
pub mod credentials;
pub mod grant_clock;
pub mod grant_manager;
pub mod rate_card;
pub mod rate_limiter;
pub mod voucher_manager;
