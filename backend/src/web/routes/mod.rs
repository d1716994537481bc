pub mod activation_routes;
pub mod grant_routes;
pub mod router_routes;
pub mod voucher_routes;
