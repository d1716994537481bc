pub mod router_auth;
