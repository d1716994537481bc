//! Data access for the billing tables.
//!
//! Every function is generic over `ConnectionTrait` so callers can run it on
//! the pool or inside a transaction. Business rules live in `crate::services`;
//! this layer only knows how rows are read and conditionally written.

pub mod grant_service;
pub mod license_service;
pub mod router_service;
pub mod sale_service;
pub mod session_service;
pub mod voucher_service;

pub use grant_service::*;
pub use license_service::*;
pub use router_service::*;
pub use sale_service::*;
pub use session_service::*;
pub use voucher_service::*;
