//! SeaORM entities mapping to the billing tables.
//!
//! Each entity lives in its own module; the prelude re-exports them under
//! short names for services and route handlers.

pub mod license;
pub mod portable_grant;
pub mod router;
pub mod sale_event;
pub mod session;
pub mod voucher;

pub mod prelude {
    pub use super::license::Entity as License;
    pub use super::license::Model as LicenseModel;
    pub use super::license::ActiveModel as LicenseActiveModel;
    pub use super::license::Column as LicenseColumn;

    pub use super::portable_grant::Entity as PortableGrant;
    pub use super::portable_grant::Model as PortableGrantModel;
    pub use super::portable_grant::ActiveModel as PortableGrantActiveModel;
    pub use super::portable_grant::Column as PortableGrantColumn;

    pub use super::router::Entity as Router;
    pub use super::router::Model as RouterModel;
    pub use super::router::ActiveModel as RouterActiveModel;
    pub use super::router::Column as RouterColumn;

    pub use super::sale_event::Entity as SaleEvent;
    pub use super::sale_event::Model as SaleEventModel;
    pub use super::sale_event::ActiveModel as SaleEventActiveModel;
    pub use super::sale_event::Column as SaleEventColumn;

    pub use super::session::Entity as Session;
    pub use super::session::Model as SessionModel;
    pub use super::session::ActiveModel as SessionActiveModel;
    pub use super::session::Column as SessionColumn;

    pub use super::voucher::Entity as Voucher;
    pub use super::voucher::Model as VoucherModel;
    pub use super::voucher::ActiveModel as VoucherActiveModel;
    pub use super::voucher::Column as VoucherColumn;
}
