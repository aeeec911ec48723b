//! Shared newtype wrappers.

mod contact;
mod id;
mod money;

pub use contact::{Email, EmailError, Phone, PhoneError};
pub use id::{
    CertificateCode, CityId, LineKey, MethodId, OrderId, ProductId, PvzCode, UserId, VariantId,
};
pub use money::Money;
