//! Domain models and request/response payloads

pub mod audit;
pub mod authorization_code;
pub mod notification;
pub mod property;

pub use audit::{AdminCommandRequest, AuditEntry, NewAuditEntry};
pub use authorization_code::{
    AuthorizationCode, CodeRequest, IssueCodeRequest, NewAuthorizationCode, ValidationResponse,
};
pub use notification::Notification;
pub use property::{Owner, Property};
