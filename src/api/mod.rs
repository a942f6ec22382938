pub mod client;
pub mod models;

pub use client::{ApiClient, ApiError, ApplyReport};
pub use models::{
    AssociationLink, AuditEntry, ContactKind, ContactRecord, OrgKind, OrgRecord, Person,
};
