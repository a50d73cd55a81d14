pub mod accounts;
pub mod billing;
pub mod citation;
pub mod desk;
pub mod domain;
pub mod entitlement;
pub mod history;
pub mod ports;
pub mod pricing;
pub mod query;
pub mod store;

pub use accounts::{AccountError, Accounts};
pub use billing::{Billing, BillingError, PendingOrder};
pub use citation::{CitationLink, LinkedResult, Segment};
pub use desk::{Delivered, DeskError, QuotaStatus, ResearchDesk};
pub use domain::{
    AuthSession, CitedWork, QueryResult, ReferenceRecord, Section, SubscriptionTier, UserAccount,
    UserCredentials, UNLIMITED,
};
pub use ports::{
    Clock, KeyValueStore, PaymentGateway, PortError, PortResult, ResearchRequest, ResearchService,
    SystemClock,
};
pub use pricing::PlanId;
pub use query::{QueryError, QueryErrorKind, QueryResponse};
pub use store::Repository;
