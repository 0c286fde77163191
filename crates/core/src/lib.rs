pub mod audit;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod leave;
pub mod request_context;

pub use audit::{AuditEvent, AuditSink, BoundaryEvent, InMemoryAuditSink};
pub use catalog::{PolicyCatalog, PolicyProvider};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot,
    CircuitState,
};
pub use directory::{
    DirectoryError, EmployeeDirectory, InMemoryEmployeeDirectory, ResilientDirectory,
};
pub use domain::employee::{EmployeeId, EmployeeRecord};
pub use domain::policy::{BlackoutPeriod, Country, LeavePolicy};
pub use errors::{ApplicationError, InterfaceError};
pub use leave::{
    Clock, EligibilityDecision, FixedClock, Ineligibility, LeavePolicyEngine, LeaveSummary,
    LeaveToolError, PolicyLookup, SystemClock,
};
pub use request_context::RequestContext;
