//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod demo;
pub mod finance_info;
pub mod logging;
pub mod migration;
pub mod reconcile;
mod user;

pub use demo::{demo_user, users_db_filename, DemoService, DEMO_USER_ID};
pub use finance_info::{
    FinanceInfoOutcome, FinanceInfoRequest, FinanceInfoService, HttpResponse, ResponseBody,
};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use reconcile::reconcile_cursors;
pub use user::UserService;
