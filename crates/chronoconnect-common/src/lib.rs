pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{AppError, ConfigError};
pub use id::new_id;
pub use notifications::{Notification, NotificationLevel, NotificationQueue};

pub type Result<T> = std::result::Result<T, AppError>;
