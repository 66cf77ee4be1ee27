//! Capability providers for the Gatling operator
//!
//! - [`storage`]: object storage backends, as storage addresses and the
//!   rclone shell bodies that move results and reports
//! - [`notification`]: backends that announce a finished run
//!
//! Providers are closed enums resolved from the names users put in the
//! Gatling spec.

pub mod notification;
pub mod storage;

pub use notification::{NotificationProvider, NotifyError};
pub use storage::StorageProvider;
