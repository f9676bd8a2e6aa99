mod inventory;
mod metrics;
mod notification;
mod readers;
mod root;
mod tags;

pub use inventory::inventory;
pub use metrics::get_metrics;
pub use notification::{
    notification_events, notification_status, start_notification, stop_notification,
};
pub use readers::list_readers;
pub use root::{root, test};
pub use tags::{analyze, clear, edit, initialize, secure, unsecure};
