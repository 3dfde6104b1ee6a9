pub mod box_client;
pub mod http_client;
pub mod slack_notifier;

pub use box_client::BoxFileStore;
pub use http_client::build_client;
pub use slack_notifier::SlackNotifier;
