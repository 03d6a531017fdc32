pub mod alert;
pub mod channel;
pub mod feed;
pub mod notification;
pub mod preference;

pub use alert::{AlertService, RuleRemoval};
pub use channel::ChannelService;
pub use feed::NotificationFeedService;
pub use notification::{create_sender, ChannelSender, DeliveryResult, SenderRegistry};
pub use preference::PreferenceService;
