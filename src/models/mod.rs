pub mod alert;
pub mod channel;
pub mod condition;
pub mod context;
pub mod job;
pub mod market;
pub mod notification;
pub mod preference;

pub use alert::{
    AlertRecipient, AlertRule, AlertRuleResponse, ChannelKind, CreateAlertRule, ExtraRecipient,
    RecipientInput, RecipientType, TestAlertPayload, UpdateAlertRule,
};
pub use channel::{
    EmailConfig, NotificationChannel, PushConfig, SmsConfig, UpdateNotificationChannel,
    WebhookConfig,
};
pub use condition::{window_end, AlertCondition, CompareOp};
pub use context::{format_amount, AlertContext};
pub use job::{AlertJob, EnqueueOptions, JobStatus, QueueBacklog, QueuedJob};
pub use market::{MarketDeadline, MarketTreasury, UserContact};
pub use notification::{FeedQuery, MarkedRead, NewNotification, Notification, UnreadCount};
pub use preference::{DigestFrequency, UpsertPreferences, UserNotificationPreference};
