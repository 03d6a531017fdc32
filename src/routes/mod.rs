pub mod alerts;
pub mod channels;
pub mod events;
pub mod health;
pub mod notifications;
pub mod preferences;
