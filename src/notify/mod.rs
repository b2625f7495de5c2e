// Run status notifications

pub mod telegram;

pub use telegram::{TelegramNotifier, TELEGRAM_API_BASE};
