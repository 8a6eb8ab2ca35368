/// Telegram 訊息格式
pub mod telegram;
