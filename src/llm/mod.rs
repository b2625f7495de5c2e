// Vision model captioning

pub mod anthropic;
pub mod caption;

pub use anthropic::AnthropicAdapter;
pub use caption::{CaptionConfig, CaptionGenerator};
