pub mod interactive;
pub mod silent;

pub use interactive::{CompletionReply, InteractiveChannel};
pub use silent::SilentChannel;
