pub mod channel;
pub mod content;
pub mod fetch;
pub mod path;
pub mod provider;
