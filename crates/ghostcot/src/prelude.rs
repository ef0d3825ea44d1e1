//! Convenience re-exports for common `ghostcot` types.
//!
//! ```ignore
//! use ghostcot::prelude::*;
//! ```
//!
//! Covers the wrapper, its configuration, messages, and output fragments.
//! The SSE decoder and the raw splitter adapters stay in their modules.

pub use crate::api::{OpenAiClient, TransportError};
pub use crate::config::{ConfigError, CotConfig};
pub use crate::splitter::{Channel, OutputFragment, SplitResult, TagSplitter, split_complete};
pub use crate::transport::{ChatTransport, CotChat, CotCompletion};
pub use crate::{Message, MessageRole};
