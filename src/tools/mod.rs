// ABOUTME: Supported CLI tools: their capability records and non-interactive prompt invocation
// Each tool is a closed variant dispatched by lookup, never loaded dynamically

pub mod capability;
pub mod error;
pub mod invoke;

pub use capability::{shell_quote, ResumeSyntax, ToolCapability, ToolKind};
pub use error::InvocationError;
pub use invoke::{PromptCommand, PromptInvoker};
