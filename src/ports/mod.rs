pub mod file_system;
pub mod process;
pub mod webhook;

pub use file_system::{FileSystem, FileSystemError, FileSystemResult};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, ProcessResult};
pub use webhook::{WebhookClient, WebhookError, WebhookResult};
