pub mod fs;
pub mod reasoning;
pub mod shell;
pub mod tools;

pub use fs::LocalFs;
pub use reasoning::HttpReasoning;
pub use shell::HostShell;
pub use tools::{BuiltinTools, CURRENT_TIME_TOOL};
