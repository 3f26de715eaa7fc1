//! Sandbox execution bridge.
//!
//! Executes generated source inside an isolated context and proxies model
//! calls issued from within it back to the host by correlation id. Renders
//! are totally ordered; a superseded render abandons itself silently.

pub mod bridge;
pub mod host;
pub mod protocol;
pub mod proxy;
pub mod render;
pub mod shell;

pub use bridge::SandboxBridge;
pub use host::{ExecutionHost, InProcessHost};
pub use protocol::{RpcMessage, StreamPayload};
pub use proxy::SandboxModelProxy;
pub use render::{RenderRequest, RenderScheduler, RenderStatus, SETTLE_DELAY};
