//! Host library for TUP haptic devices.
//!
//! tup drives actuator devices over a serial link: it builds and parses
//! protocol messages, frames them on the wire, and runs the transport
//! context that correlates responses and dispatches device notifications.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial TTY and Unix socket links, line configuration
//! - [`message`]: Frame envelope, typed message builders and parsers
//! - [`context`]: Transport context, request correlation, observer dispatch
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use tup::context::Context;
//! use tup::message::Message;
//! use tup::transport::SerialConfig;
//!
//! let mut ctx = Context::new();
//! ctx.open("/dev/ttyACM0")?;
//! ctx.set_config(SerialConfig::default())?;
//!
//! let mut msg = Message::new();
//! msg.init_load(0, 4);
//! ctx.command(&msg, Duration::from_secs(1))?;
//! msg.init_play(0);
//! ctx.command(&msg, Duration::from_secs(1))?;
//! # Ok::<(), tup::context::ContextError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use tup_transport::*;
}

/// Re-export message codec types.
pub mod message {
    pub use tup_message::*;
}

/// Re-export transport context types.
pub mod context {
    pub use tup_context::*;
}
