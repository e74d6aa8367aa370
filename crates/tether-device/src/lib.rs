//! The gateway in front of the USB/network device link:
//! lifecycle, pairing record discovery, JIT debugger attachment and
//! app/profile installation pass-throughs.

pub mod gateway;
pub mod link;
pub mod pairing;

pub use gateway::{DeviceError, JitEvent, JitGateway, JitTarget, LinkStatus};
pub use link::{DeviceLink, LinkError};
