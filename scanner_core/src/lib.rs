#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Film transport synchronization and scan orchestration engine.
//!
//! The engine advances 8mm film one frame at a time by running a stepper
//! against a Hall-effect frame sensor, and orchestrates capture, save and
//! notification around those advances. Hardware is abstracted behind the
//! traits in `scanner_traits`; everything here works the same against the
//! simulated devices in `scanner_hardware`.

pub mod builder;
pub mod conversions;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod liveview;
pub mod mocks;
pub mod motor;
pub mod ramp;
pub mod saver;
pub mod scanner;
pub mod sensor;
mod session;
pub mod session_log;
pub mod transport;

pub use builder::{BuildError, ScannerBuilder};
pub use error::{Result, ScannerError};
pub use events::{
    CallbackEvent, CallbackList, ScanEndInfo, ScannerCallback, ScannerState, StateBroadcaster,
    StateUpdate,
};
pub use liveview::{LiveViewFeed, LiveViewHandle};
pub use scanner::{LiveViewCfg, ScanCfg, Scanner, StopHandle};
pub use sensor::AdvanceOutcome;
pub use transport::{RecoveryCfg, TransportCfg};
