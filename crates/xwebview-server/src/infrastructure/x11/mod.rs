//! X11 adapters, all on `x11rb`.
//!
//! Each adapter opens its own connection: blocking event waits on the
//! capture connection never delay pixel or input requests.

pub mod capture;
pub mod display;
pub mod xtest;

pub use capture::DamageWatcher;
pub use display::X11Display;
pub use xtest::XTestInjector;
