pub mod clock;
pub mod pidfile;
pub mod telemetry;

pub use clock::*;
pub use pidfile::*;
pub use telemetry::*;
