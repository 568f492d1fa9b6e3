pub mod auto_connect;
pub mod scanner;
pub mod session;

pub use auto_connect::{AutoConnect, AutoConnectOptions};
pub use scanner::{CharacteristicReading, DeviceScanner, DiscoveredDevice, DiscoveryError};
pub use session::{ConnectionSession, ConnectionState};
