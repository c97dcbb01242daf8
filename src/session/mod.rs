// Session module - metering lifecycle and tick scheduling
//
// 1. controller: Standby/Recording state machine producing MeterReadings
// 2. driver: runs the controller from an external periodic trigger

pub mod controller;
pub mod driver;

pub use controller::{MeterReading, SessionController, SessionState};
pub use driver::{
    DriverExit, IntervalTrigger, ManualTicker, ManualTrigger, MeterDriver, StopHandle, TickTrigger,
};
