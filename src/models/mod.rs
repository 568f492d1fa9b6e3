pub mod common;
pub mod device_assignment;
pub mod reading;
pub mod vitals;
