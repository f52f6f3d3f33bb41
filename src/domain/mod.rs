pub mod errors;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod ports;
