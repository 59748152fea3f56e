//! Domain model: orders, the accrual service vocabulary, and the ports the engine talks through.

pub mod accrual;
pub mod order;
pub mod ports;
