//! Application layer: the accrual reconciliation engine.
//!
//! `AccrualEngine` is the entry point. Submitted orders go through the `AdmissionController`,
//! which runs each accrual lookup on its own task within a fixed budget and spills the excess
//! into a small overflow pool or back to the periodic sweep. The `StatusReconciler` turns a
//! lookup into an order-store write, and the `InFlightTracker` keeps the sweep from
//! re-dispatching orders that are already being worked on.

pub mod admission;
pub mod engine;
pub mod in_flight;
pub mod overflow;
pub mod reconciler;
