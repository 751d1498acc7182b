#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod capture;
pub mod control;
pub mod design_parameters;
pub mod dump;
pub mod engine;
pub mod event_bus;
pub mod frequency;
pub mod hardware;
pub mod pipeline;
pub mod processing;
pub mod sampler;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod sweep;
pub mod time;

pub use vna_dsp::Complex;

/// Timing and resource failures reported up through the measurement stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Capture did not complete before its deadline")]
    HardwareTimeout,
    #[error("Resource held by another role past its timeout")]
    ResourceBusy,
    #[error("Event pool or queue exhausted")]
    QueueExhausted,
    #[error("No free scheduler slot fits the request")]
    NoFreeSlot,
    #[error("Task launch failed")]
    LaunchFailed,
}
