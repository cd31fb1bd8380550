/*!
Module containing basic connector and inventory traits

Connectors are raw sources of physical memory. Besides [`PhysicalMemory`](crate::mem::PhysicalMemory)
a connector can optionally expose the cpu state of the target.
*/

pub mod cpu_state;
#[doc(hidden)]
pub use cpu_state::{ConnectorCpuStateInner, CpuState};
