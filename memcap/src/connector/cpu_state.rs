//! Describes optional cpu state for a connector

use crate::error::Result;

/// Optional cpu state capability of a connector.
pub trait ConnectorCpuStateInner: Send {
    type CpuStateType<'a>: CpuState + 'a
    where
        Self: 'a;
    type IntoCpuStateType: CpuState + Clone + 'static;

    fn cpu_state(&mut self) -> Result<Self::CpuStateType<'_>>;
    fn into_cpu_state(self) -> Result<Self::IntoCpuStateType>
    where
        Self: Sized;
}

pub trait CpuState: Send {
    // TODO: register access and single stepping once a connector can serve them
    fn pause(&mut self);
    fn resume(&mut self);
}
