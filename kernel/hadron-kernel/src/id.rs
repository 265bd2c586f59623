//! Type-safe identifiers for kernel resources.
//!
//! The logical identifiers ([`Pid`], [`CpuId`], [`Fd`], [`IrqVector`]) are
//! defined in `hadron-core` for host testability and re-exported here.
//! [`HwIrqVector`] is kernel-local: it names a raw hardware interrupt
//! vector number as programmed into the IDT, distinct from the logical
//! [`IrqVector`] handed out to drivers.

pub use hadron_core::id::{CpuId, Fd, IrqVector, Pid};

/// Raw hardware interrupt vector number (IDT slot 0-255).
pub type HwIrqVector = u8;
