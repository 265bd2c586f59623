//! MSI-X interrupt topology (§4.8).
//!
//! Vectors are assigned in a fixed order: mailbox, user, error, then one per
//! Rx queue. The vector count is therefore `non_queue_vectors + num_queues`,
//! with a device-enforced minimum of `non_queue_vectors + 1` (every device
//! needs at least one queue vector to make progress).

use super::regs::{QdmaRegs, err_intr};

/// Fixed non-queue vectors every function reserves ahead of its queue
/// vectors: mailbox, user interrupt, error.
pub const NON_QUEUE_VECTORS: u16 = 3;

/// What a given MSI-X vector index is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorAssignment {
    /// Mailbox (function-to-function / PF-to-VF) interrupt.
    Mailbox,
    /// User-logic interrupt (application-defined).
    User,
    /// Aggregated error interrupt.
    Error,
    /// Per-Rx-queue completion interrupt.
    Queue(u16),
}

/// Returns the total number of MSI-X vectors needed for `num_queues` Rx
/// queues, or `None` if `num_queues` is zero (the device requires at least
/// one queue vector).
#[must_use]
pub const fn vectors_required(num_queues: u16) -> Option<u16> {
    if num_queues == 0 {
        None
    } else {
        Some(NON_QUEUE_VECTORS + num_queues)
    }
}

/// Resolves what MSI-X vector `index` is assigned to, given the fixed
/// mailbox/user/error/queue ordering.
#[must_use]
pub const fn assignment_for(index: u16) -> VectorAssignment {
    match index {
        0 => VectorAssignment::Mailbox,
        1 => VectorAssignment::User,
        2 => VectorAssignment::Error,
        n => VectorAssignment::Queue(n - NON_QUEUE_VECTORS),
    }
}

/// Programs the global error-interrupt register to arm vector `vector` for
/// function `func`.
///
/// # Safety
/// The BAR backing `regs` must be mapped and `vector` must be a valid,
/// allocated MSI-X vector index for this function.
pub unsafe fn arm_error_interrupt(regs: &QdmaRegs, func: u8, vector: u16) {
    let word = u32::from(func) | (u32::from(vector) << err_intr::VEC_SHIFT) | err_intr::ARM;
    regs.set_glbl_interrupt_cfg(word);
}

/// Tears down the error interrupt, leaving `func` programmed but disarmed.
///
/// # Safety
/// The BAR backing `regs` must be mapped.
pub unsafe fn disarm_error_interrupt(regs: &QdmaRegs, func: u8) {
    regs.set_glbl_interrupt_cfg(u32::from(func));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_count_matches_non_queue_plus_queues() {
        assert_eq!(vectors_required(1), Some(4));
        assert_eq!(vectors_required(8), Some(11));
    }

    #[test]
    fn zero_queues_is_rejected() {
        assert_eq!(vectors_required(0), None);
    }

    #[test]
    fn fixed_assignment_order_is_mailbox_user_error_then_queues() {
        assert_eq!(assignment_for(0), VectorAssignment::Mailbox);
        assert_eq!(assignment_for(1), VectorAssignment::User);
        assert_eq!(assignment_for(2), VectorAssignment::Error);
        assert_eq!(assignment_for(3), VectorAssignment::Queue(0));
        assert_eq!(assignment_for(10), VectorAssignment::Queue(7));
    }
}
