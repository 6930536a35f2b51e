//! Architecture boundary: context fabrication and switching, local
//! interrupt control, CPU identity and reschedule IPIs.
//!
//! The scheduling core never touches hardware directly; a platform crate
//! implements [`Arch`] for its CPU and wires the timer interrupt to the
//! kernel's tick entry points. Saved contexts are opaque to the core: they
//! live inside the owning thread's stack and are only ever handled as raw
//! pointers, the way the dispatcher hands them to `context_switch`.

/// CPU identifier type.
pub type CpuId = usize;

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations involve direct hardware manipulation and inline
/// assembly. All methods marked as unsafe have specific preconditions that
/// must be upheld by the caller.
pub trait Arch: 'static {
    /// Fabricate a resumable context at `stack_top`, returning the context
    /// pointer (which points into the stack).
    ///
    /// When first switched to, the context must begin execution at `entry`
    /// with `arg` as its single argument.
    ///
    /// # Safety
    ///
    /// - `stack_top` must be the highest address of a live, exclusively
    ///   owned stack region large enough for the fabricated frame
    /// - `entry` must be the address of a `fn(usize)` that never returns
    unsafe fn init_stack(stack_top: *mut u8, entry: usize, arg: usize) -> *mut u8;

    /// Save the current context and resume `next`.
    ///
    /// The pointer to the saved context is stored through `prev_slot`.
    ///
    /// # Safety
    ///
    /// - `prev_slot` must be valid for a pointer-sized write and remain
    ///   valid until the saved context is resumed
    /// - `next` must have been produced by `init_stack` or a previous save
    /// - Must be called with interrupts disabled
    unsafe fn context_switch(prev_slot: *mut *mut u8, next: *mut u8);

    /// Index of the executing CPU, in `0..cores()`.
    fn cpu_id() -> CpuId;

    /// Number of CPUs in the system.
    fn cores() -> usize;

    /// Enable interrupt delivery on the current CPU.
    fn enable_interrupts();

    /// Disable interrupt delivery on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Request a reschedule on a remote CPU.
    ///
    /// The receiving CPU's IPI handler must call the kernel's reschedule
    /// entry, the same way its timer tick does.
    fn send_reschedule_ipi(cpu: CpuId);

    /// Idle the CPU until the next interrupt.
    fn wait_for_interrupt();
}

/// A no-op architecture for host testing and single-threaded simulation.
///
/// Context switches do nothing, so the calling context keeps executing
/// while the kernel's bookkeeping tracks which thread *would* be running.
/// Scheduler tests drive dispatch decisions through this implementation.
pub struct NoOpArch;

impl Arch for NoOpArch {
    unsafe fn init_stack(stack_top: *mut u8, _entry: usize, _arg: usize) -> *mut u8 {
        stack_top
    }

    unsafe fn context_switch(_prev_slot: *mut *mut u8, _next: *mut u8) {}

    fn cpu_id() -> CpuId {
        0
    }

    fn cores() -> usize {
        1
    }

    fn enable_interrupts() {}

    fn disable_interrupts() {}

    fn interrupts_enabled() -> bool {
        true
    }

    fn send_reschedule_ipi(_cpu: CpuId) {}

    fn wait_for_interrupt() {
        core::hint::spin_loop();
    }
}
