//! Sandbox core: a [`SimMachine`] wired to a booted [`Kernel`]
//!
//! Every trap the machine raises is handed to the kernel and its
//! [`Disposition`] applied, which is what the trap return path does on the
//! device.

use crate::arch::context::TrapFrame;
use crate::boot::{Alarm, Kernel};
use crate::error::WardenError;
use crate::sandbox::{Terminated, UntrustedEnv};
use crate::syscall::BlockCipher;
use crate::trap::Disposition;

use super::SimMachine;

/// Sandbox core for host runs
pub struct Hart<'k, C: BlockCipher> {
    machine: SimMachine,
    kernel: &'k Kernel<C>,
    alarm: &'k Alarm,
}

impl<'k, C: BlockCipher> Hart<'k, C> {
    /// `machine` must already be running the sandbox (see
    /// [`Kernel::enter_untrusted`])
    pub fn new(machine: SimMachine, kernel: &'k Kernel<C>, alarm: &'k Alarm) -> Self {
        Self { machine, kernel, alarm }
    }

    pub fn machine(&self) -> &SimMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SimMachine {
        &mut self.machine
    }

    /// Run the kernel's trap handler on `frame` and apply the result
    ///
    /// # Errors
    /// [`Terminated`] unless the disposition was a plain resume.
    pub fn deliver(&mut self, mut frame: TrapFrame) -> Result<(), Terminated> {
        match self.kernel.handle_trap(&mut frame, &mut self.machine) {
            Disposition::Resume => {
                self.machine.mret(&frame);
                Ok(())
            }
            Disposition::Exit => Err(Terminated::Exited),
            Disposition::Contain(violation) => {
                self.alarm.record_violation();
                let (base, size) = self.kernel.config().sandbox_data;
                self.machine.clear(base, size);
                // Nothing from the faulting context survives the restart
                frame.regs = [0; 32];
                frame.regs[TrapFrame::SP] = base + size;
                self.machine.mret(&frame);
                Err(Terminated::Contained(violation))
            }
            Disposition::Halt(error) => {
                if let WardenError::SecurityViolation(_) = error {
                    self.alarm.record_violation();
                }
                self.alarm.halt();
                log::error!("sandbox core halted: {}", error);
                Err(Terminated::Halted(error))
            }
        }
    }
}

impl<C: BlockCipher> UntrustedEnv for Hart<'_, C> {
    fn syscall(&mut self, id: u32, arg: u32) -> Result<u32, Terminated> {
        let frame = self.machine.ecall(id, arg);
        self.deliver(frame)?;
        Ok(self.machine.reg(TrapFrame::A0))
    }

    fn load(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Terminated> {
        match self.machine.load(addr, out) {
            Ok(()) => Ok(()),
            Err(frame) => self.deliver(frame),
        }
    }

    fn store(&mut self, addr: u32, data: &[u8]) -> Result<(), Terminated> {
        match self.machine.store(addr, data) {
            Ok(()) => Ok(()),
            Err(frame) => self.deliver(frame),
        }
    }

    fn branch(&mut self, target: u32) -> Result<(), Terminated> {
        match self.machine.jump(target) {
            Ok(()) => Ok(()),
            Err(frame) => self.deliver(frame),
        }
    }
}
