//! Simulated two-core device
//!
//! The monitor runs on the calling thread and the sandbox core on a second
//! one, sharing a [`Boundary`] exactly as the two harts share the IPC
//! region on the device. The [`Alarm`] stands in for kernel RAM.

use std::sync::atomic::{AtomicBool, Ordering};

use aes::Aes128;
use anyhow::{anyhow, Context};
use warden_admission::DiagnosticLine;
use warden_kernel::components::console::buffer::BufferConsole;
use warden_kernel::config::DEMO_DEVICE_KEY;
use warden_kernel::monitor::{LineAssembler, Monitor, MonitorStatus};
use warden_kernel::sandbox::{SandboxTask, Terminated, UntrustedEnv};
use warden_kernel::sim::{Hart, SimMachine};
use warden_kernel::syscall::numbers::SYS_ENCRYPT;
use warden_kernel::syscall::DeviceKey;
use warden_kernel::{Alarm, Boundary, Kernel, KernelConfig};
use warden_pmp::{layout, RegionDescriptor};

use crate::config::SimConfig;

/// Program the sandbox core's PMP and drop it into the sandbox
pub fn boot(regions: &[RegionDescriptor], config: KernelConfig) -> anyhow::Result<(SimMachine, Kernel<Aes128>)> {
    let mut machine = SimMachine::new();
    let kernel = Kernel::boot(&mut machine, regions, config, DeviceKey::from_bytes(DEMO_DEVICE_KEY))
        .context("sandbox core boot")?;
    kernel.enter_untrusted(&mut machine).context("privilege drop")?;
    Ok((machine, kernel))
}

/// Feed `input` to the monitor as console bytes and collect every
/// diagnostic line written until each input line has been answered
pub fn run(config: &SimConfig, input: &[u8]) -> anyhow::Result<Vec<String>> {
    let kernel_config = config.kernel_config();
    let (machine, kernel) = boot(config.regions(), kernel_config)?;
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let done = AtomicBool::new(false);

    let mut assembler = LineAssembler::new();
    let expected = input.iter().filter_map(|b| assembler.push(*b)).count();
    console.feed(input);

    let mut monitor = Monitor::new(&console, &boundary, &alarm, &kernel_config).context("monitor")?;
    let mut hart = Hart::new(machine, &kernel, &alarm);
    let ready = DiagnosticLine::Ready.to_string();

    crossbeam::scope(|s| {
        let done = &done;
        let boundary = &boundary;

        s.spawn(move |_| {
            'restart: while !done.load(Ordering::Acquire) {
                let Ok(mut task) = SandboxTask::new(boundary, &kernel_config) else {
                    break;
                };
                while !done.load(Ordering::Acquire) {
                    match task.poll(&mut hart) {
                        Ok(_) => std::thread::yield_now(),
                        Err(Terminated::Contained(violation)) => {
                            log::warn!("sandbox restarted after {}", violation);
                            continue 'restart;
                        }
                        Err(reason) => {
                            log::error!("sandbox core stopped: {:?}", reason);
                            break 'restart;
                        }
                    }
                }
            }
            done.store(true, Ordering::Release);
        });

        monitor.announce();
        let mut lines = Vec::new();
        let mut answered = 0;
        while answered < expected {
            let stopped = done.load(Ordering::Acquire);
            let status = monitor.poll();
            for line in console.take_lines() {
                if line != ready {
                    answered += 1;
                }
                lines.push(line);
            }
            if status == MonitorStatus::Halted {
                break;
            }
            if stopped {
                // One last poll has drained what the core left behind
                log::warn!("{} of {} lines unanswered", expected - answered, expected);
                break;
            }
            std::thread::yield_now();
        }
        done.store(true, Ordering::Release);
        lines
    })
    .map_err(|_| anyhow!("sandbox thread panicked"))
}

/// A hostile action taken by sandbox code
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    attack: fn(&mut dyn UntrustedEnv) -> Result<(), Terminated>,
}

pub static SCENARIOS: [Scenario; 5] = [
    Scenario {
        name: "read-kernel-ram",
        description: "load from kernel RAM, where the device key lives",
        attack: |env| env.load(layout::KERNEL_RAM_BASE, &mut [0u8; 16]),
    },
    Scenario {
        name: "write-kernel-ram",
        description: "overwrite kernel RAM",
        attack: |env| env.store(layout::KERNEL_RAM_BASE + 0x40, &[0x41; 4]),
    },
    Scenario {
        name: "jump-kernel-flash",
        description: "branch into kernel code",
        // The fetch at the target is what faults
        attack: |env| {
            env.branch(layout::KERNEL_FLASH_BASE + 0x200)?;
            env.load(layout::SANDBOX_RAM_BASE, &mut [0u8; 4])
        },
    },
    Scenario {
        name: "gpio-write",
        description: "drive a peripheral the table does not grant",
        attack: |env| env.store(layout::PERIPH_GPIO_BASE, &[0xFF; 4]),
    },
    Scenario {
        name: "gateway-kernel-pointer",
        description: "hand the encryption service a kernel RAM buffer",
        attack: |env| env.syscall(SYS_ENCRYPT, layout::KERNEL_RAM_BASE).map(|_| ()),
    },
];

pub fn find_scenario(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}

/// What happened to one scenario
#[derive(Debug)]
pub struct Outcome {
    pub result: Result<(), Terminated>,
    /// Diagnostic lines the monitor wrote afterwards
    pub lines: Vec<String>,
    /// Sandbox program counter after the trap was handled
    pub pc: u32,
}

impl Outcome {
    pub fn blocked(&self) -> bool {
        self.result.is_err()
    }
}

/// Boot a fresh device, run one attack from the sandbox and let the
/// monitor report it
pub fn attack(config: &SimConfig, scenario: &Scenario) -> anyhow::Result<Outcome> {
    let kernel_config = config.kernel_config();
    let (machine, kernel) = boot(config.regions(), kernel_config)?;
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, &kernel_config).context("monitor")?;
    let mut hart = Hart::new(machine, &kernel, &alarm);

    log::info!("scenario {}: {}", scenario.name, scenario.description);
    let result = (scenario.attack)(&mut hart);
    monitor.poll();

    Ok(Outcome {
        result,
        lines: console.take_lines(),
        pc: hart.machine().pc(),
    })
}
