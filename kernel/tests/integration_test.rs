//! End-to-end tests on the software hart
//!
//! The monitor, the sandbox task and the kernel run exactly as on the
//! device; only the core and the UART are simulated.

use std::sync::atomic::{AtomicBool, Ordering};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use warden_admission::pad_block;
use warden_kernel::arch::context::TrapFrame;
use warden_kernel::arch::{cause, ProtectionUnit};
use warden_kernel::components::console::buffer::BufferConsole;
use warden_kernel::config::DEMO_DEVICE_KEY;
use warden_kernel::error::{SecurityViolation, UnhandledTrap};
use warden_kernel::monitor::{Monitor, MonitorStatus};
use warden_kernel::sandbox::{SandboxTask, Step, Terminated, UntrustedEnv};
use warden_kernel::sim::{Hart, SimMachine};
use warden_kernel::syscall::numbers::SYS_ENCRYPT;
use warden_kernel::syscall::DeviceKey;
use warden_kernel::trap::FaultKind;
use warden_kernel::*;
use warden_pmp::{layout, AccessType, PrivilegeLevel, DEFAULT_REGIONS};

fn boot(config: KernelConfig) -> (SimMachine, Kernel<Aes128>) {
    let mut machine = SimMachine::new();
    let kernel = Kernel::boot(
        &mut machine,
        &DEFAULT_REGIONS,
        config,
        DeviceKey::from_bytes(DEMO_DEVICE_KEY),
    )
    .expect("boot");
    kernel.enter_untrusted(&mut machine).expect("privilege drop");
    (machine, kernel)
}

fn expected_data_line(input: &[u8]) -> String {
    let cipher = Aes128::new(GenericArray::from_slice(&DEMO_DEVICE_KEY));
    let mut block = GenericArray::clone_from_slice(&pad_block(input));
    cipher.encrypt_block(&mut block);
    let hex: Vec<String> = block.iter().map(|b| format!("{:02X}", b)).collect();
    format!("DATA: {}|THREAT:0|CLEAN", hex.join(" "))
}

/// One accepted line: SYSTEM_READY, then the ciphertext of the padded input
#[test]
fn test_line_is_encrypted_end_to_end() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();

    monitor.announce();
    console.feed(b"hello\r\n");
    assert_eq!(monitor.poll(), MonitorStatus::Running);
    assert!(matches!(task.poll(&mut hart), Ok(Step::Reported(_))));
    assert_eq!(monitor.poll(), MonitorStatus::Running);

    assert_eq!(console.take_lines(), vec!["SYSTEM_READY".to_string(), expected_data_line(b"hello")]);
    assert_eq!(hart.machine().current_level(), PrivilegeLevel::Untrusted);
}

/// Hostile input never reaches the sandbox when the monitor re-screens
#[test]
fn test_hostile_line_rejected_by_monitor() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();

    console.feed(b"admin'-- UNION SELECT password FROM users; DROP TABLE t\n");
    monitor.poll();
    assert_eq!(task.poll(&mut hart), Ok(Step::Idle));

    let lines = console.take_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("THREAT_DETECTED|SCORE:"));
    assert!(lines[0].contains("SQL_INJ"));
}

/// Without the trusted re-screen the sandbox's own verdict is reported
#[test]
fn test_sandbox_screening_without_rescreen() {
    let config = KernelConfig {
        trusted_rescreen: false,
        ..KernelConfig::DEFAULT
    };
    let (machine, kernel) = boot(config);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();

    console.feed(&[b'A'; 100]);
    console.feed(b"\n");
    monitor.poll();
    task.poll(&mut hart).unwrap();
    monitor.poll();
    assert_eq!(
        console.take_lines(),
        vec!["THREAT_DETECTED|SCORE:75|REASON:OVERFLOW LONG_INPUT".to_string()]
    );
}

/// A load from kernel RAM traps before it reads anything, the context is
/// restarted at its entry with its data cleared, and the monitor raises
/// the alarm once
#[test]
fn test_kernel_ram_load_is_contained() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
    let mut hart = Hart::new(machine, &kernel, &alarm);

    hart.machine_mut().poke(layout::KERNEL_RAM_BASE, &[0x5A; 16]);
    hart.store(layout::SANDBOX_RAM_BASE, b"scratch").unwrap();
    hart.branch(layout::SANDBOX_FLASH_BASE + 0x80).unwrap();
    let fault_pc = hart.machine().pc();

    let mut stolen = [0u8; 16];
    let result = hart.load(layout::KERNEL_RAM_BASE, &mut stolen);
    assert_eq!(
        result,
        Err(Terminated::Contained(SecurityViolation {
            kind: FaultKind::Load,
            address: layout::KERNEL_RAM_BASE,
            pc: fault_pc,
        }))
    );
    assert_eq!(stolen, [0; 16]);

    let machine = hart.machine();
    assert_eq!(machine.current_level(), PrivilegeLevel::Untrusted);
    assert_eq!(machine.pc(), layout::SANDBOX_FLASH_BASE);
    assert_ne!(machine.pc(), fault_pc);
    let (base, size) = kernel.config().sandbox_data;
    assert!(machine.populated().all(|(addr, _)| addr < base || addr >= base + size));

    assert_eq!(alarm.violations(), 1);
    assert_eq!(monitor.poll(), MonitorStatus::Running);
    assert_eq!(
        console.take_lines(),
        vec!["SECURITY ALERT: RUNTIME MEMORY VIOLATION".to_string()]
    );

    // The restarted context keeps serving input
    let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();
    console.feed(b"after\n");
    monitor.poll();
    assert!(matches!(task.poll(&mut hart), Ok(Step::Reported(_))));
    monitor.poll();
    assert_eq!(console.take_lines(), vec![expected_data_line(b"after")]);
}

/// A restarted context starts from zeroed registers with a fresh stack
#[test]
fn test_contained_context_loses_its_registers() {
    const A2: usize = 12;
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);

    hart.machine_mut().set_reg(A2, 0xDEAD_BEEF);
    hart.machine_mut().set_reg(TrapFrame::A0, 0x1234);
    let result = hart.load(layout::KERNEL_RAM_BASE, &mut [0u8; 4]);
    assert!(matches!(result, Err(Terminated::Contained(_))));

    let machine = hart.machine();
    let (base, size) = kernel.config().sandbox_data;
    assert_eq!(machine.pc(), layout::SANDBOX_FLASH_BASE);
    assert_eq!(machine.reg(TrapFrame::SP), base + size);
    assert_eq!(machine.reg(A2), 0);
    assert_eq!(machine.reg(TrapFrame::A0), 0);
    assert!((0..32).filter(|&i| i != TrapFrame::SP).all(|i| machine.reg(i) == 0));
}

/// Jumping into kernel flash faults on the fetch
#[test]
fn test_fetch_from_kernel_flash_is_contained() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);

    hart.branch(layout::KERNEL_FLASH_BASE + 0x200).unwrap();
    let result = hart.store(layout::SANDBOX_RAM_BASE, b"x");
    assert!(matches!(
        result,
        Err(Terminated::Contained(SecurityViolation { kind: FaultKind::Fetch, .. }))
    ));
    assert_eq!(alarm.violations(), 1);
}

/// A gateway request whose buffer the sandbox could not write is a
/// violation, and the sandbox image is left intact
#[test]
fn test_gateway_rejects_read_only_buffer() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    hart.machine_mut().poke(layout::SANDBOX_FLASH_BASE + 0x100, b"code code code!!");

    let result = hart.syscall(SYS_ENCRYPT, layout::SANDBOX_FLASH_BASE + 0x100);
    assert!(matches!(
        result,
        Err(Terminated::Contained(SecurityViolation { kind: FaultKind::Store, .. }))
    ));
    let mut image = [0u8; 16];
    hart.machine().peek(layout::SANDBOX_FLASH_BASE + 0x100, &mut image);
    assert_eq!(&image, b"code code code!!");
}

/// Key material placed in the kernel vault is unreachable from the
/// sandbox, directly or through the gateway
#[test]
fn test_key_not_readable_from_sandbox() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    hart.machine_mut().poke(layout::KERNEL_RAM_BASE + 0x40, &DEMO_DEVICE_KEY);

    let readable: Vec<u8> = hart
        .machine()
        .populated()
        .filter(|(addr, _)| hart.machine().pmp().decide(*addr, AccessType::Read, PrivilegeLevel::Untrusted))
        .map(|(_, byte)| byte)
        .collect();
    assert!(!readable.windows(DEMO_DEVICE_KEY.len()).any(|w| w == DEMO_DEVICE_KEY));

    let mut out = [0u8; 16];
    assert!(matches!(
        hart.load(layout::KERNEL_RAM_BASE + 0x40, &mut out),
        Err(Terminated::Contained(_))
    ));
    assert_eq!(out, [0; 16]);

    assert!(matches!(
        hart.syscall(SYS_ENCRYPT, layout::KERNEL_RAM_BASE + 0x40),
        Err(Terminated::Contained(SecurityViolation { kind: FaultKind::Load, .. }))
    ));
    assert_eq!(alarm.violations(), 2);
}

/// Under the halt policy a violation stops the device
#[test]
fn test_halt_policy() {
    let config = KernelConfig {
        fault_policy: FaultPolicy::Halt,
        ..KernelConfig::DEFAULT
    };
    let (machine, kernel) = boot(config);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
    let mut hart = Hart::new(machine, &kernel, &alarm);

    let result = hart.store(layout::PERIPH_GPIO_BASE, &[1, 0, 0, 0]);
    assert!(matches!(
        result,
        Err(Terminated::Halted(WardenError::SecurityViolation(SecurityViolation {
            kind: FaultKind::Store,
            ..
        })))
    ));
    assert!(alarm.is_halted());
    assert_eq!(monitor.poll(), MonitorStatus::Halted);
    assert_eq!(
        console.take_lines(),
        vec!["SECURITY ALERT: RUNTIME MEMORY VIOLATION".to_string()]
    );
}

/// Interrupts and unknown operations have no handler and halt
#[test]
fn test_unhandled_traps_halt() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);

    let frame = hart.machine_mut().inject_interrupt(7);
    assert!(matches!(
        hart.deliver(frame),
        Err(Terminated::Halted(WardenError::UnhandledTrapCause(UnhandledTrap::Interrupt { code: 7, .. })))
    ));
    assert!(alarm.is_halted());
    assert_eq!(alarm.violations(), 0);

    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    assert!(matches!(
        hart.syscall(0x7777, 0),
        Err(Terminated::Halted(WardenError::UnhandledTrapCause(UnhandledTrap::UnknownSyscall {
            id: 0x7777,
            ..
        })))
    ));

    let (mut machine, kernel) = boot(KernelConfig::DEFAULT);
    let alarm = Alarm::new();
    let frame = machine.raise(cause::ILLEGAL_INSTRUCTION, 0);
    let mut hart = Hart::new(machine, &kernel, &alarm);
    assert!(matches!(
        hart.deliver(frame),
        Err(Terminated::Halted(WardenError::UnhandledTrapCause(UnhandledTrap::Exception { code: 2, .. })))
    ));
}

/// The exit operation ends the context without touching memory
#[test]
fn test_exit() {
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let mut hart = Hart::new(machine, &kernel, &alarm);
    let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();
    assert_eq!(task.shutdown(&mut hart), Terminated::Exited);
    assert!(!alarm.is_halted());
}

/// A second privilege drop on the same core is refused
#[test]
fn test_single_privilege_drop() {
    let (mut machine, kernel) = boot(KernelConfig::DEFAULT);
    let frame = machine.raise(cause::ECALL_FROM_USER, 0);
    assert_eq!(machine.current_level(), PrivilegeLevel::Trusted);
    assert_eq!(
        kernel.enter_untrusted(&mut machine),
        Err(WardenError::Transition(error::TransitionError::AlreadyLowered))
    );
    assert_eq!(frame.mcause, cause::ECALL_FROM_USER);
}

/// Monitor and sandbox on separate threads, as on the two cores
#[test]
fn test_two_cores() {
    const LINES: usize = 8;
    let (machine, kernel) = boot(KernelConfig::DEFAULT);
    let boundary = Boundary::new();
    let alarm = Alarm::new();
    let console = BufferConsole::new();
    let done = AtomicBool::new(false);

    for i in 0..LINES {
        console.feed(format!("reading {}\n", i).as_bytes());
    }

    let output = crossbeam::scope(|s| {
        let mut monitor = Monitor::new(&console, &boundary, &alarm, kernel.config()).unwrap();
        let mut task = SandboxTask::new(&boundary, kernel.config()).unwrap();
        let mut hart = Hart::new(machine, &kernel, &alarm);
        let done = &done;

        s.spawn(move |_| {
            while !done.load(Ordering::Acquire) {
                task.poll(&mut hart).expect("sandbox step");
                std::thread::yield_now();
            }
        });

        let mut lines = Vec::new();
        while lines.len() < LINES {
            monitor.poll();
            lines.extend(console.take_lines());
            std::thread::yield_now();
        }
        done.store(true, Ordering::Release);
        lines
    })
    .unwrap();

    let expected: Vec<String> = (0..LINES)
        .map(|i| expected_data_line(format!("reading {}", i).as_bytes()))
        .collect();
    assert_eq!(output, expected);
}
