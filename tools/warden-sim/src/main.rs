//! warden-sim - host simulator for the Warden sandbox
//!
//! Commands:
//! - `warden-sim run [FILE]` - feed lines (or stdin) through the simulated device
//! - `warden-sim analyze <PAYLOAD>` - score one payload
//! - `warden-sim regions` - show the protection table and the programmed PMP
//! - `warden-sim attack [NAME]` - run hostile sandbox scenarios

mod config;
mod session;

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use warden_admission::AdmissionEngine;
use warden_kernel::sandbox::Terminated;
use warden_pmp::{configure, plan, AccessType, PmpDump, PrivilegeLevel, SimulatedPmp, PMP_ENTRIES};

use config::SimConfig;

#[derive(Parser)]
#[command(name = "warden-sim")]
#[command(author = "Warden Contributors")]
#[command(version)]
#[command(about = "Warden - PMP sandbox simulator", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the firmware's built-in settings)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    ///
    /// `RUST_LOG` filters are applied on top.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run input lines through the monitor and the sandbox core
    Run {
        /// Input file, one payload per line (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Score a payload with the admission engine
    Analyze {
        /// Payload text
        payload: String,
    },

    /// Show the protection table, its encoding and the programmed unit
    Regions {
        /// Report the decision for each access type at this address
        #[arg(short, long, value_parser = parse_address)]
        at: Option<u32>,
    },

    /// Run hostile sandbox scenarios and show how each one ended
    Attack {
        /// Scenario to run (all when omitted)
        name: Option<String>,

        /// List scenarios and exit
        #[arg(short, long)]
        list: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = SimConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { input } => {
            run(&config, input)?;
        }

        Commands::Analyze { payload } => {
            analyze(&config, payload.as_bytes());
        }

        Commands::Regions { at } => {
            show_regions(&config, at)?;
        }

        Commands::Attack { name, list } => {
            if list {
                list_scenarios();
            } else {
                run_attacks(&config, name.as_deref())?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn parse_address(text: &str) -> Result<u32, String> {
    let digits = text.trim_start_matches("0x").replace('_', "");
    let radix = if text.starts_with("0x") { 16 } else { 10 };
    u32::from_str_radix(&digits, radix).map_err(|err| format!("bad address '{}': {}", text, err))
}

fn paint(line: &str) -> ColoredString {
    if line.starts_with("DATA:") {
        line.green()
    } else if line.starts_with("THREAT_DETECTED") {
        line.yellow()
    } else if line.starts_with("SECURITY ALERT") {
        line.red().bold()
    } else {
        line.cyan()
    }
}

fn run(config: &SimConfig, input: Option<PathBuf>) -> anyhow::Result<()> {
    let bytes = match &input {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes).context("reading stdin")?;
            bytes
        }
    };

    for line in session::run(config, &bytes)? {
        println!("{}", paint(&line));
    }
    Ok(())
}

fn analyze(config: &SimConfig, payload: &[u8]) {
    let screening = AdmissionEngine::new(config.admission).screen(payload);
    let profile = &screening.profile;

    println!("{} {} bytes", "🔍".cyan(), payload.len());
    let rows = [
        ("sql injection", profile.sql_injection),
        ("code injection", profile.code_injection),
        ("overflow", profile.overflow),
        ("format string", profile.format_string),
        ("shellcode", profile.shellcode),
        ("entropy", profile.entropy),
        ("length", profile.suspicious_length),
    ];
    for (name, score) in rows {
        let score = if score > 0 { score.to_string().yellow() } else { score.to_string().normal() };
        println!("   {:<16} {:>3}", name, score);
    }
    println!("   {:<16} {:>3}", "control chars", profile.control_chars);
    println!();

    let summary = format!(
        "score {}/{} ({})",
        screening.score,
        config.admission.threshold,
        screening.tags()
    );
    if screening.is_accepted() {
        println!("{} accepted: {}", "✓".green(), summary);
    } else {
        println!("{} rejected: {}", "✗".red(), summary.bold());
    }
}

fn show_regions(config: &SimConfig, at: Option<u32>) -> anyhow::Result<()> {
    let table = config.regions();
    let encoded = plan(table, PMP_ENTRIES).context("encoding region table")?;

    println!("{} Region table ({} entries)", "📋".green(), table.len());
    for (index, (region, entry)) in table.iter().zip(&encoded).enumerate() {
        println!(
            "   [{:02}] {:<20} base={:#010x} size={:#x} pmpaddr={:#010x} cfg={:#04x}",
            index,
            region.label.bold(),
            region.base,
            region.size,
            entry.pmpaddr,
            entry.cfg
        );
    }

    let mut pmp = SimulatedPmp::new();
    configure(&mut pmp, table).context("programming simulated PMP")?;
    println!();
    println!("{} Programmed unit", "🔧".green());
    for line in PmpDump(&pmp).to_string().lines() {
        println!("   {}", line);
    }

    if let Some(address) = at {
        println!();
        println!("{} {:#010x}", "🔎".cyan(), address);
        for level in [PrivilegeLevel::Untrusted, PrivilegeLevel::Trusted] {
            let decisions: Vec<String> = [AccessType::Read, AccessType::Write, AccessType::Execute]
                .into_iter()
                .map(|access| {
                    let verdict = if pmp.decide(address, access, level) { "allow" } else { "deny" };
                    format!("{:?}={}", access, verdict)
                })
                .collect();
            println!("   {:<9} {}", format!("{:?}", level), decisions.join(" "));
        }
    }
    Ok(())
}

fn list_scenarios() {
    for scenario in &session::SCENARIOS {
        println!("   {:<24} {}", scenario.name.bold(), scenario.description);
    }
}

fn run_attacks(config: &SimConfig, name: Option<&str>) -> anyhow::Result<()> {
    let scenarios: Vec<&session::Scenario> = match name {
        Some(name) => {
            let Some(scenario) = session::find_scenario(name) else {
                anyhow::bail!("no scenario '{}' (see --list)", name);
            };
            vec![scenario]
        }
        None => session::SCENARIOS.iter().collect(),
    };

    let mut breaches = 0;
    for scenario in scenarios {
        let outcome = session::attack(config, scenario)?;
        let verdict = match &outcome.result {
            Err(Terminated::Contained(violation)) => {
                format!("contained ({}), restarted at {:#010x}", violation, outcome.pc).green()
            }
            Err(Terminated::Halted(error)) => format!("core halted ({})", error).red(),
            Err(Terminated::Exited) => "sandbox exited".normal(),
            Err(Terminated::Mailbox(error)) => format!("mailbox fault ({})", error).red(),
            Ok(()) => "NOT BLOCKED".red().bold(),
        };
        if !outcome.blocked() {
            breaches += 1;
        }
        println!("{} {:<24} {}", "⚔".yellow(), scenario.name.bold(), verdict);
        for line in &outcome.lines {
            println!("      {}", paint(line));
        }
    }

    if breaches > 0 {
        anyhow::bail!("{} scenario(s) got past the protection table", breaches);
    }
    Ok(())
}
