//! Host tool for console UART descriptors.
//!
//! Runs the driver's own descriptor parser and validation so a boot line
//! can be checked before it reaches the hypervisor. PCI discovery and the
//! existence probe need hardware and are reported as deferred.

mod cli;
mod report;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hvcon_driver_api::PortIndex;
use hvcon_drivers::pci::serial::LEGACY_IO_BASE;
use hvcon_drivers::uart16550::config::{IoBaseSpec, PortDescriptor, PortSettings, UartDefaults};
use hvcon_drivers::uart16550::engine::poll_interval_ms;
use hvcon_drivers::uart16550::line::{self, LineParams, MAX_BAUD, MIN_BAUD};

use crate::report::{CheckReport, TimingReport};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Check(ref args) => cmd_check(args, cli.json),
        cli::Command::Timing(ref args) => cmd_timing(args, cli.json),
    }
}

fn cmd_check(args: &cli::CheckArgs, json: bool) -> Result<()> {
    check(args)?.emit(json)
}

fn cmd_timing(args: &cli::TimingArgs, json: bool) -> Result<()> {
    timing(args)?.emit(json)
}

/// Validates a descriptor the way boot would, short of touching hardware.
fn check(args: &cli::CheckArgs) -> Result<CheckReport> {
    let index = match args.port {
        cli::Port::Com1 => PortIndex::Com1,
        cli::Port::Com2 => PortIndex::Com2,
    };
    let defaults = UartDefaults::pc(index).with_console(args.console);
    let mut settings = PortSettings::from_defaults(&defaults);

    let mut desc = PortDescriptor::parse(&args.descriptor)
        .with_context(|| format!("parsing descriptor `{}`", args.descriptor))?;
    let scan = match desc.io_base {
        Some(spec @ (IoBaseSpec::Pci | IoBaseSpec::Amt)) => {
            desc.io_base = None;
            Some(spec)
        }
        _ => None,
    };
    if args.descriptor.is_empty() && settings.baud.is_none() {
        bail!("{index}: no descriptor and no default baud; port stays unconfigured");
    }
    settings
        .apply(&desc, index, None)
        .with_context(|| format!("applying descriptor to {index}"))?;
    if scan.is_some() {
        // The scan supplies the real base at boot; validate against the
        // legacy port it may fall back to.
        settings.binding.io_base = LEGACY_IO_BASE;
    }
    let params = settings
        .validate()
        .with_context(|| format!("validating {index}"))?;

    Ok(CheckReport::new(index, &settings, &params, scan))
}

/// Divisor and poll timing for one line setting.
fn timing(args: &cli::TimingArgs) -> Result<TimingReport> {
    if !(MIN_BAUD..=MAX_BAUD).contains(&args.baud) {
        bail!("baud {} outside {MIN_BAUD}..={MAX_BAUD}", args.baud);
    }
    let format = PortDescriptor::parse(&format!(",{}", args.format))
        .with_context(|| format!("parsing format `{}`", args.format))?
        .format
        .context("missing frame format")?;
    if !(5..=8).contains(&format.data_bits) || !(1..=2).contains(&format.stop_bits) {
        bail!("unsupported frame format `{}`", args.format);
    }
    let params = LineParams {
        baud: line::Baud::Rate(args.baud),
        clock_hz: args.clock,
        data_bits: u8::try_from(format.data_bits)?,
        parity: format.parity,
        stop_bits: u8::try_from(format.stop_bits)?,
    };

    let divisor = line::divisor_for(params.clock_hz, args.baud);
    Ok(TimingReport {
        baud: args.baud,
        clock_hz: params.clock_hz,
        divisor,
        actual_baud: line::baud_for(params.clock_hz, divisor),
        lcr: params.lcr().bits(),
        poll_interval_ms: poll_interval_ms(params.frame_bits(), args.fifo.max(1), args.baud),
    })
}
