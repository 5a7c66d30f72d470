//! Command-line interface definitions for comcfg.

use clap::{Parser, Subcommand, ValueEnum};

/// Console UART descriptor checker.
#[derive(Parser)]
#[command(name = "comcfg", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Parse and validate a descriptor against platform defaults.
    Check(CheckArgs),
    /// Show divisor and poll interval for a line setting.
    Timing(TimingArgs),
}

/// Serial port slot.
#[derive(Clone, Copy, ValueEnum)]
pub enum Port {
    /// First port (0x3F8, IRQ 4).
    Com1,
    /// Second port (0x2F8, IRQ 3).
    Com2,
}

/// Arguments for the `check` subcommand.
#[derive(Parser)]
pub struct CheckArgs {
    /// Descriptor: `baud[/clock][,DPS[,io_base[,irq[,port-bdf[,bridge-bdf]]]]]`.
    pub descriptor: String,

    /// Port whose defaults apply.
    #[arg(long, short = 'p', value_enum, default_value = "com1")]
    pub port: Port,

    /// Treat the port as named on the console line.
    #[arg(long)]
    pub console: bool,
}

/// Arguments for the `timing` subcommand.
#[derive(Parser)]
pub struct TimingArgs {
    /// Baud rate.
    pub baud: u32,

    /// UART input clock in Hz.
    #[arg(long, default_value_t = hvcon_drivers::uart16550::UART_CLOCK_HZ)]
    pub clock: u32,

    /// Frame format, e.g. `8n1`.
    #[arg(long, default_value = "8n1")]
    pub format: String,

    /// FIFO depth used for the poll interval.
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..=256))]
    pub fifo: u32,
}
