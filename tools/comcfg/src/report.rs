//! Text and JSON output.

use anyhow::Result;
use hvcon_driver_api::PortIndex;
use hvcon_drivers::uart16550::config::{IoBaseSpec, PortSettings};
use hvcon_drivers::uart16550::line::LineParams;
use serde::Serialize;

/// Outcome of `check`.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    port: String,
    baud: String,
    clock_hz: u32,
    data_bits: u8,
    parity: char,
    stop_bits: u8,
    io_base: Option<u64>,
    discovery: Option<&'static str>,
    irq: i64,
    pci_function: Option<String>,
    pci_bridge: Option<String>,
}

impl CheckReport {
    /// Summarizes validated settings.
    pub fn new(
        index: PortIndex,
        settings: &PortSettings,
        params: &LineParams,
        scan: Option<IoBaseSpec>,
    ) -> Self {
        let discovery = match scan {
            Some(IoBaseSpec::Pci) => Some("pci"),
            Some(IoBaseSpec::Amt) => Some("amt"),
            _ => None,
        };
        Self {
            port: index.to_string(),
            baud: params.baud.to_string(),
            clock_hz: params.clock_hz,
            data_bits: params.data_bits,
            parity: params.parity.as_char(),
            stop_bits: params.stop_bits,
            io_base: discovery.is_none().then_some(settings.binding.io_base),
            discovery,
            irq: settings.irq.raw(),
            pci_function: settings.pci.map(|l| l.function.to_string()),
            pci_bridge: settings.pci.and_then(|l| l.bridge).map(|b| b.to_string()),
        }
    }

    /// Prints the report.
    pub fn emit(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        println!("{}: ok", self.port);
        println!(
            "  line    {} baud, {}{}{}, clock {} Hz",
            self.baud, self.data_bits, self.parity, self.stop_bits, self.clock_hz
        );
        match (self.io_base, self.discovery) {
            (Some(base), _) => println!("  base    {base:#x}"),
            (None, Some(mode)) => println!("  base    PCI scan ({mode}), resolved at boot"),
            (None, None) => {}
        }
        let irq = match self.irq {
            i64::MIN..=-1 => "disabled".to_string(),
            0 => "polled".to_string(),
            line => line.to_string(),
        };
        println!("  irq     {irq}");
        if let Some(function) = &self.pci_function {
            print!("  pci     {function}");
            if let Some(bridge) = &self.pci_bridge {
                print!(" via {bridge}");
            }
            println!();
        }
        Ok(())
    }
}

/// Outcome of `timing`.
#[derive(Serialize)]
pub struct TimingReport {
    /// Requested baud.
    pub baud: u32,
    /// Input clock.
    pub clock_hz: u32,
    /// Divisor latch value.
    pub divisor: u16,
    /// Rate the divisor really produces.
    pub actual_baud: Option<u32>,
    /// Line control byte.
    pub lcr: u8,
    /// Poll period when interrupts are not confirmed.
    pub poll_interval_ms: u32,
}

impl TimingReport {
    /// Prints the report.
    pub fn emit(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        println!("divisor  {} ({} Hz / 16 / {})", self.divisor, self.clock_hz, self.baud);
        if let Some(actual) = self.actual_baud {
            println!("actual   {actual} baud");
        }
        println!("lcr      {:#04x}", self.lcr);
        println!("poll     {} ms", self.poll_interval_ms);
        Ok(())
    }
}
