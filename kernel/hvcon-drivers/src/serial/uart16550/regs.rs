//! 16550 register map.

use bitflags::bitflags;

/// Register indices, before the binding's shift is applied.
pub mod reg {
    /// Receive Buffer Register (read, DLAB=0).
    pub const RBR: u8 = 0;
    /// Transmit Holding Register (write, DLAB=0).
    pub const THR: u8 = 0;
    /// Divisor Latch Low byte (DLAB=1).
    pub const DLL: u8 = 0;
    /// Interrupt Enable Register (DLAB=0).
    pub const IER: u8 = 1;
    /// Divisor Latch High byte (DLAB=1).
    pub const DLM: u8 = 1;
    /// Interrupt Identification Register (read).
    pub const IIR: u8 = 2;
    /// FIFO Control Register (write). Reads return IIR.
    pub const FCR: u8 = 2;
    /// Line Control Register.
    pub const LCR: u8 = 3;
    /// Modem Control Register.
    pub const MCR: u8 = 4;
    /// Line Status Register.
    pub const LSR: u8 = 5;
    /// Modem Status Register.
    pub const MSR: u8 = 6;
    /// DesignWare UART Status Register. Reading it clears busy-detect.
    pub const USR: u8 = 0x1F;
}

/// Value an unpowered, removed or unmapped device returns from IER.
pub const EXISTENCE_SENTINEL: u8 = 0xFF;

bitflags! {
    /// Interrupt Enable Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u8 {
        /// Received data available.
        const RX_DATA           = 1 << 0;
        /// Transmitter holding register empty.
        const THR_EMPTY         = 1 << 1;
        /// Receiver line status.
        const LINE_STATUS       = 1 << 2;
        /// Modem status.
        const MODEM_STATUS      = 1 << 3;
    }
}

bitflags! {
    /// Interrupt Identification Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Iir: u8 {
        /// Set when *no* interrupt is pending.
        const NO_INT            = 0x01;
        /// DesignWare busy-detect indication (all three id bits set).
        const BUSY_DETECT       = 0x07;
        /// Both bits set when FIFOs are enabled and working.
        const FIFOS_ENABLED     = 0xC0;
    }
}

bitflags! {
    /// FIFO Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u8 {
        /// Enable FIFOs.
        const ENABLE            = 1 << 0;
        /// Clear receive FIFO.
        const CLEAR_RX          = 1 << 1;
        /// Clear transmit FIFO.
        const CLEAR_TX          = 1 << 2;
        /// Receive trigger level: 14 bytes.
        const TRIGGER_14        = 0b11 << 6;
    }
}

bitflags! {
    /// Line Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u8 {
        /// Word length, bits 0-1 (`data_bits - 5`).
        const WORD_LEN          = 0b11;
        /// Second stop bit.
        const STOP_BIT          = 1 << 2;
        /// Parity mode, bits 3-5.
        const PARITY            = 0b111 << 3;
        /// Break control.
        const BREAK             = 1 << 6;
        /// Divisor Latch Access Bit.
        const DLAB              = 1 << 7;
    }
}

bitflags! {
    /// Modem Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mcr: u8 {
        /// Data Terminal Ready.
        const DTR               = 1 << 0;
        /// Request To Send.
        const RTS               = 1 << 1;
        /// Auxiliary output 1.
        const OUT1              = 1 << 2;
        /// Auxiliary output 2 (gates the IRQ line on PC-compatible boards).
        const OUT2              = 1 << 3;
        /// Loopback mode.
        const LOOPBACK          = 1 << 4;
    }
}

bitflags! {
    /// Line Status Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u8 {
        /// Received data ready.
        const DATA_READY        = 1 << 0;
        /// Overrun error.
        const OVERRUN_ERROR     = 1 << 1;
        /// Parity error.
        const PARITY_ERROR      = 1 << 2;
        /// Framing error.
        const FRAMING_ERROR     = 1 << 3;
        /// Break indicator.
        const BREAK_INDICATOR   = 1 << 4;
        /// Transmit holding register empty.
        const THR_EMPTY         = 1 << 5;
        /// Transmitter empty (holding and shift registers).
        const TRANSMITTER_EMPTY = 1 << 6;
        /// Error in receive FIFO.
        const FIFO_ERROR        = 1 << 7;
    }
}

bitflags! {
    /// Modem Status Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Msr: u8 {
        /// Clear To Send (mirrors RTS in loopback).
        const CTS               = 1 << 4;
        /// Data Set Ready (mirrors DTR in loopback).
        const DSR               = 1 << 5;
        /// Ring Indicator (mirrors OUT1 in loopback).
        const RI                = 1 << 6;
        /// Data Carrier Detect (mirrors OUT2 in loopback).
        const DCD               = 1 << 7;
    }
}
