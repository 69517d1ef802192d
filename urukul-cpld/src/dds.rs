//! Synthesizer SPI endpoint.
//!
//! Just enough of an AD9910/AD9912 serial port to be a routing target: it
//! records what it receives, shifts out a preset word and drives the status
//! lines the CPLD reports.

use crate::signals::{DdsPins, DdsStatus};

/// Word received during one CS_N low period.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub length: u32,
    /// Last 64 bits received, MSB first.
    pub data: u64,
}

#[derive(Clone, Debug)]
pub struct Synth {
    pub smp_err: bool,
    pub pll_lock: bool,
    readback: u64,
    readback_length: u32,
    shift_in: u64,
    count: u32,
    shift_out: u64,
    sdo: bool,
    received: Vec<Transaction>,
    io_updates: u32,
    pins: DdsPins,
}

impl Synth {
    pub fn new() -> Self {
        Self {
            smp_err: false,
            pll_lock: true,
            readback: 0,
            readback_length: 32,
            shift_in: 0,
            count: 0,
            shift_out: 0,
            sdo: true,
            received: Vec::new(),
            io_updates: 0,
            pins: DdsPins::default(),
        }
    }

    /// Word shifted out MSB first, starting with the CS_N falling edge.
    pub fn set_readback(&mut self, length: u32, data: u64) {
        assert!((1..=64).contains(&length));
        self.readback_length = length;
        self.readback = data;
    }

    fn msb(&self) -> bool {
        (self.shift_out >> (self.readback_length - 1)) & 1 != 0
    }

    pub fn apply(&mut self, pins: &DdsPins) {
        let prev = self.pins;
        if prev.cs_n && !pins.cs_n {
            self.shift_in = 0;
            self.count = 0;
            self.shift_out = self.readback;
            self.sdo = self.msb();
        }
        if !pins.cs_n {
            if !prev.sck && pins.sck {
                self.shift_in = (self.shift_in << 1) | pins.sdi as u64;
                self.count += 1;
            }
            if prev.sck && !pins.sck {
                self.shift_out <<= 1;
                self.sdo = self.msb();
            }
        }
        if !prev.cs_n && pins.cs_n {
            if self.count > 0 {
                self.received.push(Transaction {
                    length: self.count,
                    data: self.shift_in,
                });
            }
            self.sdo = true;
        }
        if !prev.io_update && pins.io_update {
            self.io_updates += 1;
        }
        self.pins = *pins;
    }

    pub fn status(&self) -> DdsStatus {
        DdsStatus {
            sdo: self.sdo,
            smp_err: self.smp_err,
            pll_lock: self.pll_lock,
        }
    }

    pub fn received(&self) -> &[Transaction] {
        &self.received
    }

    pub fn last(&self) -> Option<&Transaction> {
        self.received.last()
    }

    pub fn io_updates(&self) -> u32 {
        self.io_updates
    }

    /// Pins as last applied by the CPLD.
    pub fn pins(&self) -> &DdsPins {
        &self.pins
    }
}

impl Default for Synth {
    fn default() -> Self {
        Self::new()
    }
}
