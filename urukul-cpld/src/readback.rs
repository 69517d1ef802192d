//! Half-duplex read-back sub-protocol (protocol revision 9).
//!
//! With CFG.READBACK set, transactions alternate between two phases:
//!
//! * Write: a normal transaction. The serial output of the selected device is
//!   captured as it would appear on MISO and its last 8 bits are kept at
//!   deselection.
//! * Read: no device is selected or clocked. The chip select code picks what
//!   is shifted out instead: 1 the protocol revision, 3 the PLL_LOCK vector,
//!   anything else the byte captured in the preceding write phase.
//!
//! The phase flips at the deselection of every transaction that started and
//! ended with READBACK set and falls back to write whenever READBACK is
//! cleared.

use crate::router::Selection;
use crate::siso::SerialInSerialOut;
use crate::sr::Phase;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadbackPhase {
    Write,
    Read,
}

/// Live values the read phase can return.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sources {
    pub proto_rev: u8,
    pub pll_lock: u8,
}

#[derive(Clone, Debug)]
pub struct Readback {
    phase: ReadbackPhase,
    enabled: bool,
    armed: bool,
    addressed: Selection,
    capture: u8,
    captured: u8,
    siso: SerialInSerialOut,
}

impl Readback {
    /// `width` is that of the CFG shift register, the output register is one
    /// bit shorter.
    pub fn new(width: u32) -> Self {
        assert!(width >= 2);
        Self {
            phase: ReadbackPhase::Write,
            enabled: false,
            armed: false,
            addressed: Selection::Idle,
            capture: 0,
            captured: 0,
            siso: SerialInSerialOut::new(width - 1),
        }
    }

    pub fn phase(&self) -> ReadbackPhase {
        self.phase
    }

    pub fn reading(&self) -> bool {
        self.phase == ReadbackPhase::Read
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Byte kept from the last write phase.
    pub fn captured(&self) -> u8 {
        self.captured
    }

    /// Follows CFG.READBACK. Returns the new phase if it changed.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<ReadbackPhase> {
        self.enabled = enabled;
        if !enabled && self.reading() {
            self.phase = ReadbackPhase::Write;
            Some(self.phase)
        } else {
            None
        }
    }

    pub fn select(&mut self, addressed: Selection) {
        self.addressed = addressed;
        self.armed = self.enabled;
        self.capture = 0;
        if self.reading() {
            self.siso.select(true);
        }
    }

    /// Returns the new phase if it flipped.
    pub fn deselect(&mut self) -> Option<ReadbackPhase> {
        self.siso.select(false);
        self.addressed = Selection::Idle;
        let armed = self.armed && self.enabled;
        self.armed = false;
        if !armed {
            return None;
        }
        self.phase = match self.phase {
            ReadbackPhase::Write => {
                self.captured = self.capture;
                ReadbackPhase::Read
            },
            ReadbackPhase::Read => ReadbackPhase::Write,
        };
        Some(self.phase)
    }

    fn source(&self, sources: &Sources) -> u64 {
        match self.addressed {
            Selection::Idle => 0,
            Selection::Cfg => sources.proto_rev as u64,
            Selection::Broadcast => sources.pll_lock as u64,
            Selection::Att | Selection::Dds(_) => self.captured as u64,
        }
    }

    /// `miso` is the serial output of the selected device before the edge.
    pub fn sample(&mut self, miso: bool, sources: &Sources) {
        match self.phase {
            ReadbackPhase::Write => {
                if self.armed {
                    self.capture = (self.capture << 1) | miso as u8;
                }
            },
            ReadbackPhase::Read => {
                let source = self.source(sources);
                self.siso.tick(Phase::Sample, source);
            },
        }
    }

    pub fn shift(&mut self) {
        if self.reading() {
            self.siso.tick(Phase::Shift, 0);
        }
    }

    pub fn sdo(&self) -> bool {
        self.siso.sdo()
    }
}
