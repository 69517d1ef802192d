//! SPI slave shift registers.
//!
//! Mode 0 timing: data is sampled on the rising SCK edge ([`Phase::Sample`])
//! and the next output bit is presented on the falling edge
//! ([`Phase::Shift`]). All registers are MSB first.

/// Clock phase of an edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Rising SCK edge.
    Sample,
    /// Falling SCK edge.
    Shift,
}

pub(crate) fn width_mask(width: u32) -> u64 {
    assert!((1..=64).contains(&width));
    if width == 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

///////////////////////////////////////////////////////////////////////
// Latch enable

/// Latch enable flip-flop.
///
/// Preset while the owner is deselected, cleared by the first sample edge
/// while selected. Its rising edge on deselection is the latch pulse, so a
/// selection without any clock edge never latches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LatchEnable {
    q: bool,
    sel: bool,
}

impl LatchEnable {
    pub fn new() -> Self {
        Self {
            q: true,
            sel: false,
        }
    }

    pub fn q(&self) -> bool {
        self.q
    }

    pub fn selected(&self) -> bool {
        self.sel
    }

    /// Returns `true` on the latch pulse.
    pub fn select(&mut self, sel: bool) -> bool {
        self.sel = sel;
        if sel {
            false
        } else {
            let rising = !self.q;
            self.q = true;
            rising
        }
    }

    /// Returns `true` if this is the first sample edge of the selection.
    pub fn sample(&mut self) -> bool {
        let first = self.q;
        if self.sel {
            self.q = false;
        }
        first
    }
}

impl Default for LatchEnable {
    fn default() -> Self {
        Self::new()
    }
}

///////////////////////////////////////////////////////////////////////
// Select latched

/// Full duplex shift register, latched on deselection.
///
/// The first sample edge after select assertion loads the upper bits from
/// the parallel output value and bit 0 from SDI. Following edges shift. The
/// MSB of the parallel output value is therefore never shifted out and the
/// first bit seen by the host is left over from the previous transaction.
#[derive(Clone, Debug)]
pub struct ShiftRegister {
    width: u32,
    mask: u64,
    sr: u64,
    sdo: bool,
    le: LatchEnable,
    di: u64,
}

impl ShiftRegister {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            mask: width_mask(width),
            sr: 0,
            sdo: false,
            le: LatchEnable::new(),
            di: 0,
        }
    }

    /// Applies a select transition. Returns the newly latched word if this
    /// deselection completed a transaction.
    pub fn select(&mut self, sel: bool) -> Option<u64> {
        if self.le.select(sel) {
            self.di = self.sr;
            Some(self.di)
        } else {
            None
        }
    }

    pub fn sample(&mut self, sdi: bool, parallel_out: u64) {
        if !self.le.selected() {
            return;
        }
        let upper = if self.le.sample() { parallel_out } else { self.sr };
        self.sr = ((upper << 1) | sdi as u64) & self.mask;
    }

    pub fn shift(&mut self) {
        if self.le.selected() {
            self.sdo = (self.sr >> (self.width - 1)) & 1 != 0;
        }
    }

    pub fn tick(&mut self, phase: Phase, sdi: bool, parallel_out: u64) {
        match phase {
            Phase::Sample => self.sample(sdi, parallel_out),
            Phase::Shift => self.shift(),
        }
    }

    pub fn sdo(&self) -> bool {
        self.sdo
    }

    /// Parallel input latch.
    pub fn latched(&self) -> u64 {
        self.di
    }

    pub fn latch_enable(&self) -> bool {
        self.le.q()
    }
}

///////////////////////////////////////////////////////////////////////
// Bit counted

/// Full duplex shift register, latched by a bit counter.
///
/// The latch is updated on the `width`-th sample edge of a selection and the
/// register is reloaded from the parallel output value on that same edge, so
/// words can follow each other without deselection. A partial word is
/// discarded on deselection.
#[derive(Clone, Debug)]
pub struct CountedShiftRegister {
    width: u32,
    mask: u64,
    sr: u64,
    sdo: bool,
    sel: bool,
    load: bool,
    count: u32,
    di: u64,
}

impl CountedShiftRegister {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            mask: width_mask(width),
            sr: 0,
            sdo: false,
            sel: false,
            load: false,
            count: width - 1,
            di: 0,
        }
    }

    pub fn selected(&self) -> bool {
        self.sel
    }

    pub fn select(&mut self, sel: bool) {
        if sel && !self.sel {
            self.load = true;
            self.count = self.width - 1;
        }
        self.sel = sel;
    }

    /// Returns the newly latched word if this edge completed one.
    pub fn sample(&mut self, sdi: bool, parallel_out: u64) -> Option<u64> {
        if !self.sel {
            return None;
        }
        let upper = if self.load { parallel_out } else { self.sr };
        self.load = false;
        self.sr = ((upper << 1) | sdi as u64) & self.mask;
        if self.count == 0 {
            self.di = self.sr;
            self.sr = parallel_out & self.mask;
            self.count = self.width - 1;
            Some(self.di)
        } else {
            self.count -= 1;
            None
        }
    }

    pub fn shift(&mut self) {
        if self.sel {
            self.sdo = (self.sr >> (self.width - 1)) & 1 != 0;
        }
    }

    pub fn tick(&mut self, phase: Phase, sdi: bool, parallel_out: u64) -> Option<u64> {
        match phase {
            Phase::Sample => self.sample(sdi, parallel_out),
            Phase::Shift => {
                self.shift();
                None
            },
        }
    }

    pub fn sdo(&self) -> bool {
        self.sdo
    }

    pub fn latched(&self) -> u64 {
        self.di
    }

    /// Sample edges left until the next latch.
    pub fn remaining(&self) -> u32 {
        self.count + 1
    }
}
