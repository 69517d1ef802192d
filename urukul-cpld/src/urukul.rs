//! The composed CPLD.

use crossbeam::channel::Sender;
use log::{debug, trace};
use urukul_pac::register::{ProtoRev, IFC_MODE, STA};

use crate::att::AttenuatorSelect;
use crate::cfg::{ConfigFields, ConfigRegister};
use crate::event::CpldEvent;
use crate::readback::{Readback, ReadbackPhase, Sources};
use crate::router::{ChipSelectRouter, Route, Selection};
use crate::signals::{BusIn, ChipInputs, Outputs};
use crate::sr::{CountedShiftRegister, Phase, ShiftRegister};
use crate::status::StatusRegister;

/// Build time configuration: protocol revision and mode straps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CpldConfig {
    pub revision: ProtoRev,
    pub ifc_mode: IFC_MODE,
}

#[derive(Clone, Debug)]
enum CfgShifter {
    Latched(ShiftRegister),
    Counted(CountedShiftRegister),
}

impl CfgShifter {
    fn new(revision: ProtoRev, width: u32) -> Self {
        match revision {
            ProtoRev::V8 => CfgShifter::Latched(ShiftRegister::new(width)),
            ProtoRev::V9 => CfgShifter::Counted(CountedShiftRegister::new(width)),
        }
    }

    fn select(&mut self, sel: bool) -> Option<u64> {
        match self {
            CfgShifter::Latched(sr) => sr.select(sel),
            CfgShifter::Counted(sr) => {
                sr.select(sel);
                None
            },
        }
    }

    fn tick(&mut self, phase: Phase, sdi: bool, parallel_out: u64) -> Option<u64> {
        match self {
            CfgShifter::Latched(sr) => {
                sr.tick(phase, sdi, parallel_out);
                None
            },
            CfgShifter::Counted(sr) => sr.tick(phase, sdi, parallel_out),
        }
    }

    fn sdo(&self) -> bool {
        match self {
            CfgShifter::Latched(sr) => sr.sdo(),
            CfgShifter::Counted(sr) => sr.sdo(),
        }
    }

    fn latch_enable(&self) -> bool {
        match self {
            CfgShifter::Latched(sr) => sr.latch_enable(),
            CfgShifter::Counted(sr) => !sr.selected(),
        }
    }
}

///////////////////////////////////////////////////////////////////////

/// Urukul CPLD.
///
/// Driven by successive host pin states through [`Urukul::step`]. Select
/// changes take effect before a clock edge in the same step. The outputs are
/// a function of the state and the chip inputs, see [`Urukul::outputs`].
#[derive(Clone, Debug)]
pub struct Urukul {
    config: CpldConfig,
    shifter: CfgShifter,
    cfg: ConfigRegister,
    status: StatusRegister,
    router: ChipSelectRouter,
    att: AttenuatorSelect,
    readback: Option<Readback>,
    bus: BusIn,
    /// Chip select as decoded from the bus.
    addressed: Selection,
    /// Device actually selected. Idle during a read-back read phase.
    selection: Selection,
    monitor: Option<Sender<CpldEvent>>,
}

impl Urukul {
    pub const CFG_WIDTH: u32 = 24;

    pub fn new(config: CpldConfig) -> Self {
        let readback = match config.revision {
            ProtoRev::V8 => None,
            ProtoRev::V9 => Some(Readback::new(Self::CFG_WIDTH)),
        };
        Self {
            config,
            shifter: CfgShifter::new(config.revision, Self::CFG_WIDTH),
            cfg: ConfigRegister::new(config.revision, config.ifc_mode),
            status: StatusRegister::new(config.revision, config.ifc_mode),
            router: ChipSelectRouter::new(config.ifc_mode),
            att: AttenuatorSelect::new(),
            readback,
            bus: BusIn::default(),
            addressed: Selection::Idle,
            selection: Selection::Idle,
            monitor: None,
        }
    }

    pub fn config(&self) -> &CpldConfig {
        &self.config
    }

    pub fn attach_monitor(&mut self, monitor: Sender<CpldEvent>) {
        self.monitor = Some(monitor);
    }

    pub fn cfg(&self) -> &ConfigFields {
        self.cfg.fields()
    }

    pub fn cfg_raw(&self) -> u32 {
        self.cfg.raw()
    }

    pub fn addressed(&self) -> Selection {
        self.addressed
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn readback_phase(&self) -> Option<ReadbackPhase> {
        self.readback.as_ref().map(|rb| rb.phase())
    }

    /// Byte captured by the last read-back write phase.
    pub fn readback_captured(&self) -> Option<u8> {
        self.readback.as_ref().map(|rb| rb.captured())
    }

    pub fn status(&self, chips: &ChipInputs) -> STA {
        self.status.read(self.cfg.rf_sw(&self.bus), chips)
    }

    pub fn route(&self) -> Route {
        Route::new(self.selection, self.cfg.fields().mask_nu)
    }

    fn emit(&self, event: CpldEvent) {
        if let Some(monitor) = &self.monitor {
            if monitor.send(event).is_err() {
                trace!("monitor gone, dropping {:?}", event);
            }
        }
    }

    /// Applies a new host pin state.
    pub fn step(&mut self, bus: BusIn, chips: &ChipInputs) {
        let prev = self.bus;
        self.bus = bus;

        let addressed = self.router.selection(&bus);
        if addressed != self.addressed {
            if !self.addressed.is_idle() {
                self.deselect();
            }
            if !addressed.is_idle() {
                self.select(addressed);
            }
        }

        match (prev.sck, bus.sck) {
            (false, true) => self.tick(Phase::Sample, chips),
            (true, false) => self.tick(Phase::Shift, chips),
            _ => {},
        }
    }

    fn select(&mut self, addressed: Selection) {
        let reading = self.readback.as_ref().map_or(false, |rb| rb.reading());
        if let Some(rb) = self.readback.as_mut() {
            rb.select(addressed);
        }
        self.addressed = addressed;
        self.selection = if reading { Selection::Idle } else { addressed };

        let route = self.route();
        if route.cfg {
            self.shifter.select(true);
        }
        if route.att {
            self.att.select(true);
        }
        trace!("select {:?} reading={}", addressed, reading);
        self.emit(CpldEvent::Selected(addressed));
    }

    fn deselect(&mut self) {
        let route = self.route();
        let addressed = self.addressed;
        self.addressed = Selection::Idle;
        self.selection = Selection::Idle;
        trace!("deselect {:?}", addressed);
        self.emit(CpldEvent::Deselected(addressed));

        if route.cfg {
            if let Some(word) = self.shifter.select(false) {
                self.latch(word);
            }
        }
        if route.att && self.att.select(false) {
            debug!("att: latched");
            self.emit(CpldEvent::AttenuatorLatched);
        }
        let flipped = self.readback.as_mut().and_then(|rb| rb.deselect());
        if let Some(phase) = flipped {
            debug!("readback: {:?} phase", phase);
            self.emit(CpldEvent::ReadbackPhase(phase));
        }
    }

    fn tick(&mut self, phase: Phase, chips: &ChipInputs) {
        let route = self.route();
        match phase {
            Phase::Sample => {
                let mask_nu = self.cfg.fields().mask_nu;
                let miso = self.router.miso(self.selection, mask_nu, self.shifter.sdo(), chips);
                let sources = Sources {
                    proto_rev: self.config.revision.number(),
                    pll_lock: chips.pll_lock(),
                };
                if let Some(rb) = self.readback.as_mut() {
                    rb.sample(miso, &sources);
                }
                if route.cfg {
                    let parallel_out = u32::from(self.status(chips)) as u64;
                    if let Some(word) = self.shifter.tick(Phase::Sample, self.bus.mosi, parallel_out) {
                        self.latch(word);
                    }
                }
                if route.att {
                    self.att.sample();
                }
            },
            Phase::Shift => {
                if route.cfg {
                    self.shifter.tick(Phase::Shift, false, 0);
                }
                if let Some(rb) = self.readback.as_mut() {
                    rb.shift();
                }
            },
        }
    }

    fn latch(&mut self, word: u64) {
        let fields = self.cfg.update(word);
        debug!("cfg: {:#08x}", self.cfg.raw());
        self.emit(CpldEvent::ConfigLatched { raw: self.cfg.raw(), fields });

        let reset = self.readback.as_mut().and_then(|rb| rb.set_enabled(fields.readback));
        if let Some(phase) = reset {
            debug!("readback: {:?} phase", phase);
            self.emit(CpldEvent::ReadbackPhase(phase));
        }
    }

    /// Everything the CPLD drives for the current state.
    pub fn outputs(&self, chips: &ChipInputs) -> Outputs {
        let mut out = Outputs::default();
        let mask_nu = self.cfg.fields().mask_nu;
        self.cfg.drive(&self.bus, chips, &mut out);
        self.router.drive(&self.route(), mask_nu, &self.bus, self.att.le(), &mut out);

        out.readback = self.readback.as_ref()
            .filter(|rb| rb.reading() && !self.addressed.is_idle())
            .map(|rb| rb.sdo());
        out.miso = if self.router.miso_available() {
            Some(out.readback.unwrap_or_else(||
                self.router.miso(self.selection, mask_nu, self.shifter.sdo(), chips)))
        } else {
            None
        };

        out.tp = [
            out.dds[0].cs_n,
            out.dds[0].sck,
            chips.dds[0].sdo,
            out.dds[0].sdi,
            self.shifter.latch_enable(),
        ];
        out
    }
}

#[cfg(test)]
mod tests {
    use crossbeam::channel::unbounded;

    use super::*;

    /// Host side bit-bang straight into the CPLD, chips left at their pull-ups.
    fn transfer(dut: &mut Urukul, cs: u8, length: u32, data: u64) -> u64 {
        let chips = ChipInputs::default();
        let mut bus = BusIn { cs, ..Default::default() };
        dut.step(bus, &chips);
        let mut miso = 0;
        for i in (0..length).rev() {
            bus.mosi = (data >> i) & 1 != 0;
            bus.sck = false;
            dut.step(bus, &chips);
            miso = (miso << 1) | dut.outputs(&chips).miso.unwrap_or(false) as u64;
            bus.sck = true;
            dut.step(bus, &chips);
        }
        bus.sck = false;
        dut.step(bus, &chips);
        bus.cs = 0;
        dut.step(bus, &chips);
        miso
    }

    #[test]
    fn cfg_write_returns_status() {
        let mut dut = Urukul::new(CpldConfig::default());
        transfer(&mut dut, 1, 24, 0x00_0003);
        assert_eq!(dut.cfg().rf_sw, 0x3);
        let sta = STA::from(transfer(&mut dut, 1, 24, 0x00_0003) as u32);
        assert_eq!(sta.RF_SW(), 0x3);
        assert_eq!(sta.PLL_LOCK(), 0xf);
        assert_eq!(sta.IFC_MODE(), 0b0101);
        assert_eq!(sta.PROTO_REV(), 8);
    }

    #[test]
    fn idle_clocks_change_nothing() {
        let mut dut = Urukul::new(CpldConfig::default());
        transfer(&mut dut, 1, 24, 0x00_0456);
        transfer(&mut dut, 0, 24, 0xff_ffff);
        assert_eq!(dut.cfg_raw(), 0x456);
        assert_eq!(dut.selection(), Selection::Idle);
    }

    #[test]
    fn select_applies_before_clock() {
        let mut dut = Urukul::new(CpldConfig::default());
        let chips = ChipInputs::default();
        // CS and the first rising edge in one step.
        dut.step(BusIn { cs: 1, sck: true, mosi: true, ..Default::default() }, &chips);
        assert_eq!(dut.addressed(), Selection::Cfg);
        dut.step(BusIn { cs: 1, ..Default::default() }, &chips);
        dut.step(BusIn::default(), &chips);
        assert_eq!(dut.addressed(), Selection::Idle);
        assert_eq!(dut.cfg_raw() & 0x1, 0x1);
    }

    #[test]
    fn code_change_is_deselect_and_select() {
        let mut dut = Urukul::new(CpldConfig::default());
        let (sender, receiver) = unbounded();
        dut.attach_monitor(sender);
        let chips = ChipInputs::default();
        dut.step(BusIn { cs: 2, ..Default::default() }, &chips);
        dut.step(BusIn { cs: 2, sck: true, ..Default::default() }, &chips);
        dut.step(BusIn { cs: 1, ..Default::default() }, &chips);
        dut.step(BusIn::default(), &chips);

        let events: Vec<CpldEvent> = receiver.try_iter().collect();
        assert_eq!(events, vec![
            CpldEvent::Selected(Selection::Att),
            CpldEvent::Deselected(Selection::Att),
            CpldEvent::AttenuatorLatched,
            CpldEvent::Selected(Selection::Cfg),
            CpldEvent::Deselected(Selection::Cfg),
        ]);
    }

    #[test]
    fn rev9_latches_without_deselect() {
        let mut dut = Urukul::new(CpldConfig { revision: ProtoRev::V9, ..Default::default() });
        let chips = ChipInputs::default();
        let mut bus = BusIn { cs: 1, ..Default::default() };
        dut.step(bus, &chips);
        for i in (0..24).rev() {
            bus.mosi = (0x000456 >> i) & 1 != 0;
            bus.sck = true;
            dut.step(bus, &chips);
            bus.sck = false;
            dut.step(bus, &chips);
        }
        assert_eq!(dut.cfg_raw(), 0x456);
        assert_eq!(dut.selection(), Selection::Cfg);
    }

    #[test]
    fn rev9_short_transaction_discarded() {
        let mut dut = Urukul::new(CpldConfig { revision: ProtoRev::V9, ..Default::default() });
        transfer(&mut dut, 1, 23, 0x7f_ffff);
        assert_eq!(dut.cfg_raw(), 0);
        transfer(&mut dut, 1, 24, 0x00_0001);
        assert_eq!(dut.cfg_raw(), 0x1);
    }

    #[test]
    fn dropped_monitor_is_ignored() {
        let mut dut = Urukul::new(CpldConfig::default());
        let (sender, receiver) = unbounded();
        dut.attach_monitor(sender);
        drop(receiver);
        transfer(&mut dut, 1, 24, 0x1);
        assert_eq!(dut.cfg_raw(), 0x1);
    }

    #[test]
    fn miso_not_driven_with_en_nu() {
        let dut = Urukul::new(CpldConfig {
            revision: ProtoRev::V8,
            ifc_mode: IFC_MODE::default().with_EN_NU(1),
        });
        let out = dut.outputs(&ChipInputs::default());
        assert_eq!(out.miso, None);
        assert_eq!(out.readback, None);
        assert_eq!(out.io_update_ret, None);
    }
}
