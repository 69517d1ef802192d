use console::{style, Color};

use urukul_cpld::event::CpldEvent;
use urukul_cpld::readback::ReadbackPhase;

pub fn print_cpld_event(event: &CpldEvent) {
    match event {
        CpldEvent::Selected(_) | CpldEvent::Deselected(_) => {
            eprintln!("{}", style(event).dim());
        },
        CpldEvent::ConfigLatched { raw, fields } => {
            let color = |v| if v != 0 { Color::Green } else { Color::Black };
            eprintln!("cfg      0x{raw:06x} RF_SW=[{}{}{}{}] LED=0x{:x} PROFILE={} MASK_NU=0b{:04b}{}",
                style("0").fg(color(fields.rf_sw & 0x1)),
                style("1").fg(color(fields.rf_sw & 0x2)),
                style("2").fg(color(fields.rf_sw & 0x4)),
                style("3").fg(color(fields.rf_sw & 0x8)),
                fields.led,
                fields.profile,
                fields.mask_nu,
                if fields.rst { " RST" } else { "" },
            );
        },
        CpldEvent::AttenuatorLatched => {
            eprintln!("{}", style(event).fg(Color::Cyan));
        },
        CpldEvent::ReadbackPhase(phase) => {
            let color = match phase {
                ReadbackPhase::Write => Color::Yellow,
                ReadbackPhase::Read => Color::Magenta,
            };
            eprintln!("{}", style(event).fg(color));
        },
    }
}
