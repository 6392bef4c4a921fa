use std::cell::RefCell;
use std::rc::Rc;

use marquee_core::core::interrupt::{InterruptBank, InterruptKind, InterruptLine, LineDriver};
use marquee_core::device::pia6821::PiaBindings;
use marquee_core::device::pia_registry::{Addressing, PiaRegistry};

// ==========================================================================
// Wire-OR line
// ==========================================================================

#[test]
fn test_line_or_composition() {
    let line = InterruptLine::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    line.connect({
        let events = Rc::clone(&events);
        move |level: bool| events.borrow_mut().push(level)
    });

    let d0 = LineDriver::attach(&line);
    let d1 = LineDriver::attach(&line);

    // First assertion raises the line
    d0.set(true);
    assert!(line.state());
    assert_eq!(*events.borrow(), vec![true]);

    // Second driver joining changes nothing observable
    d1.set(true);
    assert_eq!(*events.borrow(), vec![true]);

    // Releasing one driver keeps the line held by the other
    d0.set(false);
    assert!(line.state());
    assert_eq!(*events.borrow(), vec![true]);

    // Releasing the last driver drops the line, exactly once
    d1.set(false);
    assert!(!line.state());
    assert_eq!(*events.borrow(), vec![true, false]);
}

#[test]
fn test_line_redundant_reports_are_noops() {
    let line = InterruptLine::new();
    let count = Rc::new(RefCell::new(0));
    line.connect({
        let count = Rc::clone(&count);
        move |_| *count.borrow_mut() += 1
    });

    let d = LineDriver::attach(&line);
    d.set(true);
    d.set(true);
    d.set(false);
    d.set(false);
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn test_two_pias_share_one_irq_line() {
    let line = InterruptLine::new();
    let mut registry = PiaRegistry::new();

    for i in 0..2 {
        registry.configure(
            i,
            Addressing::default(),
            PiaBindings {
                irq_a: Some(LineDriver::attach(&line)),
                ..Default::default()
            },
        );
        registry.write(i, 1, 0x07); // CA1 rising armed + enabled, data reg
    }

    // Chip 0's flag raises the shared line
    registry.pia(0).unwrap().set_ca1(true);
    assert!(line.state());

    // Chip 1 joining keeps it raised
    registry.pia(1).unwrap().set_ca1(true);
    assert!(line.state());

    // Clearing chip 0 (data-register read) leaves chip 1 holding it
    registry.read(0, 0);
    assert!(line.state());

    // Clearing chip 1 finally releases the line
    registry.read(1, 0);
    assert!(!line.state());
}

#[test]
fn test_reset_releases_shared_line() {
    let line = InterruptLine::new();
    let mut registry = PiaRegistry::new();
    registry.configure(
        0,
        Addressing::default(),
        PiaBindings {
            irq_a: Some(LineDriver::attach(&line)),
            ..Default::default()
        },
    );

    registry.write(0, 1, 0x07);
    registry.pia(0).unwrap().set_ca1(true);
    assert!(line.state());

    registry.reset_all();
    assert!(!line.state());
}

#[test]
fn test_dropped_driver_releases_line() {
    let line = InterruptLine::new();

    let d0 = LineDriver::attach(&line);
    let d1 = LineDriver::attach(&line);
    d0.set(true);
    d1.set(true);

    // Dropping one asserting driver leaves the other holding the line
    drop(d0);
    assert!(line.state());

    // Dropping the last asserting driver releases it
    drop(d1);
    assert!(!line.state());

    // The vacated slots are reused and the line still works
    let d2 = LineDriver::attach(&line);
    d2.set(true);
    assert!(line.state());
    d2.set(false);
    assert!(!line.state());
}

#[test]
fn test_unconfigure_releases_shared_line() {
    let line = InterruptLine::new();
    let mut registry = PiaRegistry::new();
    registry.configure(
        0,
        Addressing::default(),
        PiaBindings {
            irq_a: Some(LineDriver::attach(&line)),
            ..Default::default()
        },
    );

    registry.write(0, 1, 0x07);
    registry.pia(0).unwrap().set_ca1(true);
    assert!(line.state());

    // Tearing the chip down must not leave the line stuck high
    registry.unconfigure_all();
    assert!(!line.state());
}

#[test]
fn test_reconfigure_releases_shared_line() {
    let line = InterruptLine::new();
    let mut registry = PiaRegistry::new();

    let assert_via_ca1 = |registry: &mut PiaRegistry| {
        registry.write(0, 1, 0x07);
        registry.pia(0).unwrap().set_ca1(true);
    };

    registry.configure(
        0,
        Addressing::default(),
        PiaBindings {
            irq_a: Some(LineDriver::attach(&line)),
            ..Default::default()
        },
    );
    assert_via_ca1(&mut registry);
    assert!(line.state());

    // Replacing the chip drops the old driver and releases the line
    registry.configure(
        0,
        Addressing::default(),
        PiaBindings {
            irq_a: Some(LineDriver::attach(&line)),
            ..Default::default()
        },
    );
    assert!(!line.state());

    // The replacement chip can raise it again
    assert_via_ca1(&mut registry);
    assert!(line.state());
}

// ==========================================================================
// CPU interrupt bank
// ==========================================================================

#[test]
fn test_level_held_until_cleared() {
    let bank = InterruptBank::new(2);

    bank.assert(0, InterruptKind::Maskable);
    bank.assert(0, InterruptKind::Maskable); // idempotent
    assert!(bank.sample(0).irq);
    assert!(bank.sample(0).irq); // still held after sampling
    assert!(!bank.sample(1).irq); // other CPU unaffected

    bank.clear(0, InterruptKind::Maskable);
    assert!(!bank.sample(0).irq);
}

#[test]
fn test_pulse_consumed_by_one_sample() {
    let bank = InterruptBank::new(1);

    bank.pulse(0, InterruptKind::Fast);
    bank.pulse(0, InterruptKind::Fast); // coalesces, not queued
    assert!(bank.sample(0).firq);
    assert!(!bank.sample(0).firq);
    assert!(!bank.level(0, InterruptKind::Fast)); // pulses hold no level
}

#[test]
fn test_kinds_are_independent() {
    let bank = InterruptBank::new(1);

    bank.assert(0, InterruptKind::Fast);
    let state = bank.sample(0);
    assert!(state.firq);
    assert!(!state.irq);
}

#[test]
fn test_out_of_range_cpu_ignored() {
    let bank = InterruptBank::new(1);

    bank.assert(5, InterruptKind::Maskable);
    bank.pulse(5, InterruptKind::Maskable);
    assert!(!bank.level(5, InterruptKind::Maskable));
    assert!(!bank.sample(5).irq);
}

#[test]
fn test_line_drives_bank() {
    // An aggregated PIA line mapped onto a CPU's maskable input.
    let bank = InterruptBank::new(2);
    let line = InterruptLine::new();
    line.connect({
        let bank = Rc::clone(&bank);
        move |level: bool| {
            if level {
                bank.assert(1, InterruptKind::Maskable);
            } else {
                bank.clear(1, InterruptKind::Maskable);
            }
        }
    });

    let d = LineDriver::attach(&line);
    d.set(true);
    assert!(bank.sample(1).irq);
    d.set(false);
    assert!(!bank.sample(1).irq);
}
