//! Cross-CPU handshake liveness.
//!
//! A "data" CPU posts a command byte through its PIA, then suspends on a
//! trigger with a watchdog timeout. A "sound" CPU acknowledges by reading
//! its own PIA data port; the read strobe on CA2 fires the trigger. The
//! data CPU must resume exactly once: at the acknowledge time if the
//! peer responds, at the watchdog deadline if it never does.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use marquee_core::core::scheduler::{CpuId, Scheduler, Trigger};
use marquee_core::device::pia6821::PiaBindings;
use marquee_core::device::pia_registry::{Addressing, PiaRegistry};

const DATA_PIA: usize = 0;
const SOUND_PIA: usize = 1;

const COMMAND: u8 = 0x42;
const WATCHDOG: u64 = 100;
const ACK_TIME: u64 = 40;
const FRAME: u64 = 200;

struct Harness {
    sched: Rc<RefCell<Scheduler>>,
    registry: PiaRegistry,
    cpu_data: CpuId,
    trigger: Trigger,
    latch: Rc<Cell<u8>>,
}

fn build() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let sched = Rc::new(RefCell::new(Scheduler::new()));
    let cpu_data = sched.borrow_mut().add_cpu();
    let _cpu_sound = sched.borrow_mut().add_cpu();
    let trigger = sched.borrow_mut().allocate_trigger();

    // The command byte travels over a latched parallel connection
    // between the two boards.
    let latch = Rc::new(Cell::new(0u8));

    let mut registry = PiaRegistry::new();
    registry.configure(
        DATA_PIA,
        Addressing::default(),
        PiaBindings {
            port_b_out: Some(Box::new({
                let latch = Rc::clone(&latch);
                move |data: u8| latch.set(data)
            })),
            ..Default::default()
        },
    );
    registry.configure(
        SOUND_PIA,
        Addressing::default(),
        PiaBindings {
            port_a_in: Some(Box::new({
                let latch = Rc::clone(&latch);
                move || latch.get()
            })),
            // The falling edge of the read strobe acknowledges the
            // command and wakes the sender.
            ca2_out: Some(Box::new({
                let sched = Rc::clone(&sched);
                move |level: bool| {
                    if !level {
                        sched.borrow_mut().fire(trigger);
                    }
                }
            })),
            ..Default::default()
        },
    );

    // Data PIA: port B all output, data register selected.
    registry.write(DATA_PIA, 2, 0xFF);
    registry.write(DATA_PIA, 3, 0x04);
    // Sound PIA: port A input, CA2 as read strobe restored on E.
    registry.write(SOUND_PIA, 1, 0x2C);

    Harness {
        sched,
        registry,
        cpu_data,
        trigger,
        latch,
    }
}

/// Drive the frame one cycle per slice. The acknowledging CPU steps
/// first within a slice so a same-cycle acknowledge is seen by the
/// sender at that cycle, not one later.
fn run(h: &mut Harness, ack_at: Option<u64>) -> Vec<u64> {
    let mut resumes = Vec::new();
    let mut sent = false;

    for _ in 0..FRAME {
        let now = h.sched.borrow().now();

        if Some(now) == ack_at {
            let command = h.registry.read(SOUND_PIA, 0);
            assert_eq!(command, COMMAND);
        }

        if h.sched.borrow().runnable(h.cpu_data) {
            if !sent {
                h.registry.write(DATA_PIA, 2, COMMAND);
                let mut sched = h.sched.borrow_mut();
                sched.yield_until(h.cpu_data, h.trigger);
                sched.schedule_timeout(h.trigger, WATCHDOG);
                sent = true;
            } else {
                resumes.push(now);
            }
        }

        h.sched.borrow_mut().advance(1);
    }

    resumes
}

#[test]
fn test_acknowledge_resumes_sender_at_ack_time() {
    let mut h = build();
    let resumes = run(&mut h, Some(ACK_TIME));
    assert_eq!(h.latch.get(), COMMAND);
    assert_eq!(resumes.first(), Some(&ACK_TIME));
}

#[test]
fn test_watchdog_resumes_sender_without_acknowledge() {
    let mut h = build();
    let resumes = run(&mut h, None);
    assert_eq!(resumes.first(), Some(&WATCHDOG));
}

#[test]
fn test_resume_happens_exactly_once() {
    // Once resumed, the sender runs every remaining slice; the first
    // entry is the resume, the rest must be consecutive (no second
    // wake-up glitch from a stale watchdog).
    let mut h = build();
    let resumes = run(&mut h, Some(ACK_TIME));
    for pair in resumes.windows(2) {
        assert_eq!(pair[1], pair[0] + 1);
    }
    assert_eq!(resumes.len() as u64, FRAME - ACK_TIME);
}
