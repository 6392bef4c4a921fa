use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::trace;

/// Interrupt inputs a virtual CPU distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptKind {
    /// Ordinary maskable interrupt request (IRQ).
    Maskable,
    /// Fast interrupt request (FIRQ on the 6809; ignored by CPUs
    /// without one).
    Fast,
}

/// Aggregate interrupt view a CPU core samples at the start of a slice.
#[derive(Default, Clone, Copy, Debug)]
pub struct InterruptState {
    pub irq: bool,
    pub firq: bool,
}

// ---------------------------------------------------------------------------
// Wire-OR interrupt line
// ---------------------------------------------------------------------------

/// An open-collector interrupt line shared by several drivers.
///
/// The line is asserted iff at least one registered driver asserts it,
/// and deasserts only when every driver has released it. Each
/// participant registers once via [`LineDriver::attach`] and reports
/// its own level through the returned handle; the line
/// recomputes its OR state on every report and invokes the connected
/// sink exactly once per observable change. Dropping a handle releases
/// its level and returns its slot to the line for reuse.
///
/// Single simulation thread only; sharing is via `Rc` with interior
/// mutability.
pub struct InterruptLine {
    /// One entry per attached driver; `None` marks a vacated slot.
    drivers: RefCell<Vec<Option<bool>>>,
    state: Cell<bool>,
    sink: RefCell<Option<Box<dyn FnMut(bool)>>>,
}

impl InterruptLine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            drivers: RefCell::new(Vec::new()),
            state: Cell::new(false),
            sink: RefCell::new(None),
        })
    }

    /// Install the sink invoked on every change of the line's OR state.
    /// Replaces any previous sink.
    pub fn connect(&self, sink: impl FnMut(bool) + 'static) {
        *self.sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Current OR state of the line.
    pub fn state(&self) -> bool {
        self.state.get()
    }

    fn set(&self, index: usize, level: bool) {
        let new_state = {
            let mut drivers = self.drivers.borrow_mut();
            drivers[index] = Some(level);
            drivers.iter().flatten().any(|&d| d)
        };
        if new_state != self.state.get() {
            self.state.set(new_state);
            trace!("interrupt line -> {}", new_state);
            if let Some(sink) = self.sink.borrow_mut().as_mut() {
                sink(new_state);
            }
        }
    }
}

/// One participant's handle on a shared [`InterruptLine`].
pub struct LineDriver {
    line: Rc<InterruptLine>,
    index: usize,
}

impl LineDriver {
    /// Register a new driver on `line`, initially released. A slot
    /// vacated by a dropped handle is reused before the line grows.
    pub fn attach(line: &Rc<InterruptLine>) -> Self {
        let index = {
            let mut drivers = line.drivers.borrow_mut();
            match drivers.iter().position(Option::is_none) {
                Some(index) => {
                    drivers[index] = Some(false);
                    index
                }
                None => {
                    drivers.push(Some(false));
                    drivers.len() - 1
                }
            }
        };
        Self {
            line: Rc::clone(line),
            index,
        }
    }

    /// Report this driver's level. Re-reporting the same level is a
    /// no-op at the line.
    pub fn set(&self, level: bool) {
        self.line.set(self.index, level);
    }
}

impl Drop for LineDriver {
    /// A dropped driver releases whatever it was asserting, so a line
    /// can never be held high by a participant that no longer exists.
    fn drop(&mut self) {
        self.line.set(self.index, false);
        self.line.drivers.borrow_mut()[self.index] = None;
    }
}

// ---------------------------------------------------------------------------
// Per-CPU interrupt bank
// ---------------------------------------------------------------------------

#[derive(Default, Clone, Copy)]
struct CpuLines {
    // Level-held lines stay asserted until explicitly cleared.
    irq_level: bool,
    firq_level: bool,
    // Pulses are consumed by the next sample().
    irq_pulse: bool,
    firq_pulse: bool,
}

/// Maps aggregated or direct signals onto virtual CPU interrupt inputs.
///
/// Supports two delivery styles, both idempotent:
/// - level-held (`assert`/`clear`): the line stays asserted until
///   cleared, for peer-to-peer signalling the target must explicitly
///   acknowledge;
/// - pulse (`pulse`): a single request consumed by the next `sample`,
///   for targets whose interrupt handling self-clears.
///
/// Out-of-range CPU indices are ignored, matching the permissive
/// behavior of writes to hardware that does not exist.
pub struct InterruptBank {
    cpus: RefCell<Vec<CpuLines>>,
}

impl InterruptBank {
    pub fn new(num_cpus: usize) -> Rc<Self> {
        Rc::new(Self {
            cpus: RefCell::new(vec![CpuLines::default(); num_cpus]),
        })
    }

    /// Assert a level-held interrupt line.
    pub fn assert(&self, cpu: usize, kind: InterruptKind) {
        self.with(cpu, |lines| match kind {
            InterruptKind::Maskable => lines.irq_level = true,
            InterruptKind::Fast => lines.firq_level = true,
        });
    }

    /// Release a level-held interrupt line.
    pub fn clear(&self, cpu: usize, kind: InterruptKind) {
        self.with(cpu, |lines| match kind {
            InterruptKind::Maskable => lines.irq_level = false,
            InterruptKind::Fast => lines.firq_level = false,
        });
    }

    /// Request a single-shot interrupt, delivered by the next `sample`.
    /// Pulsing again before delivery coalesces into one request.
    pub fn pulse(&self, cpu: usize, kind: InterruptKind) {
        self.with(cpu, |lines| match kind {
            InterruptKind::Maskable => lines.irq_pulse = true,
            InterruptKind::Fast => lines.firq_pulse = true,
        });
    }

    /// Current level of a held line (pulses not included).
    pub fn level(&self, cpu: usize, kind: InterruptKind) -> bool {
        self.cpus
            .borrow()
            .get(cpu)
            .map(|lines| match kind {
                InterruptKind::Maskable => lines.irq_level,
                InterruptKind::Fast => lines.firq_level,
            })
            .unwrap_or(false)
    }

    /// Sample the CPU's interrupt inputs, consuming pending pulses.
    /// Called by the execution loop at the start of each slice.
    pub fn sample(&self, cpu: usize) -> InterruptState {
        let mut cpus = self.cpus.borrow_mut();
        match cpus.get_mut(cpu) {
            Some(lines) => {
                let state = InterruptState {
                    irq: lines.irq_level || lines.irq_pulse,
                    firq: lines.firq_level || lines.firq_pulse,
                };
                lines.irq_pulse = false;
                lines.firq_pulse = false;
                state
            }
            None => InterruptState::default(),
        }
    }

    fn with(&self, cpu: usize, f: impl FnOnce(&mut CpuLines)) {
        if let Some(lines) = self.cpus.borrow_mut().get_mut(cpu) {
            f(lines);
        }
    }
}
