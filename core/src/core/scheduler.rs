use log::trace;

/// Opaque trigger handle.
///
/// Handles are allocated by [`Scheduler::allocate_trigger`] and never
/// reused, so unrelated subsystems cannot collide the way bare integer
/// trigger IDs could.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger(u64);

/// Handle for one virtual CPU registered with the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuId(usize);

impl CpuId {
    /// Index into machine-side per-CPU tables (bus masters, interrupt
    /// bank slots).
    pub fn index(&self) -> usize {
        self.0
    }
}

struct Timeout {
    trigger: Trigger,
    due: u64,
}

#[derive(Default)]
struct CpuSlot {
    /// Trigger this CPU is suspended on, if any.
    hold: Option<Trigger>,
}

/// Cooperative trigger scheduler for independently-clocked virtual CPUs.
///
/// Time is counted in master-clock cycles and advances only through
/// [`advance`](Scheduler::advance). A CPU that signals a peer and
/// suspends via [`yield_until`](Scheduler::yield_until) always resumes:
/// either the peer fires the trigger explicitly, or the watchdog
/// timeout armed with [`schedule_timeout`](Scheduler::schedule_timeout)
/// fires it at its due time. A misbehaving or interrupt-masked peer can
/// therefore never permanently stall the signalling CPU.
pub struct Scheduler {
    now: u64,
    // u64 so routine per-yield allocation can never wrap the counter.
    next_trigger: u64,
    /// At most one pending timeout per trigger.
    timeouts: Vec<Timeout>,
    cpus: Vec<CpuSlot>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_trigger: 0,
            timeouts: Vec::new(),
            cpus: Vec::new(),
        }
    }

    /// Register a virtual CPU, initially runnable.
    pub fn add_cpu(&mut self) -> CpuId {
        self.cpus.push(CpuSlot::default());
        CpuId(self.cpus.len() - 1)
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    /// Current simulated time in master-clock cycles.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Allocate a fresh trigger handle.
    pub fn allocate_trigger(&mut self) -> Trigger {
        let trigger = Trigger(self.next_trigger);
        self.next_trigger += 1;
        trigger
    }

    /// Arm a one-shot fallback fire of `trigger` after `delay` cycles,
    /// unless the trigger fires earlier by other means. Re-arming an
    /// already-armed trigger replaces the prior timeout.
    pub fn schedule_timeout(&mut self, trigger: Trigger, delay: u64) {
        self.timeouts.retain(|t| t.trigger != trigger);
        self.timeouts.push(Timeout {
            trigger,
            due: self.now + delay,
        });
    }

    /// Fire a trigger: resume every CPU held on it and cancel its
    /// pending timeout. Firing a trigger with no waiters and no pending
    /// timeout is a silent no-op.
    pub fn fire(&mut self, trigger: Trigger) {
        for (i, cpu) in self.cpus.iter_mut().enumerate() {
            if cpu.hold == Some(trigger) {
                cpu.hold = None;
                trace!("cpu {} resumed by {:?} at {}", i, trigger, self.now);
            }
        }
        self.timeouts.retain(|t| t.trigger != trigger);
    }

    /// Suspend a CPU until `trigger` fires. The CPU receives no further
    /// time slices until then; pair with `schedule_timeout` for a
    /// watchdog fallback.
    pub fn yield_until(&mut self, cpu: CpuId, trigger: Trigger) {
        if let Some(slot) = self.cpus.get_mut(cpu.0) {
            trace!("cpu {} held on {:?} at {}", cpu.0, trigger, self.now);
            slot.hold = Some(trigger);
        }
    }

    /// Suspend a CPU for a fixed simulated duration. Uses a private
    /// trigger, so nothing else can resume it early.
    pub fn yield_for(&mut self, cpu: CpuId, delay: u64) {
        let trigger = self.allocate_trigger();
        self.yield_until(cpu, trigger);
        self.schedule_timeout(trigger, delay);
    }

    /// Whether a CPU may run this slice.
    pub fn runnable(&self, cpu: CpuId) -> bool {
        self.cpus.get(cpu.0).is_some_and(|slot| slot.hold.is_none())
    }

    /// Advance simulated time by `cycles`, firing due timeouts at their
    /// exact due times, in due order.
    pub fn advance(&mut self, cycles: u64) {
        let end = self.now + cycles;
        loop {
            let next = self
                .timeouts
                .iter()
                .filter(|t| t.due <= end)
                .min_by_key(|t| t.due)
                .map(|t| (t.trigger, t.due));
            match next {
                Some((trigger, due)) => {
                    self.now = self.now.max(due);
                    self.fire(trigger);
                }
                None => break,
            }
        }
        self.now = end;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one frame of time-sliced cooperative execution.
///
/// Each slice, every runnable CPU gets one `step` call; `step` may call
/// back into the scheduler to yield, fire triggers, or arm timeouts.
/// Time then advances by `slice_cycles`. The slice count is a machine
/// configuration constant, chosen high enough that inter-CPU handshakes
/// complete within a frame.
pub fn run_frame<M>(
    sched: &mut Scheduler,
    machine: &mut M,
    slices: u32,
    slice_cycles: u64,
    mut step: impl FnMut(&mut Scheduler, &mut M, CpuId, u64),
) {
    for _ in 0..slices {
        for i in 0..sched.cpu_count() {
            let cpu = CpuId(i);
            if sched.runnable(cpu) {
                step(sched, machine, cpu, slice_cycles);
            }
        }
        sched.advance(slice_cycles);
    }
}
