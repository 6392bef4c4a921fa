use crate::core::interrupt::LineDriver;
use crate::core::pins::{LineInput, LineOutput, PortInput, PortOutput};

/// MC6821 Peripheral Interface Adapter (PIA)
///
/// The 6820 and 6821 are register-compatible. This implementation covers
/// the full register set: data direction registers, data ports, control
/// registers, interrupt flags, edge-detected control line inputs, and
/// the C2 output modes (direct set/reset and automatic strobe).
///
/// Each side (A and B) has:
/// - A data port connected to external hardware
/// - An output register (ORA/ORB) latching CPU writes
/// - A data direction register (DDRA/DDRB): 0=input, 1=output per bit
/// - A control register (CRA/CRB) controlling interrupts, register
///   selection, and the C2 line mode
/// - Two control/interrupt lines (CA1/CA2 or CB1/CB2)
///
/// Register addressing uses RS1:RS0 (2 bits = 4 locations), with CRx bit 2
/// selecting between DDR and data register at offsets 0 and 2.
///
/// External hardware attaches through a [`PiaBindings`] record. Every
/// binding is optional: an absent binding skips that step of the
/// protocol, it is never an error.
///
/// # Control register bits
///
/// | Bit | Meaning (input C2)            | Meaning (output C2)            |
/// |-----|-------------------------------|--------------------------------|
/// | 0   | C1 interrupt enable           | C1 interrupt enable            |
/// | 1   | C1 active edge (1=rising)     | C1 active edge (1=rising)      |
/// | 2   | 1=data register, 0=DDR        | 1=data register, 0=DDR         |
/// | 3   | C2 interrupt enable           | strobe: restore on E; set mode: level |
/// | 4   | C2 active edge (1=rising)     | 0=strobe mode, 1=set/reset mode |
/// | 5   | 0 (C2 is input)               | 1 (C2 is output)               |
/// | 6-7 | read-only interrupt flags     | read-only interrupt flags      |
pub struct Pia6821 {
    // Port A
    out_a: u8, // Output Register A (ORA) — written by CPU, stored unmasked
    ddr_a: u8, // Data Direction Register A (0=input, 1=output)
    ctl_a: u8, // Control Register A (CRA), bits 5:0 only
    in_a: u8,  // Last-sampled external input pins

    // Port B
    out_b: u8,
    ddr_b: u8,
    ctl_b: u8,
    in_b: u8,

    // Interrupt flags (bits 7 and 6 of control registers, stored separately)
    irq_a1: bool, // Set by CA1 transition
    irq_a2: bool, // Set by CA2 transition (when CA2 is input)
    irq_b1: bool,
    irq_b2: bool,

    // Control line last-sampled state (edge-detection memory)
    in_ca1: bool,
    in_ca2: bool,
    in_cb1: bool,
    in_cb2: bool,

    // Driven level of each C2 line when configured as output
    out_ca2: bool,
    out_cb2: bool,

    // Aggregate IRQ outputs, derived — recomputed by update_interrupts(),
    // never written directly by a register access
    irq_a_state: bool,
    irq_b_state: bool,

    bindings: PiaBindings,
}

/// External wiring for one PIA. All fields optional.
#[derive(Default)]
pub struct PiaBindings {
    pub port_a_in: Option<Box<dyn PortInput>>,
    pub port_b_in: Option<Box<dyn PortInput>>,
    pub ca1_in: Option<Box<dyn LineInput>>,
    pub ca2_in: Option<Box<dyn LineInput>>,
    pub cb1_in: Option<Box<dyn LineInput>>,
    pub cb2_in: Option<Box<dyn LineInput>>,
    pub port_a_out: Option<Box<dyn PortOutput>>,
    pub port_b_out: Option<Box<dyn PortOutput>>,
    pub ca2_out: Option<Box<dyn LineOutput>>,
    pub cb2_out: Option<Box<dyn LineOutput>>,
    pub irq_a: Option<LineDriver>,
    pub irq_b: Option<LineDriver>,
}

// Control register bit masks
const CTL_IRQ1_ENABLE: u8 = 0x01; // C1 interrupt enable
const CTL_C1_RISING: u8 = 0x02; // C1 active edge: 1 = low-to-high
const CTL_DATA_SELECT: u8 = 0x04; // 1 = data register, 0 = DDR
const CTL_IRQ2_ENABLE: u8 = 0x08; // C2 interrupt enable / strobe restore / set level
const CTL_C2_RISING: u8 = 0x10; // C2 active edge / output mode select
const CTL_C2_OUTPUT: u8 = 0x20; // 1 = C2 is output
const CTL_STORED_MASK: u8 = 0x3F; // bits 7:6 are read-only flags

fn c2_output(ctl: u8) -> bool {
    (ctl & CTL_C2_OUTPUT) != 0
}

/// Output C2 with bit 4 clear: automatic strobe on data register access.
fn c2_strobe_mode(ctl: u8) -> bool {
    c2_output(ctl) && (ctl & CTL_C2_RISING) == 0
}

/// In strobe mode, bit 3 set restores the strobe on the same access
/// ("E restore"); clear restores it on the next active C1 transition.
fn strobe_e_restore(ctl: u8) -> bool {
    (ctl & CTL_IRQ2_ENABLE) != 0
}

impl Pia6821 {
    /// Create a new PIA with all registers zeroed (all pins input, no
    /// interrupts) and nothing bound.
    pub fn new() -> Self {
        Self {
            out_a: 0,
            ddr_a: 0,
            ctl_a: 0,
            in_a: 0,

            out_b: 0,
            ddr_b: 0,
            ctl_b: 0,
            in_b: 0,

            irq_a1: false,
            irq_a2: false,
            irq_b1: false,
            irq_b2: false,

            in_ca1: false,
            in_ca2: false,
            in_cb1: false,
            in_cb2: false,

            out_ca2: false,
            out_cb2: false,

            irq_a_state: false,
            irq_b_state: false,

            bindings: PiaBindings::default(),
        }
    }

    /// Install the external wiring. Replaces any previous bindings.
    pub fn bind(&mut self, bindings: PiaBindings) {
        self.bindings = bindings;
    }

    /// Drop the external wiring, leaving the pin groups unbound.
    pub fn unbind(&mut self) {
        self.bindings = PiaBindings::default();
    }

    /// Zero all mutable register state, preserving bindings. A held IRQ
    /// line is released so shared wire-OR lines stay consistent.
    pub fn reset(&mut self) {
        let had_irq_a = self.irq_a_state;
        let had_irq_b = self.irq_b_state;

        self.out_a = 0;
        self.ddr_a = 0;
        self.ctl_a = 0;
        self.in_a = 0;
        self.out_b = 0;
        self.ddr_b = 0;
        self.ctl_b = 0;
        self.in_b = 0;
        self.irq_a1 = false;
        self.irq_a2 = false;
        self.irq_b1 = false;
        self.irq_b2 = false;
        self.in_ca1 = false;
        self.in_ca2 = false;
        self.in_cb1 = false;
        self.in_cb2 = false;
        self.out_ca2 = false;
        self.out_cb2 = false;
        self.irq_a_state = false;
        self.irq_b_state = false;

        if had_irq_a {
            if let Some(line) = &self.bindings.irq_a {
                line.set(false);
            }
        }
        if had_irq_b {
            if let Some(line) = &self.bindings.irq_b {
                line.set(false);
            }
        }
    }

    /// Read from PIA register. `offset` is RS1:RS0 (0-3).
    ///
    /// | Offset | CRx.2 | Register            |
    /// |--------|-------|---------------------|
    /// | 0      | 0     | DDRA                |
    /// | 0      | 1     | Port A data         |
    /// | 1      | x     | CRA                 |
    /// | 2      | 0     | DDRB                |
    /// | 2      | 1     | Port B data         |
    /// | 3      | x     | CRB                 |
    ///
    /// Reading a data port samples the bound input, clears both IRQ
    /// flags for that side, and (port A, CA2 in output strobe mode)
    /// pulses the read strobe.
    pub fn read(&mut self, offset: u8) -> u8 {
        match offset & 0x03 {
            0 => {
                if (self.ctl_a & CTL_DATA_SELECT) != 0 {
                    self.read_port_a()
                } else {
                    self.ddr_a
                }
            }
            1 => self.read_control_a(),
            2 => {
                if (self.ctl_b & CTL_DATA_SELECT) != 0 {
                    self.read_port_b()
                } else {
                    self.ddr_b
                }
            }
            3 => self.read_control_b(),
            _ => unreachable!(),
        }
    }

    /// Write to PIA register. `offset` is RS1:RS0 (0-3).
    ///
    /// Writing to a data port stores the value in ORA/ORB and drives the
    /// bound output with the DDR-masked value. Writing to a control
    /// register only affects bits 5:0 (bits 7:6 are read-only flags).
    pub fn write(&mut self, offset: u8, data: u8) {
        match offset & 0x03 {
            0 => {
                if (self.ctl_a & CTL_DATA_SELECT) != 0 {
                    self.write_port_a(data);
                } else {
                    self.write_ddr_a(data);
                }
            }
            1 => self.write_control_a(data),
            2 => {
                if (self.ctl_b & CTL_DATA_SELECT) != 0 {
                    self.write_port_b(data);
                } else {
                    self.write_ddr_b(data);
                }
            }
            3 => self.write_control_b(data),
            _ => unreachable!(),
        }
    }

    // --- Port A ---

    fn read_port_a(&mut self) -> u8 {
        if let Some(input) = self.bindings.port_a_in.as_mut() {
            self.in_a = input.sample();
        }
        let value = (self.out_a & self.ddr_a) | (self.in_a & !self.ddr_a);

        // A data-port read clears both flags for this side.
        self.irq_a1 = false;
        self.irq_a2 = false;
        self.update_interrupts();

        // CA2 output strobe: the read pulses CA2 low. With E restore it
        // comes back high on the same access, otherwise the next active
        // CA1 transition restores it (see set_ca1).
        if c2_strobe_mode(self.ctl_a) {
            if self.out_ca2 {
                if let Some(out) = self.bindings.ca2_out.as_mut() {
                    out.write(false);
                }
            }
            self.out_ca2 = false;

            if strobe_e_restore(self.ctl_a) {
                if let Some(out) = self.bindings.ca2_out.as_mut() {
                    out.write(true);
                }
                self.out_ca2 = true;
            }
        }

        value
    }

    fn write_port_a(&mut self, data: u8) {
        // ORA stores the raw byte; only DDR=1 bits reach the pins.
        self.out_a = data;
        if self.ddr_a != 0 {
            let pins = self.out_a & self.ddr_a;
            if let Some(out) = self.bindings.port_a_out.as_mut() {
                out.write(pins);
            }
        }
    }

    fn write_ddr_a(&mut self, data: u8) {
        if self.ddr_a != data {
            self.ddr_a = data;
            // Changing the mask changes which bits are visible on the
            // pins even though ORA did not change, so the output is
            // re-driven.
            if self.ddr_a != 0 {
                let pins = self.out_a & self.ddr_a;
                if let Some(out) = self.bindings.port_a_out.as_mut() {
                    out.write(pins);
                }
            }
        }
    }

    fn read_control_a(&mut self) -> u8 {
        // Sampling the control lines here runs edge detection as a side
        // effect of the read.
        if let Some(input) = self.bindings.ca1_in.as_mut() {
            let level = input.sample();
            self.set_ca1(level);
        }
        if let Some(input) = self.bindings.ca2_in.as_mut() {
            let level = input.sample();
            self.set_ca2(level);
        }

        let mut value = self.ctl_a;
        if self.irq_a1 {
            value |= 0x80;
        }
        // An output-configured CA2 never surfaces its flag here.
        if self.irq_a2 && !c2_output(self.ctl_a) {
            value |= 0x40;
        }
        value
    }

    fn write_control_a(&mut self, data: u8) {
        let data = data & CTL_STORED_MASK;

        // With CA2 as output, bit 3 drives the line directly; transfer
        // it whenever it differs from the current driven level.
        if c2_output(data) {
            let level = (data & CTL_IRQ2_ENABLE) != 0;
            if level != self.out_ca2 {
                if let Some(out) = self.bindings.ca2_out.as_mut() {
                    out.write(level);
                }
            }
            self.out_ca2 = level;
        }

        self.ctl_a = data;
        self.update_interrupts();
    }

    // --- Port B ---

    fn read_port_b(&mut self) -> u8 {
        if let Some(input) = self.bindings.port_b_in.as_mut() {
            self.in_b = input.sample();
        }
        let value = (self.out_b & self.ddr_b) | (self.in_b & !self.ddr_b);

        self.irq_b1 = false;
        self.irq_b2 = false;
        self.update_interrupts();

        value
    }

    fn write_port_b(&mut self, data: u8) {
        self.out_b = data;
        if self.ddr_b != 0 {
            let pins = self.out_b & self.ddr_b;
            if let Some(out) = self.bindings.port_b_out.as_mut() {
                out.write(pins);
            }
        }

        // CB2 output strobe: on the B side the *write* pulses the line
        // (mirroring the A-side read strobe).
        if c2_strobe_mode(self.ctl_b) {
            if self.out_cb2 {
                if let Some(out) = self.bindings.cb2_out.as_mut() {
                    out.write(false);
                }
            }
            self.out_cb2 = false;

            if strobe_e_restore(self.ctl_b) {
                if let Some(out) = self.bindings.cb2_out.as_mut() {
                    out.write(true);
                }
                self.out_cb2 = true;
            }
        }
    }

    fn write_ddr_b(&mut self, data: u8) {
        if self.ddr_b != data {
            self.ddr_b = data;
            if self.ddr_b != 0 {
                let pins = self.out_b & self.ddr_b;
                if let Some(out) = self.bindings.port_b_out.as_mut() {
                    out.write(pins);
                }
            }
        }
    }

    fn read_control_b(&mut self) -> u8 {
        if let Some(input) = self.bindings.cb1_in.as_mut() {
            let level = input.sample();
            self.set_cb1(level);
        }
        if let Some(input) = self.bindings.cb2_in.as_mut() {
            let level = input.sample();
            self.set_cb2(level);
        }

        let mut value = self.ctl_b;
        if self.irq_b1 {
            value |= 0x80;
        }
        if self.irq_b2 && !c2_output(self.ctl_b) {
            value |= 0x40;
        }
        value
    }

    fn write_control_b(&mut self, data: u8) {
        let data = data & CTL_STORED_MASK;

        if c2_output(data) {
            let level = (data & CTL_IRQ2_ENABLE) != 0;
            if level != self.out_cb2 {
                if let Some(out) = self.bindings.cb2_out.as_mut() {
                    out.write(level);
                }
            }
            self.out_cb2 = level;
        }

        self.ctl_b = data;
        self.update_interrupts();
    }

    // --- Control line inputs (board logic or bound samplers) ---

    /// Set external input pins for Port A. No edge processing; the value
    /// is latched for the next data-port read.
    pub fn set_port_a_input(&mut self, data: u8) {
        self.in_a = data;
    }

    /// Set external input pins for Port B.
    pub fn set_port_b_input(&mut self, data: u8) {
        self.in_b = data;
    }

    /// Update CA1. CA1 is always an input; CRA bit 1 selects the active
    /// edge (1 = rising). An active transition sets irq_a1 and, when CA2
    /// is an output strobe restored by C1, drives the strobe high again.
    pub fn set_ca1(&mut self, state: bool) {
        let rising = state && !self.in_ca1;
        let falling = !state && self.in_ca1;
        self.in_ca1 = state;

        let active_rising = (self.ctl_a & CTL_C1_RISING) != 0;
        if (active_rising && rising) || (!active_rising && falling) {
            self.irq_a1 = true;
            self.update_interrupts();

            if c2_strobe_mode(self.ctl_a) && !strobe_e_restore(self.ctl_a) {
                if !self.out_ca2 {
                    if let Some(out) = self.bindings.ca2_out.as_mut() {
                        out.write(true);
                    }
                }
                self.out_ca2 = true;
            }
        }
    }

    /// Update CB1. CRB bit 1 selects the active edge (1 = rising).
    pub fn set_cb1(&mut self, state: bool) {
        let rising = state && !self.in_cb1;
        let falling = !state && self.in_cb1;
        self.in_cb1 = state;

        let active_rising = (self.ctl_b & CTL_C1_RISING) != 0;
        if (active_rising && rising) || (!active_rising && falling) {
            self.irq_b1 = true;
            self.update_interrupts();

            if c2_strobe_mode(self.ctl_b) && !strobe_e_restore(self.ctl_b) {
                if !self.out_cb2 {
                    if let Some(out) = self.bindings.cb2_out.as_mut() {
                        out.write(true);
                    }
                }
                self.out_cb2 = true;
            }
        }
    }

    /// Update CA2 when configured as input (CRA bit 5 = 0); ignored in
    /// output mode. CRA bit 4 selects the active edge (1 = rising).
    pub fn set_ca2(&mut self, state: bool) {
        if c2_output(self.ctl_a) {
            return;
        }

        let rising = state && !self.in_ca2;
        let falling = !state && self.in_ca2;
        self.in_ca2 = state;

        let active_rising = (self.ctl_a & CTL_C2_RISING) != 0;
        if (active_rising && rising) || (!active_rising && falling) {
            self.irq_a2 = true;
            self.update_interrupts();
        }
    }

    /// Update CB2 when configured as input (CRB bit 5 = 0); ignored in
    /// output mode. CRB bit 4 selects the active edge (1 = rising).
    pub fn set_cb2(&mut self, state: bool) {
        if c2_output(self.ctl_b) {
            return;
        }

        let rising = state && !self.in_cb2;
        let falling = !state && self.in_cb2;
        self.in_cb2 = state;

        let active_rising = (self.ctl_b & CTL_C2_RISING) != 0;
        if (active_rising && rising) || (!active_rising && falling) {
            self.irq_b2 = true;
            self.update_interrupts();
        }
    }

    // --- Interrupt aggregation ---

    /// Recompute the aggregate IRQ outputs from the flags and enable
    /// bits, notifying the bound lines only on change.
    fn update_interrupts(&mut self) {
        let new_a = (self.irq_a1 && (self.ctl_a & CTL_IRQ1_ENABLE) != 0)
            || (self.irq_a2 && (self.ctl_a & CTL_IRQ2_ENABLE) != 0);
        if new_a != self.irq_a_state {
            self.irq_a_state = new_a;
            if let Some(line) = &self.bindings.irq_a {
                line.set(new_a);
            }
        }

        let new_b = (self.irq_b1 && (self.ctl_b & CTL_IRQ1_ENABLE) != 0)
            || (self.irq_b2 && (self.ctl_b & CTL_IRQ2_ENABLE) != 0);
        if new_b != self.irq_b_state {
            self.irq_b_state = new_b;
            if let Some(line) = &self.bindings.irq_b {
                line.set(new_b);
            }
        }
    }

    /// Current aggregate state of the IRQA output.
    pub fn irq_a(&self) -> bool {
        self.irq_a_state
    }

    /// Current aggregate state of the IRQB output.
    pub fn irq_b(&self) -> bool {
        self.irq_b_state
    }

    // --- Output accessors ---

    /// Current output value of Port A (ORA masked by DDRA). Useful for
    /// continuously-connected consumers like a DAC.
    pub fn output_a(&self) -> u8 {
        self.out_a & self.ddr_a
    }

    /// Current output value of Port B (ORB masked by DDRB).
    pub fn output_b(&self) -> u8 {
        self.out_b & self.ddr_b
    }

    /// Driven level of CA2 when configured as output.
    pub fn ca2_output(&self) -> bool {
        self.out_ca2
    }

    /// Driven level of CB2 when configured as output.
    pub fn cb2_output(&self) -> bool {
        self.out_cb2
    }
}

impl Default for Pia6821 {
    fn default() -> Self {
        Self::new()
    }
}
