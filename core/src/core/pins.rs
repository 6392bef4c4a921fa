/// Capability traits for per-pin-group board wiring.
///
/// Peripheral devices do not know what sits on the other end of their
/// pins. Board logic supplies these as trait objects when a device is
/// configured; a missing binding simply skips that pin group. Closures
/// implement the traits via the blanket impls below, which keeps test
/// and board wiring terse.

/// An 8-bit input port sampled on demand (e.g. a DIP switch bank or an
/// input mux feeding a PIA data port).
pub trait PortInput {
    fn sample(&mut self) -> u8;
}

/// An 8-bit output port driven whenever the visible pin state changes
/// (e.g. a DAC latched from a PIA data port).
pub trait PortOutput {
    fn write(&mut self, data: u8);
}

/// A single input line sampled on demand (control/handshake inputs).
pub trait LineInput {
    fn sample(&mut self) -> bool;
}

/// A single output line driven on level change (strobes, handshake
/// acknowledges).
pub trait LineOutput {
    fn write(&mut self, level: bool);
}

impl<F: FnMut() -> u8> PortInput for F {
    fn sample(&mut self) -> u8 {
        self()
    }
}

impl<F: FnMut(u8)> PortOutput for F {
    fn write(&mut self, data: u8) {
        self(data)
    }
}

impl<F: FnMut() -> bool> LineInput for F {
    fn sample(&mut self) -> bool {
        self()
    }
}

impl<F: FnMut(bool)> LineOutput for F {
    fn write(&mut self, level: bool) {
        self(level)
    }
}
