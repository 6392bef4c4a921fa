use log::{debug, trace, warn};

use crate::device::pia6821::{Pia6821, PiaBindings};

/// Number of PIA slots in a registry. Slots are reused across
/// configure/reset cycles; replacing or unconfiguring a slot drops the
/// old chip, which releases any interrupt line it was driving.
pub const MAX_PIAS: usize = 8;

/// Register ordering seen on the bus.
///
/// Standard is port A, control A, port B, control B. Some boards wire
/// RS0/RS1 swapped, giving port A, port B, control A, control B.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegisterOrder {
    #[default]
    Standard,
    Alternate,
}

/// How an 8-bit PIA sits on the host bus.
///
/// On a 16-bit bus the chip occupies every other address and one byte
/// lane carries the data; `SixteenAutosense` infers the lane from which
/// half of the word is populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BusWidth {
    #[default]
    Eight,
    SixteenLower,
    SixteenUpper,
    SixteenAutosense,
}

/// Addressing mode for one PIA slot, fixed at configure time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Addressing {
    pub order: RegisterOrder,
    pub width: BusWidth,
}

#[derive(Default)]
struct Slot {
    addressing: Addressing,
    pia: Pia6821,
}

/// Fixed arena of PIA instances addressed by integer index.
///
/// Owns every chip in the machine and performs the bus-side offset
/// decode (register ordering, 16-bit lane adaptation) before handing
/// the 2-bit register select to the chip. Passed explicitly through the
/// simulation context.
///
/// Indices outside `0..MAX_PIAS` are accepted as no-ops: reads return 0
/// and writes are dropped, the permissive behavior firmware expects
/// from hardware that simply does not exist.
pub struct PiaRegistry {
    slots: [Slot; MAX_PIAS],
}

/// Alternate ordering swaps the two middle register slots.
const ALTERNATE_SWIZZLE: [u8; 4] = [0, 2, 1, 3];

fn decode(addressing: Addressing, offset: u16) -> u8 {
    let offset = match addressing.width {
        BusWidth::Eight => offset,
        // On a 16-bit bus the chip occupies every other address.
        _ => offset >> 1,
    };
    let reg = (offset & 0x03) as u8;
    match addressing.order {
        RegisterOrder::Standard => reg,
        RegisterOrder::Alternate => ALTERNATE_SWIZZLE[reg as usize],
    }
}

impl PiaRegistry {
    /// Allocate all slots, unconfigured and unbound.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    /// Install addressing and external wiring for one slot. The chip's
    /// register state is zeroed. Out-of-range indices are ignored.
    pub fn configure(&mut self, index: usize, addressing: Addressing, bindings: PiaBindings) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        debug!("pia {} configured ({:?})", index, addressing);
        slot.addressing = addressing;
        slot.pia = Pia6821::new();
        slot.pia.bind(bindings);
    }

    /// Zero every chip's mutable register state, preserving bindings
    /// and addressing.
    pub fn reset_all(&mut self) {
        debug!("pia registry reset");
        for slot in &mut self.slots {
            slot.pia.reset();
        }
    }

    /// Zero everything including bindings and addressing, returning
    /// every slot to its unconfigured state.
    pub fn unconfigure_all(&mut self) {
        debug!("pia registry unconfigured");
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
    }

    /// Direct access to one chip for board logic that drives pins
    /// (control lines, port inputs) outside a bus access.
    pub fn pia(&mut self, index: usize) -> Option<&mut Pia6821> {
        self.slots.get_mut(index).map(|slot| &mut slot.pia)
    }

    /// Bus read. `offset` is the raw bus offset within the chip's
    /// address range; returns 0 for out-of-range indices.
    pub fn read(&mut self, index: usize, offset: u16) -> u8 {
        let Some(slot) = self.slots.get_mut(index) else {
            return 0;
        };
        let reg = decode(slot.addressing, offset);
        let value = slot.pia.read(reg);
        trace!("pia {} read reg {} -> {:02X}", index, reg, value);
        value
    }

    /// Bus write. Out-of-range indices are dropped.
    pub fn write(&mut self, index: usize, offset: u16, data: u8) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let reg = decode(slot.addressing, offset);
        trace!("pia {} write reg {} <- {:02X}", index, reg, data);
        slot.pia.write(reg, data);
    }

    /// 16-bit bus read. The register byte is returned in the lane the
    /// slot's width selects (low lane for lower and autosense, high
    /// lane for upper).
    pub fn read_word(&mut self, index: usize, offset: u16) -> u16 {
        let Some(slot) = self.slots.get_mut(index) else {
            return 0;
        };
        let reg = decode(slot.addressing, offset);
        let value = slot.pia.read(reg);
        trace!("pia {} read reg {} -> {:02X}", index, reg, value);
        match slot.addressing.width {
            BusWidth::SixteenUpper => (value as u16) << 8,
            _ => value as u16,
        }
    }

    /// 16-bit bus write. In autosense mode the populated lane carries
    /// the data; a word with both lanes populated is ambiguous and is
    /// dropped without touching any register.
    pub fn write_word(&mut self, index: usize, offset: u16, data: u16) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let byte = match slot.addressing.width {
            BusWidth::Eight | BusWidth::SixteenLower => data as u8,
            BusWidth::SixteenUpper => (data >> 8) as u8,
            BusWidth::SixteenAutosense => {
                if data & 0xFF00 == 0 {
                    data as u8
                } else if data & 0x00FF == 0 {
                    (data >> 8) as u8
                } else {
                    warn!("pia {} ambiguous 16-bit write {:04X} dropped", index, data);
                    return;
                }
            }
        };
        let reg = decode(slot.addressing, offset);
        trace!("pia {} write reg {} <- {:02X}", index, reg, byte);
        slot.pia.write(reg, byte);
    }
}

impl Default for PiaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
