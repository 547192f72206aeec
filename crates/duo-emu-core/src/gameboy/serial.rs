use log::trace;

/// Link port with nothing attached.
///
/// Internally clocked transfers finish immediately: the other end shifts in
/// all ones, and the outgoing byte is captured so test ROMs that print over
/// the link port can be read back.
#[derive(Debug, Default, Clone)]
pub struct Serial {
    sb: u8,
    sc: u8,
    output: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val & 0x81;
                if self.sc == 0x81 {
                    trace!("Serial out {:02X}", self.sb);
                    self.output.push(self.sb);
                    self.sb = 0xFF;
                    self.sc &= 0x7F;
                    *if_reg |= 0x08;
                }
            }
            _ => {}
        }
    }

    /// Drains the bytes sent since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}
