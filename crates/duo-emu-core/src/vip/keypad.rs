/// VIP hex keypad and the IN button.
///
/// The program selects one key with `OUT 2` and polls it on `EF3`.
#[derive(Debug, Default, Clone)]
pub struct Keypad {
    keys: [bool; 16],
    latch: u8,
    in_button: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.keys[(key & 0x0F) as usize] = pressed;
    }

    pub fn set_in_button(&mut self, pressed: bool) {
        self.in_button = pressed;
    }

    pub fn latch(&mut self, value: u8) {
        self.latch = value & 0x0F;
    }

    pub fn latched(&self) -> u8 {
        self.latch
    }

    /// `EF3`: the latched key is held.
    pub fn key_line(&self) -> bool {
        self.keys[self.latch as usize]
    }

    /// `EF4`.
    pub fn in_line(&self) -> bool {
        self.in_button
    }
}
