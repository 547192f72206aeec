/// Joypad buttons in `P1` bit order within their group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// `P1`/`JOYP`. Pressed buttons read as 0 on the selected group's lines.
#[derive(Debug, Clone)]
pub struct Joypad {
    select: u8,
    /// Bits 0-3 directions, 4-7 actions; set while held.
    pressed: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            pressed: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut lines = 0x0F;
        if self.select & 0x10 == 0 {
            lines &= !(self.pressed & 0x0F);
        }
        if self.select & 0x20 == 0 {
            lines &= !(self.pressed >> 4);
        }
        0xC0 | self.select | lines
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Updates a button. Returns true when a press pulls a selected line low,
    /// which raises the joypad interrupt.
    pub fn set_button(&mut self, button: Button, pressed: bool) -> bool {
        let before = self.read() & 0x0F;
        if pressed {
            self.pressed |= button.mask();
        } else {
            self.pressed &= !button.mask();
        }
        let after = self.read() & 0x0F;
        before & !after != 0
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed != 0
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
