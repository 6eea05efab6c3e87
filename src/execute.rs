use rand::{Rng, RngCore};

use crate::font::{FONT_GLYPH_SIZE, FONT_SET_START_ADDRESS};
use crate::{
    AluOp, Chip8Error, DISPLAY_X, DISPLAY_Y, Interpreter, Machine, Opcode, PIXEL_OFF,
    PIXEL_ON, StepOutcome, u4,
};

impl<R: RngCore> Interpreter<R> {
    /// Runs one decoded instruction. PC already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepOutcome, Chip8Error> {
        let m = &mut self.machine;

        match opcode {
            Opcode::Sys { nnn } => {
                log::debug!("Ignoring SYS {nnn:#05X}");
            }
            Opcode::ClearDisplay => {
                m.framebuffer.fill(PIXEL_OFF);
            }
            Opcode::Return => {
                m.sp = m.sp.checked_sub(1).ok_or(Chip8Error::StackUnderflow)?;
                m.pc = m.stack[m.sp as usize];
            }
            Opcode::Jump { nnn } => {
                m.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                m.pc = nnn.wrapping_add(m.v[0].into());
            }
            Opcode::Call { nnn } => {
                let slot = m
                    .stack
                    .get_mut(m.sp as usize)
                    .ok_or(Chip8Error::StackOverflow { target: nnn })?;
                *slot = m.pc;
                m.sp += 1;
                m.pc = nnn;
            }
            Opcode::SkipRegEqualImm { x, kk } => {
                if m.v[x] == kk {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualImm { x, kk } => {
                if m.v[x] != kk {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if m.v[x] == m.v[y] {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if m.v[x] != m.v[y] {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SetRegImm { x, kk } => {
                m.v[x] = kk;
            }
            Opcode::AddRegImm { x, kk } => {
                m.v[x] = m.v[x].wrapping_add(kk);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::SetIndexImm { nnn } => {
                m.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                m.i = m.i.wrapping_add(m.v[x].into());
            }
            Opcode::Random { x, kk } => {
                let rand_byte: u8 = self.rng.random();
                self.machine.v[x] = rand_byte & kk;
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                if self.key_in(x)? {
                    self.machine.pc = self.machine.pc.wrapping_add(2);
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.key_in(x)? {
                    self.machine.pc = self.machine.pc.wrapping_add(2);
                }
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                m.v[x] = m.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                m.delay_timer = m.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                m.sound_timer = m.v[x];
            }
            Opcode::FontChar { x } => {
                let digit = u4::try_from(m.v[x]).map_err(|digit| Chip8Error::FontDigitOutOfRange {
                    digit,
                    opcode: m.opcode,
                })?;
                m.i = (FONT_SET_START_ADDRESS + usize::from(digit) * FONT_GLYPH_SIZE) as u16;
            }
            Opcode::Bcd { x } => {
                let value = m.v[x];
                let range = Machine::mem_range(m.i, 3)?;
                let digits = [value / 100, (value / 10) % 10, value % 10];
                m.memory[range].copy_from_slice(&digits);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let range = Machine::mem_range(m.i, count)?;
                m.memory[range].copy_from_slice(&m.v[..count]);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let range = Machine::mem_range(m.i, count)?;
                m.v[..count].copy_from_slice(&m.memory[range]);
            }
            Opcode::Unknown(opcode) => {
                return Err(Chip8Error::UnknownOpcode {
                    opcode,
                    address: m.pc.wrapping_sub(2),
                });
            }
        };

        Ok(StepOutcome::Continue)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        let v = &mut self.machine.v;
        let (vx, vy) = (v[x], v[y]);

        // VF is written after Vx so the flag survives when x is F
        let flag = match op {
            AluOp::Set => {
                v[x] = vy;
                return;
            }
            AluOp::Or => {
                v[x] = vx | vy;
                return;
            }
            AluOp::And => {
                v[x] = vx & vy;
                return;
            }
            AluOp::Xor => {
                v[x] = vx ^ vy;
                return;
            }
            AluOp::Add => {
                let (res, carry) = vx.overflowing_add(vy);
                v[x] = res;
                carry as u8
            }
            AluOp::Sub => {
                v[x] = vx.wrapping_sub(vy);
                (vx > vy) as u8
            }
            AluOp::SubReverse => {
                v[x] = vy.wrapping_sub(vx);
                (vy > vx) as u8
            }
            AluOp::ShiftRight => {
                v[x] = vx >> 1;
                vx & 1
            }
            AluOp::ShiftLeft => {
                v[x] = vx << 1;
                vx >> 7
            }
        };

        v[0xF] = flag;
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<StepOutcome, Chip8Error> {
        let m = &mut self.machine;
        let x_pos = m.v[x] as usize % DISPLAY_X;
        let y_pos = m.v[y] as usize % DISPLAY_Y;

        // Fetch every row before drawing so a bad read leaves the screen untouched
        let rows = usize::from(n);
        let mut sprite = [0u8; 15];
        sprite[..rows].copy_from_slice(&m.memory[Machine::mem_range(m.i, rows)?]);

        let mut any_erased = false;
        for (row, &sprite_byte) in sprite[..rows].iter().enumerate() {
            let py = (y_pos + row) % DISPLAY_Y;

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let px = (x_pos + col) % DISPLAY_X;
                    let pixel = &mut m.framebuffer[py * DISPLAY_X + px];

                    if *pixel == PIXEL_ON {
                        any_erased = true;
                    }
                    *pixel ^= PIXEL_ON;
                }
            }
        }

        m.v[0xF] = any_erased as u8;
        Ok(StepOutcome::WaitForNextFrame)
    }

    fn execute_wait_for_key(&mut self, x: u4) -> StepOutcome {
        let m = &mut self.machine;

        match m.keypad.iter().position(|&pressed| pressed) {
            Some(key) => {
                m.v[x] = key as u8;
                StepOutcome::Continue
            }
            None => {
                // Repeat this instruction until a key is pressed
                m.pc = m.pc.wrapping_sub(2);
                StepOutcome::WaitForNextFrame
            }
        }
    }

    /// Keypad state for the key number held in `Vx`.
    fn key_in(&self, x: u4) -> Result<bool, Chip8Error> {
        let m = &self.machine;
        let key = u4::try_from(m.v[x]).map_err(|key| Chip8Error::KeyOutOfRange {
            key,
            opcode: m.opcode,
        })?;
        Ok(m.keypad[key])
    }
}
