use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::{Chip8Error, Framebuffer, Machine, Opcode, StepOutcome, u4};

/// Fetch-decode-execute engine owning a [`Machine`].
///
/// The random source used by `Cxkk` is injected so runs can be made
/// deterministic with [`Interpreter::with_seed`].
pub struct Interpreter<R: RngCore = StdRng> {
    pub(crate) machine: Machine,
    pub(crate) rng: R,
}

impl Interpreter<StdRng> {
    /// Creates an interpreter whose random source is seeded from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Interpreter<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> Interpreter<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            machine: Machine::new(),
            rng,
        }
    }

    /// Loads a raw program image at 0x200.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.machine.load_program(program)
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// An `Err` means the machine halted. PC is left on the failing
    /// instruction and no other state from that instruction is applied.
    pub fn step(&mut self) -> Result<StepOutcome, Chip8Error> {
        let address = self.machine.pc;
        let opcode = self.fetch()?;
        self.machine.opcode = opcode;
        self.machine.pc = self.machine.pc.wrapping_add(2);

        let decoded = Opcode::decode(opcode);
        log::trace!("{address:#06X}: {opcode:04X} {decoded:?}");

        let result = self.execute(decoded);
        if result.is_err() {
            self.machine.pc = address;
        }
        result
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    pub fn tick_timers(&mut self) {
        self.machine.delay_timer = self.machine.delay_timer.saturating_sub(1);
        self.machine.sound_timer = self.machine.sound_timer.saturating_sub(1);
    }

    /// Power-on reset. The random source keeps its current state.
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        self.machine.framebuffer()
    }

    pub fn sound_timer(&self) -> u8 {
        self.machine.sound_timer()
    }

    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.machine.set_key(key, pressed);
    }

    /// Fetches the 16-bit big-endian opcode at PC.
    fn fetch(&self) -> Result<u16, Chip8Error> {
        let high = self.machine.mem_read(self.machine.pc)?;
        let low = self.machine.mem_read(self.machine.pc.wrapping_add(1))?;

        Ok(u16::from_be_bytes([high, low]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PIXEL_ON;

    fn load(program: &[u16]) -> Interpreter {
        let bytes: Vec<u8> = program.iter().flat_map(|op| op.to_be_bytes()).collect();
        let mut interpreter = Interpreter::with_seed(7);
        interpreter.load_program(&bytes).unwrap();
        interpreter
    }

    fn run(program: &[u16], steps: usize) -> Interpreter {
        let mut interpreter = load(program);
        for _ in 0..steps {
            interpreter.step().unwrap();
        }
        interpreter
    }

    fn reg(interpreter: &Interpreter, index: u8) -> u8 {
        interpreter.machine().v(u4::new(index))
    }

    #[test]
    fn clear_display_advances_pc() {
        let interpreter = run(&[0x00E0], 1);
        assert_eq!(interpreter.machine().pc(), 0x202);
        assert_eq!(interpreter.machine().current_opcode(), 0x00E0);
        assert!(interpreter.framebuffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn clear_display_unlights_pixels() {
        let mut interpreter = load(&[0x00E0]);
        interpreter.machine_mut().framebuffer[100] = PIXEL_ON;
        interpreter.step().unwrap();
        assert_eq!(interpreter.framebuffer()[100], 0);
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let interpreter = run(&[0x6A05, 0x7A03], 2);
        assert_eq!(reg(&interpreter, 0xA), 8);
        assert_eq!(reg(&interpreter, 0xF), 0);

        let interpreter = run(&[0x6F07, 0x60FF, 0x7002], 3);
        assert_eq!(reg(&interpreter, 0), 0x01);
        assert_eq!(reg(&interpreter, 0xF), 7);
    }

    #[test]
    fn call_and_return() {
        let mut program = vec![0x0000; 0x81];
        program[0] = 0x2300;
        program[0x80] = 0x00EE;
        let mut interpreter = load(&program);

        interpreter.step().unwrap();
        assert_eq!(interpreter.machine().pc(), 0x300);
        assert_eq!(interpreter.machine().sp(), 1);
        assert_eq!(interpreter.machine().stack(), &[0x202]);

        interpreter.step().unwrap();
        assert_eq!(interpreter.machine().pc(), 0x202);
        assert_eq!(interpreter.machine().sp(), 0);
    }

    #[test]
    fn call_with_full_stack_overflows() {
        // 0x200 calls itself forever
        let mut interpreter = load(&[0x2200]);
        for _ in 0..16 {
            interpreter.step().unwrap();
        }
        assert_eq!(interpreter.machine().sp(), 16);
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::StackOverflow { target: 0x200 })
        );
        assert_eq!(interpreter.machine().sp(), 16);
        assert_eq!(interpreter.machine().pc(), 0x200);
    }

    #[test]
    fn return_with_empty_stack_underflows() {
        let mut interpreter = load(&[0x00EE]);
        assert_eq!(interpreter.step(), Err(Chip8Error::StackUnderflow));
    }

    #[test]
    fn jumps() {
        let interpreter = run(&[0x1234], 1);
        assert_eq!(interpreter.machine().pc(), 0x234);

        let interpreter = run(&[0x6010, 0xB300], 2);
        assert_eq!(interpreter.machine().pc(), 0x310);
    }

    #[test]
    fn skips() {
        // skip taken: pc lands past the next instruction
        assert_eq!(run(&[0x6311, 0x3311], 2).machine().pc(), 0x206);
        assert_eq!(run(&[0x6311, 0x3312], 2).machine().pc(), 0x204);
        assert_eq!(run(&[0x6311, 0x4312], 2).machine().pc(), 0x206);
        assert_eq!(run(&[0x6311, 0x4311], 2).machine().pc(), 0x204);
        assert_eq!(run(&[0x6311, 0x6411, 0x5340], 3).machine().pc(), 0x208);
        assert_eq!(run(&[0x6311, 0x6412, 0x5340], 3).machine().pc(), 0x206);
        assert_eq!(run(&[0x6311, 0x6412, 0x9340], 3).machine().pc(), 0x208);
        assert_eq!(run(&[0x6311, 0x6411, 0x9340], 3).machine().pc(), 0x206);
    }

    #[test]
    fn alu_add_sets_carry() {
        let interpreter = run(&[0x60FF, 0x6101, 0x8014], 3);
        assert_eq!(reg(&interpreter, 0), 0x00);
        assert_eq!(reg(&interpreter, 0xF), 1);

        let interpreter = run(&[0x6001, 0x6101, 0x8014], 3);
        assert_eq!(reg(&interpreter, 0), 0x02);
        assert_eq!(reg(&interpreter, 0xF), 0);
    }

    #[test]
    fn alu_bitwise_ops_leave_flag() {
        let interpreter = run(&[0x6F05, 0x600C, 0x610A, 0x8011], 4);
        assert_eq!(reg(&interpreter, 0), 0x0E);
        assert_eq!(reg(&interpreter, 0xF), 5);

        let interpreter = run(&[0x600C, 0x610A, 0x8012], 3);
        assert_eq!(reg(&interpreter, 0), 0x08);

        let interpreter = run(&[0x600C, 0x610A, 0x8013], 3);
        assert_eq!(reg(&interpreter, 0), 0x06);

        let interpreter = run(&[0x610A, 0x8010], 2);
        assert_eq!(reg(&interpreter, 0), 0x0A);
    }

    #[test]
    fn alu_sub_sets_not_borrow() {
        let interpreter = run(&[0x6005, 0x6103, 0x8015], 3);
        assert_eq!(reg(&interpreter, 0), 2);
        assert_eq!(reg(&interpreter, 0xF), 1);

        let interpreter = run(&[0x6003, 0x6105, 0x8015], 3);
        assert_eq!(reg(&interpreter, 0), 0xFE);
        assert_eq!(reg(&interpreter, 0xF), 0);

        // equal operands: no strict "greater than", flag cleared
        let interpreter = run(&[0x6004, 0x6104, 0x8015], 3);
        assert_eq!(reg(&interpreter, 0), 0);
        assert_eq!(reg(&interpreter, 0xF), 0);
    }

    #[test]
    fn alu_sub_reverse() {
        let interpreter = run(&[0x6003, 0x6105, 0x8017], 3);
        assert_eq!(reg(&interpreter, 0), 2);
        assert_eq!(reg(&interpreter, 0xF), 1);

        let interpreter = run(&[0x6005, 0x6103, 0x8017], 3);
        assert_eq!(reg(&interpreter, 0), 0xFE);
        assert_eq!(reg(&interpreter, 0xF), 0);
    }

    #[test]
    fn alu_shifts_report_shifted_out_bit() {
        let interpreter = run(&[0x6005, 0x8016], 2);
        assert_eq!(reg(&interpreter, 0), 0x02);
        assert_eq!(reg(&interpreter, 0xF), 1);

        let interpreter = run(&[0x6081, 0x801E], 2);
        assert_eq!(reg(&interpreter, 0), 0x02);
        assert_eq!(reg(&interpreter, 0xF), 1);

        let interpreter = run(&[0x6040, 0x801E], 2);
        assert_eq!(reg(&interpreter, 0), 0x80);
        assert_eq!(reg(&interpreter, 0xF), 0);
    }

    #[test]
    fn flag_wins_when_vf_is_destination() {
        let interpreter = run(&[0x6FFF, 0x6101, 0x8F14], 3);
        assert_eq!(reg(&interpreter, 0xF), 1);
    }

    #[test]
    fn index_register_ops() {
        let interpreter = run(&[0xA123], 1);
        assert_eq!(interpreter.machine().i(), 0x123);

        let interpreter = run(&[0xAFFF, 0x6502, 0xF51E], 3);
        assert_eq!(interpreter.machine().i(), 0x1001);

        let interpreter = run(&[0x650A, 0xF529], 2);
        assert_eq!(interpreter.machine().i(), 0x050 + 50);
    }

    #[test]
    fn font_char_rejects_non_hex_digit() {
        let mut interpreter = load(&[0x6510, 0xF529]);
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::FontDigitOutOfRange {
                digit: 0x10,
                opcode: 0xF529
            })
        );
    }

    #[test]
    fn random_is_masked_and_deterministic_per_seed() {
        let a = run(&[0xC00F, 0xC1FF], 2);
        let b = run(&[0xC00F, 0xC1FF], 2);
        assert_eq!(reg(&a, 0) & 0xF0, 0);
        assert_eq!(reg(&a, 0), reg(&b, 0));
        assert_eq!(reg(&a, 1), reg(&b, 1));

        let zero = run(&[0xC200], 1);
        assert_eq!(reg(&zero, 2), 0);
    }

    #[test]
    fn draw_twice_detects_collision() {
        // I -> glyph "0" (0xF0 first row), draw 1 row at (0, 0) twice
        let mut interpreter = load(&[0xA050, 0xD011, 0xD011]);
        interpreter.step().unwrap();

        assert_eq!(interpreter.step(), Ok(StepOutcome::WaitForNextFrame));
        let machine = interpreter.machine();
        assert!((0..4).all(|x| machine.pixel(x, 0)));
        assert!(!machine.pixel(4, 0));
        assert_eq!(machine.v(u4::new(0xF)), 0);

        interpreter.step().unwrap();
        let machine = interpreter.machine();
        assert!((0..8).all(|x| !machine.pixel(x, 0)));
        assert_eq!(machine.v(u4::new(0xF)), 1);
    }

    #[test]
    fn draw_collision_in_early_row_is_kept() {
        // second sprite: row 0 collides, row 1 does not
        let mut interpreter = load(&[0xA050, 0xD011, 0xA055, 0xD012]);
        for _ in 0..4 {
            interpreter.step().unwrap();
        }
        assert_eq!(reg(&interpreter, 0xF), 1);
    }

    #[test]
    fn draw_wraps_anchor_and_pixels() {
        // x = 62 + 64, y = 31 + 32: anchor wraps to (62, 31)
        let mut interpreter = load(&[0x607E, 0x613F, 0xA050, 0xD012]);
        for _ in 0..4 {
            interpreter.step().unwrap();
        }
        let machine = interpreter.machine();
        assert!(machine.pixel(62, 31));
        assert!(machine.pixel(63, 31));
        // columns past the right edge continue at x = 0, rows past the bottom at y = 0
        assert!(machine.pixel(0, 31));
        assert!(machine.pixel(1, 31));
        assert!(machine.pixel(62, 0));
        assert!(!machine.pixel(63, 0));
    }

    #[test]
    fn key_skips() {
        let mut interpreter = load(&[0x6507, 0xE59E]);
        interpreter.set_key(u4::new(7), true);
        interpreter.step().unwrap();
        interpreter.step().unwrap();
        assert_eq!(interpreter.machine().pc(), 0x206);

        let interpreter = run(&[0x6507, 0xE59E], 2);
        assert_eq!(interpreter.machine().pc(), 0x204);

        let interpreter = run(&[0x6507, 0xE5A1], 2);
        assert_eq!(interpreter.machine().pc(), 0x206);
    }

    #[test]
    fn key_skip_rejects_out_of_range_key() {
        let mut interpreter = load(&[0x6520, 0xE5A1]);
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::KeyOutOfRange {
                key: 0x20,
                opcode: 0xE5A1
            })
        );
    }

    #[test]
    fn wait_for_key_blocks_until_pressed() {
        let mut interpreter = load(&[0xF30A]);
        for _ in 0..5 {
            assert_eq!(interpreter.step(), Ok(StepOutcome::WaitForNextFrame));
            assert_eq!(interpreter.machine().pc(), 0x200);
        }

        interpreter.set_key(u4::new(0xC), true);
        interpreter.set_key(u4::new(0x9), true);
        assert_eq!(interpreter.step(), Ok(StepOutcome::Continue));
        assert_eq!(reg(&interpreter, 3), 0x9);
        assert_eq!(interpreter.machine().pc(), 0x202);
    }

    #[test]
    fn timers() {
        let mut interpreter = load(&[0x6505, 0xF515, 0xF518, 0xF607]);
        for _ in 0..3 {
            interpreter.step().unwrap();
        }
        assert_eq!(interpreter.machine().delay_timer(), 5);
        assert_eq!(interpreter.sound_timer(), 5);

        interpreter.tick_timers();
        interpreter.tick_timers();
        interpreter.step().unwrap();
        assert_eq!(reg(&interpreter, 6), 3);

        for _ in 0..10 {
            interpreter.tick_timers();
        }
        assert_eq!(interpreter.machine().delay_timer(), 0);
        assert_eq!(interpreter.sound_timer(), 0);
        assert!(!interpreter.machine().should_beep());
    }

    #[test]
    fn bcd() {
        let interpreter = run(&[0x60FE, 0xA300, 0xF033], 3);
        assert_eq!(&interpreter.machine().memory()[0x300..0x303], &[2, 5, 4]);

        let interpreter = run(&[0x6007, 0xA300, 0xF033], 3);
        assert_eq!(&interpreter.machine().memory()[0x300..0x303], &[0, 0, 7]);
    }

    #[test]
    fn store_and_load_registers_round_trip() {
        let mut interpreter = load(&[
            0x6011, 0x6122, 0x6233, 0x6344, 0x6455, // V0..V4
            0xA300, 0xF355, // store V0..V3
            0x6000, 0x6100, 0x6200, 0x6300, // clear
            0xF365, // load V0..V3
        ]);
        for _ in 0..12 {
            interpreter.step().unwrap();
        }
        assert_eq!(
            &interpreter.machine().memory()[0x300..0x305],
            &[0x11, 0x22, 0x33, 0x44, 0x00]
        );
        assert_eq!(interpreter.machine().i(), 0x300);
        for (index, expected) in [0x11, 0x22, 0x33, 0x44, 0x55].into_iter().enumerate() {
            assert_eq!(reg(&interpreter, index as u8), expected);
        }
    }

    #[test]
    fn store_past_end_of_memory_fails() {
        let mut interpreter = load(&[0xAFFE, 0xF255]);
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(interpreter.machine().memory()[0xFFE..], [0, 0]);
        assert_eq!(interpreter.machine().pc(), 0x202);
    }

    #[test]
    fn bcd_past_end_of_memory_writes_nothing() {
        let mut interpreter = load(&[0x60FE, 0xAFFE, 0xF033]);
        interpreter.step().unwrap();
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(interpreter.machine().memory()[0xFFE..], [0, 0]);
    }

    #[test]
    fn load_past_end_of_memory_leaves_registers() {
        let mut interpreter = load(&[0x6009, 0x6109, 0x6209, 0xAFFE, 0xF265]);
        interpreter.machine_mut().memory[0xFFE] = 0x11;
        interpreter.machine_mut().memory[0xFFF] = 0x22;
        for _ in 0..4 {
            interpreter.step().unwrap();
        }
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        for index in 0..3 {
            assert_eq!(reg(&interpreter, index), 9);
        }
    }

    #[test]
    fn draw_past_end_of_memory_leaves_screen_and_flag() {
        let mut interpreter = load(&[0x6F07, 0xAFFF, 0xD012]);
        interpreter.machine_mut().memory[0xFFF] = 0xFF;
        interpreter.step().unwrap();
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        assert!(interpreter.framebuffer().iter().all(|&p| p == 0));
        assert_eq!(reg(&interpreter, 0xF), 7);
        assert_eq!(interpreter.machine().pc(), 0x204);
        assert_eq!(interpreter.machine().current_opcode(), 0xD012);
    }

    #[test]
    fn halted_call_and_return_keep_pc_on_instruction() {
        let mut interpreter = load(&[0x00E0, 0x00EE]);
        interpreter.step().unwrap();
        assert_eq!(interpreter.step(), Err(Chip8Error::StackUnderflow));
        assert_eq!(interpreter.machine().pc(), 0x202);
        assert_eq!(interpreter.machine().sp(), 0);
    }

    #[test]
    fn unknown_opcode_halts_with_address() {
        let mut interpreter = load(&[0x00E0, 0x5121]);
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::UnknownOpcode {
                opcode: 0x5121,
                address: 0x202
            })
        );
    }

    #[test]
    fn sys_call_is_ignored() {
        let interpreter = run(&[0x0123], 1);
        assert_eq!(interpreter.machine().pc(), 0x202);
    }

    #[test]
    fn fetch_past_end_of_memory_fails() {
        let mut interpreter = load(&[0x1FFF]);
        interpreter.step().unwrap();
        assert_eq!(
            interpreter.step(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut interpreter = run(&[0x6A05, 0x1300], 2);
        interpreter.reset();
        assert_eq!(interpreter.machine().pc(), 0x200);
        assert_eq!(reg(&interpreter, 0xA), 0);
        assert_eq!(interpreter.machine().memory()[0x200], 0);
    }
}
