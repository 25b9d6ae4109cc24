//! Implementation of the core CPU ([Sharp LR35902](https://en.wikipedia.org/wiki/Game_Boy)) logic for the Game Boy.
//!
//! Does not include the instruction set implementation, only the core
//! CPU logic and the CPU struct definition.
//!
//! Time advances exclusively through the memory bus: every bus access
//! and every explicit internal cycle moves the complete machine by one
//! machine cycle, [`Cpu::clock`] just reports the clocks consumed.

use crate::{
    apu::Apu,
    consts::{BGP_ADDR, LCDC_ADDR},
    debugln,
    dma::Dma,
    inst::{execute, execute_cb, OPCODES, OPCODES_CB, PREFIX},
    mmu::Mmu,
    pad::Pad,
    ppu::Ppu,
    serial::Serial,
    timer::Timer,
};

use std::fmt::{self, Display, Formatter};

pub struct Cpu {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    ime: bool,

    /// One instruction delay latch for EI, the master enable only
    /// becomes effective after the instruction that follows it.
    ime_pending: bool,

    zero: bool,
    sub: bool,
    half_carry: bool,
    carry: bool,

    halted: bool,

    /// Set when a STOP instruction was executed, the machine stays
    /// frozen until a joypad line is pulled low.
    stopped: bool,

    /// Set when HALT was executed with IME disabled and an enabled
    /// interrupt already pending, making the following byte execute
    /// twice (the PC increment of one fetch is lost).
    halt_bug: bool,

    /// Reference to the MMU (Memory Management Unit) to be used
    /// for memory bus access operations.
    pub mmu: Mmu,

    /// Reference to the PC (Program Counter) of the previous executed
    /// instruction, used for debugging purposes.
    pub ppc: u16,
}

impl Cpu {
    pub fn new(mmu: Mmu) -> Self {
        Self {
            pc: 0x0,
            sp: 0x0,
            a: 0x0,
            b: 0x0,
            c: 0x0,
            d: 0x0,
            e: 0x0,
            h: 0x0,
            l: 0x0,
            ime: false,
            ime_pending: false,
            zero: false,
            sub: false,
            half_carry: false,
            carry: false,
            halted: false,
            stopped: false,
            halt_bug: false,
            mmu,
            ppc: 0x0,
        }
    }

    pub fn reset(&mut self) {
        self.pc = 0x0;
        self.sp = 0x0;
        self.a = 0x0;
        self.b = 0x0;
        self.c = 0x0;
        self.d = 0x0;
        self.e = 0x0;
        self.h = 0x0;
        self.l = 0x0;
        self.ime = false;
        self.ime_pending = false;
        self.zero = false;
        self.sub = false;
        self.half_carry = false;
        self.carry = false;
        self.halted = false;
        self.stopped = false;
        self.halt_bug = false;
        self.ppc = 0x0;
    }

    /// Sets the CPU registers and some of the memory space to the
    /// expected state after a typical Game Boy boot ROM finishes.
    ///
    /// Using this strategy it's possible to skip the "normal" boot
    /// loading process for the original DMG Game Boy.
    pub fn boot(&mut self) {
        self.pc = 0x0100;
        self.sp = 0xfffe;
        self.a = 0x01;
        self.b = 0x00;
        self.c = 0x13;
        self.d = 0x00;
        self.e = 0xd8;
        self.h = 0x01;
        self.l = 0x4d;
        self.zero = true;
        self.sub = false;
        self.half_carry = true;
        self.carry = true;

        // updates part of the MMU state, disabling the boot memory
        // overlay and setting the post boot register values that
        // games depend on
        self.mmu.set_boot_active(false);
        self.mmu.write_raw(LCDC_ADDR, 0x91);
        self.mmu.write_raw(BGP_ADDR, 0xfc);
    }

    /// Runs one unit of CPU work, either an interrupt dispatch, one
    /// instruction, or a halted/stopped filler cycle, returning the
    /// number of master clocks consumed.
    pub fn clock(&mut self) -> u8 {
        let start_clocks = self.mmu.clocks();

        // while stopped the machine is frozen, a pressed joypad
        // button is the only wake source
        if self.stopped {
            if self.mmu.pad_i().any_pressed() {
                self.stopped = false;
            } else {
                return 4;
            }
        }

        let pending = self.mmu.int_pending();

        // a pending interrupt releases the halted state even with
        // the master enable cleared (no dispatch in that case)
        if self.halted && !self.ime && pending != 0 {
            self.halted = false;
        }

        if self.ime && pending != 0 {
            self.service_interrupt(pending);
            return (self.mmu.clocks() - start_clocks) as u8;
        }

        if self.halted {
            self.mmu.cycle();
            return 4;
        }

        // EI becomes effective only at this point, after the
        // interrupt check of the following instruction boundary
        if self.ime_pending {
            self.ime = true;
            self.ime_pending = false;
        }

        self.ppc = self.pc;
        let opcode = self.fetch();

        #[cfg(feature = "cpulog")]
        {
            println!("{}", self.description(opcode, self.ppc));
        }

        if opcode == PREFIX {
            let extended = self.read_u8();
            execute_cb(self, extended);
        } else {
            execute(self, opcode);
        }

        (self.mmu.clocks() - start_clocks) as u8
    }

    /// Dispatches the highest priority (lowest bit) pending
    /// interrupt, taking the documented 5 machine cycles.
    fn service_interrupt(&mut self, pending: u8) {
        self.ime = false;
        self.ime_pending = false;
        self.halted = false;

        // two idle machine cycles before the PC is pushed
        self.mmu.cycle();
        self.mmu.cycle();

        let pc = self.pc;
        self.push_word(pc);

        let vector = if pending & 0x01 == 0x01 {
            debugln!("Going to run V-Blank interrupt handler (0x40)");
            self.mmu.ppu().ack_vblank();
            0x40
        } else if pending & 0x02 == 0x02 {
            debugln!("Going to run LCD STAT interrupt handler (0x48)");
            self.mmu.ppu().ack_stat();
            0x48
        } else if pending & 0x04 == 0x04 {
            debugln!("Going to run Timer interrupt handler (0x50)");
            self.mmu.timer().ack_tima();
            0x50
        } else if pending & 0x08 == 0x08 {
            debugln!("Going to run Serial interrupt handler (0x58)");
            self.mmu.serial().ack_serial();
            0x58
        } else {
            debugln!("Going to run JoyPad interrupt handler (0x60)");
            self.mmu.pad().ack_pad();
            0x60
        };

        self.pc = vector;
        self.mmu.cycle();
    }

    /// Fetches the opcode at PC, losing the PC increment once when
    /// the HALT bug condition is armed.
    #[inline(always)]
    fn fetch(&mut self) -> u8 {
        let opcode = self.mmu.read(self.pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.pc = self.pc.wrapping_add(1);
        }
        opcode
    }

    /// Spends one machine cycle with no bus activity, used by
    /// instructions with internal delay cycles.
    #[inline(always)]
    pub fn tick(&mut self) {
        self.mmu.cycle();
    }

    #[inline(always)]
    pub fn mmu(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    #[inline(always)]
    pub fn mmu_i(&self) -> &Mmu {
        &self.mmu
    }

    #[inline(always)]
    pub fn ppu(&mut self) -> &mut Ppu {
        self.mmu.ppu()
    }

    #[inline(always)]
    pub fn ppu_i(&self) -> &Ppu {
        self.mmu_i().ppu_i()
    }

    #[inline(always)]
    pub fn apu(&mut self) -> &mut Apu {
        self.mmu.apu()
    }

    #[inline(always)]
    pub fn apu_i(&self) -> &Apu {
        self.mmu_i().apu_i()
    }

    #[inline(always)]
    pub fn dma(&mut self) -> &mut Dma {
        self.mmu.dma()
    }

    #[inline(always)]
    pub fn dma_i(&self) -> &Dma {
        self.mmu_i().dma_i()
    }

    #[inline(always)]
    pub fn pad(&mut self) -> &mut Pad {
        self.mmu.pad()
    }

    #[inline(always)]
    pub fn pad_i(&self) -> &Pad {
        self.mmu_i().pad_i()
    }

    #[inline(always)]
    pub fn timer(&mut self) -> &mut Timer {
        self.mmu.timer()
    }

    #[inline(always)]
    pub fn timer_i(&self) -> &Timer {
        self.mmu_i().timer_i()
    }

    #[inline(always)]
    pub fn serial(&mut self) -> &mut Serial {
        self.mmu.serial()
    }

    #[inline(always)]
    pub fn serial_i(&self) -> &Serial {
        self.mmu_i().serial_i()
    }

    #[inline(always)]
    pub fn halted(&self) -> bool {
        self.halted
    }

    #[inline(always)]
    pub fn set_halted(&mut self, value: bool) {
        self.halted = value;
    }

    #[inline(always)]
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    #[inline(always)]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[inline(always)]
    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    #[inline(always)]
    pub fn sp(&self) -> u16 {
        self.sp
    }

    #[inline(always)]
    pub fn set_sp(&mut self, value: u16) {
        self.sp = value;
    }

    #[inline(always)]
    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f() as u16
    }

    #[inline(always)]
    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    #[inline(always)]
    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    #[inline(always)]
    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    /// The F register materialized from the four flags, the low
    /// nibble is always zero.
    #[inline(always)]
    pub fn f(&self) -> u8 {
        (u8::from(self.zero) << 7)
            | (u8::from(self.sub) << 6)
            | (u8::from(self.half_carry) << 5)
            | (u8::from(self.carry) << 4)
    }

    #[inline(always)]
    pub fn set_f(&mut self, value: u8) {
        self.zero = value & 0x80 == 0x80;
        self.sub = value & 0x40 == 0x40;
        self.half_carry = value & 0x20 == 0x20;
        self.carry = value & 0x10 == 0x10;
    }

    #[inline(always)]
    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.set_f(value as u8);
    }

    #[inline(always)]
    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    #[inline(always)]
    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    #[inline(always)]
    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    #[inline(always)]
    pub fn ime(&self) -> bool {
        self.ime
    }

    #[inline(always)]
    pub fn set_ime(&mut self, value: bool) {
        self.ime = value;
    }

    /// Reads the byte at PC (one machine cycle) and advances it.
    #[inline(always)]
    pub fn read_u8(&mut self) -> u8 {
        let byte = self.mmu.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    #[inline(always)]
    pub fn read_u16(&mut self) -> u16 {
        let byte1 = self.read_u8();
        let byte2 = self.read_u8();

        byte1 as u16 | ((byte2 as u16) << 8)
    }

    #[inline(always)]
    pub fn push_byte(&mut self, byte: u8) {
        self.sp = self.sp.wrapping_sub(1);
        self.mmu.write(self.sp, byte);
    }

    #[inline(always)]
    pub fn push_word(&mut self, word: u16) {
        self.push_byte((word >> 8) as u8);
        self.push_byte(word as u8);
    }

    #[inline(always)]
    pub fn pop_byte(&mut self) -> u8 {
        let byte = self.mmu.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        byte
    }

    #[inline(always)]
    pub fn pop_word(&mut self) -> u16 {
        self.pop_byte() as u16 | ((self.pop_byte() as u16) << 8)
    }

    #[inline(always)]
    pub fn zero(&self) -> bool {
        self.zero
    }

    #[inline(always)]
    pub fn set_zero(&mut self, value: bool) {
        self.zero = value;
    }

    #[inline(always)]
    pub fn sub(&self) -> bool {
        self.sub
    }

    #[inline(always)]
    pub fn set_sub(&mut self, value: bool) {
        self.sub = value;
    }

    #[inline(always)]
    pub fn half_carry(&self) -> bool {
        self.half_carry
    }

    #[inline(always)]
    pub fn set_half_carry(&mut self, value: bool) {
        self.half_carry = value;
    }

    #[inline(always)]
    pub fn carry(&self) -> bool {
        self.carry
    }

    #[inline(always)]
    pub fn set_carry(&mut self, value: bool) {
        self.carry = value;
    }

    /// Suspends execution until an enabled interrupt becomes
    /// pending. Entered with IME cleared and an interrupt already
    /// pending, it instead arms the HALT bug.
    #[inline(always)]
    pub fn halt(&mut self) {
        if !self.ime && self.mmu.int_pending() != 0 {
            self.halt_bug = true;
        } else {
            self.halted = true;
        }
    }

    /// Enters the stopped state, clearing DIV, painting the screen
    /// white and freezing the machine until a button is pressed.
    #[inline(always)]
    pub fn stop(&mut self) {
        self.stopped = true;
        self.mmu.timer().clear_div();
        self.mmu.ppu().freeze_white();
    }

    /// Requests the interrupt master enable, effective only after
    /// the following instruction.
    #[inline(always)]
    pub fn enable_int(&mut self) {
        self.ime_pending = true;
    }

    #[inline(always)]
    pub fn disable_int(&mut self) {
        self.ime = false;
        self.ime_pending = false;
    }

    /// Immediate interrupt master enable, used by RETI.
    #[inline(always)]
    pub fn enable_int_now(&mut self) {
        self.ime = true;
        self.ime_pending = false;
    }

    pub fn description(&self, opcode: u8, inst_pc: u16) -> String {
        let info = if opcode == PREFIX {
            &OPCODES_CB[self.mmu.read_raw(inst_pc.wrapping_add(1)) as usize]
        } else {
            &OPCODES[opcode as usize]
        };
        let title_str = format!("[0x{inst_pc:04x}] {}", info.mnemonic);
        let inst_time_str = format!("({} cycles)", info.cycles);
        let registers_str = format!("[PC=0x{:04x} SP=0x{:04x}] [A=0x{:02x} B=0x{:02x} C=0x{:02x} D=0x{:02x} E=0x{:02x} H=0x{:02x} L=0x{:02x}]",
        self.pc, self.sp, self.a, self.b, self.c, self.d, self.e, self.h, self.l);
        format!("{title_str: <24} {inst_time_str: <11} {registers_str: <10}")
    }

    pub fn description_default(&self) -> String {
        let opcode = self.mmu.read_raw(self.ppc);
        self.description(opcode, self.ppc)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new(Mmu::default())
    }
}

impl Display for Cpu {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description_default())
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::IF_ADDR;

    use super::Cpu;

    fn program(cpu: &mut Cpu, bytes: &[u8]) {
        for (index, byte) in bytes.iter().enumerate() {
            cpu.mmu.write_raw(0xc000 + index as u16, *byte);
        }
        cpu.pc = 0xc000;
    }

    #[test]
    fn test_cpu_clock() {
        let mut cpu = Cpu::default();

        // test NOP instruction
        program(&mut cpu, &[0x00]);
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc, 0xc001);

        // test LD A, d8 instruction
        program(&mut cpu, &[0x3e, 0x42]);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.pc, 0xc002);
        assert_eq!(cpu.a, 0x42);

        // test LD (HL+), A instruction
        program(&mut cpu, &[0x22]);
        cpu.set_hl(0xd000);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.hl(), 0xd001);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0x42);

        // test INC A instruction
        program(&mut cpu, &[0x3c]);
        cpu.a = 0x42;
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.a, 0x43);

        // test DEC A instruction
        program(&mut cpu, &[0x3d]);
        cpu.a = 0x42;
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.a, 0x41);

        // test LD A, (HL) instruction
        program(&mut cpu, &[0x7e]);
        cpu.set_hl(0xd000);
        cpu.mmu.write_raw(0xd000, 0x24);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x24);

        // test LD (HL), d8 instruction
        program(&mut cpu, &[0x36, 0x42]);
        cpu.set_hl(0xd000);
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0x42);

        // test JR i8 instruction
        program(&mut cpu, &[0x18, 0x03]);
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.pc, 0xc005);

        // test ADD A, d8 instruction
        program(&mut cpu, &[0xc6, 0x01]);
        cpu.a = 0x42;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x43);

        // test SUB d8 instruction
        program(&mut cpu, &[0xd6, 0x01]);
        cpu.a = 0x42;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x41);

        // test AND d8 instruction
        program(&mut cpu, &[0xe6, 0x0f]);
        cpu.a = 0x0a;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x0a & 0x0f);

        // test OR d8 instruction
        program(&mut cpu, &[0xf6, 0x0f]);
        cpu.a = 0x0a;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x0a | 0x0f);

        // test XOR d8 instruction
        program(&mut cpu, &[0xee, 0x0f]);
        cpu.a = 0x0a;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x0a ^ 0x0f);
    }

    #[test]
    fn test_flags_low_nibble_zero() {
        let mut cpu = Cpu::default();
        cpu.set_f(0xff);
        assert_eq!(cpu.f(), 0xf0);
        cpu.set_f(0x0f);
        assert_eq!(cpu.f(), 0x00);
    }

    #[test]
    fn test_interrupt_dispatch() {
        let mut cpu = Cpu::default();
        cpu.set_ime(true);
        cpu.mmu.ie = 0x01;
        cpu.mmu.ppu().set_int_vblank(true);
        cpu.pc = 0xc000;
        cpu.sp = 0xd000;

        let cycles = cpu.clock();
        assert_eq!(cycles, 20);
        assert_eq!(cpu.pc, 0x40);
        assert_eq!(cpu.sp, 0xcffe);
        assert_eq!(cpu.mmu.read_raw(0xcfff), 0xc0);
        assert_eq!(cpu.mmu.read_raw(0xcffe), 0x00);
        assert!(!cpu.ime());
        assert_eq!(cpu.mmu.read_raw(IF_ADDR) & 0x01, 0x00);
    }

    #[test]
    fn test_interrupt_priority() {
        let mut cpu = Cpu::default();
        cpu.set_ime(true);
        cpu.mmu.ie = 0x1f;
        cpu.mmu.timer().set_int_tima(true);
        cpu.mmu.pad().set_int_pad(true);
        cpu.pc = 0xc000;
        cpu.sp = 0xd000;

        cpu.clock();
        assert_eq!(cpu.pc, 0x50);
        // the joypad request is still pending
        assert_eq!(cpu.mmu.read_raw(IF_ADDR) & 0x1f, 0x10);
    }

    #[test]
    fn test_ei_delay() {
        let mut cpu = Cpu::default();
        cpu.mmu.ie = 0x01;
        cpu.mmu.ppu().set_int_vblank(true);
        // EI; NOP
        program(&mut cpu, &[0xfb, 0x00]);

        cpu.clock();
        assert!(!cpu.ime());

        // the following instruction runs before the dispatch
        cpu.clock();
        assert!(cpu.ime());
        assert_eq!(cpu.pc, 0xc002);

        cpu.clock();
        assert_eq!(cpu.pc, 0x40);
    }

    #[test]
    fn test_halt_wakes_without_dispatch() {
        let mut cpu = Cpu::default();
        cpu.mmu.ie = 0x04;
        // HALT; INC A
        program(&mut cpu, &[0x76, 0x3c]);

        cpu.clock();
        assert!(cpu.halted());

        // no interrupt yet, the CPU idles
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert!(cpu.halted());

        cpu.mmu.timer().set_int_tima(true);
        cpu.clock();
        assert!(!cpu.halted());
        assert_eq!(cpu.a, 0x01);
    }

    #[test]
    fn test_halt_bug() {
        let mut cpu = Cpu::default();
        cpu.mmu.ie = 0x04;
        cpu.mmu.timer().set_int_tima(true);
        // HALT; INC A - with IME off and a pending interrupt the
        // byte after HALT executes twice
        program(&mut cpu, &[0x76, 0x3c]);

        cpu.clock();
        assert!(!cpu.halted());

        cpu.clock();
        assert_eq!(cpu.a, 0x01);
        assert_eq!(cpu.pc, 0xc001);

        cpu.clock();
        assert_eq!(cpu.a, 0x02);
        assert_eq!(cpu.pc, 0xc002);
    }

    #[test]
    fn test_stop_and_wake() {
        let mut cpu = Cpu::default();
        cpu.mmu.timer().write(crate::consts::TAC_ADDR, 0x05);
        // STOP
        program(&mut cpu, &[0x10, 0x00]);
        cpu.clock();
        assert!(cpu.stopped());
        assert_eq!(cpu.mmu.timer_i().counter(), 0);

        // frozen until a key is pressed
        let clocks = cpu.mmu.clocks();
        cpu.clock();
        assert!(cpu.stopped());
        assert_eq!(cpu.mmu.clocks(), clocks);

        cpu.mmu.pad().key_press(crate::pad::PadKey::A);
        cpu.clock();
        assert!(!cpu.stopped());
    }
}
