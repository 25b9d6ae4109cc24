//! Game Boy emulation entrypoint and associated functions and structures.
//!
//! Most of the meaningful publicly available functions and structures to
//! build a working emulator should be present here.
//!
//! # Examples
//!
//! Creates a simple [`GameBoy`] instance, loads an (empty) cartridge and
//! runs one frame worth of emulation.
//!
//! ```rust
//! use dotboy::gb::GameBoy;
//! let mut game_boy = GameBoy::new(None);
//! game_boy.load_rom_empty().unwrap();
//! game_boy.boot();
//! let cycles = game_boy.next_frame();
//! println!("Ran {} cycles", cycles);
//! ```

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use dotboy_common::{error::Error, ring::AudioRing, util::read_file};

use crate::{
    apu::Apu,
    cpu::Cpu,
    devices::{buffer::BufferDevice, stdout::StdoutDevice},
    dma::Dma,
    info::Info,
    mmu::Mmu,
    pad::{Pad, PadKey},
    ppu::{Ppu, PpuMode, DISPLAY_HEIGHT, DISPLAY_SIZE, DISPLAY_WIDTH, FRAME_BUFFER_SIZE},
    rom::Cartridge,
    serial::{NullDevice, Serial, SerialDevice},
    timer::Timer,
};

/// Aggregation structure allowing the bundling of
/// all the components of a GameBoy into a single
/// element for easy access.
pub struct Components {
    pub ppu: Ppu,
    pub apu: Apu,
    pub dma: Dma,
    pub pad: Pad,
    pub timer: Timer,
    pub serial: Serial,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            ppu: Ppu::default(),
            apu: Apu::default(),
            dma: Dma::default(),
            pad: Pad::default(),
            timer: Timer::default(),
            serial: Serial::default(),
        }
    }
}

pub struct Registers {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub scy: u8,
    pub scx: u8,
    pub wy: u8,
    pub wx: u8,
    pub ly: u8,
    pub lyc: u8,
}

/// Top level structure that abstracts the usage of the
/// Game Boy system under the Dotboy emulator.
///
/// Should serve as the main entry-point API.
pub struct GameBoy {
    /// Reference to the Game Boy CPU component to be
    /// used as the main element of the system, when
    /// clocked it drives every other component through
    /// the memory bus.
    cpu: Cpu,
}

impl GameBoy {
    /// The logic frequency of the Game Boy
    /// CPU in hz.
    pub const CPU_FREQ: u32 = 4194304;

    /// The visual frequency (refresh rate)
    /// of the Game Boy, close to 60 hz.
    pub const VISUAL_FREQ: f32 = 59.7275;

    /// The number of master clocks taken to run a complete frame
    /// loop in the Game Boy's PPU.
    pub const LCD_CYCLES: u32 = 70224;

    pub fn new(sampling_rate: Option<u32>) -> Self {
        let components = Components {
            apu: Apu::new(sampling_rate.unwrap_or(44100), Self::CPU_FREQ),
            ..Default::default()
        };
        let mmu = Mmu::new(components);
        let cpu = Cpu::new(mmu);
        Self { cpu }
    }

    /// Checks that the provided data is a loadable cartridge image.
    pub fn verify_rom(data: &[u8]) -> bool {
        Cartridge::from_data(data).is_ok()
    }

    /// Resets the complete machine to its power on state, the
    /// loaded cartridge (if any) is removed.
    pub fn reset(&mut self) {
        self.mmu().reset();
        self.cpu.reset();
    }

    /// Sets the CPU and I/O registers to the documented post boot
    /// state, skipping the boot ROM sequence.
    pub fn boot(&mut self) {
        self.cpu.boot();
    }

    /// Parses the provided data into a cartridge, without inserting
    /// it into the system.
    pub fn load_cartridge(data: &[u8]) -> Result<Cartridge, Error> {
        Cartridge::from_data(data)
    }

    /// Atomically replaces the current cartridge, resetting the
    /// core so the new title starts from a clean machine.
    pub fn insert(&mut self, rom: Cartridge) {
        self.reset();
        self.mmu().set_rom(rom);
    }

    pub fn load_rom(&mut self, data: &[u8]) -> Result<&mut Cartridge, Error> {
        let rom = Cartridge::from_data(data)?;
        self.insert(rom);
        Ok(self.mmu().rom())
    }

    pub fn load_rom_file(&mut self, path: &str) -> Result<&mut Cartridge, Error> {
        let data = read_file(path)?;
        self.load_rom(&data)
    }

    /// Loads a zero filled 32KB cartridge, useful for testing and
    /// benchmarking purposes.
    pub fn load_rom_empty(&mut self) -> Result<&mut Cartridge, Error> {
        let mut data = vec![0u8; 32 * 1024];
        data[0x0147] = 0x00;
        let mut sum: u8 = 0;
        for index in 0x0134..=0x014c {
            sum = sum.wrapping_sub(data[index]).wrapping_sub(1);
        }
        data[0x014d] = sum;
        self.load_rom(&data)
    }

    /// Installs a boot ROM image, mapped at 0x0000-0x00FF until
    /// the BOOT register is written by the boot sequence itself.
    pub fn load_boot(&mut self, data: &[u8]) {
        self.mmu().write_boot(data);
    }

    pub fn load_boot_file(&mut self, path: &str) -> Result<(), Error> {
        let data = read_file(path)?;
        self.load_boot(&data);
        Ok(())
    }

    /// Runs one unit of CPU work, returning the number of master
    /// clocks consumed.
    pub fn clock(&mut self) -> u8 {
        self.cpu.clock()
    }

    /// Advances the core by (at least) the provided number of
    /// master clocks, returning the amount effectively run. This is
    /// the main entry point to convert host wall-clock deltas into
    /// emulation time.
    pub fn run_for(&mut self, master_clocks: u64) -> u64 {
        let mut cycles = 0u64;
        while cycles < master_clocks {
            cycles += self.clock() as u64;
        }
        cycles
    }

    /// Runs the emulation until the next frame swap, returning the
    /// number of master clocks consumed.
    pub fn next_frame(&mut self) -> u32 {
        let mut cycles = 0u32;
        let current_frame = self.frame();
        while self.frame() == current_frame {
            cycles += self.clock() as u32;
        }
        cycles
    }

    /// Runs the emulation until PC reaches the provided address,
    /// useful to drive test ROMs to a known synchronization point.
    pub fn step_to(&mut self, addr: u16) -> u64 {
        let mut cycles = 0u64;
        while self.cpu.pc() != addr {
            cycles += self.clock() as u64;
        }
        cycles
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.pad().key_press(key);
    }

    pub fn key_lift(&mut self, key: PadKey) {
        self.pad().key_lift(key);
    }

    /// Replaces the complete joypad state with the provided bit
    /// mask (A, B, Select, Start, Right, Left, Up, Down from the
    /// least significant bit).
    pub fn set_joypad(&mut self, state: u8) {
        self.pad().set_state(state);
    }

    pub fn attach_serial(&mut self, device: Box<dyn SerialDevice>) {
        self.serial().set_device(device);
    }

    pub fn attach_null_serial(&mut self) {
        self.attach_serial(Box::<NullDevice>::default());
    }

    pub fn attach_stdout_serial(&mut self) {
        self.attach_serial(Box::<StdoutDevice>::default());
    }

    pub fn attach_buffer_serial(&mut self) {
        self.attach_serial(Box::<BufferDevice>::default());
    }

    /// Returns the output of the serial device as a string, mostly
    /// useful to capture the output of test ROMs.
    pub fn serial_output(&self) -> String {
        self.serial_i().device().state()
    }

    /// The RGB frame buffer of the last completed frame, swapped in
    /// place at each V-Blank.
    pub fn frame_buffer(&self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.ppu_i().frame_buffer()
    }

    /// The raw 2 bit (palette applied) shade buffer of the frame
    /// currently in composition.
    pub fn shade_buffer(&self) -> &[u8; DISPLAY_SIZE] {
        self.ppu_i().shade_buffer()
    }

    /// Monotonically increasing frame counter, changes exactly once
    /// per V-Blank, to be used by the host for frame pacing.
    pub fn frame(&self) -> u16 {
        self.ppu_i().frame_index()
    }

    /// Drains pending audio frames into the caller owned buffers,
    /// returning the number of stereo frames produced.
    pub fn pull_audio(&self, left: &mut [i16], right: &mut [i16]) -> usize {
        self.apu_i().pull_audio(left, right)
    }

    /// Obtains a handle over the audio ring that can be moved onto
    /// the host audio thread and drained from there.
    pub fn audio_ring(&self) -> Arc<AudioRing> {
        self.apu_i().ring()
    }

    pub fn clear_audio_buffer(&mut self) {
        self.apu_i().clear_audio();
    }

    /// Serializes the battery backed cartridge state (external RAM
    /// plus RTC for timer carts).
    pub fn snapshot_save_ram(&self) -> Vec<u8> {
        self.rom_i().snapshot_ram()
    }

    /// Restores a battery backed cartridge state previously
    /// produced by [`GameBoy::snapshot_save_ram`].
    pub fn restore_save_ram(&mut self, data: &[u8]) -> Result<(), Error> {
        self.rom().restore_ram(data)
    }

    pub fn read_memory(&self, addr: u16) -> u8 {
        self.mmu_i().read_raw(addr)
    }

    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.mmu().write_raw(addr, value);
    }

    pub fn registers(&self) -> Registers {
        let ppu_registers = self.ppu_i().registers();
        Registers {
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            e: self.cpu.e,
            h: self.cpu.h,
            l: self.cpu.l,
            scy: ppu_registers.scy,
            scx: ppu_registers.scx,
            wy: ppu_registers.wy,
            wx: ppu_registers.wx,
            ly: ppu_registers.ly,
            lyc: ppu_registers.lyc,
        }
    }

    pub fn clocks(&self) -> u64 {
        self.mmu_i().clocks()
    }

    pub fn ppu_ly(&self) -> u8 {
        self.ppu_i().ly()
    }

    pub fn ppu_mode(&self) -> PpuMode {
        self.ppu_i().mode()
    }

    pub fn display_width(&self) -> usize {
        DISPLAY_WIDTH
    }

    pub fn display_height(&self) -> usize {
        DISPLAY_HEIGHT
    }

    pub fn set_ppu_enabled(&mut self, value: bool) {
        self.mmu().set_ppu_enabled(value);
    }

    pub fn set_apu_enabled(&mut self, value: bool) {
        self.mmu().set_apu_enabled(value);
    }

    pub fn set_dma_enabled(&mut self, value: bool) {
        self.mmu().set_dma_enabled(value);
    }

    pub fn set_timer_enabled(&mut self, value: bool) {
        self.mmu().set_timer_enabled(value);
    }

    pub fn set_serial_enabled(&mut self, value: bool) {
        self.mmu().set_serial_enabled(value);
    }

    pub fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn cpu_i(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&mut self) -> &mut Mmu {
        self.cpu.mmu()
    }

    pub fn mmu_i(&self) -> &Mmu {
        self.cpu.mmu_i()
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        self.cpu.ppu()
    }

    pub fn ppu_i(&self) -> &Ppu {
        self.cpu.ppu_i()
    }

    pub fn apu(&mut self) -> &mut Apu {
        self.cpu.apu()
    }

    pub fn apu_i(&self) -> &Apu {
        self.cpu.apu_i()
    }

    pub fn dma(&mut self) -> &mut Dma {
        self.cpu.dma()
    }

    pub fn dma_i(&self) -> &Dma {
        self.cpu.dma_i()
    }

    pub fn pad(&mut self) -> &mut Pad {
        self.cpu.pad()
    }

    pub fn pad_i(&self) -> &Pad {
        self.cpu.pad_i()
    }

    pub fn timer(&mut self) -> &mut Timer {
        self.cpu.timer()
    }

    pub fn timer_i(&self) -> &Timer {
        self.cpu.timer_i()
    }

    pub fn serial(&mut self) -> &mut Serial {
        self.cpu.serial()
    }

    pub fn serial_i(&self) -> &Serial {
        self.cpu.serial_i()
    }

    pub fn rom(&mut self) -> &mut Cartridge {
        self.mmu().rom()
    }

    pub fn rom_i(&self) -> &Cartridge {
        self.mmu_i().rom_i()
    }

    pub fn cartridge(&mut self) -> &mut Cartridge {
        self.rom()
    }

    pub fn cartridge_i(&self) -> &Cartridge {
        self.rom_i()
    }

    pub fn description(&self, column_length: usize) -> String {
        let version_l = format!("{:width$}", "Version", width = column_length);
        let clock_l = format!("{:width$}", "Clock", width = column_length);
        let serial_l = format!("{:width$}", "Serial", width = column_length);
        format!(
            "{}  {}\n{}  {:.02} Mhz\n{}  {}",
            version_l,
            Info::version(),
            clock_l,
            Self::CPU_FREQ as f32 / 1000.0 / 1000.0,
            serial_l,
            self.serial_i().device().description(),
        )
    }

    pub fn description_debug(&self) -> String {
        format!(
            "{}\nCPU:\n{}\nDMA:\n{}",
            self.description(12),
            self.cpu_i().description_default(),
            self.dma_i().description()
        )
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Display for GameBoy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description(9))
    }
}

#[cfg(test)]
mod tests {
    use super::GameBoy;

    #[test]
    fn test_boot_state() {
        let mut gb = GameBoy::new(None);
        gb.load_rom_empty().unwrap();
        gb.boot();

        let registers = gb.registers();
        assert_eq!(registers.pc, 0x0100);
        assert_eq!(registers.sp, 0xfffe);
        assert_eq!(registers.a, 0x01);
        assert_eq!(gb.read_memory(0xff40), 0x91);
        assert_eq!(gb.read_memory(0xff47), 0xfc);
    }

    #[test]
    fn test_run_for_advances_time() {
        let mut gb = GameBoy::new(None);
        gb.load_rom_empty().unwrap();
        gb.boot();

        let cycles = gb.run_for(1000);
        assert!(cycles >= 1000);
        assert_eq!(gb.clocks(), cycles);
    }

    #[test]
    fn test_insert_resets() {
        let mut gb = GameBoy::new(None);
        gb.load_rom_empty().unwrap();
        gb.boot();
        gb.run_for(1000);

        let rom = GameBoy::load_cartridge(&{
            let mut data = vec![0u8; 32 * 1024];
            let mut sum: u8 = 0;
            for index in 0x0134..=0x014c {
                sum = sum.wrapping_sub(data[index]).wrapping_sub(1);
            }
            data[0x014d] = sum;
            data
        })
        .unwrap();
        gb.insert(rom);

        assert_eq!(gb.clocks(), 0);
        assert_eq!(gb.registers().pc, 0x0000);
    }

    #[test]
    fn test_descriptions() {
        let mut gb = GameBoy::new(None);
        gb.load_rom_empty().unwrap();
        gb.boot();
        gb.clock();

        assert!(gb.to_string().contains("Clock"));
        let debug = gb.description_debug();
        assert!(debug.contains("CPU:"));
        assert!(debug.contains("DMA:"));
        assert!(debug.contains("[0x0100] NOP"));
    }

    #[test]
    fn test_verify_rom() {
        assert!(!GameBoy::verify_rom(&[0u8; 16]));
        let mut data = vec![0u8; 32 * 1024];
        data[0x0147] = 0x01;
        assert!(GameBoy::verify_rom(&data));
    }
}
