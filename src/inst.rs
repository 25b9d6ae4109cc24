//! ISA (instruction set architecture) implementation for the [Sharp LR35902](https://en.wikipedia.org/wiki/Game_Boy) CPU.
//!
//! The opcode tables carry the static description of every
//! instruction (mnemonic and machine clock costs), execution is
//! decoded from the opcode bit patterns so that operand variants of
//! the same operation share a single executor. All timing is paid
//! through bus accesses and explicit internal cycles, the table
//! costs are informative.

use crate::{cpu::Cpu, warnln};

pub const PREFIX: u8 = 0xcb;

/// Static description of an opcode: mnemonic, cost in master clocks
/// and, for conditional control flow, the cost when taken.
pub struct OpInfo {
    pub mnemonic: &'static str,
    pub cycles: u8,
    pub cycles_taken: u8,
}

const fn op(mnemonic: &'static str, cycles: u8) -> OpInfo {
    OpInfo {
        mnemonic,
        cycles,
        cycles_taken: cycles,
    }
}

const fn opc(mnemonic: &'static str, cycles: u8, cycles_taken: u8) -> OpInfo {
    OpInfo {
        mnemonic,
        cycles,
        cycles_taken,
    }
}

pub const OPCODES: [OpInfo; 256] = [
    // 0x0 opcodes
    op("NOP", 4),
    op("LD BC, d16", 12),
    op("LD (BC), A", 8),
    op("INC BC", 8),
    op("INC B", 4),
    op("DEC B", 4),
    op("LD B, d8", 8),
    op("RLCA", 4),
    op("LD (a16), SP", 20),
    op("ADD HL, BC", 8),
    op("LD A, (BC)", 8),
    op("DEC BC", 8),
    op("INC C", 4),
    op("DEC C", 4),
    op("LD C, d8", 8),
    op("RRCA", 4),
    // 0x1 opcodes
    op("STOP", 4),
    op("LD DE, d16", 12),
    op("LD (DE), A", 8),
    op("INC DE", 8),
    op("INC D", 4),
    op("DEC D", 4),
    op("LD D, d8", 8),
    op("RLA", 4),
    op("JR r8", 12),
    op("ADD HL, DE", 8),
    op("LD A, (DE)", 8),
    op("DEC DE", 8),
    op("INC E", 4),
    op("DEC E", 4),
    op("LD E, d8", 8),
    op("RRA", 4),
    // 0x2 opcodes
    opc("JR NZ, r8", 8, 12),
    op("LD HL, d16", 12),
    op("LD (HL+), A", 8),
    op("INC HL", 8),
    op("INC H", 4),
    op("DEC H", 4),
    op("LD H, d8", 8),
    op("DAA", 4),
    opc("JR Z, r8", 8, 12),
    op("ADD HL, HL", 8),
    op("LD A, (HL+)", 8),
    op("DEC HL", 8),
    op("INC L", 4),
    op("DEC L", 4),
    op("LD L, d8", 8),
    op("CPL", 4),
    // 0x3 opcodes
    opc("JR NC, r8", 8, 12),
    op("LD SP, d16", 12),
    op("LD (HL-), A", 8),
    op("INC SP", 8),
    op("INC (HL)", 12),
    op("DEC (HL)", 12),
    op("LD (HL), d8", 12),
    op("SCF", 4),
    opc("JR C, r8", 8, 12),
    op("ADD HL, SP", 8),
    op("LD A, (HL-)", 8),
    op("DEC SP", 8),
    op("INC A", 4),
    op("DEC A", 4),
    op("LD A, d8", 8),
    op("CCF", 4),
    // 0x4 opcodes
    op("LD B, B", 4),
    op("LD B, C", 4),
    op("LD B, D", 4),
    op("LD B, E", 4),
    op("LD B, H", 4),
    op("LD B, L", 4),
    op("LD B, (HL)", 8),
    op("LD B, A", 4),
    op("LD C, B", 4),
    op("LD C, C", 4),
    op("LD C, D", 4),
    op("LD C, E", 4),
    op("LD C, H", 4),
    op("LD C, L", 4),
    op("LD C, (HL)", 8),
    op("LD C, A", 4),
    // 0x5 opcodes
    op("LD D, B", 4),
    op("LD D, C", 4),
    op("LD D, D", 4),
    op("LD D, E", 4),
    op("LD D, H", 4),
    op("LD D, L", 4),
    op("LD D, (HL)", 8),
    op("LD D, A", 4),
    op("LD E, B", 4),
    op("LD E, C", 4),
    op("LD E, D", 4),
    op("LD E, E", 4),
    op("LD E, H", 4),
    op("LD E, L", 4),
    op("LD E, (HL)", 8),
    op("LD E, A", 4),
    // 0x6 opcodes
    op("LD H, B", 4),
    op("LD H, C", 4),
    op("LD H, D", 4),
    op("LD H, E", 4),
    op("LD H, H", 4),
    op("LD H, L", 4),
    op("LD H, (HL)", 8),
    op("LD H, A", 4),
    op("LD L, B", 4),
    op("LD L, C", 4),
    op("LD L, D", 4),
    op("LD L, E", 4),
    op("LD L, H", 4),
    op("LD L, L", 4),
    op("LD L, (HL)", 8),
    op("LD L, A", 4),
    // 0x7 opcodes
    op("LD (HL), B", 8),
    op("LD (HL), C", 8),
    op("LD (HL), D", 8),
    op("LD (HL), E", 8),
    op("LD (HL), H", 8),
    op("LD (HL), L", 8),
    op("HALT", 4),
    op("LD (HL), A", 8),
    op("LD A, B", 4),
    op("LD A, C", 4),
    op("LD A, D", 4),
    op("LD A, E", 4),
    op("LD A, H", 4),
    op("LD A, L", 4),
    op("LD A, (HL)", 8),
    op("LD A, A", 4),
    // 0x8 opcodes
    op("ADD A, B", 4),
    op("ADD A, C", 4),
    op("ADD A, D", 4),
    op("ADD A, E", 4),
    op("ADD A, H", 4),
    op("ADD A, L", 4),
    op("ADD A, (HL)", 8),
    op("ADD A, A", 4),
    op("ADC A, B", 4),
    op("ADC A, C", 4),
    op("ADC A, D", 4),
    op("ADC A, E", 4),
    op("ADC A, H", 4),
    op("ADC A, L", 4),
    op("ADC A, (HL)", 8),
    op("ADC A, A", 4),
    // 0x9 opcodes
    op("SUB B", 4),
    op("SUB C", 4),
    op("SUB D", 4),
    op("SUB E", 4),
    op("SUB H", 4),
    op("SUB L", 4),
    op("SUB (HL)", 8),
    op("SUB A", 4),
    op("SBC A, B", 4),
    op("SBC A, C", 4),
    op("SBC A, D", 4),
    op("SBC A, E", 4),
    op("SBC A, H", 4),
    op("SBC A, L", 4),
    op("SBC A, (HL)", 8),
    op("SBC A, A", 4),
    // 0xA opcodes
    op("AND B", 4),
    op("AND C", 4),
    op("AND D", 4),
    op("AND E", 4),
    op("AND H", 4),
    op("AND L", 4),
    op("AND (HL)", 8),
    op("AND A", 4),
    op("XOR B", 4),
    op("XOR C", 4),
    op("XOR D", 4),
    op("XOR E", 4),
    op("XOR H", 4),
    op("XOR L", 4),
    op("XOR (HL)", 8),
    op("XOR A", 4),
    // 0xB opcodes
    op("OR B", 4),
    op("OR C", 4),
    op("OR D", 4),
    op("OR E", 4),
    op("OR H", 4),
    op("OR L", 4),
    op("OR (HL)", 8),
    op("OR A", 4),
    op("CP B", 4),
    op("CP C", 4),
    op("CP D", 4),
    op("CP E", 4),
    op("CP H", 4),
    op("CP L", 4),
    op("CP (HL)", 8),
    op("CP A", 4),
    // 0xC opcodes
    opc("RET NZ", 8, 20),
    op("POP BC", 12),
    opc("JP NZ, a16", 12, 16),
    op("JP a16", 16),
    opc("CALL NZ, a16", 12, 24),
    op("PUSH BC", 16),
    op("ADD A, d8", 8),
    op("RST 00H", 16),
    opc("RET Z", 8, 20),
    op("RET", 16),
    opc("JP Z, a16", 12, 16),
    op("PREFIX CB", 4),
    opc("CALL Z, a16", 12, 24),
    op("CALL a16", 24),
    op("ADC A, d8", 8),
    op("RST 08H", 16),
    // 0xD opcodes
    opc("RET NC", 8, 20),
    op("POP DE", 12),
    opc("JP NC, a16", 12, 16),
    op("! ILLEGAL !", 4),
    opc("CALL NC, a16", 12, 24),
    op("PUSH DE", 16),
    op("SUB d8", 8),
    op("RST 10H", 16),
    opc("RET C", 8, 20),
    op("RETI", 16),
    opc("JP C, a16", 12, 16),
    op("! ILLEGAL !", 4),
    opc("CALL C, a16", 12, 24),
    op("! ILLEGAL !", 4),
    op("SBC A, d8", 8),
    op("RST 18H", 16),
    // 0xE opcodes
    op("LDH (a8), A", 12),
    op("POP HL", 12),
    op("LD (C), A", 8),
    op("! ILLEGAL !", 4),
    op("! ILLEGAL !", 4),
    op("PUSH HL", 16),
    op("AND d8", 8),
    op("RST 20H", 16),
    op("ADD SP, r8", 16),
    op("JP HL", 4),
    op("LD (a16), A", 16),
    op("! ILLEGAL !", 4),
    op("! ILLEGAL !", 4),
    op("! ILLEGAL !", 4),
    op("XOR d8", 8),
    op("RST 28H", 16),
    // 0xF opcodes
    op("LDH A, (a8)", 12),
    op("POP AF", 12),
    op("LD A, (C)", 8),
    op("DI", 4),
    op("! ILLEGAL !", 4),
    op("PUSH AF", 16),
    op("OR d8", 8),
    op("RST 30H", 16),
    op("LD HL, SP+r8", 12),
    op("LD SP, HL", 8),
    op("LD A, (a16)", 16),
    op("EI", 4),
    op("! ILLEGAL !", 4),
    op("! ILLEGAL !", 4),
    op("CP d8", 8),
    op("RST 38H", 16),
];

pub const OPCODES_CB: [OpInfo; 256] = [
    // 0x0 opcodes
    op("RLC B", 8),
    op("RLC C", 8),
    op("RLC D", 8),
    op("RLC E", 8),
    op("RLC H", 8),
    op("RLC L", 8),
    op("RLC (HL)", 16),
    op("RLC A", 8),
    op("RRC B", 8),
    op("RRC C", 8),
    op("RRC D", 8),
    op("RRC E", 8),
    op("RRC H", 8),
    op("RRC L", 8),
    op("RRC (HL)", 16),
    op("RRC A", 8),
    // 0x1 opcodes
    op("RL B", 8),
    op("RL C", 8),
    op("RL D", 8),
    op("RL E", 8),
    op("RL H", 8),
    op("RL L", 8),
    op("RL (HL)", 16),
    op("RL A", 8),
    op("RR B", 8),
    op("RR C", 8),
    op("RR D", 8),
    op("RR E", 8),
    op("RR H", 8),
    op("RR L", 8),
    op("RR (HL)", 16),
    op("RR A", 8),
    // 0x2 opcodes
    op("SLA B", 8),
    op("SLA C", 8),
    op("SLA D", 8),
    op("SLA E", 8),
    op("SLA H", 8),
    op("SLA L", 8),
    op("SLA (HL)", 16),
    op("SLA A", 8),
    op("SRA B", 8),
    op("SRA C", 8),
    op("SRA D", 8),
    op("SRA E", 8),
    op("SRA H", 8),
    op("SRA L", 8),
    op("SRA (HL)", 16),
    op("SRA A", 8),
    // 0x3 opcodes
    op("SWAP B", 8),
    op("SWAP C", 8),
    op("SWAP D", 8),
    op("SWAP E", 8),
    op("SWAP H", 8),
    op("SWAP L", 8),
    op("SWAP (HL)", 16),
    op("SWAP A", 8),
    op("SRL B", 8),
    op("SRL C", 8),
    op("SRL D", 8),
    op("SRL E", 8),
    op("SRL H", 8),
    op("SRL L", 8),
    op("SRL (HL)", 16),
    op("SRL A", 8),
    // 0x4 opcodes
    op("BIT 0, B", 8),
    op("BIT 0, C", 8),
    op("BIT 0, D", 8),
    op("BIT 0, E", 8),
    op("BIT 0, H", 8),
    op("BIT 0, L", 8),
    op("BIT 0, (HL)", 12),
    op("BIT 0, A", 8),
    op("BIT 1, B", 8),
    op("BIT 1, C", 8),
    op("BIT 1, D", 8),
    op("BIT 1, E", 8),
    op("BIT 1, H", 8),
    op("BIT 1, L", 8),
    op("BIT 1, (HL)", 12),
    op("BIT 1, A", 8),
    // 0x5 opcodes
    op("BIT 2, B", 8),
    op("BIT 2, C", 8),
    op("BIT 2, D", 8),
    op("BIT 2, E", 8),
    op("BIT 2, H", 8),
    op("BIT 2, L", 8),
    op("BIT 2, (HL)", 12),
    op("BIT 2, A", 8),
    op("BIT 3, B", 8),
    op("BIT 3, C", 8),
    op("BIT 3, D", 8),
    op("BIT 3, E", 8),
    op("BIT 3, H", 8),
    op("BIT 3, L", 8),
    op("BIT 3, (HL)", 12),
    op("BIT 3, A", 8),
    // 0x6 opcodes
    op("BIT 4, B", 8),
    op("BIT 4, C", 8),
    op("BIT 4, D", 8),
    op("BIT 4, E", 8),
    op("BIT 4, H", 8),
    op("BIT 4, L", 8),
    op("BIT 4, (HL)", 12),
    op("BIT 4, A", 8),
    op("BIT 5, B", 8),
    op("BIT 5, C", 8),
    op("BIT 5, D", 8),
    op("BIT 5, E", 8),
    op("BIT 5, H", 8),
    op("BIT 5, L", 8),
    op("BIT 5, (HL)", 12),
    op("BIT 5, A", 8),
    // 0x7 opcodes
    op("BIT 6, B", 8),
    op("BIT 6, C", 8),
    op("BIT 6, D", 8),
    op("BIT 6, E", 8),
    op("BIT 6, H", 8),
    op("BIT 6, L", 8),
    op("BIT 6, (HL)", 12),
    op("BIT 6, A", 8),
    op("BIT 7, B", 8),
    op("BIT 7, C", 8),
    op("BIT 7, D", 8),
    op("BIT 7, E", 8),
    op("BIT 7, H", 8),
    op("BIT 7, L", 8),
    op("BIT 7, (HL)", 12),
    op("BIT 7, A", 8),
    // 0x8 opcodes
    op("RES 0, B", 8),
    op("RES 0, C", 8),
    op("RES 0, D", 8),
    op("RES 0, E", 8),
    op("RES 0, H", 8),
    op("RES 0, L", 8),
    op("RES 0, (HL)", 16),
    op("RES 0, A", 8),
    op("RES 1, B", 8),
    op("RES 1, C", 8),
    op("RES 1, D", 8),
    op("RES 1, E", 8),
    op("RES 1, H", 8),
    op("RES 1, L", 8),
    op("RES 1, (HL)", 16),
    op("RES 1, A", 8),
    // 0x9 opcodes
    op("RES 2, B", 8),
    op("RES 2, C", 8),
    op("RES 2, D", 8),
    op("RES 2, E", 8),
    op("RES 2, H", 8),
    op("RES 2, L", 8),
    op("RES 2, (HL)", 16),
    op("RES 2, A", 8),
    op("RES 3, B", 8),
    op("RES 3, C", 8),
    op("RES 3, D", 8),
    op("RES 3, E", 8),
    op("RES 3, H", 8),
    op("RES 3, L", 8),
    op("RES 3, (HL)", 16),
    op("RES 3, A", 8),
    // 0xA opcodes
    op("RES 4, B", 8),
    op("RES 4, C", 8),
    op("RES 4, D", 8),
    op("RES 4, E", 8),
    op("RES 4, H", 8),
    op("RES 4, L", 8),
    op("RES 4, (HL)", 16),
    op("RES 4, A", 8),
    op("RES 5, B", 8),
    op("RES 5, C", 8),
    op("RES 5, D", 8),
    op("RES 5, E", 8),
    op("RES 5, H", 8),
    op("RES 5, L", 8),
    op("RES 5, (HL)", 16),
    op("RES 5, A", 8),
    // 0xB opcodes
    op("RES 6, B", 8),
    op("RES 6, C", 8),
    op("RES 6, D", 8),
    op("RES 6, E", 8),
    op("RES 6, H", 8),
    op("RES 6, L", 8),
    op("RES 6, (HL)", 16),
    op("RES 6, A", 8),
    op("RES 7, B", 8),
    op("RES 7, C", 8),
    op("RES 7, D", 8),
    op("RES 7, E", 8),
    op("RES 7, H", 8),
    op("RES 7, L", 8),
    op("RES 7, (HL)", 16),
    op("RES 7, A", 8),
    // 0xC opcodes
    op("SET 0, B", 8),
    op("SET 0, C", 8),
    op("SET 0, D", 8),
    op("SET 0, E", 8),
    op("SET 0, H", 8),
    op("SET 0, L", 8),
    op("SET 0, (HL)", 16),
    op("SET 0, A", 8),
    op("SET 1, B", 8),
    op("SET 1, C", 8),
    op("SET 1, D", 8),
    op("SET 1, E", 8),
    op("SET 1, H", 8),
    op("SET 1, L", 8),
    op("SET 1, (HL)", 16),
    op("SET 1, A", 8),
    // 0xD opcodes
    op("SET 2, B", 8),
    op("SET 2, C", 8),
    op("SET 2, D", 8),
    op("SET 2, E", 8),
    op("SET 2, H", 8),
    op("SET 2, L", 8),
    op("SET 2, (HL)", 16),
    op("SET 2, A", 8),
    op("SET 3, B", 8),
    op("SET 3, C", 8),
    op("SET 3, D", 8),
    op("SET 3, E", 8),
    op("SET 3, H", 8),
    op("SET 3, L", 8),
    op("SET 3, (HL)", 16),
    op("SET 3, A", 8),
    // 0xE opcodes
    op("SET 4, B", 8),
    op("SET 4, C", 8),
    op("SET 4, D", 8),
    op("SET 4, E", 8),
    op("SET 4, H", 8),
    op("SET 4, L", 8),
    op("SET 4, (HL)", 16),
    op("SET 4, A", 8),
    op("SET 5, B", 8),
    op("SET 5, C", 8),
    op("SET 5, D", 8),
    op("SET 5, E", 8),
    op("SET 5, H", 8),
    op("SET 5, L", 8),
    op("SET 5, (HL)", 16),
    op("SET 5, A", 8),
    // 0xF opcodes
    op("SET 6, B", 8),
    op("SET 6, C", 8),
    op("SET 6, D", 8),
    op("SET 6, E", 8),
    op("SET 6, H", 8),
    op("SET 6, L", 8),
    op("SET 6, (HL)", 16),
    op("SET 6, A", 8),
    op("SET 7, B", 8),
    op("SET 7, C", 8),
    op("SET 7, D", 8),
    op("SET 7, E", 8),
    op("SET 7, H", 8),
    op("SET 7, L", 8),
    op("SET 7, (HL)", 16),
    op("SET 7, A", 8),
];

/// Executes one base table opcode against the CPU. The regular
/// blocks (loads, ALU) decode their operands from the opcode bits,
/// the irregular rows are handled individually.
pub fn execute(cpu: &mut Cpu, opcode: u8) {
    match opcode {
        0x00 => (),
        0x07 => {
            let a = cpu.a;
            let result = rlc(cpu, a);
            cpu.a = result;
            cpu.set_zero(false);
        }
        0x08 => {
            let addr = cpu.read_u16();
            cpu.mmu.write(addr, cpu.sp as u8);
            cpu.mmu.write(addr.wrapping_add(1), (cpu.sp >> 8) as u8);
        }
        0x0f => {
            let a = cpu.a;
            let result = rrc(cpu, a);
            cpu.a = result;
            cpu.set_zero(false);
        }
        0x10 => cpu.stop(),
        0x17 => {
            let a = cpu.a;
            let result = rl(cpu, a);
            cpu.a = result;
            cpu.set_zero(false);
        }
        0x18 => jr(cpu, true),
        0x1f => {
            let a = cpu.a;
            let result = rr(cpu, a);
            cpu.a = result;
            cpu.set_zero(false);
        }
        0x20 | 0x28 | 0x30 | 0x38 => {
            let taken = condition(cpu, (opcode >> 3) & 0x03);
            jr(cpu, taken);
        }
        0x27 => daa(cpu),
        0x2f => {
            cpu.a = !cpu.a;
            cpu.set_sub(true);
            cpu.set_half_carry(true);
        }
        0x37 => {
            cpu.set_sub(false);
            cpu.set_half_carry(false);
            cpu.set_carry(true);
        }
        0x3f => {
            let carry = cpu.carry();
            cpu.set_sub(false);
            cpu.set_half_carry(false);
            cpu.set_carry(!carry);
        }

        // LD rr, d16
        0x01 | 0x11 | 0x21 | 0x31 => {
            let word = cpu.read_u16();
            set_r16(cpu, (opcode >> 4) & 0x03, word);
        }
        // LD (BC)/(DE)/(HL+)/(HL-), A
        0x02 | 0x12 | 0x22 | 0x32 => {
            let addr = indirect_addr(cpu, (opcode >> 4) & 0x03);
            cpu.mmu.write(addr, cpu.a);
        }
        // LD A, (BC)/(DE)/(HL+)/(HL-)
        0x0a | 0x1a | 0x2a | 0x3a => {
            let addr = indirect_addr(cpu, (opcode >> 4) & 0x03);
            cpu.a = cpu.mmu.read(addr);
        }
        // INC rr
        0x03 | 0x13 | 0x23 | 0x33 => {
            let reg = (opcode >> 4) & 0x03;
            let value = get_r16(cpu, reg).wrapping_add(1);
            set_r16(cpu, reg, value);
            cpu.tick();
        }
        // DEC rr
        0x0b | 0x1b | 0x2b | 0x3b => {
            let reg = (opcode >> 4) & 0x03;
            let value = get_r16(cpu, reg).wrapping_sub(1);
            set_r16(cpu, reg, value);
            cpu.tick();
        }
        // ADD HL, rr
        0x09 | 0x19 | 0x29 | 0x39 => {
            let value = get_r16(cpu, (opcode >> 4) & 0x03);
            let result = add_u16_u16(cpu, cpu.hl(), value);
            cpu.set_hl(result);
            cpu.tick();
        }
        // INC r
        0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x34 | 0x3c => {
            let reg = (opcode >> 3) & 0x07;
            let value = get_r8(cpu, reg);
            let result = inc_set_flags(cpu, value);
            set_r8(cpu, reg, result);
        }
        // DEC r
        0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x35 | 0x3d => {
            let reg = (opcode >> 3) & 0x07;
            let value = get_r8(cpu, reg);
            let result = dec_set_flags(cpu, value);
            set_r8(cpu, reg, result);
        }
        // LD r, d8
        0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x36 | 0x3e => {
            let byte = cpu.read_u8();
            set_r8(cpu, (opcode >> 3) & 0x07, byte);
        }

        0x76 => cpu.halt(),
        // LD r, r'
        0x40..=0x7f => {
            let value = get_r8(cpu, opcode & 0x07);
            set_r8(cpu, (opcode >> 3) & 0x07, value);
        }
        // ALU A, r
        0x80..=0xbf => {
            let value = get_r8(cpu, opcode & 0x07);
            alu(cpu, (opcode >> 3) & 0x07, value);
        }

        // RET cc
        0xc0 | 0xc8 | 0xd0 | 0xd8 => {
            cpu.tick();
            if condition(cpu, (opcode >> 3) & 0x03) {
                cpu.pc = cpu.pop_word();
                cpu.tick();
            }
        }
        // POP rr
        0xc1 | 0xd1 | 0xe1 | 0xf1 => {
            let word = cpu.pop_word();
            set_r16_stack(cpu, (opcode >> 4) & 0x03, word);
        }
        // JP cc, a16
        0xc2 | 0xca | 0xd2 | 0xda => {
            let taken = condition(cpu, (opcode >> 3) & 0x03);
            jp(cpu, taken);
        }
        0xc3 => jp(cpu, true),
        // CALL cc, a16
        0xc4 | 0xcc | 0xd4 | 0xdc => {
            let taken = condition(cpu, (opcode >> 3) & 0x03);
            call(cpu, taken);
        }
        0xcd => call(cpu, true),
        // PUSH rr
        0xc5 | 0xd5 | 0xe5 | 0xf5 => {
            cpu.tick();
            let word = get_r16_stack(cpu, (opcode >> 4) & 0x03);
            cpu.push_word(word);
        }
        // ALU A, d8
        0xc6 | 0xce | 0xd6 | 0xde | 0xe6 | 0xee | 0xf6 | 0xfe => {
            let byte = cpu.read_u8();
            alu(cpu, (opcode >> 3) & 0x07, byte);
        }
        // RST n
        0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => {
            cpu.tick();
            cpu.push_word(cpu.pc);
            cpu.pc = (opcode & 0x38) as u16;
        }
        0xc9 => {
            cpu.pc = cpu.pop_word();
            cpu.tick();
        }
        0xd9 => {
            cpu.pc = cpu.pop_word();
            cpu.tick();
            cpu.enable_int_now();
        }
        // the prefix byte is consumed by the fetch logic
        0xcb => (),

        0xe0 => {
            let offset = cpu.read_u8();
            cpu.mmu.write(0xff00 | offset as u16, cpu.a);
        }
        0xe2 => cpu.mmu.write(0xff00 | cpu.c as u16, cpu.a),
        0xe8 => {
            let offset = cpu.read_u8() as i8;
            cpu.sp = add_sp_i8(cpu, offset);
            cpu.tick();
            cpu.tick();
        }
        0xe9 => cpu.pc = cpu.hl(),
        0xea => {
            let addr = cpu.read_u16();
            cpu.mmu.write(addr, cpu.a);
        }
        0xf0 => {
            let offset = cpu.read_u8();
            cpu.a = cpu.mmu.read(0xff00 | offset as u16);
        }
        0xf2 => cpu.a = cpu.mmu.read(0xff00 | cpu.c as u16),
        0xf3 => cpu.disable_int(),
        0xf8 => {
            let offset = cpu.read_u8() as i8;
            let result = add_sp_i8(cpu, offset);
            cpu.set_hl(result);
            cpu.tick();
        }
        0xf9 => {
            cpu.sp = cpu.hl();
            cpu.tick();
        }
        0xfa => {
            let addr = cpu.read_u16();
            cpu.a = cpu.mmu.read(addr);
        }
        0xfb => cpu.enable_int(),

        _ => warnln!("Illegal opcode 0x{:02x} executed as NOP", opcode),
    }
}

/// Executes one 0xCB prefixed opcode, the complete table is regular
/// so decode is purely positional.
pub fn execute_cb(cpu: &mut Cpu, opcode: u8) {
    let reg = opcode & 0x07;
    let bit = (opcode >> 3) & 0x07;
    match opcode >> 6 {
        // rotates and shifts
        0x00 => {
            let value = get_r8(cpu, reg);
            let result = match bit {
                0x00 => rlc(cpu, value),
                0x01 => rrc(cpu, value),
                0x02 => rl(cpu, value),
                0x03 => rr(cpu, value),
                0x04 => sla(cpu, value),
                0x05 => sra(cpu, value),
                0x06 => swap(cpu, value),
                _ => srl(cpu, value),
            };
            set_r8(cpu, reg, result);
        }
        // BIT b, r
        0x01 => {
            let value = get_r8(cpu, reg);
            cpu.set_zero(value & (1 << bit) == 0);
            cpu.set_sub(false);
            cpu.set_half_carry(true);
        }
        // RES b, r
        0x02 => {
            let value = get_r8(cpu, reg);
            set_r8(cpu, reg, value & !(1 << bit));
        }
        // SET b, r
        _ => {
            let value = get_r8(cpu, reg);
            set_r8(cpu, reg, value | (1 << bit));
        }
    }
}

/// Reads an 8 bit operand selected by the standard operand encoding,
/// index 6 is memory through HL and pays its bus cycle.
#[inline(always)]
fn get_r8(cpu: &mut Cpu, reg: u8) -> u8 {
    match reg {
        0x00 => cpu.b,
        0x01 => cpu.c,
        0x02 => cpu.d,
        0x03 => cpu.e,
        0x04 => cpu.h,
        0x05 => cpu.l,
        0x06 => cpu.mmu.read(cpu.hl()),
        _ => cpu.a,
    }
}

#[inline(always)]
fn set_r8(cpu: &mut Cpu, reg: u8, value: u8) {
    match reg {
        0x00 => cpu.b = value,
        0x01 => cpu.c = value,
        0x02 => cpu.d = value,
        0x03 => cpu.e = value,
        0x04 => cpu.h = value,
        0x05 => cpu.l = value,
        0x06 => cpu.mmu.write(cpu.hl(), value),
        _ => cpu.a = value,
    }
}

#[inline(always)]
fn get_r16(cpu: &mut Cpu, reg: u8) -> u16 {
    match reg {
        0x00 => cpu.bc(),
        0x01 => cpu.de(),
        0x02 => cpu.hl(),
        _ => cpu.sp,
    }
}

#[inline(always)]
fn set_r16(cpu: &mut Cpu, reg: u8, value: u16) {
    match reg {
        0x00 => cpu.set_bc(value),
        0x01 => cpu.set_de(value),
        0x02 => cpu.set_hl(value),
        _ => cpu.sp = value,
    }
}

/// The PUSH/POP register pair encoding replaces SP with AF.
#[inline(always)]
fn get_r16_stack(cpu: &mut Cpu, reg: u8) -> u16 {
    match reg {
        0x00 => cpu.bc(),
        0x01 => cpu.de(),
        0x02 => cpu.hl(),
        _ => cpu.af(),
    }
}

#[inline(always)]
fn set_r16_stack(cpu: &mut Cpu, reg: u8, value: u16) {
    match reg {
        0x00 => cpu.set_bc(value),
        0x01 => cpu.set_de(value),
        0x02 => cpu.set_hl(value),
        _ => cpu.set_af(value),
    }
}

/// Effective address of the indirect load row, the HL variants
/// post-increment and post-decrement the pair.
#[inline(always)]
fn indirect_addr(cpu: &mut Cpu, reg: u8) -> u16 {
    match reg {
        0x00 => cpu.bc(),
        0x01 => cpu.de(),
        0x02 => {
            let addr = cpu.hl();
            cpu.set_hl(addr.wrapping_add(1));
            addr
        }
        _ => {
            let addr = cpu.hl();
            cpu.set_hl(addr.wrapping_sub(1));
            addr
        }
    }
}

/// Branch condition selected from the opcode (NZ, Z, NC, C).
#[inline(always)]
fn condition(cpu: &Cpu, code: u8) -> bool {
    match code {
        0x00 => !cpu.zero(),
        0x01 => cpu.zero(),
        0x02 => !cpu.carry(),
        _ => cpu.carry(),
    }
}

/// Dispatches one of the eight accumulator ALU operations.
#[inline(always)]
fn alu(cpu: &mut Cpu, operation: u8, value: u8) {
    match operation {
        0x00 => {
            let a = cpu.a;
            let result = add_set_flags(cpu, a, value);
            cpu.a = result;
        }
        0x01 => {
            let a = cpu.a;
            let result = add_carry_set_flags(cpu, a, value);
            cpu.a = result;
        }
        0x02 => {
            let a = cpu.a;
            let result = sub_set_flags(cpu, a, value);
            cpu.a = result;
        }
        0x03 => {
            let a = cpu.a;
            let result = sub_carry_set_flags(cpu, a, value);
            cpu.a = result;
        }
        0x04 => {
            cpu.a &= value;
            let a = cpu.a;
            cpu.set_zero(a == 0);
            cpu.set_sub(false);
            cpu.set_half_carry(true);
            cpu.set_carry(false);
        }
        0x05 => {
            cpu.a ^= value;
            let a = cpu.a;
            cpu.set_zero(a == 0);
            cpu.set_sub(false);
            cpu.set_half_carry(false);
            cpu.set_carry(false);
        }
        0x06 => {
            cpu.a |= value;
            let a = cpu.a;
            cpu.set_zero(a == 0);
            cpu.set_sub(false);
            cpu.set_half_carry(false);
            cpu.set_carry(false);
        }
        _ => {
            let a = cpu.a;
            sub_set_flags(cpu, a, value);
        }
    }
}

fn jr(cpu: &mut Cpu, taken: bool) {
    let byte = cpu.read_u8() as i8;
    if !taken {
        return;
    }
    cpu.pc = (cpu.pc as i16).wrapping_add(byte as i16) as u16;
    cpu.tick();
}

fn jp(cpu: &mut Cpu, taken: bool) {
    let addr = cpu.read_u16();
    if !taken {
        return;
    }
    cpu.pc = addr;
    cpu.tick();
}

fn call(cpu: &mut Cpu, taken: bool) {
    let addr = cpu.read_u16();
    if !taken {
        return;
    }
    cpu.tick();
    cpu.push_word(cpu.pc);
    cpu.pc = addr;
}

fn add_set_flags(cpu: &mut Cpu, first: u8, second: u8) -> u8 {
    let first = first as u32;
    let second = second as u32;

    let result = first.wrapping_add(second);
    let result_b = result as u8;

    cpu.set_sub(false);
    cpu.set_zero(result_b == 0);
    cpu.set_half_carry((first ^ second ^ result) & 0x10 == 0x10);
    cpu.set_carry(result & 0x100 == 0x100);

    result_b
}

fn add_carry_set_flags(cpu: &mut Cpu, first: u8, second: u8) -> u8 {
    let first = first as u32;
    let second = second as u32;
    let carry = cpu.carry() as u32;

    let result = first.wrapping_add(second).wrapping_add(carry);
    let result_b = result as u8;

    cpu.set_sub(false);
    cpu.set_zero(result_b == 0);
    cpu.set_half_carry((first ^ second ^ result) & 0x10 == 0x10);
    cpu.set_carry(result & 0x100 == 0x100);

    result_b
}

fn sub_set_flags(cpu: &mut Cpu, first: u8, second: u8) -> u8 {
    let first = first as u32;
    let second = second as u32;

    let result = first.wrapping_sub(second);
    let result_b = result as u8;

    cpu.set_sub(true);
    cpu.set_zero(result_b == 0);
    cpu.set_half_carry((first ^ second ^ result) & 0x10 == 0x10);
    cpu.set_carry(result & 0x100 == 0x100);

    result_b
}

fn sub_carry_set_flags(cpu: &mut Cpu, first: u8, second: u8) -> u8 {
    let first = first as u32;
    let second = second as u32;
    let carry = cpu.carry() as u32;

    let result = first.wrapping_sub(second).wrapping_sub(carry);
    let result_b = result as u8;

    cpu.set_sub(true);
    cpu.set_zero(result_b == 0);
    cpu.set_half_carry((first ^ second ^ result) & 0x10 == 0x10);
    cpu.set_carry(result & 0x100 == 0x100);

    result_b
}

/// 16 bit addition used by ADD HL, rr, the zero flag is untouched
/// and half carry is computed on bit 11.
fn add_u16_u16(cpu: &mut Cpu, first: u16, second: u16) -> u16 {
    let first = first as u32;
    let second = second as u32;
    let result = first.wrapping_add(second);

    cpu.set_sub(false);
    cpu.set_half_carry((first ^ second ^ result) & 0x1000 == 0x1000);
    cpu.set_carry(result & 0x10000 == 0x10000);

    result as u16
}

/// Signed offset addition over SP used by ADD SP, r8 and
/// LD HL, SP+r8, the flags come from the low byte arithmetic.
fn add_sp_i8(cpu: &mut Cpu, offset: i8) -> u16 {
    let sp = cpu.sp;
    let offset_u = offset as u16;
    let result = sp.wrapping_add(offset_u);

    cpu.set_zero(false);
    cpu.set_sub(false);
    cpu.set_half_carry((sp & 0x0f) + (offset_u & 0x0f) > 0x0f);
    cpu.set_carry((sp & 0xff) + (offset_u & 0xff) > 0xff);

    result
}

fn inc_set_flags(cpu: &mut Cpu, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(value & 0x0f == 0x0f);
    result
}

fn dec_set_flags(cpu: &mut Cpu, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    cpu.set_sub(true);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(value & 0x0f == 0x00);
    result
}

/// BCD correction of the accumulator, tracked through the subtract,
/// carry and half carry flags of the preceding operation.
fn daa(cpu: &mut Cpu) {
    let a = cpu.a;
    let mut adjust = 0;

    if cpu.half_carry() {
        adjust |= 0x06;
    }

    if cpu.carry() {
        adjust |= 0x60;
    }

    let result = if cpu.sub() {
        a.wrapping_sub(adjust)
    } else {
        if a & 0x0f > 0x09 {
            adjust |= 0x06;
        }
        if a > 0x99 {
            adjust |= 0x60;
        }
        a.wrapping_add(adjust)
    };

    cpu.a = result;

    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);
    cpu.set_carry(adjust & 0x60 == 0x60);
}

fn rl(cpu: &mut Cpu, value: u8) -> u8 {
    let carry = cpu.carry();

    cpu.set_carry(value & 0x80 == 0x80);

    let result = (value << 1) | carry as u8;

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);

    result
}

fn rlc(cpu: &mut Cpu, value: u8) -> u8 {
    cpu.set_carry(value & 0x80 == 0x80);

    let result = (value << 1) | (value >> 7);

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);

    result
}

fn rr(cpu: &mut Cpu, value: u8) -> u8 {
    let carry = cpu.carry();

    cpu.set_carry(value & 0x01 == 0x01);

    let result = (value >> 1) | ((carry as u8) << 7);

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);

    result
}

fn rrc(cpu: &mut Cpu, value: u8) -> u8 {
    cpu.set_carry(value & 0x01 == 0x01);

    let result = (value >> 1) | (value << 7);

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);

    result
}

fn sla(cpu: &mut Cpu, value: u8) -> u8 {
    let result = value << 1;

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);
    cpu.set_carry(value & 0x80 == 0x80);

    result
}

fn sra(cpu: &mut Cpu, value: u8) -> u8 {
    let result = (value >> 1) | (value & 0x80);

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);
    cpu.set_carry(value & 0x01 == 0x01);

    result
}

fn srl(cpu: &mut Cpu, value: u8) -> u8 {
    let result = value >> 1;

    cpu.set_sub(false);
    cpu.set_zero(result == 0);
    cpu.set_half_carry(false);
    cpu.set_carry(value & 0x01 == 0x01);

    result
}

fn swap(cpu: &mut Cpu, value: u8) -> u8 {
    cpu.set_sub(false);
    cpu.set_zero(value == 0);
    cpu.set_half_carry(false);
    cpu.set_carry(false);

    (value << 4) | (value >> 4)
}

#[cfg(test)]
mod tests {
    use crate::cpu::Cpu;

    use super::{OPCODES, OPCODES_CB};

    fn program(cpu: &mut Cpu, bytes: &[u8]) {
        for (index, byte) in bytes.iter().enumerate() {
            cpu.mmu.write_raw(0xc000 + index as u16, *byte);
        }
        cpu.pc = 0xc000;
    }

    #[test]
    fn test_tables_are_complete() {
        assert_eq!(OPCODES.len(), 256);
        assert_eq!(OPCODES_CB.len(), 256);
        assert_eq!(OPCODES[0x00].mnemonic, "NOP");
        assert_eq!(OPCODES[0x36].cycles, 12);
        assert_eq!(OPCODES[0x20].cycles_taken, 12);
        assert_eq!(OPCODES_CB[0x46].cycles, 12);
        assert_eq!(OPCODES_CB[0xc6].cycles, 16);
    }

    #[test]
    fn test_add_flags() {
        let mut cpu = Cpu::default();
        // ADD A, d8 with half carry
        program(&mut cpu, &[0xc6, 0x0f]);
        cpu.a = 0x01;
        cpu.clock();
        assert_eq!(cpu.a, 0x10);
        assert!(cpu.half_carry());
        assert!(!cpu.carry());
        assert!(!cpu.zero());

        // ADD A, d8 with full wrap around
        program(&mut cpu, &[0xc6, 0x01]);
        cpu.a = 0xff;
        cpu.clock();
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.zero());
        assert!(cpu.carry());
        assert!(cpu.half_carry());
        assert_eq!(cpu.f() & 0x0f, 0x00);
    }

    #[test]
    fn test_adc_uses_carry() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0xce, 0x00]);
        cpu.a = 0x00;
        cpu.set_carry(true);
        cpu.clock();
        assert_eq!(cpu.a, 0x01);
    }

    #[test]
    fn test_sub_and_cp() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0xd6, 0x10]);
        cpu.a = 0x0f;
        cpu.clock();
        assert_eq!(cpu.a, 0xff);
        assert!(cpu.carry());
        assert!(cpu.sub());

        // CP leaves the accumulator untouched
        program(&mut cpu, &[0xfe, 0x42]);
        cpu.a = 0x42;
        cpu.clock();
        assert_eq!(cpu.a, 0x42);
        assert!(cpu.zero());
    }

    #[test]
    fn test_ld_r_r_block() {
        let mut cpu = Cpu::default();
        // LD B, C; LD D, B; LD A, D
        program(&mut cpu, &[0x41, 0x50, 0x7a]);
        cpu.c = 0x33;
        cpu.clock();
        cpu.clock();
        cpu.clock();
        assert_eq!(cpu.b, 0x33);
        assert_eq!(cpu.d, 0x33);
        assert_eq!(cpu.a, 0x33);
    }

    #[test]
    fn test_inc_dec_hl_memory() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0x34, 0x35]);
        cpu.set_hl(0xd000);
        cpu.mmu.write_raw(0xd000, 0x0f);

        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0x10);
        assert!(cpu.half_carry());

        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0x0f);
    }

    #[test]
    fn test_add_hl_flags() {
        let mut cpu = Cpu::default();
        // ADD HL, BC with carry out of bit 11
        program(&mut cpu, &[0x09]);
        cpu.set_hl(0x0fff);
        cpu.set_bc(0x0001);
        cpu.set_zero(true);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.hl(), 0x1000);
        assert!(cpu.half_carry());
        assert!(!cpu.carry());
        // zero flag is preserved
        assert!(cpu.zero());
    }

    #[test]
    fn test_jp_and_call_timing() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0xc3, 0x00, 0xd0]);
        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.pc, 0xd000);

        // CALL pushes the return address
        program(&mut cpu, &[0xcd, 0x00, 0xd0]);
        cpu.sp = 0xe000;
        let cycles = cpu.clock();
        assert_eq!(cycles, 24);
        assert_eq!(cpu.pc, 0xd000);
        assert_eq!(cpu.sp, 0xdffe);
        assert_eq!(cpu.mmu.read_raw(0xdfff), 0xc0);
        assert_eq!(cpu.mmu.read_raw(0xdffe), 0x03);
    }

    #[test]
    fn test_conditional_not_taken_timing() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0x20, 0x10]);
        cpu.set_zero(true);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.pc, 0xc002);

        program(&mut cpu, &[0xc4, 0x00, 0xd0]);
        cpu.set_zero(false);
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.pc, 0xc003);

        program(&mut cpu, &[0xc0]);
        cpu.set_zero(true);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.pc, 0xc001);
    }

    #[test]
    fn test_ret_round_trip() {
        let mut cpu = Cpu::default();
        // CALL a16 to a RET
        program(&mut cpu, &[0xcd, 0x00, 0xd0]);
        cpu.mmu.write_raw(0xd000, 0xc9);
        cpu.sp = 0xe000;
        cpu.clock();
        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.pc, 0xc003);
        assert_eq!(cpu.sp, 0xe000);
    }

    #[test]
    fn test_rst() {
        let mut cpu = Cpu::default();
        // RST 18H
        program(&mut cpu, &[0xdf]);
        cpu.sp = 0xe000;
        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.pc, 0x18);
        assert_eq!(cpu.mmu.read_raw(0xdffe), 0x01);
    }

    #[test]
    fn test_push_pop_af_masks_flags() {
        let mut cpu = Cpu::default();
        // PUSH BC; POP AF
        program(&mut cpu, &[0xc5, 0xf1]);
        cpu.set_bc(0x12ff);
        cpu.sp = 0xe000;
        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        // the low nibble of F never holds data
        assert_eq!(cpu.af(), 0x12f0);
    }

    #[test]
    fn test_add_sp_flags() {
        let mut cpu = Cpu::default();
        // ADD SP, r8 with a negative offset
        program(&mut cpu, &[0xe8, 0xff]);
        cpu.sp = 0x0000;
        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.sp, 0xffff);
        assert!(!cpu.half_carry());
        assert!(!cpu.carry());

        // LD HL, SP+r8
        program(&mut cpu, &[0xf8, 0x01]);
        cpu.sp = 0x00ff;
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.hl(), 0x0100);
        assert!(cpu.half_carry());
        assert!(cpu.carry());
    }

    #[test]
    fn test_ldh_and_indirect_c() {
        let mut cpu = Cpu::default();
        // LDH (a8), A ; LD A, (C)
        program(&mut cpu, &[0xe0, 0x80, 0xf2]);
        cpu.a = 0x42;
        cpu.c = 0x80;
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.mmu.read_raw(0xff80), 0x42);

        cpu.a = 0x00;
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn test_ld_a16_sp() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0x08, 0x00, 0xd0]);
        cpu.sp = 0x1234;
        let cycles = cpu.clock();
        assert_eq!(cycles, 20);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0x34);
        assert_eq!(cpu.mmu.read_raw(0xd001), 0x12);
    }

    #[test]
    fn test_daa_after_add() {
        let mut cpu = Cpu::default();
        // 0x15 + 0x27 = 0x3C, DAA corrects to 0x42
        program(&mut cpu, &[0xc6, 0x27, 0x27]);
        cpu.a = 0x15;
        cpu.clock();
        cpu.clock();
        assert_eq!(cpu.a, 0x42);
        assert!(!cpu.carry());

        // 0x99 + 0x01 = 0x9A, DAA corrects to 0x00 with carry
        program(&mut cpu, &[0xc6, 0x01, 0x27]);
        cpu.a = 0x99;
        cpu.clock();
        cpu.clock();
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.carry());
        assert!(cpu.zero());
    }

    #[test]
    fn test_daa_after_sub() {
        let mut cpu = Cpu::default();
        // 0x42 - 0x15 = 0x2D, DAA corrects to 0x27
        program(&mut cpu, &[0xd6, 0x15, 0x27]);
        cpu.a = 0x42;
        cpu.clock();
        cpu.clock();
        assert_eq!(cpu.a, 0x27);
    }

    #[test]
    fn test_cpl_scf_ccf() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0x2f, 0x37, 0x3f]);
        cpu.a = 0x55;
        cpu.clock();
        assert_eq!(cpu.a, 0xaa);
        assert!(cpu.sub());
        assert!(cpu.half_carry());

        cpu.clock();
        assert!(cpu.carry());
        assert!(!cpu.sub());
        assert!(!cpu.half_carry());

        cpu.clock();
        assert!(!cpu.carry());
    }

    #[test]
    fn test_rotates_clear_zero() {
        let mut cpu = Cpu::default();
        // RLCA on zero keeps the zero flag cleared
        program(&mut cpu, &[0x07]);
        cpu.a = 0x00;
        cpu.set_zero(true);
        cpu.clock();
        assert!(!cpu.zero());

        // RLA shifts the carry in
        program(&mut cpu, &[0x17]);
        cpu.a = 0x80;
        cpu.set_carry(false);
        cpu.clock();
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.carry());
    }

    #[test]
    fn test_cb_bit_res_set() {
        let mut cpu = Cpu::default();
        // BIT 7, A; RES 7, A; SET 0, A
        program(&mut cpu, &[0xcb, 0x7f, 0xcb, 0xbf, 0xcb, 0xc7]);
        cpu.a = 0x80;

        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert!(!cpu.zero());
        assert!(cpu.half_carry());

        cpu.clock();
        assert_eq!(cpu.a, 0x00);

        cpu.clock();
        assert_eq!(cpu.a, 0x01);
    }

    #[test]
    fn test_cb_memory_timing() {
        let mut cpu = Cpu::default();
        // SWAP (HL); BIT 0, (HL)
        program(&mut cpu, &[0xcb, 0x36, 0xcb, 0x46]);
        cpu.set_hl(0xd000);
        cpu.mmu.write_raw(0xd000, 0xab);

        let cycles = cpu.clock();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.mmu.read_raw(0xd000), 0xba);

        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert!(cpu.zero());
    }

    #[test]
    fn test_cb_shifts() {
        let mut cpu = Cpu::default();
        // SLA B; SRA B; SRL B
        program(&mut cpu, &[0xcb, 0x20, 0xcb, 0x28, 0xcb, 0x38]);
        cpu.b = 0xc1;

        cpu.clock();
        assert_eq!(cpu.b, 0x82);
        assert!(cpu.carry());

        cpu.clock();
        assert_eq!(cpu.b, 0xc1);
        assert!(!cpu.carry());

        cpu.clock();
        assert_eq!(cpu.b, 0x60);
        assert!(cpu.carry());
    }

    #[test]
    fn test_jp_hl() {
        let mut cpu = Cpu::default();
        program(&mut cpu, &[0xe9]);
        cpu.set_hl(0xd000);
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc, 0xd000);
    }

    #[test]
    fn test_hl_post_increment_decrement() {
        let mut cpu = Cpu::default();
        // LD (HL+), A; LD (HL-), A; LD A, (HL+)
        program(&mut cpu, &[0x22, 0x32, 0x2a]);
        cpu.a = 0x42;
        cpu.set_hl(0xd000);

        cpu.clock();
        assert_eq!(cpu.hl(), 0xd001);

        cpu.clock();
        assert_eq!(cpu.hl(), 0xd000);
        assert_eq!(cpu.mmu.read_raw(0xd001), 0x42);

        cpu.a = 0x00;
        cpu.clock();
        assert_eq!(cpu.a, 0x42);
        assert_eq!(cpu.hl(), 0xd001);
    }
}
