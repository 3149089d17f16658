use std::io::Write;

use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::program::Program;

/// Index of the stack pointer slot in the register file.
pub const SP: u8 = 7;

/// Initial stack pointer value; the stack grows downward from here.
const STACK_START: u8 = 0xF4;

const FLAG_EQUAL: u8 = 0b0000_0001;
const FLAG_GREATER: u8 = 0b0000_0010;
const FLAG_LESS: u8 = 0b0000_0100;

/// An error that occurred during loading or execution of a program
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("address {0:#06x} is outside addressable memory")]
  AddressOutOfRange(usize),

  #[error("register index {0} is out of range")]
  InvalidRegister(u8),

  #[error("instruction {opcode:#010b} at address {pc:#06x} is invalid")]
  InvalidInstruction { opcode: u8, pc: usize },

  #[error("unsupported alu operation {0:#010b}")]
  UnsupportedAluOperation(u8),

  #[error("modulo by zero")]
  DivisionByZero,

  #[error("machine is halted")]
  MachineHalted,

  #[error("output error: {0}")]
  Io(#[from] std::io::Error),
}

/// Eight 8-bit general-purpose slots; slot [`SP`] is reserved for the stack
/// pointer. Operand bytes name registers, so indices are validated rather
/// than trusted.
#[derive(Debug)]
pub struct Registers {
  slots: [u8; 8],
}

impl Registers {
  fn new() -> Self {
    let mut slots = [0; 8];
    slots[SP as usize] = STACK_START;
    Self { slots }
  }

  pub fn get(&self, index: u8) -> Result<u8, Error> {
    self
      .slots
      .get(index as usize)
      .copied()
      .ok_or(Error::InvalidRegister(index))
  }

  pub fn set(&mut self, index: u8, value: u8) -> Result<(), Error> {
    let slot = self
      .slots
      .get_mut(index as usize)
      .ok_or(Error::InvalidRegister(index))?;
    *slot = value;
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
  Active,
  Halted,
}

/// A virtual machine for a small 8-bit register architecture.
///
/// The machine owns a flat byte memory, eight registers and a flags byte.
/// Programs live in the same address space as the downward-growing stack.
#[derive(Debug)]
pub struct Vm {
  pc: usize,
  registers: Registers,
  flags: u8,
  state: State,
  memory: Memory,
}

impl Vm {
  /// Create a new, empty virtual machine
  pub fn new() -> Self {
    Self {
      pc: 0,
      registers: Registers::new(),
      flags: 0,
      state: State::Active,
      memory: Memory::new(),
    }
  }

  /// Write a program image into memory starting at address 0 and reset the
  /// program counter.
  pub fn load(&mut self, program: &Program) -> Result<(), Error> {
    for (address, &byte) in program.bytes().iter().enumerate() {
      self.memory.write(address, byte)?;
    }
    self.pc = 0;
    log::debug!("loaded {} byte program", program.bytes().len());
    Ok(())
  }

  pub fn is_halted(&self) -> bool {
    self.state == State::Halted
  }

  /// Step through a single fetch-decode-execute cycle, writing any `PRN`
  /// output to `out`.
  pub fn step<W>(&mut self, out: &mut W) -> Result<(), Error>
  where
    W: Write,
  {
    if self.state == State::Halted {
      return Err(Error::MachineHalted);
    }
    let pc = self.pc;
    let ir = self.memory.read(pc)?;
    let op = Opcode::try_from(ir).map_err(|opcode| Error::InvalidInstruction { opcode, pc })?;
    let count = op.operand_count();
    let a = if count >= 1 { self.memory.read(pc + 1)? } else { 0 };
    let b = if count >= 2 { self.memory.read(pc + 2)? } else { 0 };
    if op.is_alu() {
      self.alu(op, a, b)?;
    } else {
      self.execute(op, a, b, pc, out)?;
    }
    if !op.sets_pc() {
      self.pc = pc + count + 1;
    }
    Ok(())
  }

  /// Run fetch-decode-execute cycles until the machine halts.
  pub fn run<W>(&mut self, out: &mut W) -> Result<(), Error>
  where
    W: Write,
  {
    while self.state == State::Active {
      log::trace!("{}", self.trace());
      self.step(out)?;
    }
    Ok(())
  }

  /// Execute an ALU operation on the registers named by the operand bytes.
  /// All results wrap to 8 bits.
  fn alu(&mut self, op: Opcode, reg_a: u8, reg_b: u8) -> Result<(), Error> {
    let a = self.registers.get(reg_a)?;
    let b = self.registers.get(reg_b)?;
    let result = match op {
      Opcode::Add => a.wrapping_add(b),
      Opcode::Sub => a.wrapping_sub(b),
      Opcode::Mul => a.wrapping_mul(b),
      Opcode::Mod => {
        if b == 0 {
          return Err(Error::DivisionByZero);
        }
        a % b
      }
      Opcode::Cmp => {
        self.flags = if a == b {
          FLAG_EQUAL
        } else if a < b {
          FLAG_LESS
        } else {
          FLAG_GREATER
        };
        return Ok(());
      }
      Opcode::And => a & b,
      Opcode::Or => a | b,
      Opcode::Xor => a ^ b,
      Opcode::Not => !a,
      Opcode::Shl => a.checked_shl(b as u32).unwrap_or(0),
      Opcode::Shr => a.checked_shr(b as u32).unwrap_or(0),
      op => return Err(Error::UnsupportedAluOperation(op as u8)),
    };
    self.registers.set(reg_a, result)
  }

  /// Execute a non-ALU instruction. `a` and `b` are the decoded operand
  /// bytes and `pc` the address the instruction was fetched from.
  fn execute<W>(&mut self, op: Opcode, a: u8, b: u8, pc: usize, out: &mut W) -> Result<(), Error>
  where
    W: Write,
  {
    match op {
      Opcode::Hlt => self.state = State::Halted,
      Opcode::Ldi => self.registers.set(a, b)?,
      Opcode::Prn => {
        let value = self.registers.get(a)?;
        writeln!(out, "{value}")?;
      }
      Opcode::Push => {
        let value = self.registers.get(a)?;
        self.push_byte(value)?;
      }
      Opcode::Pop => {
        let value = self.pop_byte()?;
        self.registers.set(a, value)?;
      }
      Opcode::Call => {
        self.push_byte((pc + 2) as u8)?;
        self.pc = self.registers.get(a)? as usize;
      }
      Opcode::Ret => self.pc = self.pop_byte()? as usize,
      Opcode::Jmp => self.pc = self.registers.get(a)? as usize,
      Opcode::Jeq => self.branch_if(a, pc, true)?,
      Opcode::Jne => self.branch_if(a, pc, false)?,
      op => return Err(Error::InvalidInstruction { opcode: op as u8, pc }),
    }
    Ok(())
  }

  fn push_byte(&mut self, value: u8) -> Result<(), Error> {
    let sp = self.registers.get(SP)?.wrapping_sub(1);
    self.registers.set(SP, sp)?;
    self.memory.write(sp as usize, value)
  }

  fn pop_byte(&mut self) -> Result<u8, Error> {
    let sp = self.registers.get(SP)?;
    let value = self.memory.read(sp as usize)?;
    self.registers.set(SP, sp.wrapping_add(1))?;
    Ok(value)
  }

  /// Jump through the register named by `reg` when the equal flag matches
  /// `wants_equal`; otherwise fall through past the operand.
  fn branch_if(&mut self, reg: u8, pc: usize, wants_equal: bool) -> Result<(), Error> {
    if (self.flags & FLAG_EQUAL != 0) == wants_equal {
      self.pc = self.registers.get(reg)? as usize;
    } else {
      self.pc = pc + 2;
    }
    Ok(())
  }

  /// Render the current machine state: program counter, the three bytes at
  /// and after it, and every register, as two-digit hex.
  pub fn trace(&self) -> String {
    let byte = |address: usize| {
      self
        .memory
        .read(address)
        .map(|value| format!("{value:02X}"))
        .unwrap_or_else(|_| "??".to_owned())
    };
    let mut line = format!(
      "TRACE: {:02X} | {} {} {} |",
      self.pc,
      byte(self.pc),
      byte(self.pc + 1),
      byte(self.pc + 2),
    );
    for value in self.registers.slots {
      line.push_str(&format!(" {value:02X}"));
    }
    line
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}
