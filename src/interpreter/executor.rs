//! Instruction fetch, decode and dispatch.

use super::Machine;
use crate::bitcast;
use crate::consts::*;
use crate::error::{Fault, VmError};
use crate::host;
use crate::opcode::Opcode;
use crate::types::{RegisterId, Word};

use tracing::trace;

fn reg(operand: Word) -> Result<RegisterId, Fault> {
    if (operand as usize) < VM_REGISTER_COUNT {
        Ok(operand as RegisterId)
    } else {
        Err(Fault::InvalidRegister { index: operand })
    }
}

impl Machine {
    /// Run the dispatch loop until a `STOP`, returning its operand
    /// register.
    ///
    /// Registers are worked on in locals and synchronized with the machine
    /// around every host call, so a host function observes the registers
    /// exactly as the calling convention left them. On a fault the machine
    /// keeps the state of the last synchronization point.
    pub fn execute(&mut self) -> Result<Word, VmError> {
        let mut uregs = self.uregs;
        let mut fregs = self.fregs;

        loop {
            let pc = uregs[REG_PC];
            let word = self.word(pc)?;
            let op = Opcode::from_word(word).ok_or(Fault::InvalidOpcode { word, pc })?;

            match op {
                Opcode::ULD => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = self.word(uregs[b])?;
                }
                Opcode::FLD => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] = bitcast::f64_from_word(self.word(uregs[b])?);
                }
                Opcode::UST => {
                    let (a, b) = self.reg_operands(pc)?;
                    self.set_word(uregs[a], uregs[b])?;
                }
                Opcode::FST => {
                    let (a, b) = self.reg_operands(pc)?;
                    self.set_word(uregs[a], bitcast::word_from_f64(fregs[b]))?;
                }
                Opcode::UIMM => {
                    let (a, imm) = self.imm_operands(pc)?;
                    uregs[a] = imm;
                }
                Opcode::FIMM => {
                    let (a, imm) = self.imm_operands(pc)?;
                    fregs[a] = bitcast::f64_from_word(imm);
                }
                Opcode::UMOV => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = uregs[b];
                }
                Opcode::FMOV => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] = fregs[b];
                }
                Opcode::U2F => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] = uregs[b] as f64;
                }
                Opcode::I2F => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] = bitcast::i64_from_word(uregs[b]) as f64;
                }
                Opcode::F2U => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = fregs[b] as Word;
                }
                Opcode::F2I => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = bitcast::word_from_i64(fregs[b] as i64);
                }
                Opcode::BT => {
                    let off = bitcast::i64_from_word(self.word(pc.wrapping_add(1))?);
                    let taken = uregs[REG_COND] != 0;
                    uregs[REG_PC] = pc.wrapping_add(if taken { off as Word } else { 2 });
                    continue;
                }
                Opcode::BF => {
                    let off = bitcast::i64_from_word(self.word(pc.wrapping_add(1))?);
                    let taken = uregs[REG_COND] == 0;
                    uregs[REG_PC] = pc.wrapping_add(if taken { off as Word } else { 2 });
                    continue;
                }
                Opcode::UEQ => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (uregs[a] == uregs[b]) as Word;
                }
                Opcode::FEQ => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (fregs[a] == fregs[b]) as Word;
                }
                Opcode::UGT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (uregs[a] > uregs[b]) as Word;
                }
                Opcode::IGT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] =
                        (bitcast::i64_from_word(uregs[a]) > bitcast::i64_from_word(uregs[b])) as Word;
                }
                Opcode::FGT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (fregs[a] > fregs[b]) as Word;
                }
                Opcode::ULT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (uregs[a] < uregs[b]) as Word;
                }
                Opcode::ILT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] =
                        (bitcast::i64_from_word(uregs[a]) < bitcast::i64_from_word(uregs[b])) as Word;
                }
                Opcode::FLT => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[REG_COND] = (fregs[a] < fregs[b]) as Word;
                }
                Opcode::UADD => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = uregs[a].wrapping_add(uregs[b]);
                }
                Opcode::FADD => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] += fregs[b];
                }
                Opcode::USUB => {
                    let (a, b) = self.reg_operands(pc)?;
                    uregs[a] = uregs[a].wrapping_sub(uregs[b]);
                }
                Opcode::FSUB => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] -= fregs[b];
                }
                Opcode::UMUL => {
                    let (a, b) = self.reg_operands(pc)?;
                    let wide = uregs[a] as u128 * uregs[b] as u128;
                    uregs[a] = wide as Word;
                    uregs[REG_OVERFLOW] = (wide >> 64) as Word;
                }
                Opcode::IMUL => {
                    let (a, b) = self.reg_operands(pc)?;
                    let wide = bitcast::i64_from_word(uregs[a]) as i128
                        * bitcast::i64_from_word(uregs[b]) as i128;
                    uregs[a] = bitcast::word_from_i64(wide as i64);
                    uregs[REG_OVERFLOW] = bitcast::word_from_i64((wide >> 64) as i64);
                }
                Opcode::FMUL => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] *= fregs[b];
                }
                Opcode::UDIV => {
                    let (a, b) = self.reg_operands(pc)?;
                    let rem = uregs[a] % uregs[b];
                    uregs[a] /= uregs[b];
                    uregs[REG_OVERFLOW] = rem;
                }
                Opcode::IDIV => {
                    let (a, b) = self.reg_operands(pc)?;
                    let num = bitcast::i64_from_word(uregs[a]);
                    let den = bitcast::i64_from_word(uregs[b]);
                    uregs[a] = bitcast::word_from_i64(num.wrapping_div(den));
                    uregs[REG_OVERFLOW] = bitcast::word_from_i64(num.wrapping_rem(den));
                }
                Opcode::FDIV => {
                    let (a, b) = self.reg_operands(pc)?;
                    fregs[a] /= fregs[b];
                }
                Opcode::CALL => {
                    let (a, b) = self.reg_operands(pc)?;
                    let target = uregs[b];
                    uregs[REG_PC] = pc.wrapping_add(3);

                    self.uregs = uregs;
                    self.fregs = fregs;

                    trace!("host call to {target:#x}");
                    // Safety: the image vouches for `target`; it must be a
                    // word published by `host::service_word` in this
                    // process.
                    let f = unsafe { host::from_word(target) };
                    let ret = f(self);

                    uregs = self.uregs;
                    fregs = self.fregs;
                    uregs[a] = ret;
                    continue;
                }
                Opcode::STOP => {
                    let a = reg(self.word(pc.wrapping_add(1))?)?;
                    self.uregs = uregs;
                    self.fregs = fregs;
                    return Ok(uregs[a]);
                }
            }

            uregs[REG_PC] = uregs[REG_PC].wrapping_add(3);
        }
    }

    fn reg_operands(&self, pc: Word) -> Result<(RegisterId, RegisterId), Fault> {
        Ok((
            reg(self.word(pc.wrapping_add(1))?)?,
            reg(self.word(pc.wrapping_add(2))?)?,
        ))
    }

    fn imm_operands(&self, pc: Word) -> Result<(RegisterId, Word), Fault> {
        Ok((
            reg(self.word(pc.wrapping_add(1))?)?,
            self.word(pc.wrapping_add(2))?,
        ))
    }
}
