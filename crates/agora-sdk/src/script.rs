//! Script assembly primitives for eCash covenants.
//!
//! Scripts are assembled with [`bitcoin::script::Builder`] and walked with
//! [`Script::instructions`]. eCash opcodes that Bitcoin renamed or never had
//! are kept as raw bytes below.

use bitcoin::hashes::{Hash, hash160, sha256d};
use bitcoin::opcodes;
use bitcoin::script::{Builder, Instruction, PushBytes};
use bitcoin::{PubkeyHash, Script, ScriptBuf};

use crate::error::{Error, Result};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;
pub const OP_16: u8 = 0x60;
pub const OP_IF: u8 = 0x63;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_TOALTSTACK: u8 = 0x6b;
pub const OP_FROMALTSTACK: u8 = 0x6c;
pub const OP_2DUP: u8 = 0x6e;
pub const OP_3DUP: u8 = 0x6f;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_NIP: u8 = 0x77;
pub const OP_OVER: u8 = 0x78;
pub const OP_PICK: u8 = 0x79;
pub const OP_ROT: u8 = 0x7b;
pub const OP_SWAP: u8 = 0x7c;
pub const OP_CAT: u8 = 0x7e;
pub const OP_SPLIT: u8 = 0x7f;
pub const OP_NUM2BIN: u8 = 0x80;
pub const OP_BIN2NUM: u8 = 0x81;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_0NOTEQUAL: u8 = 0x92;
pub const OP_ADD: u8 = 0x93;
pub const OP_SUB: u8 = 0x94;
pub const OP_DIV: u8 = 0x96;
pub const OP_MOD: u8 = 0x97;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKDATASIGVERIFY: u8 = 0xbb;
pub const OP_REVERSEBYTES: u8 = 0xbc;
pub const OP_INVALIDOPCODE: u8 = 0xff;

/// A parsed script operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A non-push opcode.
    Code(u8),
    /// A data push, including the small-number opcodes `OP_0`, `OP_1NEGATE`
    /// and `OP_1..OP_16`.
    Push(Vec<u8>),
}

/// [`Builder`] with the eCash minimal-push rules and raw opcode bytes.
#[derive(Debug, Clone)]
pub struct ScriptBuilder(Builder);

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self(Builder::new())
    }
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(self, opcode: u8) -> Self {
        Self(self.0.push_opcode(opcodes::All::from(opcode)))
    }

    pub fn ops(self, opcodes: &[u8]) -> Self {
        opcodes.iter().fold(self, |builder, &opcode| builder.op(opcode))
    }

    /// Push `data` with the smallest possible push opcode.
    ///
    /// Unlike [`Builder::push_slice`], single bytes 1..=16 and 0x81 use their
    /// dedicated opcodes, which eCash requires of executed pushes.
    pub fn push_bytes(self, data: &[u8]) -> Self {
        match data {
            [n @ 1..=16] => self.op(OP_1 + n - 1),
            [0x81] => self.op(OP_1NEGATE),
            _ => match <&PushBytes>::try_from(data) {
                Ok(data) => Self(self.0.push_slice(data)),
                // 4 GiB or more; no such script is spendable
                Err(_) => self.op(OP_INVALIDOPCODE),
            },
        }
    }

    /// Push `n` as a minimally encoded script number.
    pub fn push_int(self, n: i64) -> Self {
        Self(self.0.push_int(n))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_script().into_bytes()
    }

    pub fn into_script(self) -> ScriptBuf {
        self.0.into_script()
    }
}

/// Walk the operations of a script.
pub fn parse_ops(script: &[u8]) -> Result<Vec<Op>> {
    Script::from_bytes(script)
        .instructions()
        .map(|instruction| -> Result<Op> {
            Ok(match instruction? {
                Instruction::PushBytes(data) => Op::Push(data.as_bytes().to_vec()),
                Instruction::Op(opcode) => match opcode.to_u8() {
                    OP_1NEGATE => Op::Push(vec![0x81]),
                    code @ OP_1..=OP_16 => Op::Push(vec![code - OP_1 + 1]),
                    code => Op::Code(code),
                },
            })
        })
        .collect()
}

/// Bytecode following the `codesep_idx`-th `OP_CODESEPARATOR`.
///
/// This is the scriptCode committed to by a signature made after that
/// separator executed.
pub fn cut_out_codesep(script: &[u8], codesep_idx: usize) -> Result<Vec<u8>> {
    let mut instructions = Script::from_bytes(script).instructions();
    let mut seen = 0;
    while let Some(instruction) = instructions.next() {
        if matches!(instruction?, Instruction::Op(op) if op.to_u8() == OP_CODESEPARATOR) {
            if seen == codesep_idx {
                return Ok(instructions.as_script().to_bytes());
            }
            seen += 1;
        }
    }
    Err(Error::Encoding(format!(
        "script has no OP_CODESEPARATOR #{codesep_idx}"
    )))
}

/// `OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pkh: &[u8; 20]) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*pkh))
}

/// P2SH output script committing to `redeem_script`.
pub fn p2sh_of(redeem_script: &[u8]) -> ScriptBuf {
    ScriptBuf::new_p2sh(&Script::from_bytes(redeem_script).script_hash())
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// RIPEMD160(SHA256(data))
pub fn sha_rmd160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}
