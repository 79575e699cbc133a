use super::value::Value;
use std::convert::TryFrom;

#[cfg(any(feature = "debug-bytecode", feature = "debug-execution"))]
use super::object::Heap;

/// One-byte instructions. Every short/long pair occupies consecutive
/// numeric slots so `op + 1` names the long form; `write_variable` and
/// the constant writer rely on that coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Constant,
    ConstantLong,
    None,
    True,
    False,
    Pop,
    PopN,
    Dup,
    GetLocal,
    GetLocalLong,
    SetLocal,
    SetLocalLong,
    GetGlobal,
    GetGlobalLong,
    DefGlobal,
    DefGlobalLong,
    SetGlobal,
    SetGlobalLong,
    Equal,
    Greater,
    Less,
    Add,
    Multiply,
    Divide,
    Modulo,
    LeftShift,
    RightShift,
    Negate,
    Not,
    And,
    Or,
    Jump,
    JumpLong,
    JumpFalse,
    JumpFalseLong,
    Loop,
    LoopLong,
    Print,
    Call,
    Return,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        match op {
            OpCode::Constant => 0,
            OpCode::ConstantLong => 1,
            OpCode::None => 2,
            OpCode::True => 3,
            OpCode::False => 4,
            OpCode::Pop => 5,
            OpCode::PopN => 6,
            OpCode::Dup => 7,
            OpCode::GetLocal => 8,
            OpCode::GetLocalLong => 9,
            OpCode::SetLocal => 10,
            OpCode::SetLocalLong => 11,
            OpCode::GetGlobal => 12,
            OpCode::GetGlobalLong => 13,
            OpCode::DefGlobal => 14,
            OpCode::DefGlobalLong => 15,
            OpCode::SetGlobal => 16,
            OpCode::SetGlobalLong => 17,
            OpCode::Equal => 18,
            OpCode::Greater => 19,
            OpCode::Less => 20,
            OpCode::Add => 21,
            OpCode::Multiply => 22,
            OpCode::Divide => 23,
            OpCode::Modulo => 24,
            OpCode::LeftShift => 25,
            OpCode::RightShift => 26,
            OpCode::Negate => 27,
            OpCode::Not => 28,
            OpCode::And => 29,
            OpCode::Or => 30,
            OpCode::Jump => 31,
            OpCode::JumpLong => 32,
            OpCode::JumpFalse => 33,
            OpCode::JumpFalseLong => 34,
            OpCode::Loop => 35,
            OpCode::LoopLong => 36,
            OpCode::Print => 37,
            OpCode::Call => 38,
            OpCode::Return => 39,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Constant),
            1 => Ok(Self::ConstantLong),
            2 => Ok(Self::None),
            3 => Ok(Self::True),
            4 => Ok(Self::False),
            5 => Ok(Self::Pop),
            6 => Ok(Self::PopN),
            7 => Ok(Self::Dup),
            8 => Ok(Self::GetLocal),
            9 => Ok(Self::GetLocalLong),
            10 => Ok(Self::SetLocal),
            11 => Ok(Self::SetLocalLong),
            12 => Ok(Self::GetGlobal),
            13 => Ok(Self::GetGlobalLong),
            14 => Ok(Self::DefGlobal),
            15 => Ok(Self::DefGlobalLong),
            16 => Ok(Self::SetGlobal),
            17 => Ok(Self::SetGlobalLong),
            18 => Ok(Self::Equal),
            19 => Ok(Self::Greater),
            20 => Ok(Self::Less),
            21 => Ok(Self::Add),
            22 => Ok(Self::Multiply),
            23 => Ok(Self::Divide),
            24 => Ok(Self::Modulo),
            25 => Ok(Self::LeftShift),
            26 => Ok(Self::RightShift),
            27 => Ok(Self::Negate),
            28 => Ok(Self::Not),
            29 => Ok(Self::And),
            30 => Ok(Self::Or),
            31 => Ok(Self::Jump),
            32 => Ok(Self::JumpLong),
            33 => Ok(Self::JumpFalse),
            34 => Ok(Self::JumpFalseLong),
            35 => Ok(Self::Loop),
            36 => Ok(Self::LoopLong),
            37 => Ok(Self::Print),
            38 => Ok(Self::Call),
            39 => Ok(Self::Return),
            _ => Err(()),
        }
    }
}

impl OpCode {
    /// The variant numbered immediately after this one, carrying a 32-bit
    /// operand.
    fn long_variant(self) -> OpCode {
        OpCode::try_from(u8::from(self) + 1).unwrap()
    }
}

/// The unit handed from compiler to VM: flat opcode bytes, one source
/// line per byte, and the constant pool the operands index into.
#[derive(Clone)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Rebuilds a chunk from its serialized parts.
    pub fn from_parts(code: Vec<u8>, lines: Vec<usize>, constants: Vec<Value>) -> Self {
        Self {
            code,
            lines,
            constants,
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    pub fn constant_at(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op.into(), line);
    }

    fn write_u16(&mut self, value: u16, line: usize) {
        self.write((value >> 8) as u8, line);
        self.write((value & 0xff) as u8, line);
    }

    fn write_u32(&mut self, value: u32, line: usize) {
        self.write((value >> 24 & 0xff) as u8, line);
        self.write((value >> 16 & 0xff) as u8, line);
        self.write((value >> 8 & 0xff) as u8, line);
        self.write((value & 0xff) as u8, line);
    }

    /// Appends to the constant pool and returns the index, `u32::MAX`
    /// standing in as the overflow sentinel. String constants are
    /// deduplicated; interning makes that a handle comparison.
    pub fn add_constant(&mut self, value: Value) -> u32 {
        if let Value::Str(handle) = value {
            for (index, constant) in self.constants.iter().enumerate() {
                if let Value::Str(existing) = constant {
                    if *existing == handle {
                        return index as u32;
                    }
                }
            }
        }

        if self.constants.len() >= u32::MAX as usize {
            eprintln!("Too many constants in one chunk.");
            return u32::MAX;
        }

        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    pub fn write_constant(&mut self, value: Value, line: usize) -> u32 {
        let index = self.add_constant(value);
        if index < u8::MAX as u32 {
            self.write_op(OpCode::Constant, line);
            self.write(index as u8, line);
        } else if index < u32::MAX {
            self.write_op(OpCode::ConstantLong, line);
            self.write_u32(index, line);
        } else {
            eprintln!("Too many constants in one chunk.");
        }
        index
    }

    /// Emits the short form `<op> <u8>` when the operand fits, otherwise
    /// the long form `<op + 1> <u32 big-endian>`.
    pub fn write_variable(&mut self, op: OpCode, var: u32, line: usize) {
        if var < u8::MAX as u32 {
            self.write_op(op, line);
            self.write(var as u8, line);
        } else {
            self.write_op(op.long_variant(), line);
            self.write_u32(var, line);
        }
    }

    /// Emits the jump with a placeholder operand and returns the offset
    /// of the operand for later patching.
    pub fn emit_jump(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        self.write(0xff, line);
        self.write(0xff, line);
        self.code.len() - 2
    }

    pub fn emit_jump_long(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        for _ in 0..4 {
            self.write(0xff, line);
        }
        self.code.len() - 4
    }

    /// Back-fills a 16-bit jump operand. Errs when the distance does not
    /// fit, which the compiler reports as "Too much code to jump over."
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), ()> {
        let jump = self.code.len() - offset - 2;
        if jump > u16::MAX as usize {
            return Err(());
        }
        self.code[offset] = (jump >> 8) as u8;
        self.code[offset + 1] = (jump & 0xff) as u8;
        Ok(())
    }

    pub fn patch_jump_long(&mut self, offset: usize) -> Result<(), ()> {
        let jump = self.code.len() - offset - 4;
        if jump > u32::MAX as usize {
            return Err(());
        }
        self.code[offset] = (jump >> 24 & 0xff) as u8;
        self.code[offset + 1] = (jump >> 16 & 0xff) as u8;
        self.code[offset + 2] = (jump >> 8 & 0xff) as u8;
        self.code[offset + 3] = (jump & 0xff) as u8;
        Ok(())
    }

    /// Unconditional backwards jump; picks the long form when the
    /// distance overflows 16 bits.
    pub fn emit_loop(&mut self, loop_start: usize, line: usize) {
        let distance = self.code.len() + 3 - loop_start;
        if distance <= u16::MAX as usize {
            self.write_op(OpCode::Loop, line);
            self.write_u16(distance as u16, line);
        } else {
            let distance = self.code.len() + 5 - loop_start;
            self.write_op(OpCode::LoopLong, line);
            self.write_u32(distance as u32, line);
        }
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(feature = "debug-bytecode", feature = "debug-execution"))]
impl Chunk {
    fn read_u16_at(&self, offset: usize) -> u16 {
        (self.code[offset] as u16) << 8 | self.code[offset + 1] as u16
    }

    fn read_u32_at(&self, offset: usize) -> u32 {
        (self.code[offset] as u32) << 24
            | (self.code[offset + 1] as u32) << 16
            | (self.code[offset + 2] as u32) << 8
            | self.code[offset + 3] as u32
    }

    fn debug_value(&self, index: usize, heap: &Heap) -> String {
        match self.constants.get(index) {
            Some(Value::Str(handle)) => format!("{:?}", heap.get_str(*handle)),
            Some(value) => value.stringify(heap),
            None => "<bad constant>".to_string(),
        }
    }

    /// Renders one instruction; returns the text and the instruction's
    /// total width in bytes.
    pub fn disassemble_instruction(&self, offset: usize, heap: &Heap) -> (String, usize) {
        let mut text = format!("{:04} ", offset);
        if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            text += "   | ";
        } else {
            text += format!("{:4} ", self.lines[offset]).as_str();
        }

        let op = match OpCode::try_from(self.code[offset]) {
            Ok(op) => op,
            Err(()) => {
                text += format!("Unknown opcode {}\n", self.code[offset]).as_str();
                return (text, 1);
            }
        };

        match op {
            OpCode::None
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Add
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Modulo
            | OpCode::LeftShift
            | OpCode::RightShift
            | OpCode::Negate
            | OpCode::Not
            | OpCode::And
            | OpCode::Or
            | OpCode::Print
            | OpCode::Return => {
                text += format!("{:?}\n", op).as_str();
                (text, 1)
            }
            OpCode::PopN | OpCode::Call => {
                text += format!("{:?} {}\n", op, self.code[offset + 1]).as_str();
                (text, 2)
            }
            OpCode::Constant | OpCode::GetGlobal | OpCode::DefGlobal | OpCode::SetGlobal => {
                let index = self.code[offset + 1] as usize;
                text += format!("{:?} {} ({})\n", op, index, self.debug_value(index, heap))
                    .as_str();
                (text, 2)
            }
            OpCode::ConstantLong
            | OpCode::GetGlobalLong
            | OpCode::DefGlobalLong
            | OpCode::SetGlobalLong => {
                let index = self.read_u32_at(offset + 1) as usize;
                text += format!("{:?} {} ({})\n", op, index, self.debug_value(index, heap))
                    .as_str();
                (text, 5)
            }
            OpCode::GetLocal | OpCode::SetLocal => {
                text += format!("{:?} {}\n", op, self.code[offset + 1]).as_str();
                (text, 2)
            }
            OpCode::GetLocalLong | OpCode::SetLocalLong => {
                text += format!("{:?} {}\n", op, self.read_u32_at(offset + 1)).as_str();
                (text, 5)
            }
            OpCode::Jump | OpCode::JumpFalse => {
                let jump = self.read_u16_at(offset + 1) as usize;
                text += format!("{:?} {:04} -> {:04}\n", op, offset, offset + 3 + jump).as_str();
                (text, 3)
            }
            OpCode::Loop => {
                let jump = self.read_u16_at(offset + 1) as usize;
                text += format!("{:?} {:04} -> {:04}\n", op, offset, offset + 3 - jump).as_str();
                (text, 3)
            }
            OpCode::JumpLong | OpCode::JumpFalseLong => {
                let jump = self.read_u32_at(offset + 1) as usize;
                text += format!("{:?} {:04} -> {:04}\n", op, offset, offset + 5 + jump).as_str();
                (text, 5)
            }
            OpCode::LoopLong => {
                let jump = self.read_u32_at(offset + 1) as usize;
                text += format!("{:?} {:04} -> {:04}\n", op, offset, offset + 5 - jump).as_str();
                (text, 5)
            }
        }
    }

    pub fn disassemble(&self, name: &str, heap: &Heap) -> String {
        let mut text = format!("== {} ==\n", name);
        let mut offset = 0;
        while offset < self.len() {
            let (line, width) = self.disassemble_instruction(offset, heap);
            text += &line;
            offset += width;
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Heap;

    #[test]
    fn short_long_pairs_occupy_consecutive_slots() {
        for (short, long) in [
            (OpCode::Constant, OpCode::ConstantLong),
            (OpCode::GetLocal, OpCode::GetLocalLong),
            (OpCode::SetLocal, OpCode::SetLocalLong),
            (OpCode::GetGlobal, OpCode::GetGlobalLong),
            (OpCode::DefGlobal, OpCode::DefGlobalLong),
            (OpCode::SetGlobal, OpCode::SetGlobalLong),
            (OpCode::Jump, OpCode::JumpLong),
            (OpCode::JumpFalse, OpCode::JumpFalseLong),
            (OpCode::Loop, OpCode::LoopLong),
        ] {
            assert_eq!(u8::from(short) + 1, u8::from(long));
        }
    }

    #[test]
    fn opcode_byte_round_trip() {
        for byte in 0..40u8 {
            let op = OpCode::try_from(byte).unwrap();
            assert_eq!(u8::from(op), byte);
        }
        assert!(OpCode::try_from(40).is_err());
        assert!(OpCode::try_from(255).is_err());
    }

    #[test]
    fn lines_stay_parallel_to_code() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::None, 1);
        chunk.write_constant(Value::Int(5), 2);
        chunk.write_variable(OpCode::GetLocal, 3, 2);
        chunk.emit_jump(OpCode::Jump, 3);
        chunk.emit_loop(0, 4);
        assert_eq!(chunk.code().len(), chunk.lines().len());
    }

    #[test]
    fn constants_switch_to_the_long_form_at_255() {
        let mut chunk = Chunk::new();
        for i in 0..254 {
            chunk.write_constant(Value::Int(i), 1);
        }
        let before = chunk.len();
        let index = chunk.write_constant(Value::Int(254), 1);
        assert_eq!(index, 254);
        assert_eq!(chunk.byte_at(before), Some(OpCode::Constant.into()));

        let before = chunk.len();
        let index = chunk.write_constant(Value::Int(255), 1);
        assert_eq!(index, 255);
        assert_eq!(chunk.byte_at(before), Some(OpCode::ConstantLong.into()));
        // big-endian 32-bit operand
        assert_eq!(
            (0..4)
                .map(|i| chunk.byte_at(before + 1 + i).unwrap() as u32)
                .fold(0, |acc, b| acc << 8 | b),
            255
        );
    }

    #[test]
    fn string_constants_are_deduplicated_by_handle() {
        let mut heap = Heap::new();
        let mut chunk = Chunk::new();
        let h = heap.intern("name");
        let a = chunk.add_constant(Value::Str(h));
        let b = chunk.add_constant(Value::Str(h));
        assert_eq!(a, b);
        assert_eq!(chunk.constants().len(), 1);
    }

    #[test]
    fn variables_switch_to_the_long_form_at_255() {
        let mut chunk = Chunk::new();
        chunk.write_variable(OpCode::GetLocal, 254, 1);
        assert_eq!(chunk.byte_at(0), Some(OpCode::GetLocal.into()));
        assert_eq!(chunk.byte_at(1), Some(254));

        let mut chunk = Chunk::new();
        chunk.write_variable(OpCode::GetLocal, 255, 1);
        assert_eq!(chunk.byte_at(0), Some(OpCode::GetLocalLong.into()));
        assert_eq!(chunk.byte_at(1), Some(0));
        assert_eq!(chunk.byte_at(4), Some(255));
    }

    #[test]
    fn jump_patching_points_past_the_operand() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::None, 1);
        let jump = chunk.emit_jump(OpCode::JumpFalse, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(jump).unwrap();
        let operand = (chunk.byte_at(jump).unwrap() as usize) << 8
            | chunk.byte_at(jump + 1).unwrap() as usize;
        // landing offset is the byte after the operand plus the distance
        assert_eq!(jump + 2 + operand, chunk.len());
    }

    #[test]
    fn patching_a_too_long_jump_fails() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..(u16::MAX as usize + 1) {
            chunk.write_op(OpCode::Pop, 1);
        }
        assert!(chunk.patch_jump(jump).is_err());
    }

    #[test]
    fn long_jump_patching() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump_long(OpCode::JumpLong, 1);
        for _ in 0..(u16::MAX as usize + 10) {
            chunk.write_op(OpCode::Pop, 1);
        }
        chunk.patch_jump_long(jump).unwrap();
        let operand = (0..4)
            .map(|i| chunk.byte_at(jump + i).unwrap() as usize)
            .fold(0, |acc, b| acc << 8 | b);
        assert_eq!(jump + 4 + operand, chunk.len());
    }

    #[test]
    fn loop_operand_reaches_back_to_the_start() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::None, 1);
        let loop_start = chunk.len();
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Pop, 1);
        let loop_offset = chunk.len();
        chunk.emit_loop(loop_start, 1);
        assert_eq!(chunk.byte_at(loop_offset), Some(OpCode::Loop.into()));
        let operand = (chunk.byte_at(loop_offset + 1).unwrap() as usize) << 8
            | chunk.byte_at(loop_offset + 2).unwrap() as usize;
        // the VM subtracts the operand after reading it
        assert_eq!(loop_offset + 3 - operand, loop_start);
    }
}
