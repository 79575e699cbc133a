use super::chunk::Chunk;
use super::compiler::Compiler;
use super::object::Heap;
use super::reporter::Reporter;
use super::vm::Vm;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

impl InterpretResult {
    pub fn is_error(self) -> bool {
        self != InterpretResult::Ok
    }

    pub fn exit_code(self) -> i32 {
        match self {
            InterpretResult::Ok => exitcode::OK,
            InterpretResult::CompileError => exitcode::DATAERR,
            InterpretResult::RuntimeError => exitcode::SOFTWARE,
        }
    }
}

/// Compile-and-run front door. Owns the VM so that globals, interned
/// strings and the object pool live across calls; constructing and
/// dropping the pipeline brackets all VM-global state.
pub struct CompilationPipeline {
    vm: Vm,
}

impl CompilationPipeline {
    pub fn new() -> Self {
        Self { vm: Vm::new() }
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            vm: Vm::with_output(out),
        }
    }

    pub fn heap(&self) -> &Heap {
        self.vm.heap()
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        self.vm.heap_mut()
    }

    pub fn compile(
        &mut self,
        source: &str,
        reporter: &mut dyn Reporter,
    ) -> (InterpretResult, Chunk) {
        let mut chunk = Chunk::new();
        match Compiler::new(source, &mut chunk, self.vm.heap_mut(), reporter).compile() {
            Ok(()) => (InterpretResult::Ok, chunk),
            Err(()) => (InterpretResult::CompileError, chunk),
        }
    }

    pub fn run_compiled(&mut self, chunk: &Chunk, reporter: &mut dyn Reporter) -> InterpretResult {
        match self.vm.run(chunk, reporter) {
            Ok(()) => InterpretResult::Ok,
            Err(()) => InterpretResult::RuntimeError,
        }
    }

    pub fn interpret(&mut self, source: &str, reporter: &mut dyn Reporter) -> InterpretResult {
        let (result, chunk) = self.compile(source, reporter);
        if result.is_error() {
            // a chunk that failed to compile is never executed
            return result;
        }
        self.run_compiled(&chunk, reporter)
    }
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
