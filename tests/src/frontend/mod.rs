mod decoder;
mod translate_a32;
mod translate_a64;
mod translate_thumb;

use dbt_frontend::TranslateCallbacks;
use dbt_ir::IrEmitter;
use std::collections::HashMap;

/// Simple guest code store for translation tests: a map of aligned
/// words, with counters for instrumentation assertions.
pub struct CodeMem {
    pub words: HashMap<u64, u32>,
    pub code_reads: usize,
    pub hook_fires: usize,
}

impl CodeMem {
    pub fn new(base: u64, words: &[u32]) -> CodeMem {
        let mut map = HashMap::new();
        for (i, &w) in words.iter().enumerate() {
            map.insert(base + 4 * i as u64, w);
        }
        CodeMem {
            words: map,
            code_reads: 0,
            hook_fires: 0,
        }
    }

    /// Halfword layout helper for Thumb tests.
    pub fn from_halfwords(base: u64, halfwords: &[u16]) -> CodeMem {
        let mut map = HashMap::new();
        for (i, chunk) in halfwords.chunks(2).enumerate() {
            let lo = u32::from(chunk[0]);
            let hi = chunk.get(1).map(|&h| u32::from(h)).unwrap_or(0);
            map.insert(base + 4 * i as u64, lo | (hi << 16));
        }
        CodeMem {
            words: map,
            code_reads: 0,
            hook_fires: 0,
        }
    }
}

impl TranslateCallbacks for CodeMem {
    fn memory_read_code(&mut self, vaddr: u64) -> u32 {
        self.code_reads += 1;
        // Unmapped code reads as the permanently-undefined encoding.
        self.words.get(&(vaddr & !3)).copied().unwrap_or(0xE7F0_00F0)
    }

    fn pre_translate_hook(&mut self, _is_thumb: bool, _pc: u64, _ir: &mut IrEmitter) {
        self.hook_fires += 1;
    }
}
