mod block_of_code;
mod determinism;
mod encoder;

use dbt_backend::emit::Thunks;
use dbt_backend::jitstate::JitState;
use dbt_backend::CodePtr;

extern "C" fn dummy_lookup(_jit_state: *mut JitState) -> CodePtr {
    std::ptr::null()
}

extern "C" fn dummy_read(_ctx: *mut std::ffi::c_void, _vaddr: u64) -> u64 {
    0
}

extern "C" fn dummy_write(_ctx: *mut std::ffi::c_void, _vaddr: u64, _value: u64) {}

extern "C" fn dummy_svc(_ctx: *mut std::ffi::c_void, _swi: u32) {}

extern "C" fn dummy_exception(_ctx: *mut std::ffi::c_void, _code: u32) {}

extern "C" fn dummy_interpret(_ctx: *mut std::ffi::c_void) {}

pub fn dummy_thunks() -> Thunks {
    Thunks {
        read8: dummy_read,
        read16: dummy_read,
        read32: dummy_read,
        read64: dummy_read,
        write8: dummy_write,
        write16: dummy_write,
        write32: dummy_write,
        write64: dummy_write,
        call_svc: dummy_svc,
        exception_raised: dummy_exception,
        interpret: dummy_interpret,
    }
}

pub fn new_code() -> dbt_backend::BlockOfCode {
    dbt_backend::BlockOfCode::new(dummy_lookup).expect("mmap failed")
}
