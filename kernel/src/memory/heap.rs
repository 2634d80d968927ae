//! Kernel heap
//!
//! A fixed arena handed to `linked_list_allocator` at boot. Only Trusted
//! code allocates; the sandbox task works entirely on the stack.

use core::ptr::addr_of_mut;

use linked_list_allocator::LockedHeap;

/// Heap size
const HEAP_SIZE: usize = 8 * 1024;

static mut HEAP_MEMORY: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the arena to the allocator
///
/// # Safety
/// Call exactly once, before the first allocation.
pub unsafe fn init() {
    ALLOCATOR.lock().init(addr_of_mut!(HEAP_MEMORY) as *mut u8, HEAP_SIZE);
}

/// Bytes currently free
pub fn free() -> usize {
    ALLOCATOR.lock().free()
}
