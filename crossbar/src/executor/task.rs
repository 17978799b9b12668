/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Type-erased work items with small-buffer payload storage.
//!
//! A task owns a payload and the function that consumes it. Payloads whose
//! size and alignment fit the inline buffer are stored in place, so the
//! executor's hot path performs no allocation; anything larger goes through
//! one `Box`. The payload is destroyed exactly once: either by running the
//! task or by dropping it unexecuted.

use std::marker::PhantomData;
use std::mem::{align_of, size_of, ManuallyDrop, MaybeUninit};
use std::ptr;

use static_assertions::{const_assert, const_assert_eq};

/// Capacity of the inline payload buffer, in bytes.
pub const INLINE_TASK_BYTES: usize = 64;

/// Guaranteed alignment of the inline payload buffer.
pub const INLINE_TASK_ALIGN: usize = 16;

#[repr(C, align(16))]
struct InlineStore([MaybeUninit<u8>; INLINE_TASK_BYTES]);

const_assert_eq!(size_of::<InlineStore>(), INLINE_TASK_BYTES);
const_assert!(align_of::<InlineStore>() == INLINE_TASK_ALIGN);

// What the erased storage actually holds: the payload together with its
// consuming function.
struct Cell<P> {
    payload: P,
    run: fn(P),
}

const fn fits_inline<T>() -> bool {
    size_of::<T>() <= INLINE_TASK_BYTES && align_of::<T>() <= INLINE_TASK_ALIGN
}

struct TaskVTable {
    // Both take a pointer to a live `Cell<P>` and consume it.
    run: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
}

unsafe fn run_inline<P>(cell: *mut u8) {
    // Moves the cell out of the buffer; the buffer must not be touched again.
    let cell = unsafe { cell.cast::<Cell<P>>().read() };
    (cell.run)(cell.payload);
}

unsafe fn drop_inline<P>(cell: *mut u8) {
    unsafe { ptr::drop_in_place(cell.cast::<Cell<P>>()) };
}

unsafe fn run_heap<P>(cell: *mut u8) {
    let cell = unsafe { Box::from_raw(cell.cast::<Cell<P>>()) };
    (cell.run)(cell.payload);
}

unsafe fn drop_heap<P>(cell: *mut u8) {
    drop(unsafe { Box::from_raw(cell.cast::<Cell<P>>()) });
}

struct Vt<P>(PhantomData<P>);

impl<P> Vt<P> {
    const INLINE: TaskVTable = TaskVTable {
        run: run_inline::<P>,
        drop: drop_inline::<P>,
    };
    const HEAP: TaskVTable = TaskVTable {
        run: run_heap::<P>,
        drop: drop_heap::<P>,
    };
}

enum Slot {
    Inline(InlineStore),
    Heap(*mut u8),
}

/// A queued unit of work: erased payload plus the function consuming it.
pub(crate) struct Task {
    slot: Slot,
    vtable: &'static TaskVTable,
}

// Construction requires `P: Send`, and the vtable functions only ever touch
// the payload from the thread that runs or drops the task.
unsafe impl Send for Task {}

impl Task {
    pub(crate) fn new<P: Send + 'static>(payload: P, run: fn(P)) -> Self {
        let cell = Cell { payload, run };
        if fits_inline::<Cell<P>>() {
            let mut store = InlineStore([MaybeUninit::uninit(); INLINE_TASK_BYTES]);
            let dst = store.0.as_mut_ptr().cast::<Cell<P>>();
            debug_assert_eq!(dst as usize % align_of::<Cell<P>>(), 0);
            unsafe { ptr::write(dst, cell) };
            Task {
                slot: Slot::Inline(store),
                vtable: &Vt::<P>::INLINE,
            }
        } else {
            Task {
                slot: Slot::Heap(Box::into_raw(Box::new(cell)).cast::<u8>()),
                vtable: &Vt::<P>::HEAP,
            }
        }
    }

    fn cell_ptr(&mut self) -> *mut u8 {
        match &mut self.slot {
            Slot::Inline(store) => store.0.as_mut_ptr().cast::<u8>(),
            Slot::Heap(cell) => *cell,
        }
    }

    /// Consumes the task, running its payload through the stored function.
    pub(crate) fn run(self) {
        let mut this = ManuallyDrop::new(self);
        let cell = this.cell_ptr();
        unsafe { (this.vtable.run)(cell) };
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        let cell = self.cell_ptr();
        unsafe { (self.vtable.drop)(cell) };
    }
}
