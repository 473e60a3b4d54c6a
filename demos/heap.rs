use std::io::Read;

use exalloc::{Heap, HeapConfig, SbrkSource};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break and the heap layout.
fn print_heap(
  label: &str,
  heap: &Heap<SbrkSource>,
) {
  println!(
    "[{}] PID = {}, program break = {:?}, heap size = {} bytes",
    label,
    std::process::id(),
    heap.source().program_break(),
    heap.heap_size(),
  );

  for block in heap.blocks() {
    println!(
      "    {:p}: {:>8} bytes {}",
      block.ptr,
      block.size,
      if block.allocated { "allocated" } else { "free" }
    );
  }
}

fn main() {
  env_logger::init();

  // The heap owns the program break from here on.
  let source = unsafe { SbrkSource::new() };
  let mut heap = match Heap::with_config(source, HeapConfig::default().with_chunk_size(4096)) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("could not initialise the heap: {err}");
      return;
    },
  };

  print_heap("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three allocations carved out of the initial chunk.
  // --------------------------------------------------------------------
  let first = heap.allocate(4);
  let second = heap.allocate(12);
  let third = heap.allocate(64);
  println!("\n[1] Allocated 4, 12 and 64 bytes at {first:p}, {second:p}, {third:p}");

  unsafe {
    first.cast::<u32>().write(0xDEADBEEF);
    second.write_bytes(0xAB, 12);
  }
  print_heap("after allocations", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the first two blocks. They are adjacent, so they coalesce
  //    into a single free block.
  // --------------------------------------------------------------------
  unsafe {
    heap.free(first);
    heap.free(second);
  }
  println!("\n[2] Freed first and second block");
  print_heap("after frees", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A small allocation reuses the coalesced block.
  // --------------------------------------------------------------------
  let fourth = heap.allocate(2);
  println!(
    "\n[3] Allocated 2 bytes at {fourth:p}, reused the freed block? {}",
    if fourth == first { "Yes" } else { "No" }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Grow the third block past the chunk to move the program break.
  // --------------------------------------------------------------------
  let third = unsafe { heap.resize(third, 64 * 1024) };
  println!("\n[4] Resized third block to 64 KiB, now at {third:p}");
  print_heap("after resize", &heap);

  let violations = heap.check(true);
  println!("\n[5] Consistency check: {} violation(s)", violations.len());
  for violation in violations {
    println!("    {violation}");
  }
}
