//! Pipeline stages for a batch run.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ dispatch ──▶ process ──▶ transport
//! (*.pdf)      (batches)    (per file)  (HTTP POST)
//! ```
//!
//! 1. [`discover`]: list `*.pdf` in the input directory, eagerly and
//!    sorted, or lazily as a stream
//! 2. [`dispatch`]: cut into batches, bounded fan-out inside a batch
//! 3. [`process`]: idempotence check, request, overload retry, atomic
//!    write
//! 4. [`transport`]: the only stage with network I/O

pub mod discover;
pub mod dispatch;
pub mod process;
pub mod transport;
