//! OS plumbing shared by the linter crates.
//!
//! - **`handle`**: single-owner OS handles with blocking read-all / write-all
//! - **`pipe`**: pipe pairs wired for exactly one direction of a child's stdio
//! - **`scratch`**: hidden on-disk copy of the edited buffer for file-based linters

pub mod handle;
pub mod pipe;
pub mod scratch;

pub use handle::{Handle, HandleError, READ_CHUNK_BYTES};
pub use pipe::{ChildPipe, create_input_pipe, create_output_pipe};
pub use scratch::ScratchCopy;
