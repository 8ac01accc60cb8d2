//! Edit construction layer
//! - cursor.rs: splitting a buffer around the cursor
//! - synthesize.rs: raw suggestion -> label, insertion and cleanup edit

pub mod cursor;
pub mod synthesize;

pub use cursor::CursorContext;
pub use synthesize::{SynthesizedEdit, overlap_len, starts_with_isolated_closer, synthesize};
