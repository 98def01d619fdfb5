pub mod error;
pub mod endian;
pub mod array;
pub mod block;
pub mod header;
pub mod index;
pub mod io_stream;
pub mod parallel;
pub mod file;

pub use error::{EclError, Result};
pub use array::{ArrayData, ArrayType, EclElement};
pub use header::FileFormat;
pub use index::{ArrayEntry, ArrayInfo, Directory};
pub use io_stream::{ArrayReader, EclWriter, WriterOptions};
pub use parallel::{balance, LoadExecutor, LoadPlan, SequentialExecutor, ThreadedExecutor};
pub use file::{EclFile, ReaderOptions};
