mod jobs;
pub use jobs::*;

mod queue;
pub use queue::*;

mod root;
pub use root::*;
