pub mod assignment;
pub mod job;
pub mod location;
pub mod macros;
pub mod report;
pub mod staff;
pub mod time;

pub use assignment::*;
pub use job::*;
pub use location::*;
pub use report::*;
pub use staff::*;
pub use time::*;
