mod message;
mod policy;
mod snowflake;

pub use message::*;
pub use policy::*;
pub use snowflake::*;
