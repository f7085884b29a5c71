mod interface;
mod os_random;
mod seeded;
mod thread_random;

pub use interface::*;
pub use os_random::*;
pub use seeded::*;
pub use thread_random::*;
