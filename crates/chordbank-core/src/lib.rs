pub mod chords;
pub mod constants;
pub mod error;
pub mod gain;
pub mod pitch;
pub mod progression;
pub mod session;
pub mod timers;

pub use chords::*;
pub use constants::*;
pub use error::*;
pub use gain::*;
pub use pitch::*;
pub use progression::*;
pub use session::*;
pub use timers::*;
