//! Dialogue state machine
//!
//! Pure transitions: the stored state and an event go in, the next stored
//! state and a list of effects come out. The runtime performs the I/O.

mod effect;
pub mod event;
pub mod replies;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::ConvContext;
pub use transition::{transition, TransitionError};
