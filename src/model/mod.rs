mod call_state;
mod directory;
mod error;
mod events;
mod participant;
mod room;

pub use call_state::{CallEvent, CallState, CallTransition};
pub use directory::{Departure, JoinOutcome, JoinPolicy, Member, SessionDirectory};
pub use error::RelayError;
pub use events::{ClientEvent, LeaveRequest, ServerEvent};
pub use participant::{ConnectionId, Participant};
pub use room::{Room, RoomId};
