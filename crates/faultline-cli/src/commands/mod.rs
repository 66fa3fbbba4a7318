pub mod check_in;
pub mod client_args;
pub mod print_envelope;
pub mod send_error;
pub mod send_message;

pub use check_in::CheckInCommand;
pub use print_envelope::PrintEnvelopeCommand;
pub use send_error::SendErrorCommand;
pub use send_message::SendMessageCommand;
