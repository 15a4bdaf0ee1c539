mod id;
mod mac;
mod sequence_number;

pub use id::{Id, IdGenerator};
pub use mac::MacAddress;
pub use sequence_number::SequenceNumber;
