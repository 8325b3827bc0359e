pub mod device;
pub mod message;

pub use device::{Device, DeviceKey, NewDevice};
pub use message::{ConversationPage, Message, NewMessage, PageRequest, DEFAULT_MSG_TYPE};
