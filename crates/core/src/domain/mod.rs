pub mod analysis;
pub mod conversation;
pub mod order;
pub mod trigger;
pub mod vendor;
