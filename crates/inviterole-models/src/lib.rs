pub mod attribution;
pub mod gateway;
pub mod id;
pub mod invite;
pub mod member;
pub mod role;
