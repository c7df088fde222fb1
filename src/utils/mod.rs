pub(crate) mod dns;
pub(crate) mod domain;
pub mod smtp;
