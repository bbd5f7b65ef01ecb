// Line-delimited JSON API over TCP.

pub mod dto;
pub mod server;
