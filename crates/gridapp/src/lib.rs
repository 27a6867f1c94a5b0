pub mod cli;
pub mod kiosk;
