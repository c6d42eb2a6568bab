// src/api/mod.rs
//
// Blocking REST implementations of the collaborator traits.

pub mod drive;
pub mod gmail;
pub mod http;
pub mod sheets;

pub use drive::DriveClient;
pub use gmail::GmailClient;
pub use http::GoogleHttp;
pub use sheets::SheetsClient;
