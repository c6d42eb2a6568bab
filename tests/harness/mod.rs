// tests/harness/mod.rs
//
// Integration testing harness for chip-sync.
// Provides in-memory sheet, mailbox and drive simulations, a scripted form
// driver, and time control for testing.

pub mod mock_form;
pub mod test_harness;
pub mod virtual_clock;
pub mod virtual_mailbox;

pub use mock_form::{FormCall, MockFormDriver};
pub use test_harness::{TestHarness, CATEGORY, DOWNLOADED, RANGE, ROOT_FOLDER, SPREADSHEET, SUBJECT};
pub use virtual_mailbox::{MailAction, MailboxMessage};
pub use virtual_sheet::VirtualSheet;
