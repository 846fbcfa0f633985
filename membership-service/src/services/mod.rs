pub mod billing;
pub mod email;
pub mod payments;
pub mod reminder;
pub mod store;

pub use email::{EmailSender, MockEmailSender, SmtpEmailSender};
pub use store::{MembershipRepository, MembershipStore};
