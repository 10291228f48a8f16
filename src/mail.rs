pub mod mailer;
pub mod mails;

pub use mailer::{LogMailer, MailError, Mailer, SmtpMailer};
