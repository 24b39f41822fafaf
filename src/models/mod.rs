pub mod credentials;
pub mod invoice;
pub mod order;
pub mod session;

pub use credentials::Credentials;
pub use invoice::{InvoiceContent, InvoiceResource};
pub use order::{OrderRecord, UNKNOWN};
pub use session::{AuthSession, AuthStatus, AuthenticatedContext, PendingChallenge, SessionCookie};
