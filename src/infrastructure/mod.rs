pub mod js_executor;
pub mod transport;

pub use js_executor::{BrowserTransport, JsExecutor};
pub use transport::{HttpTransport, PageResponse, Transport};
