pub mod auth_negotiator;
pub mod exporter;
pub mod followup_writer;
pub mod html;
pub mod html_form;
pub mod invoice_fetcher;
pub mod login_verifier;
pub mod order_extractor;

pub use auth_negotiator::AuthNegotiator;
pub use exporter::{export_orders, parse_csv, write_csv, ExportFormats};
pub use followup_writer::FollowupWriter;
pub use invoice_fetcher::{find_printable_link, InvoiceFetcher};
pub use login_verifier::{verify_login, LoginCheck};
pub use order_extractor::{normalize_order_id, ExtractDiagnostic, Extraction, OrderExtractor};
