//! HTML → PDF rendering.

pub mod handlers;

use std::time::Duration;

use tracing::{info, Instrument};

use crate::browser::{BrowserEngine, BrowserError, SessionGuard};

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Renders `html` in a fresh browser session bounded by `deadline`.
///
/// The session is released whatever the outcome, including on deadline
/// expiry.
pub async fn generate_pdf(
    engine: &dyn BrowserEngine,
    html: &str,
    deadline: Duration,
) -> Result<Vec<u8>, BrowserError> {
    let mut session = SessionGuard::acquire(engine).await?;
    let span = tracing::info_span!("render_pdf", session_id = %session.id());

    let outcome = async {
        match tokio::time::timeout(deadline, session.render_pdf(html)).await {
            Ok(rendered) => rendered,
            Err(_) => Err(BrowserError::Timeout(deadline)),
        }
    }
    .instrument(span)
    .await;

    session.release().await;

    let pdf = outcome?;
    ensure_pdf_signature(&pdf)?;
    info!(bytes = pdf.len(), "PDF rendered");
    Ok(pdf)
}

fn ensure_pdf_signature(bytes: &[u8]) -> Result<(), BrowserError> {
    if bytes.starts_with(PDF_SIGNATURE) {
        Ok(())
    } else {
        Err(BrowserError::InvalidOutput(format!(
            "printed {} bytes without a PDF signature",
            bytes.len()
        )))
    }
}
