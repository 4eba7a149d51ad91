//! Invoice upload validation and the optimistic invoice patch.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use moogship_client::{InvoiceFile, MutationError, NotificationKind, ValidationError};
use moogship_core::ShipmentId;
use moogship_integration_tests::{TestContext, shipment_json};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn invoice(name: &str, size: usize) -> InvoiceFile {
    InvoiceFile {
        filename: name.to_string(),
        content_type: None,
        bytes: vec![b'%'; size],
    }
}

#[tokio::test]
async fn test_oversized_invoice_is_rejected_locally() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/api/shipments/4/upload-invoice"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.server)
        .await;

    let err = ctx
        .console
        .upload_invoice(ShipmentId::new(4), invoice("invoice.pdf", 12 * 1024 * 1024))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Validation(ValidationError::FileTooLarge { .. })
    ));
    assert_eq!(err.message(), "File Too Large");
    assert_eq!(ctx.request_count().await, 0);

    let note = ctx.console.notifications().latest().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert_eq!(note.description.as_deref(), Some("File Too Large"));
}

#[tokio::test]
async fn test_non_pdf_invoice_is_rejected_locally() {
    let ctx = TestContext::new().await;

    let err = ctx
        .console
        .upload_invoice(ShipmentId::new(4), invoice("invoice.docx", 2048))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Validation(ValidationError::NotPdf)
    ));
    assert_eq!(ctx.request_count().await, 0);
}

#[tokio::test]
async fn test_upload_patches_cached_shipment() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/api/shipments/my"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([shipment_json(4, "approved", 5000)])),
        )
        .mount(&ctx.server)
        .await;
    let mut uploaded = shipment_json(4, "approved", 5000);
    uploaded["invoiceFilename"] = json!("invoice.pdf");
    Mock::given(method("POST"))
        .and(path("/api/shipments/4/upload-invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(uploaded))
        .expect(1)
        .mount(&ctx.server)
        .await;

    ctx.console.my_shipments().await.unwrap();
    ctx.console
        .upload_invoice(ShipmentId::new(4), invoice("invoice.pdf", 4096))
        .await
        .unwrap();

    let cached = ctx
        .console
        .cached_shipment(ShipmentId::new(4))
        .await
        .unwrap();
    assert_eq!(cached.invoice_filename.as_deref(), Some("invoice.pdf"));
    assert!(cached.invoice_uploaded_at.is_some());
    assert_eq!(
        ctx.console.notifications().latest().unwrap().kind,
        NotificationKind::Success
    );
}
