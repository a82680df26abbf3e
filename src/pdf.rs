//! Commission invoice PDF rendering via Typst.
//!
//! The template is embedded; rendering writes the invoice data as JSON
//! next to it in a per-render temp directory and shells out to the
//! `typst` binary.

use std::path::PathBuf;

use serde::Serialize;
use tokio::fs;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct InvoiceData {
    pub invoice_number: String,
    pub date: String,
    pub client_name: String,
    pub client_address: Option<String>,
    pub currency: String,
    pub items: Vec<InvoiceLine>,
    pub subtotal: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub total: f64,
}

const INVOICE_TEMPLATE: &str = r##"#let data = json("DATA_JSON_PATH")

#set page(paper: "a4", margin: (top: 1in, bottom: 1in, left: 1in, right: 1in))
#set text(size: 10pt)

#let money(amount) = {
  data.currency + " " + str(calc.round(amount, digits: 2))
}

#grid(
  columns: (1fr, 1fr),
  align: (left, right),
  [
    #text(size: 20pt, weight: "bold")[COMMISSION INVOICE]
    #v(0.5em)
    Invoice no. #data.invoice_number \
    Date: #data.date
  ],
  [
    #text(weight: "bold")[#data.client_name]
    #if data.client_address != none [
      \ #data.client_address
    ]
  ],
)

#v(2em)

#table(
  columns: (1fr, auto, auto, auto),
  align: (left, right, right, right),
  table.header([*Description*], [*Qty*], [*Unit Price*], [*Amount*]),
  ..data.items.map(item => (
    item.description,
    str(item.quantity),
    money(item.unit_price),
    money(item.amount),
  )).flatten(),
)

#v(1em)

#align(right)[
  #table(
    columns: (auto, auto),
    align: (left, right),
    stroke: none,
    [Subtotal], [#money(data.subtotal)],
    [VAT (#str(data.vat_rate)%)], [#money(data.vat_amount)],
    [*Total*], [*#money(data.total)*],
  )
]
"##;

/// Render the invoice to PDF bytes. Requires the `typst` binary on PATH.
pub async fn render_invoice(invoice: &InvoiceData) -> Result<Vec<u8>, ApiError> {
    let work_dir = std::env::temp_dir()
        .join("taxdesk-invoices")
        .join(Uuid::new_v4().to_string());
    fs::create_dir_all(&work_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("invoice workspace: {}", e)))?;

    let result = compile(invoice, &work_dir).await;
    let _ = fs::remove_dir_all(&work_dir).await;
    result
}

async fn compile(invoice: &InvoiceData, work_dir: &PathBuf) -> Result<Vec<u8>, ApiError> {
    let json_data = serde_json::to_string(invoice)
        .map_err(|e| ApiError::Internal(format!("invoice data: {}", e)))?;
    fs::write(work_dir.join("data.json"), &json_data)
        .await
        .map_err(|e| ApiError::Internal(format!("invoice data: {}", e)))?;

    // data.json sits next to the template, so the template references it
    // by bare filename
    let template = INVOICE_TEMPLATE.replace("DATA_JSON_PATH", "data.json");
    let template_path = work_dir.join("invoice.typ");
    fs::write(&template_path, template)
        .await
        .map_err(|e| ApiError::Internal(format!("invoice template: {}", e)))?;

    let output_path = work_dir.join("invoice.pdf");

    let output = Command::new("typst")
        .arg("compile")
        .arg("--root")
        .arg(work_dir)
        .arg(&template_path)
        .arg(&output_path)
        .output()
        .await
        .map_err(|_| {
            ApiError::Internal(
                "typst not found; install it with `cargo install typst-cli`".to_string(),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApiError::Internal(format!("PDF generation failed: {}", stderr)));
    }

    fs::read(&output_path)
        .await
        .map_err(|e| ApiError::Internal(format!("PDF output: {}", e)))
}
