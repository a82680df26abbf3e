use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::ApiError,
    pdf::{self, InvoiceData, InvoiceLine},
};

const DEFAULT_VAT_RATE: f64 = 5.0;

#[derive(Debug, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    pub invoice_number: Option<String>,
    pub client_name: String,
    pub client_address: Option<String>,
    pub currency: Option<String>,
    pub vat_rate: Option<f64>,
    pub items: Vec<InvoiceItem>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn compute_invoice(request: &InvoiceRequest) -> Result<InvoiceData, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::Validation("at least one line item is required".to_string()));
    }
    if request.client_name.trim().is_empty() {
        return Err(ApiError::Validation("client_name is required".to_string()));
    }

    let mut items = Vec::with_capacity(request.items.len());
    let mut subtotal = 0.0;
    for item in &request.items {
        if item.quantity <= 0.0 {
            return Err(ApiError::Validation(format!(
                "{}: quantity must be positive",
                item.description
            )));
        }
        if item.unit_price < 0.0 {
            return Err(ApiError::Validation(format!(
                "{}: unit price must not be negative",
                item.description
            )));
        }
        let amount = round2(item.quantity * item.unit_price);
        subtotal += amount;
        items.push(InvoiceLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount,
        });
    }
    let subtotal = round2(subtotal);

    let vat_rate = request.vat_rate.unwrap_or(DEFAULT_VAT_RATE);
    if !(0.0..=100.0).contains(&vat_rate) {
        return Err(ApiError::Validation("vat_rate must be between 0 and 100".to_string()));
    }
    let vat_amount = round2(subtotal * vat_rate / 100.0);
    let total = round2(subtotal + vat_amount);

    let now = Utc::now();
    Ok(InvoiceData {
        invoice_number: request
            .invoice_number
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("DXB-{}", now.format("%Y%m%d-%H%M%S"))),
        date: now.format("%Y-%m-%d").to_string(),
        client_name: request.client_name.trim().to_string(),
        client_address: request.client_address.clone(),
        currency: request.currency.clone().unwrap_or_else(|| "AED".to_string()),
        items,
        subtotal,
        vat_rate,
        vat_amount,
        total,
    })
}

/// Standalone commission invoice generator; shares nothing with the rest
/// of the data model.
pub async fn dubai_commissions(
    Json(request): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = compute_invoice(&request)?;
    let bytes = pdf::render_invoice(&invoice).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"{}.pdf\"",
            invoice.invoice_number
        ))
        .map_err(|e| ApiError::Internal(e.to_string()))?,
    );

    Ok((headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<InvoiceItem>) -> InvoiceRequest {
        InvoiceRequest {
            invoice_number: Some("DXB-001".to_string()),
            client_name: "Gulf Trading LLC".to_string(),
            client_address: None,
            currency: None,
            vat_rate: None,
            items,
        }
    }

    #[test]
    fn totals_add_up_with_default_vat() {
        let invoice = compute_invoice(&request(vec![
            InvoiceItem {
                description: "Brokerage".to_string(),
                quantity: 2.0,
                unit_price: 1000.0,
            },
            InvoiceItem {
                description: "Handling".to_string(),
                quantity: 1.0,
                unit_price: 499.99,
            },
        ]))
        .expect("valid invoice");

        assert_eq!(invoice.subtotal, 2499.99);
        assert_eq!(invoice.vat_rate, 5.0);
        assert_eq!(invoice.vat_amount, 125.0);
        assert_eq!(invoice.total, 2624.99);
        assert_eq!(invoice.currency, "AED");
    }

    #[test]
    fn rejects_empty_and_invalid_items() {
        assert!(compute_invoice(&request(Vec::new())).is_err());
        assert!(compute_invoice(&request(vec![InvoiceItem {
            description: "x".to_string(),
            quantity: 0.0,
            unit_price: 10.0,
        }]))
        .is_err());
        assert!(compute_invoice(&request(vec![InvoiceItem {
            description: "x".to_string(),
            quantity: 1.0,
            unit_price: -1.0,
        }]))
        .is_err());
    }
}
