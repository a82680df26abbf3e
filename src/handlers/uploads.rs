use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Multipart;
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::get_current_user,
    models::{OfficialReceipt, PotAttachment, PurchaseRecord, SalesRecord},
    storage::SharedStorage,
    AppState,
};

use super::{commissions, purchases, sales};

const RECORD_ATTACHMENT_KINDS: &[&str] =
    &["cheque", "voucher", "invoice", "doc_2307", "deposit_slip"];

pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

fn allowed_mime(content_type: &str) -> bool {
    content_type.starts_with("image/") || content_type == "application/pdf"
}

fn file_extension(filename: &str, content_type: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext {
        Some(ext) if !ext.is_empty() => ext,
        _ => match content_type {
            "application/pdf" => "pdf".to_string(),
            other => other.split('/').nth(1).unwrap_or("bin").to_string(),
        },
    }
}

/// Object key for a record attachment. The running index continues from
/// the attachments already on the record, so re-uploads never collide.
fn attachment_key(period: &str, tin: &str, kind: &str, index: usize, ext: &str) -> String {
    format!("{}/{}/{}-{}.{}", period, tin, kind, index, ext)
}

async fn collect_upload(
    mut multipart: Multipart,
) -> Result<(Option<String>, Vec<UploadedFile>), ApiError> {
    let mut kind = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        if let Some(filename) = field.file_name().map(|s| s.to_string()) {
            let content_type = field.content_type().map(|s| s.to_string()).unwrap_or_default();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("could not read {}: {}", filename, e)))?;
            if !data.is_empty() {
                files.push(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
        } else if name == "file_type" {
            let text = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("invalid multipart body".to_string()))?;
            kind = Some(
                String::from_utf8(text.to_vec())
                    .map_err(|_| ApiError::Validation("invalid file_type".to_string()))?,
            );
        }
    }

    Ok((kind, files))
}

fn check_files(files: &[UploadedFile]) -> Result<(), ApiError> {
    if files.is_empty() {
        return Err(ApiError::Validation("no files provided".to_string()));
    }
    for file in files {
        if !allowed_mime(&file.content_type) {
            return Err(ApiError::Validation(format!(
                "{}: only images and PDFs are accepted",
                file.filename
            )));
        }
    }
    Ok(())
}

/// Upload every file concurrently and wait for all of them. Returns one
/// result per file, in input order; failures don't abort the batch.
async fn upload_files<F>(
    storage: &SharedStorage,
    files: &[UploadedFile],
    make_key: F,
) -> Vec<Result<String, ApiError>>
where
    F: Fn(usize, &UploadedFile) -> String,
{
    let tasks = files.iter().enumerate().map(|(i, file)| {
        let key = make_key(i, file);
        let storage = storage.clone();
        let data = file.data.to_vec();
        async move { storage.upload(&key, data).await.map(|_| key) }
    });
    join_all(tasks).await
}

fn sales_urls(record: &SalesRecord, kind: &str) -> Vec<String> {
    match kind {
        "cheque" => record.cheque.0.clone(),
        "voucher" => record.voucher.0.clone(),
        "invoice" => record.invoice.0.clone(),
        "doc_2307" => record.doc_2307.0.clone(),
        "deposit_slip" => record.deposit_slip.0.clone(),
        _ => Vec::new(),
    }
}

fn purchase_urls(record: &PurchaseRecord, kind: &str) -> Vec<String> {
    match kind {
        "cheque" => record.cheque.0.clone(),
        "voucher" => record.voucher.0.clone(),
        "invoice" => record.invoice.0.clone(),
        "doc_2307" => record.doc_2307.0.clone(),
        "deposit_slip" => record.deposit_slip.0.clone(),
        _ => Vec::new(),
    }
}

fn warning(failed: usize) -> Option<String> {
    if failed > 0 {
        Some(format!("{} file(s) failed to upload", failed))
    } else {
        None
    }
}

#[derive(Deserialize)]
pub struct DeleteAttachmentPayload {
    pub file_type: String,
    pub url: String,
}

#[derive(Deserialize)]
pub struct DeleteKeyPayload {
    pub key: String,
}

pub async fn upload_sales_attachments(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = sales::fetch_visible_sale(&state.db, &current_user, record_id).await?;

    let (kind, files) = collect_upload(multipart).await?;
    let kind = kind.ok_or_else(|| ApiError::Validation("file_type is required".to_string()))?;
    if !RECORD_ATTACHMENT_KINDS.contains(&kind.as_str()) {
        return Err(ApiError::Validation(format!("unknown file_type: {}", kind)));
    }
    check_files(&files)?;

    let mut urls = sales_urls(&record, &kind);
    let existing = urls.len();
    let period = record.tax_month.format("%Y-%m").to_string();

    let results = upload_files(&state.storage, &files, |i, file| {
        attachment_key(
            &period,
            &record.tin,
            &kind,
            existing + i + 1,
            &file_extension(&file.filename, &file.content_type),
        )
    })
    .await;

    let mut failed = 0;
    for result in results {
        match result {
            Ok(key) => urls.push(state.storage.public_url(&key)),
            Err(e) => {
                log::warn!("sales attachment upload failed: {}", e);
                failed += 1;
            }
        }
    }

    // `kind` doubles as the column name; it is allow-listed above.
    let sql = format!(
        "UPDATE sales_records SET {} = $1, updated_at = NOW() WHERE id = $2",
        kind
    );
    sqlx::query(&sql)
        .bind(SqlJson(&urls))
        .bind(record.id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({
        "urls": urls,
        "uploaded": urls.len() - existing,
        "failed": failed,
        "warning": warning(failed),
    })))
}

pub async fn delete_sales_attachment(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    Json(payload): Json<DeleteAttachmentPayload>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = sales::fetch_visible_sale(&state.db, &current_user, record_id).await?;

    if !RECORD_ATTACHMENT_KINDS.contains(&payload.file_type.as_str()) {
        return Err(ApiError::Validation(format!(
            "unknown file_type: {}",
            payload.file_type
        )));
    }

    let key = state
        .storage
        .key_from_url(&payload.url)
        .ok_or_else(|| ApiError::Validation("url was not produced by this storage".to_string()))?;
    state.storage.delete(&key).await?;

    let urls: Vec<String> = sales_urls(&record, &payload.file_type)
        .into_iter()
        .filter(|u| u != &payload.url)
        .collect();

    let sql = format!(
        "UPDATE sales_records SET {} = $1, updated_at = NOW() WHERE id = $2",
        payload.file_type
    );
    sqlx::query(&sql)
        .bind(SqlJson(&urls))
        .bind(record.id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "urls": urls })))
}

pub async fn upload_purchase_attachments(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = purchases::fetch_visible_purchase(&state.db, &current_user, record_id).await?;

    let (kind, files) = collect_upload(multipart).await?;
    let kind = kind.ok_or_else(|| ApiError::Validation("file_type is required".to_string()))?;
    check_files(&files)?;

    let period = record.tax_month.format("%Y-%m").to_string();

    // Official receipts keep the original filename next to the URL;
    // everything else is a bare URL list like on sales.
    if kind == "official_receipt" {
        let mut receipts = record.official_receipt.0.clone();
        let existing = receipts.len();

        let results = upload_files(&state.storage, &files, |i, file| {
            attachment_key(
                &period,
                &record.tin,
                &kind,
                existing + i + 1,
                &file_extension(&file.filename, &file.content_type),
            )
        })
        .await;

        let mut failed = 0;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(key) => receipts.push(OfficialReceipt {
                    name: file.filename.clone(),
                    url: state.storage.public_url(&key),
                }),
                Err(e) => {
                    log::warn!("official receipt upload failed: {}", e);
                    failed += 1;
                }
            }
        }

        sqlx::query(
            "UPDATE purchase_records SET official_receipt = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(SqlJson(&receipts))
        .bind(record.id)
        .execute(&state.db)
        .await?;

        return Ok(Json(json!({
            "official_receipt": receipts,
            "failed": failed,
            "warning": warning(failed),
        })));
    }

    if !RECORD_ATTACHMENT_KINDS.contains(&kind.as_str()) {
        return Err(ApiError::Validation(format!("unknown file_type: {}", kind)));
    }

    let mut urls = purchase_urls(&record, &kind);
    let existing = urls.len();

    let results = upload_files(&state.storage, &files, |i, file| {
        attachment_key(
            &period,
            &record.tin,
            &kind,
            existing + i + 1,
            &file_extension(&file.filename, &file.content_type),
        )
    })
    .await;

    let mut failed = 0;
    for result in results {
        match result {
            Ok(key) => urls.push(state.storage.public_url(&key)),
            Err(e) => {
                log::warn!("purchase attachment upload failed: {}", e);
                failed += 1;
            }
        }
    }

    let sql = format!(
        "UPDATE purchase_records SET {} = $1, updated_at = NOW() WHERE id = $2",
        kind
    );
    sqlx::query(&sql)
        .bind(SqlJson(&urls))
        .bind(record.id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({
        "urls": urls,
        "uploaded": urls.len() - existing,
        "failed": failed,
        "warning": warning(failed),
    })))
}

pub async fn delete_purchase_attachment(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    Json(payload): Json<DeleteAttachmentPayload>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = purchases::fetch_visible_purchase(&state.db, &current_user, record_id).await?;

    let key = state
        .storage
        .key_from_url(&payload.url)
        .ok_or_else(|| ApiError::Validation("url was not produced by this storage".to_string()))?;

    if payload.file_type == "official_receipt" {
        state.storage.delete(&key).await?;

        let receipts: Vec<OfficialReceipt> = record
            .official_receipt
            .0
            .clone()
            .into_iter()
            .filter(|r| r.url != payload.url)
            .collect();

        sqlx::query(
            "UPDATE purchase_records SET official_receipt = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(SqlJson(&receipts))
        .bind(record.id)
        .execute(&state.db)
        .await?;

        return Ok(Json(json!({ "official_receipt": receipts })));
    }

    if !RECORD_ATTACHMENT_KINDS.contains(&payload.file_type.as_str()) {
        return Err(ApiError::Validation(format!(
            "unknown file_type: {}",
            payload.file_type
        )));
    }

    state.storage.delete(&key).await?;

    let urls: Vec<String> = purchase_urls(&record, &payload.file_type)
        .into_iter()
        .filter(|u| u != &payload.url)
        .collect();

    let sql = format!(
        "UPDATE purchase_records SET {} = $1, updated_at = NOW() WHERE id = $2",
        payload.file_type
    );
    sqlx::query(&sql)
        .bind(SqlJson(&urls))
        .bind(record.id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "urls": urls })))
}

pub async fn upload_commission_attachments(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(report_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let report = commissions::fetch_visible_report(&state.db, &current_user, report_id).await?;

    let (_, files) = collect_upload(multipart).await?;
    check_files(&files)?;

    let area: Option<String> = match report.created_by {
        Some(owner) => sqlx::query_scalar::<_, Option<String>>(
            "SELECT assigned_area FROM user_profiles WHERE id = $1",
        )
        .bind(owner)
        .fetch_optional(&state.db)
        .await?
        .flatten(),
        None => None,
    };
    let area = area.unwrap_or_else(|| "unassigned".to_string());
    let created_date = report.created_at.format("%Y-%m-%d").to_string();

    let mut pot = report.accounting_pot.0.clone();
    let existing = pot.len();

    let results = upload_files(&state.storage, &files, |i, file| {
        format!(
            "commissions/{}/{}/{}-{}.{}",
            area,
            created_date,
            report.report_number,
            existing + i + 1,
            file_extension(&file.filename, &file.content_type),
        )
    })
    .await;

    let mut failed = 0;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(key) => pot.push(PotAttachment {
                name: file.filename.clone(),
                url: state.storage.public_url(&key),
                uploaded_at: Utc::now(),
            }),
            Err(e) => {
                log::warn!("commission attachment upload failed: {}", e);
                failed += 1;
            }
        }
    }

    sqlx::query(
        "UPDATE commission_reports SET accounting_pot = $1, updated_at = NOW() WHERE uuid = $2",
    )
    .bind(SqlJson(&pot))
    .bind(report.uuid)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({
        "accounting_pot": pot,
        "failed": failed,
        "warning": warning(failed),
    })))
}

pub async fn delete_commission_attachment(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(report_id): Path<Uuid>,
    Json(payload): Json<DeleteKeyPayload>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let report = commissions::fetch_visible_report(&state.db, &current_user, report_id).await?;

    state.storage.delete(&payload.key).await?;

    let pot: Vec<PotAttachment> = report
        .accounting_pot
        .0
        .clone()
        .into_iter()
        .filter(|a| state.storage.key_from_url(&a.url).as_deref() != Some(payload.key.as_str()))
        .collect();

    sqlx::query(
        "UPDATE commission_reports SET accounting_pot = $1, updated_at = NOW() WHERE uuid = $2",
    )
    .bind(SqlJson(&pot))
    .bind(report.uuid)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({ "accounting_pot": pot })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_allow_list() {
        assert!(allowed_mime("image/png"));
        assert!(allowed_mime("image/jpeg"));
        assert!(allowed_mime("application/pdf"));
        assert!(!allowed_mime("application/zip"));
        assert!(!allowed_mime("text/html"));
    }

    #[test]
    fn extension_prefers_filename() {
        assert_eq!(file_extension("scan.PDF", "application/octet-stream"), "pdf");
        assert_eq!(file_extension("photo.jpeg", "image/jpeg"), "jpeg");
        assert_eq!(file_extension("noext", "application/pdf"), "pdf");
        assert_eq!(file_extension("noext", "image/png"), "png");
        assert_eq!(file_extension("noext", "weird"), "bin");
    }

    #[test]
    fn keys_differ_by_running_index() {
        let a = attachment_key("2024-03", "123456789", "cheque", 1, "pdf");
        let b = attachment_key("2024-03", "123456789", "cheque", 2, "pdf");
        assert_eq!(a, "2024-03/123456789/cheque-1.pdf");
        assert_eq!(b, "2024-03/123456789/cheque-2.pdf");
        assert_ne!(a, b);
    }
}
