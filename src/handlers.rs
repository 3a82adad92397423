//! The four API handlers.
//!
//! Control flow for the autofill routes: collect uploads → run one
//! extraction per uploaded image, in category order → merge → (optionally)
//! fill the PDF template.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Form, Multipart, State, multipart::Field},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::{
    api_error::ApiError,
    category::Category,
    gemini::ImagePayload,
    merge::{FieldMap, merge_extractions},
    pdf_form::{FillOutcome, fill_form},
    prelude::*,
    server::AppState,
};

/// Attachment name for all filled-PDF downloads.
const PDF_FILENAME: &str = "Filled_Solar_Subsidy.pdf";

/// `GET /api/list-pdf-fields`
pub async fn list_pdf_fields(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    if !state.assets.field_list_exists() {
        return Err(ApiError::not_found("PDF field list not found"));
    }
    let fields = state
        .assets
        .load_field_names()
        .await
        .map_err(|err| ApiError::failure("Failed to list PDF fields", err))?;
    Ok(Json(json!({ "fields": fields })))
}

/// `POST /api/fill-pdf`
///
/// Takes the field values straight from a form-url-encoded body.
pub async fn fill_pdf(
    State(state): State<AppState>,
    Form(body): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    debug!(?body, "Received form body");
    let values: FieldMap = body
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    render_filled_pdf(&state, &values, "Failed to generate PDF").await
}

/// `POST /api/gemini-autofill`
///
/// Extracts fields from the uploaded images and returns the merged record
/// as JSON, for the client to review before filling.
pub async fn gemini_autofill(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<FieldMap>, ApiError> {
    let uploads = collect_uploads(multipart).await.map_err(|err| {
        error!("Error reading multipart upload: {err:?}");
        ApiError::opaque("An unexpected error occurred.")
    })?;
    Ok(Json(extract_and_merge(&state, &uploads).await))
}

/// `POST /api/gemini-autofill-pdf`
///
/// Same extraction as [`gemini_autofill`], but goes straight to a filled
/// PDF.
pub async fn gemini_autofill_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let failure_message = "Failed to process images and generate PDF";
    let uploads = collect_uploads(multipart).await.map_err(|err| {
        error!("Error reading multipart upload: {err:?}");
        ApiError::opaque(failure_message)
    })?;
    let merged = extract_and_merge(&state, &uploads).await;
    render_filled_pdf(&state, &merged, failure_message).await
}

/// Pull the per-category images out of a multipart body. At most one image
/// per category; unknown part names are ignored.
async fn collect_uploads(
    mut multipart: Multipart,
) -> Result<HashMap<Category, ImagePayload>> {
    let mut uploads = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let Ok(category) = name.parse::<Category>() else {
            warn!(part = %name, "Ignoring unknown multipart part");
            continue;
        };
        let mime_type = part_mime_type(&field);
        let bytes = field.bytes().await?.to_vec();
        debug!(
            category = %category,
            bytes = bytes.len(),
            mime_type = %mime_type,
            "Received image"
        );
        uploads
            .entry(category)
            .or_insert(ImagePayload { bytes, mime_type });
    }
    Ok(uploads)
}

/// The MIME type for an uploaded part: declared content type, else guessed
/// from the file name, else the phone-camera default.
fn part_mime_type(field: &Field<'_>) -> String {
    if let Some(content_type) = field.content_type() {
        return content_type.to_owned();
    }
    if let Some(file_name) = field.file_name() {
        if let Some(mime) = mime_guess::from_path(file_name).first() {
            return mime.essence_str().to_owned();
        }
    }
    "image/jpeg".to_owned()
}

/// Run extraction for every category, in merge order, and merge the results.
/// Categories without an upload contribute nothing.
async fn extract_and_merge(
    state: &AppState,
    uploads: &HashMap<Category, ImagePayload>,
) -> FieldMap {
    let mut results = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let result = match uploads.get(&category) {
            Some(image) => state.extractor.extract(category, image).await,
            None => None,
        };
        results.push(result);
    }
    merge_extractions(results)
}

/// Shared fill path for both PDF-producing routes.
async fn render_filled_pdf(
    state: &AppState,
    values: &FieldMap,
    failure_message: &str,
) -> Result<Response, ApiError> {
    if !state.assets.template_exists() {
        return Err(ApiError::not_found("Template PDF not found"));
    }
    if !state.assets.field_list_exists() {
        return Err(ApiError::not_found("PDF field list not found"));
    }
    let template = state
        .assets
        .load_template()
        .await
        .map_err(|err| ApiError::failure(failure_message, err))?;
    let field_names = state
        .assets
        .load_field_names()
        .await
        .map_err(|err| ApiError::failure(failure_message, err))?;
    let unicode_font = state.assets.load_unicode_font().await;

    let filled = fill_form(&template, &field_names, values, unicode_font.as_ref())
        .map_err(|err| ApiError::failure(failure_message, err))?;
    let filled_count = filled
        .report
        .iter()
        .filter(|f| f.outcome == FillOutcome::Filled)
        .count();
    info!(
        filled = filled_count,
        skipped = filled.report.len() - filled_count,
        "Generated PDF"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={PDF_FILENAME}"),
            ),
        ],
        filled.bytes,
    )
        .into_response())
}
