//! End-to-end tests for the API surface.
//!
//! These drive the real router with in-memory requests and a scripted
//! vision model, so no network access and no live Gemini key are needed.
//! Templates are built on the fly with `lopdf` so there are no binary
//! fixtures to keep in sync.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt as _;
use lopdf::{Document, Object, ObjectId, dictionary};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use solar_formfill::{
    assets::FormAssets,
    category::Category,
    extract::VisionExtractor,
    gemini::{ImagePayload, ModelError, VisionModel},
    prompts::prompt_for,
    server::{AppState, build_router},
};

const BOUNDARY: &str = "test-boundary-7db2";

/// A vision model that answers from a canned per-prompt script.
#[derive(Debug, Default)]
struct CannedModel {
    by_prompt: HashMap<&'static str, String>,
}

impl CannedModel {
    fn with_response(mut self, category: Category, response: &str) -> Self {
        self.by_prompt.insert(prompt_for(category), response.to_owned());
        self
    }
}

#[async_trait]
impl VisionModel for CannedModel {
    async fn generate(
        &self,
        prompt: &str,
        _image: &ImagePayload,
    ) -> Result<String, ModelError> {
        self.by_prompt
            .get(prompt)
            .cloned()
            .ok_or_else(|| ModelError::Other(anyhow!("no canned response")))
    }
}

/// Build a minimal AcroForm template with the given text fields.
fn build_template(field_names: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let mut field_ids: Vec<Object> = Vec::new();
    for (i, name) in field_names.iter().enumerate() {
        let y = 700 - (i as i64) * 40;
        let field_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(*name),
            "Rect" => vec![100.into(), y.into(), 400.into(), (y + 24).into()],
        });
        field_ids.push(field_id.into());
    }

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Annots" => field_ids.clone(),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1i64,
        }),
    );
    let acro_form_id = doc.add_object(dictionary! {
        "Fields" => field_ids,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acro_form_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test template");
    buf
}

/// Write a standard asset directory: template + field list.
fn write_assets(dir: &Path, field_names: &[&str]) {
    std::fs::create_dir_all(dir.join("pdf")).unwrap();
    std::fs::write(dir.join("pdf/EditCut.pdf"), build_template(field_names)).unwrap();
    std::fs::write(
        dir.join("pdf_fields.json"),
        serde_json::to_string(&field_names).unwrap(),
    )
    .unwrap();
}

fn state(dir: &Path, model: Arc<dyn VisionModel>) -> AppState {
    AppState {
        assets: FormAssets::new(dir),
        extractor: Arc::new(VisionExtractor::new(model, 5)),
    }
}

/// Read a text field's value back out of a serialized PDF.
fn pdf_field_value(bytes: &[u8], name: &str) -> Option<String> {
    let doc = Document::load_mem(bytes).unwrap();
    for obj in doc.objects.values() {
        if let Ok(dict) = obj.as_dict() {
            if let Ok(Object::String(t, _)) = dict.get(b"T") {
                if t.as_slice() == name.as_bytes() {
                    return match dict.get(b"V") {
                        Ok(Object::String(v, _)) => {
                            Some(String::from_utf8_lossy(v).into_owned())
                        }
                        _ => None,
                    };
                }
            }
        }
    }
    panic!("field {name} not found in PDF");
}

fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content_type, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{name}.jpg\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

#[tokio::test]
async fn list_pdf_fields_returns_the_static_list() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Nameoftheapplicant", "MobileNumber"]);
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::get("/api/list-pdf-fields")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "fields": ["Nameoftheapplicant", "MobileNumber"] })
    );
}

#[tokio::test]
async fn fill_pdf_fills_submitted_fields_and_leaves_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Nameoftheapplicant", "MobileNumber"]);
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::post("/api/fill-pdf")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("Nameoftheapplicant=Asha%20Rao"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=Filled_Solar_Subsidy.pdf"
    );
    let pdf = body_bytes(response).await;
    assert_eq!(pdf_field_value(&pdf, "Nameoftheapplicant").as_deref(), Some("Asha Rao"));
    assert_eq!(pdf_field_value(&pdf, "MobileNumber"), None);
}

#[tokio::test]
async fn fill_pdf_without_template_is_404() {
    let dir = tempfile::tempdir().unwrap();
    // Field list only, no template.
    std::fs::write(dir.path().join("pdf_fields.json"), r#"["Email"]"#).unwrap();
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::post("/api/fill-pdf")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("Email=a%40b.in"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "Template PDF not found" }));
}

#[tokio::test]
async fn autofill_with_no_images_is_an_empty_record() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Nameoftheapplicant"]);
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::post("/api/gemini-autofill")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn autofill_merges_extraction_results_and_applies_the_alias() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Nameoftheapplicant", "CategoryInDiscom"]);
    let model = CannedModel::default().with_response(
        Category::NetMeter,
        r#"Sure! {"Nameoftheapplicant": "Asha Rao", "cat": "Domestic", "CategoryInDiscom": ""}"#,
    );
    let app = build_router(state(dir.path(), Arc::new(model)));

    let response = app
        .oneshot(
            Request::post("/api/gemini-autofill")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[(
                    "netMeter",
                    "image/png",
                    b"fake image bytes",
                )])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let merged = body_json(response).await;
    assert_eq!(merged["Nameoftheapplicant"], json!("Asha Rao"));
    assert_eq!(merged["CategoryInDiscom"], json!("Domestic"));
}

#[tokio::test]
async fn autofill_ignores_unknown_parts_and_failed_extractions() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Nameoftheapplicant"]);
    // Model has no canned answer, so the discom extraction fails; the
    // request must still succeed with an empty record.
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::post("/api/gemini-autofill")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[
                    ("discom", "image/jpeg", b"fake image bytes"),
                    ("selfie", "image/jpeg", b"not a known category"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn autofill_pdf_returns_a_filled_document() {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path(), &["Latitude", "Longitude"]);
    let model = CannedModel::default().with_response(
        Category::Location,
        r#"{"Latitude": "17.4065", "Longitude": "78.4772"}"#,
    );
    let app = build_router(state(dir.path(), Arc::new(model)));

    let response = app
        .oneshot(
            Request::post("/api/gemini-autofill-pdf")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[(
                    "location",
                    "image/png",
                    b"fake image bytes",
                )])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let pdf = body_bytes(response).await;
    assert_eq!(pdf_field_value(&pdf, "Latitude").as_deref(), Some("17.4065"));
    assert_eq!(pdf_field_value(&pdf, "Longitude").as_deref(), Some("78.4772"));
}

#[tokio::test]
async fn autofill_pdf_without_template_is_404() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pdf_fields.json"), r#"["Latitude"]"#).unwrap();
    let app = build_router(state(dir.path(), Arc::new(CannedModel::default())));

    let response = app
        .oneshot(
            Request::post("/api/gemini-autofill-pdf")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Template PDF not found"));
}
