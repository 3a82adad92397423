//! Filling the AcroForm template.
//!
//! Single-pass, stateless transformation: template bytes plus a flat value
//! record in, filled PDF bytes plus a per-field report out. Per-field
//! problems are recorded and logged, never escalated; only a structurally
//! broken template fails the whole fill.

use std::collections::HashMap;

use anyhow::anyhow;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::Serialize;
use serde_json::Value;

use crate::{merge::FieldMap, prelude::*};

/// Bytes of a Unicode-capable TrueType font.
///
/// When a font is available we register it in the form's default resources
/// and write values as UTF-16BE text strings, so non-ASCII text survives.
/// Without one, values pass through [`sanitize_text`] first.
#[derive(Clone)]
pub struct UnicodeFont {
    data: Vec<u8>,
}

impl UnicodeFont {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// A filled PDF, plus what happened to each requested field.
#[derive(Debug)]
pub struct FilledPdf {
    /// The serialized document.
    pub bytes: Vec<u8>,

    /// One entry per field we attempted to write.
    pub report: Vec<FieldFill>,
}

/// What happened to one field that had a value supplied for it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldFill {
    /// The field name from the static field list.
    pub field: String,

    /// The outcome.
    pub outcome: FillOutcome,
}

/// Outcome of a single field write.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOutcome {
    /// The value was written.
    Filled,

    /// The name is in the static field list but not in the template.
    NotInTemplate,

    /// The field exists but is not a text field.
    NotTextField,

    /// The write itself failed, with the underlying message.
    WriteFailed(String),
}

/// Fill `template` with `values`, writing only names that appear in
/// `field_names` and have a non-empty, non-null value.
///
/// Skipped and failed fields are recorded in the report; they never abort
/// the fill. Fields without a usable value are not attempted and do not
/// appear in the report at all.
#[instrument(level = "debug", skip_all, fields(fields = field_names.len()))]
pub fn fill_form(
    template: &[u8],
    field_names: &[String],
    values: &FieldMap,
    unicode_font: Option<&UnicodeFont>,
) -> Result<FilledPdf> {
    let mut doc = Document::load_mem(template).context("Error loading PDF template")?;
    let acro_form_id = acro_form_id(&mut doc)?;
    let field_ids = collect_field_ids(&doc, acro_form_id)?;

    let mut report = Vec::new();
    for name in field_names {
        let Some(value) = fillable_value(values.get(name.as_str())) else {
            continue;
        };
        let value = if unicode_font.is_some() {
            value
        } else {
            sanitize_text(&value)
        };
        let outcome = match field_ids.get(name) {
            None => FillOutcome::NotInTemplate,
            Some(&id) => match write_text_value(&mut doc, id, encode_pdf_text(&value)) {
                Ok(()) => FillOutcome::Filled,
                Err(WriteError::NotTextField) => FillOutcome::NotTextField,
                Err(WriteError::Pdf(err)) => FillOutcome::WriteFailed(err.to_string()),
            },
        };
        if outcome != FillOutcome::Filled {
            warn!(field = %name, ?outcome, "Skipped form field");
        }
        report.push(FieldFill {
            field: name.clone(),
            outcome,
        });
    }

    if let Some(font) = unicode_font {
        install_unicode_font(&mut doc, acro_form_id, font)?;
    }

    // Viewers must regenerate appearances, since we dropped the old ones.
    let acro_form = doc
        .get_object_mut(acro_form_id)?
        .as_dict_mut()
        .context("AcroForm is not a dictionary")?;
    acro_form.set("NeedAppearances", true);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .context("Error serializing filled PDF")?;
    Ok(FilledPdf { bytes, report })
}

/// Strip characters the form's built-in fonts cannot render.
///
/// Greek Mu/mu and the micro sign become `M` (capacity units on nameplates);
/// all other non-ASCII code points are dropped. ASCII passes through
/// unchanged.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{039C}' | '\u{03BC}' | '\u{00B5}' => Some('M'),
            c if c.is_ascii() => Some(c),
            _ => None,
        })
        .collect()
}

/// A value we can write into a text field, as a string. Empty strings and
/// nulls are not fillable; numbers and booleans are stringified.
fn fillable_value(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Find the AcroForm dictionary, promoting an inline dictionary to its own
/// object so the rest of the code can address it by id.
fn acro_form_id(doc: &mut Document) -> Result<ObjectId> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .context("PDF has no document catalog")?
        .as_reference()
        .context("Document catalog is not a reference")?;
    let acro_form = {
        let catalog = doc.get_object(catalog_id)?.as_dict()?;
        catalog
            .get(b"AcroForm")
            .map(Object::clone)
            .map_err(|_| anyhow!("Template has no AcroForm dictionary"))?
    };
    match acro_form {
        Object::Reference(id) => Ok(id),
        Object::Dictionary(dict) => {
            let id = doc.add_object(dict);
            doc.get_object_mut(catalog_id)?
                .as_dict_mut()?
                .set("AcroForm", id);
            Ok(id)
        }
        other => Err(anyhow!("Unexpected AcroForm object: {other:?}")),
    }
}

/// Map every named form field to its object id, joining hierarchical names
/// with `.` the way fully-qualified AcroForm names work.
fn collect_field_ids(
    doc: &Document,
    acro_form_id: ObjectId,
) -> Result<HashMap<String, ObjectId>> {
    let acro_form = doc.get_object(acro_form_id)?.as_dict()?;
    let mut out = HashMap::new();
    if let Ok(fields) = acro_form.get(b"Fields") {
        let fields = resolve(doc, fields)?
            .as_array()
            .context("AcroForm Fields is not an array")?;
        for field in fields {
            let id = field
                .as_reference()
                .context("Form field is not a reference")?;
            collect_field(doc, id, None, &mut out)?;
        }
    }
    Ok(out)
}

fn collect_field(
    doc: &Document,
    id: ObjectId,
    prefix: Option<&str>,
    out: &mut HashMap<String, ObjectId>,
) -> Result<()> {
    let dict = doc.get_object(id)?.as_dict()?;
    let partial = match dict.get(b"T").ok().map(|obj| resolve(doc, obj)) {
        Some(Ok(Object::String(bytes, _))) => Some(decode_pdf_text(bytes)),
        _ => None,
    };
    let full = match (prefix, partial) {
        (Some(prefix), Some(partial)) => Some(format!("{prefix}.{partial}")),
        (None, Some(partial)) => Some(partial),
        (_, None) => prefix.map(str::to_owned),
    };

    if dict.has(b"FT") {
        if let Some(name) = &full {
            out.insert(name.clone(), id);
        }
    }

    // Recurse into child fields. Kids without a partial name are widget
    // annotations of this field, not fields of their own.
    if let Ok(kids) = dict.get(b"Kids") {
        let kids = resolve(doc, kids)?
            .as_array()
            .context("Form field Kids is not an array")?;
        for kid in kids {
            let kid_id = kid.as_reference().context("Field kid is not a reference")?;
            if doc.get_object(kid_id)?.as_dict()?.has(b"T") {
                collect_field(doc, kid_id, full.as_deref(), out)?;
            }
        }
    }
    Ok(())
}

/// Why a single field write failed.
enum WriteError {
    NotTextField,
    Pdf(anyhow::Error),
}

impl From<lopdf::Error> for WriteError {
    fn from(err: lopdf::Error) -> Self {
        WriteError::Pdf(err.into())
    }
}

/// Set a text field's value and drop its stale appearance streams, which
/// would otherwise keep showing the old (empty) rendering.
fn write_text_value(
    doc: &mut Document,
    id: ObjectId,
    bytes: Vec<u8>,
) -> Result<(), WriteError> {
    let kid_ids: Vec<ObjectId> = {
        let dict = doc.get_object(id)?.as_dict()?;
        let is_text = match dict.get(b"FT") {
            Ok(obj) => {
                let obj = match obj {
                    Object::Reference(r) => doc.get_object(*r)?,
                    other => other,
                };
                matches!(obj, Object::Name(name) if name.as_slice() == b"Tx")
            }
            Err(_) => false,
        };
        if !is_text {
            return Err(WriteError::NotTextField);
        }
        match dict.get(b"Kids") {
            Ok(Object::Array(kids)) => kids
                .iter()
                .filter_map(|kid| kid.as_reference().ok())
                .collect(),
            _ => Vec::new(),
        }
    };

    let field = doc.get_object_mut(id)?.as_dict_mut()?;
    field.set("V", Object::String(bytes, StringFormat::Literal));
    field.remove(b"AP");
    for kid_id in kid_ids {
        if let Ok(kid) = doc.get_object_mut(kid_id).and_then(Object::as_dict_mut) {
            kid.remove(b"AP");
        }
    }
    Ok(())
}

/// Register the Unicode font in the AcroForm's default resources, so viewers
/// regenerating appearances can find it by name.
fn install_unicode_font(
    doc: &mut Document,
    acro_form_id: ObjectId,
    font: &UnicodeFont,
) -> Result<()> {
    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.clone(),
    ));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "NotoSans",
        "Flags" => 32,
        "FontBBox" => vec![(-600).into(), (-300).into(), 1500.into(), 1100.into()],
        "ItalicAngle" => 0,
        "Ascent" => 1069,
        "Descent" => -293,
        "CapHeight" => 714,
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "NotoSans",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 600,
        "CIDToGIDMap" => "Identity",
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "NotoSans",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
    });

    let existing_dr = {
        let acro_form = doc.get_object(acro_form_id)?.as_dict()?;
        match acro_form.get(b"DR") {
            Ok(obj) => resolve(doc, obj).ok().cloned(),
            Err(_) => None,
        }
    };
    let mut dr = match existing_dr {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut fonts = match dr.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    fonts.set("NotoSans", font_id);
    dr.set("Font", fonts);

    let acro_form = doc.get_object_mut(acro_form_id)?.as_dict_mut()?;
    acro_form.set("DR", dr);
    acro_form.set("DA", Object::string_literal("/NotoSans 0 Tf 0 g"));
    Ok(())
}

/// Follow an indirect reference, if this is one.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Decode a PDF text string: UTF-16BE when it carries the BOM, otherwise
/// UTF-8 or Latin-1 bytes.
fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_owned(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Encode a value for a PDF text string: plain bytes for ASCII, UTF-16BE
/// with a BOM otherwise.
fn encode_pdf_text(value: &str) -> Vec<u8> {
    if value.is_ascii() {
        value.as_bytes().to_vec()
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    }
}
