//! Static form assets: the PDF template, the field-name list, and an
//! optional Unicode font.

use tokio::fs;

use crate::{pdf_form::UnicodeFont, prelude::*};

/// Relative locations under the assets directory, matching the deployed
/// layout of the service.
const TEMPLATE_REL_PATH: &str = "pdf/EditCut.pdf";
const FIELD_LIST_REL_PATH: &str = "pdf_fields.json";
const UNICODE_FONT_REL_PATH: &str = "pdf/NotoSans-Regular.ttf";

/// The read-only asset set, rooted at one directory.
///
/// Files are re-read on every request; nothing is cached, so the template
/// can be swapped without a restart.
#[derive(Clone, Debug)]
pub struct FormAssets {
    dir: PathBuf,
}

impl FormAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn template_exists(&self) -> bool {
        self.template_path().exists()
    }

    pub fn field_list_exists(&self) -> bool {
        self.field_list_path().exists()
    }

    /// Load the AcroForm template bytes.
    pub async fn load_template(&self) -> Result<Vec<u8>> {
        let path = self.template_path();
        fs::read(&path)
            .await
            .with_context(|| format!("Error reading {}", path.display()))
    }

    /// Load the ordered list of fillable field names.
    pub async fn load_field_names(&self) -> Result<Vec<String>> {
        let path = self.field_list_path();
        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Error reading {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Error parsing {}", path.display()))
    }

    /// Load the Unicode font when one is deployed. `None` selects the ASCII
    /// sanitizer in the fill step.
    pub async fn load_unicode_font(&self) -> Option<UnicodeFont> {
        match fs::read(self.dir.join(UNICODE_FONT_REL_PATH)).await {
            Ok(data) => Some(UnicodeFont::new(data)),
            Err(_) => None,
        }
    }

    fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_REL_PATH)
    }

    fn field_list_path(&self) -> PathBuf {
        self.dir.join(FIELD_LIST_REL_PATH)
    }
}
