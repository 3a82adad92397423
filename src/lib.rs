//! Fill a rooftop-solar subsidy PDF form, either from explicit web-form
//! values or from photos sent to a Gemini vision model for field extraction.
//!
//! The pipeline is: per-category extraction ([`extract`]) → merge into one
//! flat record ([`merge`]) → write into the AcroForm template
//! ([`pdf_form`]). The HTTP surface lives in [`server`] and [`handlers`].

pub mod api_error;
pub mod assets;
pub mod category;
pub mod extract;
pub mod gemini;
pub mod handlers;
pub mod merge;
pub mod pdf_form;
pub mod prelude;
pub mod prompts;
pub mod server;
