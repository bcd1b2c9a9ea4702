//! Pipeline stages for one uploaded invoice.
//!
//! Each submodule implements exactly one step. The two branches after
//! intake are independent and run concurrently in [`crate::process`].
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ recognize ──▶ remap ─────┐
//! input ─────┤   (REST)        (schema)   ├──▶ envelope
//! (multipart)└─▶ render ────▶ encode ─────┘
//!                (pdfium)     (base64)
//! ```
//!
//! 1. [`input`]    : buffer the multipart upload once
//! 2. [`recognize`]: submit to the prebuilt model and poll for the result
//! 3. [`remap`]    : select and rename three fields, inject the constant
//! 4. [`extract`]  : steps 2–3 behind a deadline; failure is fatal
//! 5. [`render`]   : rasterise page 1 on the bounded blocking pool; failure
//!    degrades the thumbnail
//! 6. [`encode`]   : PNG-encode and base64-wrap the raster

pub mod encode;
pub mod extract;
pub mod input;
pub mod recognize;
pub mod remap;
pub mod render;
