//! Documentation helpers run around Doxygen.
//!
//! - [`prefilter`] - Markdown input filter (`doxprep filter`)
//! - [`codec`] - Doxygen identifier mangling
//! - [`examples`] - example sketch documentation page
//! - [`links`] - post-processing of the generated HTML

pub mod codec;
pub mod examples;
pub mod links;
pub mod prefilter;
pub mod text;

pub use codec::{NameCodec, convert_name_to_file, convert_ref_to_name, escape, unescape};
pub use prefilter::{FileContext, FilterState, Prefilter};
