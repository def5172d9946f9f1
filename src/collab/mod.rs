//! Narrow interfaces to the work the engine does not do itself.
//!
//! - `parser` - reading entity source definitions
//! - `compiler` - the shared pre-compile step and its intermediate modules
//! - `render` - template rendering and markdown
//! - `output` - writing and removing artifacts
//!
//! Each trait ships one filesystem-backed default.

mod compiler;
mod output;
mod parser;
mod render;

pub use compiler::{CompileEntry, Compiler, DefinitionCompiler};
pub use output::{FsOutputWriter, OutputWriter};
pub use parser::{Definition, SourceParser, TomlSourceParser};
pub use render::{RenderContext, Renderer, TemplateRenderer, escape_html, markdown_to_html};
