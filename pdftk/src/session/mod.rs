//! The parsed execution plan.
//!
//! A [`Session`] is produced once by the argument state machine and then
//! executed by [`crate::ops`]. Apart from `PROMPT` values, which are asked
//! for when they are used, it does not change after parsing.

pub mod keywords;
pub mod machine;

pub use machine::ArgumentStateMachine;

use serde::Serialize;

use crate::config::{GlobalConfig, OutputOptions, Promptable};
use crate::error::{PdftkError, Result};
use crate::io::{InputDocument, ReaderPool};
use crate::pages::PageRef;
use crate::prompt::Prompter;

/// The single operation a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Concatenate page sequences.
    Cat,
    /// Interleave page sequences.
    Shuffle,
    /// One output file per page.
    Burst,
    /// Rotate selected pages of one document.
    Rotate,
    /// Apply output-side transformations to one document.
    Filter,
    /// Report metadata, bookmarks and page labels.
    DumpData {
        /// Write non-ASCII text as UTF-8 instead of XML entities.
        utf8: bool,
    },
    /// Report form fields.
    DumpDataFields {
        /// Write non-ASCII text as UTF-8 instead of XML entities.
        utf8: bool,
    },
    /// Report link annotations.
    DumpDataAnnots,
    /// Write form field values as FDF.
    GenerateFdf,
    /// Extract attached files.
    UnpackFiles,
}

impl Operation {
    /// Operations that only read their input and write a report.
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            Self::DumpData { .. }
                | Self::DumpDataFields { .. }
                | Self::DumpDataAnnots
                | Self::GenerateFdf
        )
    }

    /// Operations that must be given an output filename.
    pub fn requires_output(&self) -> bool {
        !self.is_report() && !matches!(self, Self::Burst | Self::UnpackFiles)
    }

    /// Operations that take exactly one input document.
    pub fn single_input(&self) -> bool {
        !matches!(self, Self::Cat | Self::Shuffle)
    }

    /// Lowercase command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cat => "cat",
            Self::Shuffle => "shuffle",
            Self::Burst => "burst",
            Self::Rotate => "rotate",
            Self::Filter => "filter",
            Self::DumpData { .. } => "dump_data",
            Self::DumpDataFields { .. } => "dump_data_fields",
            Self::DumpDataAnnots => "dump_data_annots",
            Self::GenerateFdf => "generate_fdf",
            Self::UnpackFiles => "unpack_files",
        }
    }

    /// Operations that take page-range arguments.
    pub fn takes_page_ranges(&self) -> bool {
        matches!(self, Self::Cat | Self::Shuffle | Self::Rotate)
    }
}

/// An overlay PDF placed under or over every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    /// The overlay document.
    pub source: Promptable,
    /// Use overlay page *n* for output page *n* (repeating the last one).
    pub multi: bool,
}

/// Filter actions applied to the single input of a Filter operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// FDF data to fill the form with.
    pub fill_form: Option<Promptable>,
    /// Files to attach.
    pub attachments: Vec<Promptable>,
    /// Attach to this page instead of the document.
    pub attach_to_page: Option<Promptable>,
    /// dump_data file with new metadata.
    pub update_info: Option<Promptable>,
    /// The update_info file is UTF-8 rather than XML-entity encoded.
    pub update_info_utf8: bool,
    /// Background (watermark) document.
    pub background: Option<Overlay>,
    /// Stamp document.
    pub stamp: Option<Overlay>,
}

/// A parsed, validated command.
#[derive(Debug)]
pub struct Session {
    /// The operation to perform.
    pub operation: Operation,
    /// Input documents and their reader instances.
    pub pool: ReaderPool,
    /// One sequence of page references per range token (or per input).
    pub page_sequences: Vec<Vec<PageRef>>,
    /// Filter actions.
    pub filter: FilterOptions,
    /// Output filename, burst pattern or unpack directory.
    pub output: Option<Promptable>,
    /// Output options.
    pub options: OutputOptions,
    /// Global flags from the pre-scan.
    pub config: GlobalConfig,
    /// Merge the inputs' outlines into the output.
    pub merge_bookmarks: bool,
}

#[derive(Serialize)]
struct SessionDump<'a> {
    operation: Option<Operation>,
    inputs: &'a [InputDocument],
    page_sequences: &'a [Vec<PageRef>],
    filter: &'a FilterOptions,
    output: Option<&'a Promptable>,
    options: &'a OutputOptions,
    config: &'a GlobalConfig,
    merge_bookmarks: bool,
}

impl Session {
    /// Parse command-line tokens into a session.
    ///
    /// # Errors
    ///
    /// Returns the first usage, range, credential or I/O error met while
    /// parsing and opening inputs.
    pub fn parse<S: AsRef<str>>(tokens: &[S], prompter: &mut dyn Prompter) -> Result<Self> {
        let config = GlobalConfig::prescan(tokens);
        ArgumentStateMachine::new(config, prompter).run(tokens)
    }

    /// Check the conditions every executable session meets.
    ///
    /// # Errors
    ///
    /// Returns a usage error describing the first unmet condition.
    pub fn validate(&self) -> Result<()> {
        if self.pool.is_empty() {
            return Err(PdftkError::usage("No input files were given"));
        }

        if self.operation.single_input() && self.pool.len() != 1 {
            return Err(PdftkError::usage(format!(
                "The {} operation takes exactly one input PDF; {} were given",
                self.operation_name(),
                self.pool.len()
            )));
        }

        if self.operation.requires_output() && self.output.is_none() {
            return Err(PdftkError::usage(format!(
                "An output filename is required for the {} operation.\n  \
                 Use: output <filename>, or output - for stdout",
                self.operation_name()
            )));
        }

        if !self.operation.is_report()
            && let Some(unopened) = self.pool.inputs().iter().find(|i| !i.authorized)
        {
            return Err(PdftkError::usage(format!(
                "Input PDF was not opened: {}",
                unopened.source
            )));
        }

        if let Some(Promptable::Given(output)) = &self.output
            && output != crate::config::STDIO
            && self.pool.inputs().iter().any(|i| i.path() == Some(output))
        {
            return Err(PdftkError::usage(format!(
                "The output filename may not be the same as an input filename: {output}"
            )));
        }

        Ok(())
    }

    /// Lowercase command name of the operation.
    pub fn operation_name(&self) -> &'static str {
        self.operation.name()
    }

    /// Total number of output pages across all sequences.
    pub fn output_page_count(&self) -> usize {
        self.page_sequences.iter().map(Vec::len).sum()
    }

    /// Pretty JSON description of the session, without passwords.
    pub fn describe(&self) -> String {
        describe(
            Some(self.operation),
            &self.pool,
            &self.page_sequences,
            &self.filter,
            self.output.as_ref(),
            &self.options,
            &self.config,
            self.merge_bookmarks,
        )
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn describe(
    operation: Option<Operation>,
    pool: &ReaderPool,
    page_sequences: &[Vec<PageRef>],
    filter: &FilterOptions,
    output: Option<&Promptable>,
    options: &OutputOptions,
    config: &GlobalConfig,
    merge_bookmarks: bool,
) -> String {
    let dump = SessionDump {
        operation,
        inputs: pool.inputs(),
        page_sequences,
        filter,
        output,
        options,
        config,
        merge_bookmarks,
    };
    serde_json::to_string_pretty(&dump).unwrap_or_else(|err| format!("<unprintable session: {err}>"))
}
