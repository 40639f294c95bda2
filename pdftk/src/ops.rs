//! Executing a parsed session.
//!
//! [`run`] parses the command line and hands the session to [`execute`],
//! which dispatches on the operation, applies filter actions and output
//! options, and writes documents or reports.

use lopdf::{Document, Object, StringFormat};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::assemble::attachments::{Attachment, attach_files, embedded_files};
use crate::assemble::overlay::{OverlayKind, apply_overlay};
use crate::assemble::{assembler, forms, metadata};
use crate::config::{GlobalConfig, IdPolicy, OutputOptions, Promptable, STDIO};
use crate::error::{PdftkError, Result};
use crate::io::{EncryptionSettings, OutputTarget, PdfWriter, ReaderPool, WriteOptions};
use crate::output::{OutputFormatter, display_warnings, display_write_statistics};
use crate::prompt::Prompter;
use crate::report::{DocumentData, FdfData, generate_fdf, render_annots, render_fields};
use crate::session::{FilterOptions, Operation, Session};

/// Default `burst` output pattern.
pub const DEFAULT_BURST_PATTERN: &str = "pg_%04d.pdf";

/// Report written next to burst pages.
pub const BURST_REPORT: &str = "doc_data.txt";

/// Parse `tokens` and execute the resulting session.
///
/// # Errors
///
/// Returns the first parse, load, assembly or write error.
pub async fn run<S: AsRef<str>>(tokens: &[S], prompter: &mut dyn Prompter) -> Result<()> {
    let config = GlobalConfig::prescan(tokens);
    let formatter = OutputFormatter::from_config(&config);
    let session = Session::parse(tokens, prompter)?;
    execute(session, &formatter, prompter).await
}

/// Execute a parsed session.
///
/// # Errors
///
/// Returns a usage error if the session fails validation, or the first
/// assembly or write error.
pub async fn execute(
    mut session: Session,
    formatter: &OutputFormatter,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    session.validate()?;
    if formatter.is_verbose() {
        formatter.section("Command");
        formatter.info(&session.describe());
    }

    let output = match session.output.take() {
        Some(Promptable::Given(output)) => Some(output),
        Some(Promptable::Prompt) => Some(prompter.ask("Please enter a name for the output:\n")?),
        None => None,
    };
    let file_id = kept_file_id(&session.pool, session.options.id_policy);
    let config = session.config;

    match session.operation {
        Operation::DumpData { utf8 } => {
            let report = DocumentData::from_document(session.pool.document(0)?).render(utf8);
            write_report(output.as_deref(), report.as_bytes(), &config, prompter).await
        }
        Operation::DumpDataFields { utf8 } => {
            let report = render_fields(session.pool.document(0)?, utf8);
            write_report(output.as_deref(), report.as_bytes(), &config, prompter).await
        }
        Operation::DumpDataAnnots => {
            let report = render_annots(session.pool.document(0)?);
            write_report(output.as_deref(), report.as_bytes(), &config, prompter).await
        }
        Operation::GenerateFdf => {
            let fdf = generate_fdf(session.pool.document(0)?)?;
            write_report(output.as_deref(), &fdf, &config, prompter).await
        }
        Operation::UnpackFiles => {
            let directory = match output.as_deref() {
                None | Some(STDIO) => PathBuf::from("."),
                Some(dir) => PathBuf::from(dir),
            };
            unpack(session.pool.document(0)?, &directory, &config, formatter, prompter).await
        }
        Operation::Burst => {
            let pattern = output.unwrap_or_else(|| DEFAULT_BURST_PATTERN.to_string());
            burst(&mut session, &pattern, file_id, formatter, prompter).await
        }
        Operation::Cat | Operation::Shuffle | Operation::Rotate | Operation::Filter => {
            let output = output
                .ok_or_else(|| PdftkError::internal("output missing after validation"))?;
            let mut doc = match session.operation {
                Operation::Cat => assembler::cat(
                    &mut session.pool,
                    &session.page_sequences,
                    session.merge_bookmarks,
                )?,
                Operation::Shuffle => {
                    assembler::shuffle(&mut session.pool, &session.page_sequences)?
                }
                Operation::Rotate => {
                    let sequence = session.page_sequences.first().cloned().unwrap_or_default();
                    assembler::rotate(&mut session.pool, &sequence)?
                }
                _ => {
                    let mut doc = session.pool.take_document(0)?;
                    apply_filter(&mut doc, &session.filter, &mut session.pool, formatter, prompter)?;
                    doc
                }
            };

            apply_output_options(&mut doc, &session.options)?;
            let options = write_options(&session.options, file_id, prompter)?;
            let target = OutputTarget::from_token(&output);
            confirm_overwrite(target.path(), &config, prompter)?;

            let stats = PdfWriter::with_options(options)
                .save_with_stats(doc, &target)
                .await?;
            display_write_statistics(formatter, &stats);
            Ok(())
        }
    }
}

/// The identifier of the first or last input, for `keep_*_id`.
fn kept_file_id(pool: &ReaderPool, policy: IdPolicy) -> Option<Object> {
    let index = match policy {
        IdPolicy::Fresh => return None,
        IdPolicy::KeepFirst => 0,
        IdPolicy::KeepFinal => pool.len().checked_sub(1)?,
    };
    let (first, second) = metadata::file_id(pool.document(index).ok()?)?;
    Some(Object::Array(vec![
        Object::String(first, StringFormat::Hexadecimal),
        Object::String(second, StringFormat::Hexadecimal),
    ]))
}

/// Resolve a `PROMPT` value with `question`.
fn resolve(value: &Promptable, question: &str, prompter: &mut dyn Prompter) -> Result<String> {
    match value {
        Promptable::Given(value) => Ok(value.clone()),
        Promptable::Prompt => prompter.ask(question),
    }
}

/// In ask mode, an existing output file is only replaced after the user
/// agrees. In dont_ask mode it is replaced silently.
fn confirm_overwrite(
    path: Option<&Path>,
    config: &GlobalConfig,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if !path.exists() || !config.may_ask() {
        return Ok(());
    }

    let question = format!(
        "Warning: the output file {} already exists. Overwrite?",
        path.display()
    );
    if prompter.confirm(&question)? {
        Ok(())
    } else {
        Err(PdftkError::output_exists(path))
    }
}

/// Apply the form and metadata output options.
fn apply_output_options(doc: &mut Document, options: &OutputOptions) -> Result<()> {
    if options.drop_xfa && forms::drop_xfa(doc)? {
        log::debug!("dropped XFA form data");
    }
    if options.drop_xmp && forms::drop_xmp(doc)? {
        log::debug!("dropped XMP metadata stream");
    }
    if options.flatten {
        forms::flatten(doc)?;
    } else if options.need_appearances {
        forms::need_appearances(doc)?;
    }
    Ok(())
}

/// Writer options with passwords resolved and checked.
fn write_options(
    options: &OutputOptions,
    file_id: Option<Object>,
    prompter: &mut dyn Prompter,
) -> Result<WriteOptions> {
    let encryption = match options.encryption {
        Some(strength) => {
            let owner = options
                .owner_pw
                .as_ref()
                .map(|pw| {
                    resolve(
                        pw,
                        "Please enter the owner password to use on the output PDF.\n   \
                         It can be empty, or have a maximum of 32 characters:\n",
                        prompter,
                    )
                })
                .transpose()?;
            let user = options
                .user_pw
                .as_ref()
                .map(|pw| {
                    resolve(
                        pw,
                        "Please enter the user password to use on the output PDF.\n   \
                         It can be empty, or have a maximum of 32 characters:\n",
                        prompter,
                    )
                })
                .transpose()?;
            OutputOptions::check_passwords(owner.as_deref(), user.as_deref())?;

            Some(EncryptionSettings {
                strength,
                owner_password: owner.unwrap_or_default(),
                user_password: user.unwrap_or_default(),
                permissions: options.permissions,
            })
        }
        None => None,
    };

    Ok(WriteOptions {
        compression: options.compression,
        encryption,
        file_id,
        ..WriteOptions::default()
    })
}

/// Apply filter actions in order: form data, metadata, attachments, then
/// background and stamp.
fn apply_filter(
    doc: &mut Document,
    filter: &FilterOptions,
    pool: &mut ReaderPool,
    formatter: &OutputFormatter,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    if let Some(source) = &filter.fill_form {
        let source = resolve(source, "Please enter a filename for the form data:\n", prompter)?;
        let bytes = pool.reader_mut().read_bytes(&source)?;
        let data = FdfData::parse(&source, &bytes)?;
        let report = forms::fill_form(doc, &data)?;
        for name in &report.unmatched {
            formatter.debug(&format!("form data names an unknown field: {name}"));
        }
        formatter.info(&format!("Filled {} form field(s)", report.filled));
    }

    if let Some(source) = &filter.update_info {
        let source = resolve(source, "Please enter a filename for the info data:\n", prompter)?;
        let bytes = pool.reader_mut().read_bytes(&source)?;
        let text = String::from_utf8_lossy(&bytes);
        let (data, warnings) = DocumentData::parse(&text, filter.update_info_utf8);
        display_warnings(formatter, &warnings);
        data.apply(doc)?;
    }

    if !filter.attachments.is_empty() {
        let mut files = Vec::with_capacity(filter.attachments.len());
        for source in &filter.attachments {
            let source = resolve(source, "Please enter a filename for an attachment:\n", prompter)?;
            let bytes = pool.reader_mut().read_bytes(&source)?;
            files.push(Attachment::from_path(&source, bytes.to_vec()));
        }
        let to_page = match &filter.attach_to_page {
            Some(page) => {
                let page = resolve(page, "Please enter the page number for the attachments:\n", prompter)?;
                Some(page.trim().parse::<u32>().ok().filter(|p| *p > 0).ok_or_else(|| {
                    PdftkError::usage(format!("Invalid to_page page number: {page}"))
                })?)
            }
            None => None,
        };
        attach_files(doc, &files, to_page)?;
        formatter.info(&format!("Attached {} file(s)", files.len()));
    }

    let overlays = [
        (&filter.background, OverlayKind::Background),
        (&filter.stamp, OverlayKind::Stamp),
    ];
    for (overlay, kind) in overlays {
        let Some(overlay) = overlay else {
            continue;
        };
        let source = resolve(
            &overlay.source,
            "Please enter a filename for the overlay PDF:\n",
            prompter,
        )?;
        let loaded = pool.reader_mut().load(&source, None)?;
        apply_overlay(doc, &loaded.document, kind, overlay.multi)?;
    }
    Ok(())
}

/// Write a text or FDF report to stdout (`None` or `-`) or a file.
async fn write_report(
    output: Option<&str>,
    bytes: &[u8],
    config: &GlobalConfig,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    match output {
        None | Some(STDIO) => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
        Some(path) => {
            let path = Path::new(path);
            confirm_overwrite(Some(path), config, prompter)?;
            write_file(path, bytes).await
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| PdftkError::FailedToWrite {
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Write every embedded file into `directory`.
async fn unpack(
    doc: &Document,
    directory: &Path,
    config: &GlobalConfig,
    formatter: &OutputFormatter,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let files = embedded_files(doc);
    if files.is_empty() {
        formatter.info("No attachments found");
        return Ok(());
    }

    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| PdftkError::FailedToCreateOutput {
            path: directory.to_path_buf(),
            source,
        })?;
    for file in &files {
        let path = directory.join(&file.name);
        confirm_overwrite(Some(&path), config, prompter)?;
        write_file(&path, &file.data).await?;
        formatter.info(&format!("Unpacked {}", path.display()));
    }
    Ok(())
}

/// Split input 0 into one file per page, plus the `dump_data` report.
async fn burst(
    session: &mut Session,
    pattern: &str,
    file_id: Option<Object>,
    formatter: &OutputFormatter,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    if pattern == STDIO {
        return Err(PdftkError::usage(
            "The burst operation writes one file per page; it cannot write to stdout",
        ));
    }

    let report = DocumentData::from_document(session.pool.document(0)?).render(false);
    let documents = assembler::burst(&mut session.pool)?;
    let options = write_options(&session.options, file_id, prompter)?;
    let writer = PdfWriter::with_options(options);

    for (index, mut doc) in documents.into_iter().enumerate() {
        apply_output_options(&mut doc, &session.options)?;
        let target = OutputTarget::from_token(&burst_file_name(pattern, index + 1));
        confirm_overwrite(target.path(), &session.config, prompter)?;
        let stats = writer.save_with_stats(doc, &target).await?;
        display_write_statistics(formatter, &stats);
    }

    let report_path = Path::new(pattern)
        .parent()
        .map(|dir| dir.join(BURST_REPORT))
        .unwrap_or_else(|| PathBuf::from(BURST_REPORT));
    write_file(&report_path, report.as_bytes()).await
}

/// Widest page number field a burst pattern may ask for.
const MAX_FIELD_WIDTH: usize = 32;

/// Expand the first printf-style `%d` conversion (with optional zero flag
/// and width) in `pattern`. `%%` is a literal percent sign. Widths above
/// 32 are clamped.
///
/// A pattern without a conversion gets `_%04d` before its extension.
pub fn burst_file_name(pattern: &str, page: usize) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut expanded = false;
    let mut chars = pattern.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek().is_some_and(|(_, next)| *next == '%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = String::new();
        while let Some((_, next)) = chars.peek().copied()
            && next.is_ascii_digit()
        {
            spec.push(next);
            chars.next();
        }
        if !expanded && chars.peek().is_some_and(|(_, next)| *next == 'd') {
            chars.next();
            let width = match spec.parse::<usize>() {
                Ok(width) => width.min(MAX_FIELD_WIDTH),
                Err(_) if spec.is_empty() => 0,
                Err(_) => MAX_FIELD_WIDTH,
            };
            if spec.starts_with('0') {
                out.push_str(&format!("{page:0width$}"));
            } else {
                out.push_str(&format!("{page:width$}"));
            }
            expanded = true;
        } else {
            out.push('%');
            out.push_str(&spec);
        }
    }

    if expanded {
        return out;
    }
    let path = Path::new(&out);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path
            .with_file_name(format!(
                "{}_{page:04}.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{out}_{page:04}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("pg_%04d.pdf", 7, "pg_0007.pdf")]
    #[case("page%d.pdf", 12, "page12.pdf")]
    #[case("p%3d.pdf", 5, "p  5.pdf")]
    #[case("100%%_%d.pdf", 1, "100%_1.pdf")]
    #[case("out/split.pdf", 3, "out/split_0003.pdf")]
    #[case("noext", 2, "noext_0002")]
    fn test_burst_file_name(#[case] pattern: &str, #[case] page: usize, #[case] expected: &str) {
        assert_eq!(burst_file_name(pattern, page), expected);
    }

    #[rstest]
    #[case("pg_%01000000d.pdf")]
    #[case("pg_%099999999999999999999999d.pdf")]
    fn test_burst_field_width_is_clamped(#[case] pattern: &str) {
        let name = burst_file_name(pattern, 7);
        assert_eq!(name, format!("pg_{}7.pdf", "0".repeat(MAX_FIELD_WIDTH - 1)));
    }

    #[test]
    fn test_confirm_overwrite_in_ask_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exists.pdf");
        std::fs::write(&path, b"x").unwrap();

        let ask = GlobalConfig::prescan(&["do_ask"]);
        let mut yes = ScriptedPrompter::new(["y"]);
        assert!(confirm_overwrite(Some(&path), &ask, &mut yes).is_ok());

        let mut no = ScriptedPrompter::new(["n"]);
        let err = confirm_overwrite(Some(&path), &ask, &mut no).unwrap_err();
        assert!(matches!(err, PdftkError::OutputExists { .. }));

        // dont_ask replaces without a question.
        let quiet = GlobalConfig::default();
        let mut silent = ScriptedPrompter::new(Vec::<String>::new());
        assert!(confirm_overwrite(Some(&path), &quiet, &mut silent).is_ok());
        assert!(silent.questions().is_empty());
    }

    #[test]
    fn test_write_options_rejects_equal_passwords() {
        let options = OutputOptions {
            encryption: Some(crate::config::EncryptionStrength::Rc4_128),
            owner_pw: Some(Promptable::Given("same".to_string())),
            user_pw: Some(Promptable::Given("same".to_string())),
            ..OutputOptions::default()
        };
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = write_options(&options, None, &mut prompter).unwrap_err();
        assert!(matches!(err, PdftkError::Usage { .. }));
    }

    #[test]
    fn test_write_options_prompts_for_owner_password() {
        let options = OutputOptions {
            encryption: Some(crate::config::EncryptionStrength::Rc4_40),
            owner_pw: Some(Promptable::Prompt),
            ..OutputOptions::default()
        };
        let mut prompter = ScriptedPrompter::new(["hunter2"]);
        let written = write_options(&options, None, &mut prompter).unwrap();
        let encryption = written.encryption.unwrap();
        assert_eq!(encryption.owner_password, "hunter2");
        assert_eq!(encryption.user_password, "");
        assert_eq!(prompter.questions().len(), 1);
    }
}
