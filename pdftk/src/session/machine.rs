//! The argument state machine.
//!
//! Tokens are consumed left to right. Each state decides whether a token
//! is data for that state or a keyword that moves the machine on. Inputs
//! are opened on the first page-range token (ranges need page counts) or
//! at the end of input, so a bad password or missing file is reported
//! before any output is written.

use std::collections::BTreeMap;

use super::keywords::Keyword;
use super::{FilterOptions, Operation, Overlay, Session};
use crate::config::{
    Compression, EncryptionStrength, GlobalConfig, IdPolicy, OutputOptions, Permission,
    Promptable,
};
use crate::error::{PdftkError, Result};
use crate::io::ReaderPool;
use crate::output::OutputFormatter;
use crate::pages::{PageRange, PageRangeResolver, PageRef, Rotation};
use crate::prompt::Prompter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InputFiles,
    InputPasswords,
    PageSequence,
    FormDataFilename,
    AttachFileFilename,
    AttachFilePageNumber,
    UpdateInfoFilename,
    BackgroundFilename,
    StampFilename,
    Output,
    OutputFilename,
    OutputArgs,
    OutputOwnerPw,
    OutputUserPw,
    OutputUserPerms,
}

/// Split `HANDLE=value`; the handle must be a non-empty run of `A-Z`.
fn split_handle(token: &str) -> (Option<&str>, &str) {
    match token.split_once('=') {
        Some((handle, value))
            if !handle.is_empty() && handle.bytes().all(|b| b.is_ascii_uppercase()) =>
        {
            (Some(handle), value)
        }
        _ => (None, token),
    }
}

/// Consumes command-line tokens and produces a [`Session`].
pub struct ArgumentStateMachine<'p> {
    config: GlobalConfig,
    prompter: &'p mut dyn Prompter,
    state: State,
    operation: Option<Operation>,
    pool: ReaderPool,
    handles: BTreeMap<String, usize>,
    labeled_passwords: Option<bool>,
    next_password: usize,
    inputs_opened: bool,
    page_sequences: Vec<Vec<PageRef>>,
    rotations: BTreeMap<u32, (Rotation, bool)>,
    whole_inputs: Vec<usize>,
    partial_ranges: bool,
    filter: FilterOptions,
    multi_overlay: bool,
    output: Option<Promptable>,
    options: OutputOptions,
    permissions_given: bool,
}

impl<'p> ArgumentStateMachine<'p> {
    /// Create a machine in the input-files state.
    pub fn new(config: GlobalConfig, prompter: &'p mut dyn Prompter) -> Self {
        Self {
            config,
            prompter,
            state: State::InputFiles,
            operation: None,
            pool: ReaderPool::new(),
            handles: BTreeMap::new(),
            labeled_passwords: None,
            next_password: 0,
            inputs_opened: false,
            page_sequences: Vec::new(),
            rotations: BTreeMap::new(),
            whole_inputs: Vec::new(),
            partial_ranges: false,
            filter: FilterOptions::default(),
            multi_overlay: false,
            output: None,
            options: OutputOptions::default(),
            permissions_given: false,
        }
    }

    /// Consume every token and build the session.
    ///
    /// On failure the inputs are dropped and, in verbose mode, the partial
    /// session is printed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error met; nothing has been written at that point.
    pub fn run<S: AsRef<str>>(mut self, tokens: &[S]) -> Result<Session> {
        let parsed = tokens
            .iter()
            .try_for_each(|token| self.consume(token.as_ref()))
            .and_then(|()| self.finish());

        if let Err(err) = parsed {
            self.abort(&err);
            return Err(err);
        }

        let mut session = Session {
            operation: self.operation.unwrap_or(Operation::Filter),
            pool: self.pool,
            page_sequences: self.page_sequences,
            filter: self.filter,
            output: self.output,
            options: self.options,
            config: self.config,
            merge_bookmarks: false,
        };
        session.merge_bookmarks =
            merge_eligible(&session, &self.whole_inputs, self.partial_ranges);

        let formatter = OutputFormatter::from_config(&session.config);
        if let Err(err) = session.validate() {
            formatter.debug(&format!("Session at failure:\n{}", session.describe()));
            return Err(err);
        }
        formatter.debug(&format!("Session:\n{}", session.describe()));
        Ok(session)
    }

    fn abort(&mut self, err: &PdftkError) {
        log::debug!("argument parse failed in state {:?}: {err}", self.state);
        let formatter = OutputFormatter::from_config(&self.config);
        formatter.debug(&format!(
            "Session at failure:\n{}",
            super::describe(
                self.operation,
                &self.pool,
                &self.page_sequences,
                &self.filter,
                self.output.as_ref(),
                &self.options,
                &self.config,
                false,
            )
        ));
        self.pool.clear();
    }

    fn consume(&mut self, token: &str) -> Result<()> {
        // Output passwords are taken verbatim, even if they look like keywords.
        match self.state {
            State::OutputOwnerPw => return self.output_password(token, true),
            State::OutputUserPw => return self.output_password(token, false),
            _ => {}
        }

        let keyword = Keyword::classify(token);
        if keyword.is_some_and(|k| k.is_global()) {
            return Ok(());
        }
        log::trace!("state {:?}: token {token:?} ({keyword:?})", self.state);

        match (self.state, keyword) {
            (State::InputFiles, None) => self.input_file(token),
            (State::InputFiles, Some(Keyword::InputPw)) => {
                self.state = State::InputPasswords;
                Ok(())
            }
            (State::InputPasswords, None) => self.input_password(token),
            (State::PageSequence, None) => self.page_range(token),
            (State::FormDataFilename, None) => {
                self.filter.fill_form = Some(Promptable::from_token(token));
                self.state = State::Output;
                Ok(())
            }
            (State::AttachFileFilename, None) => {
                self.filter.attachments.push(Promptable::from_token(token));
                Ok(())
            }
            (State::AttachFileFilename, Some(_)) if self.filter.attachments.is_empty() => {
                Err(PdftkError::usage(format!(
                    "Expected a filename after attach_files, found the keyword {token}"
                )))
            }
            (State::AttachFileFilename, Some(Keyword::ToPage)) => {
                self.state = State::AttachFilePageNumber;
                Ok(())
            }
            (State::AttachFilePageNumber, None) => self.attach_page(token),
            (State::UpdateInfoFilename, None) => {
                self.filter.update_info = Some(Promptable::from_token(token));
                self.state = State::Output;
                Ok(())
            }
            (State::BackgroundFilename, None) => {
                self.filter.background = Some(self.overlay(token));
                self.state = State::Output;
                Ok(())
            }
            (State::StampFilename, None) => {
                self.filter.stamp = Some(self.overlay(token));
                self.state = State::Output;
                Ok(())
            }
            (State::Output, None) => Err(PdftkError::usage(format!(
                "Unexpected data: {token}. Expected the output keyword"
            ))),
            (State::OutputFilename, None) => {
                self.output = Some(Promptable::from_token(token));
                self.state = State::OutputArgs;
                Ok(())
            }
            (State::OutputFilename, Some(_)) => Err(PdftkError::usage(format!(
                "Missing filename after output, found the keyword {token}"
            ))),
            (State::OutputArgs, None) => Err(PdftkError::usage(format!(
                "Unexpected data after the output filename: {token}"
            ))),
            (State::OutputArgs, Some(keyword)) => self.output_option(keyword, token),
            (State::OutputUserPerms, None) => {
                let perm = Permission::from_keyword(token).ok_or_else(|| {
                    PdftkError::usage(format!("Unknown permission after allow: {token}"))
                })?;
                self.options.permissions.grant(perm);
                Ok(())
            }
            (State::OutputUserPerms, Some(keyword)) => {
                self.state = State::OutputArgs;
                self.output_option(keyword, token)
            }
            (
                State::FormDataFilename
                | State::AttachFilePageNumber
                | State::UpdateInfoFilename
                | State::BackgroundFilename
                | State::StampFilename,
                Some(_),
            ) => Err(PdftkError::usage(format!(
                "Missing argument before the keyword {token}"
            ))),
            (_, Some(keyword)) => self.transition(keyword, token),
            (State::OutputOwnerPw | State::OutputUserPw, None) => {
                Err(PdftkError::internal("output password state reached keyword dispatch"))
            }
        }
    }

    /// Keywords that may end the input, password, page-range and
    /// attachment states.
    fn transition(&mut self, keyword: Keyword, token: &str) -> Result<()> {
        if keyword.is_operation() {
            return self.select_operation(keyword, token);
        }
        match keyword {
            Keyword::Output => {
                self.state = State::OutputFilename;
                Ok(())
            }
            _ => Err(PdftkError::usage(format!("Unexpected keyword: {token}"))),
        }
    }

    fn select_operation(&mut self, keyword: Keyword, token: &str) -> Result<()> {
        if let Some(existing) = self.operation {
            return Err(PdftkError::usage(format!(
                "Only one operation may be given; found {token} after {}",
                existing.name()
            )));
        }

        let (operation, next) = match keyword {
            Keyword::Cat => (Operation::Cat, State::PageSequence),
            Keyword::Shuffle => (Operation::Shuffle, State::PageSequence),
            Keyword::Rotate => (Operation::Rotate, State::PageSequence),
            Keyword::Burst => (Operation::Burst, State::Output),
            Keyword::Filter => (Operation::Filter, State::Output),
            Keyword::DumpData => (Operation::DumpData { utf8: false }, State::Output),
            Keyword::DumpDataUtf8 => (Operation::DumpData { utf8: true }, State::Output),
            Keyword::DumpDataFields => (Operation::DumpDataFields { utf8: false }, State::Output),
            Keyword::DumpDataFieldsUtf8 => {
                (Operation::DumpDataFields { utf8: true }, State::Output)
            }
            Keyword::DumpDataAnnots => (Operation::DumpDataAnnots, State::Output),
            Keyword::GenerateFdf => (Operation::GenerateFdf, State::Output),
            Keyword::UnpackFiles => (Operation::UnpackFiles, State::Output),
            Keyword::FillForm => (Operation::Filter, State::FormDataFilename),
            Keyword::AttachFiles => (Operation::Filter, State::AttachFileFilename),
            Keyword::UpdateInfo | Keyword::UpdateInfoUtf8 => {
                self.filter.update_info_utf8 = keyword == Keyword::UpdateInfoUtf8;
                (Operation::Filter, State::UpdateInfoFilename)
            }
            Keyword::Background | Keyword::MultiBackground => {
                self.multi_overlay = keyword == Keyword::MultiBackground;
                (Operation::Filter, State::BackgroundFilename)
            }
            Keyword::Stamp | Keyword::MultiStamp => {
                self.multi_overlay = keyword == Keyword::MultiStamp;
                (Operation::Filter, State::StampFilename)
            }
            _ => {
                return Err(PdftkError::internal(format!(
                    "{token} is not an operation keyword"
                )));
            }
        };

        log::debug!("operation {} selected", operation.name());
        self.operation = Some(operation);
        if next == State::PageSequence {
            self.open_inputs()?;
        }
        self.state = next;
        Ok(())
    }

    fn input_file(&mut self, token: &str) -> Result<()> {
        let (handle, source) = split_handle(token);
        if source.is_empty() {
            return Err(PdftkError::usage(format!("Missing filename in {token}")));
        }

        if let Some(handle) = handle
            && self.handles.contains_key(handle)
        {
            return Err(PdftkError::usage(format!(
                "Handle {handle} was assigned to more than one input file"
            )));
        }

        let index = self
            .pool
            .register(Promptable::from_token(source), handle.map(str::to_string));
        if let Some(handle) = handle {
            self.handles.insert(handle.to_string(), index);
        }
        log::debug!("input {index}: {source} (handle {handle:?})");
        Ok(())
    }

    fn input_password(&mut self, token: &str) -> Result<()> {
        let (handle, password) = split_handle(token);
        let labeled = handle.is_some();

        match self.labeled_passwords {
            Some(previous) if previous != labeled => {
                return Err(PdftkError::usage(
                    "Input passwords must either all be assigned to handles (A=pw) \
                     or all be given in input order",
                ));
            }
            _ => self.labeled_passwords = Some(labeled),
        }

        let index = match handle {
            Some(handle) => *self.handles.get(handle).ok_or_else(|| {
                PdftkError::usage(format!(
                    "Handle {handle} in input_pw was not assigned to an input file"
                ))
            })?,
            None => {
                let index = self.next_password;
                if index >= self.pool.len() {
                    return Err(PdftkError::usage(
                        "More input passwords were given than input files",
                    ));
                }
                self.next_password += 1;
                index
            }
        };

        if self.pool.inputs()[index].has_password() {
            return Err(PdftkError::usage(format!(
                "More than one password was given for input {}",
                self.pool.inputs()[index].source
            )));
        }
        self.pool.set_password(index, Promptable::from_token(password))
    }

    fn page_range(&mut self, token: &str) -> Result<()> {
        let resolver = PageRangeResolver::new(&self.handles);
        let pool = &self.pool;
        let range = resolver.resolve(token, |index| pool.page_count(index))?;
        log::debug!("range {token} -> {range:?}");

        if self.operation == Some(Operation::Rotate) {
            if range.input != 0 {
                return Err(PdftkError::usage(format!(
                    "The rotate operation takes pages from the first input only: {token}"
                )));
            }
            if let Some(rotation) = range.rotation {
                for page in range.pages() {
                    self.rotations.insert(page, rotation);
                }
            }
            return Ok(());
        }

        if range.full_document {
            self.whole_inputs.push(range.input);
        } else {
            self.partial_ranges = true;
        }
        let refs = range.claim(&mut self.pool)?;
        self.page_sequences.push(refs);
        Ok(())
    }

    fn attach_page(&mut self, token: &str) -> Result<()> {
        let page = Promptable::from_token(token);
        if let Promptable::Given(value) = &page {
            match value.parse::<u32>() {
                Ok(n) if n > 0 => {}
                _ => {
                    return Err(PdftkError::usage(format!(
                        "Invalid page number after to_page: {token}"
                    )));
                }
            }
        }
        self.filter.attach_to_page = Some(page);
        self.state = State::Output;
        Ok(())
    }

    fn overlay(&self, token: &str) -> Overlay {
        Overlay {
            source: Promptable::from_token(token),
            multi: self.multi_overlay,
        }
    }

    fn output_option(&mut self, keyword: Keyword, token: &str) -> Result<()> {
        match keyword {
            Keyword::Encrypt40Bit => self.options.encryption = Some(EncryptionStrength::Rc4_40),
            Keyword::Encrypt128Bit => {
                self.options.encryption = Some(EncryptionStrength::Rc4_128);
            }
            Keyword::OwnerPw => self.state = State::OutputOwnerPw,
            Keyword::UserPw => self.state = State::OutputUserPw,
            Keyword::Allow => {
                self.permissions_given = true;
                self.state = State::OutputUserPerms;
            }
            Keyword::Compress => self.options.compression = Compression::Compress,
            Keyword::Uncompress => self.options.compression = Compression::Uncompress,
            Keyword::Flatten => self.options.flatten = true,
            Keyword::NeedAppearances => self.options.need_appearances = true,
            Keyword::DropXfa => self.options.drop_xfa = true,
            Keyword::DropXmp => self.options.drop_xmp = true,
            Keyword::KeepFirstId => self.options.id_policy = IdPolicy::KeepFirst,
            Keyword::KeepFinalId => self.options.id_policy = IdPolicy::KeepFinal,
            _ => {
                return Err(PdftkError::usage(format!(
                    "Unexpected keyword after the output filename: {token}"
                )));
            }
        }
        Ok(())
    }

    fn output_password(&mut self, token: &str, owner: bool) -> Result<()> {
        let password = Promptable::from_token(token);
        if owner {
            self.options.owner_pw = Some(password);
        } else {
            self.options.user_pw = Some(password);
        }
        OutputOptions::check_passwords(
            self.options.owner_pw.as_ref().and_then(Promptable::given),
            self.options.user_pw.as_ref().and_then(Promptable::given),
        )?;
        self.state = State::OutputArgs;
        Ok(())
    }

    fn open_inputs(&mut self) -> Result<()> {
        if self.inputs_opened {
            return Ok(());
        }
        if self.pool.is_empty() {
            return Err(PdftkError::usage("No input files were given"));
        }
        for index in 0..self.pool.len() {
            self.pool.open(index, &self.config, &mut *self.prompter)?;
        }
        self.inputs_opened = true;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let missing = match self.state {
            State::OutputFilename => Some("a filename after output"),
            State::OutputOwnerPw => Some("a password after owner_pw"),
            State::OutputUserPw => Some("a password after user_pw"),
            State::FormDataFilename => Some("an FDF filename after fill_form"),
            State::AttachFileFilename if self.filter.attachments.is_empty() => {
                Some("a filename after attach_files")
            }
            State::AttachFilePageNumber => Some("a page number after to_page"),
            State::UpdateInfoFilename => Some("a filename after update_info"),
            State::BackgroundFilename => Some("a PDF filename after background"),
            State::StampFilename => Some("a PDF filename after stamp"),
            _ => None,
        };
        if let Some(missing) = missing {
            return Err(PdftkError::usage(format!("Expected {missing}")));
        }

        let operation = match self.operation {
            Some(operation) => operation,
            None if self.pool.len() > 1 => Operation::Cat,
            None => Operation::Filter,
        };
        self.operation = Some(operation);
        self.open_inputs()?;

        match operation {
            Operation::Rotate => {
                let count = self.pool.page_count(0)?;
                let sequence = (1..=count)
                    .map(|page| {
                        self.pool.claim(0, page)?;
                        let (rotation, absolute) = self
                            .rotations
                            .get(&page)
                            .copied()
                            .unwrap_or((Rotation::North, false));
                        Ok(PageRef {
                            input: 0,
                            page,
                            rotation,
                            absolute,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.page_sequences = vec![sequence];
            }
            Operation::Cat | Operation::Shuffle if self.page_sequences.is_empty() => {
                for index in 0..self.pool.len() {
                    let range = PageRange::whole(index, self.pool.page_count(index)?);
                    self.whole_inputs.push(index);
                    let refs = range.claim(&mut self.pool)?;
                    self.page_sequences.push(refs);
                }
            }
            _ => {}
        }

        let wants_encryption = self.options.owner_pw.is_some()
            || self.options.user_pw.is_some()
            || self.permissions_given;
        if wants_encryption && self.options.encryption.is_none() {
            self.options.encryption = Some(EncryptionStrength::Rc4_128);
        }

        Ok(())
    }
}

/// Outlines are merged only when every input is used whole, exactly once.
fn merge_eligible(session: &Session, whole_inputs: &[usize], partial_ranges: bool) -> bool {
    if session.operation != Operation::Cat || partial_ranges {
        return false;
    }
    let mut used = whole_inputs.to_vec();
    used.sort_unstable();
    used == (0..session.pool.len()).collect::<Vec<_>>()
}
