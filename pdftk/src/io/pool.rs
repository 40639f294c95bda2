//! Reader pool: independent copies of each input document.
//!
//! The same page can appear several times in one output (`cat A A`, or a
//! range that overlaps another). Import applies per-page mutations such as
//! rotation, so two emissions of one page must not share a page object.
//! Each input therefore owns a list of [`ReaderInstance`]s, and every
//! instance tracks the page numbers it has already promised to the output.
//! A page is claimed on the first instance that has not claimed it yet; if
//! every instance already holds it, another copy is opened.

use lopdf::Document;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::{GlobalConfig, Promptable};
use crate::error::{PdftkError, Result};
use crate::io::reader::PdfReader;
use crate::prompt::Prompter;

/// Identifies one reader instance across all inputs.
pub type ReaderId = usize;

/// One opened copy of an input document.
#[derive(Debug)]
pub struct ReaderInstance {
    id: ReaderId,
    document: Document,
    claimed: BTreeSet<u32>,
}

impl ReaderInstance {
    fn new(id: ReaderId, document: Document) -> Self {
        Self {
            id,
            document,
            claimed: BTreeSet::new(),
        }
    }

    /// Pool-wide identifier of this instance.
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// The opened document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for per-output page mutations.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// True if this instance has promised `page` to the output.
    pub fn has_claimed(&self, page: u32) -> bool {
        self.claimed.contains(&page)
    }
}

/// An input PDF named on the command line.
#[derive(Debug, Serialize)]
pub struct InputDocument {
    /// File name as given, or the `PROMPT` sentinel.
    pub source: Promptable,
    /// Handle assigned with `HANDLE=file`.
    pub handle: Option<String>,
    /// Page count, known once opened.
    pub page_count: Option<u32>,
    /// The file carried an encryption dictionary.
    pub encrypted: bool,
    /// The document was opened (decrypted if needed).
    pub authorized: bool,
    #[serde(skip)]
    password: Option<Promptable>,
    #[serde(skip)]
    resolved_source: Option<String>,
    #[serde(skip)]
    resolved_password: Option<String>,
    #[serde(skip)]
    instances: Vec<ReaderInstance>,
}

impl InputDocument {
    fn new(source: Promptable, handle: Option<String>) -> Self {
        Self {
            source,
            handle,
            page_count: None,
            encrypted: false,
            authorized: false,
            password: None,
            resolved_source: None,
            resolved_password: None,
            instances: Vec::new(),
        }
    }

    /// The file name this input was read from, once resolved.
    pub fn path(&self) -> Option<&str> {
        self.resolved_source
            .as_deref()
            .or_else(|| self.source.given())
    }

    /// True once at least one reader instance exists.
    pub fn is_open(&self) -> bool {
        !self.instances.is_empty()
    }

    /// True if a password was supplied with `input_pw`.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Number of opened reader instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Per-input collections of reader instances.
#[derive(Debug, Default)]
pub struct ReaderPool {
    reader: PdfReader,
    inputs: Vec<InputDocument>,
    next_id: ReaderId,
}

impl ReaderPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input document and return its index.
    pub fn register(&mut self, source: Promptable, handle: Option<String>) -> usize {
        self.inputs.push(InputDocument::new(source, handle));
        self.inputs.len() - 1
    }

    /// Attach an input password to a registered document.
    pub fn set_password(&mut self, index: usize, password: Promptable) -> Result<()> {
        self.input_mut(index)?.password = Some(password);
        Ok(())
    }

    /// All registered inputs, in command-line order.
    pub fn inputs(&self) -> &[InputDocument] {
        &self.inputs
    }

    /// Number of registered inputs.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// True if no input has been registered.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Drop every input. Used when a parse fails part way.
    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    /// The shared source reader, for auxiliary files such as FDF data.
    pub fn reader_mut(&mut self) -> &mut PdfReader {
        &mut self.reader
    }

    fn input(&self, index: usize) -> Result<&InputDocument> {
        self.inputs
            .get(index)
            .ok_or_else(|| PdftkError::internal(format!("no input document at index {index}")))
    }

    fn input_mut(&mut self, index: usize) -> Result<&mut InputDocument> {
        self.inputs
            .get_mut(index)
            .ok_or_else(|| PdftkError::internal(format!("no input document at index {index}")))
    }

    /// Open the first reader instance of an input.
    ///
    /// `PROMPT` file names and passwords are asked for here. In ask mode a
    /// rejected password is asked for again until it works or the user
    /// enters an empty line.
    ///
    /// # Errors
    ///
    /// Returns the load or credential error if the document cannot be opened.
    pub fn open(
        &mut self,
        index: usize,
        config: &GlobalConfig,
        prompter: &mut dyn Prompter,
    ) -> Result<()> {
        if self.input(index)?.is_open() {
            return Ok(());
        }

        let source = match &self.input(index)?.source {
            Promptable::Given(source) => source.clone(),
            Promptable::Prompt => {
                prompter.ask("Please enter a filename for an input document:\n")?
            }
        };
        let mut password = match &self.input(index)?.password {
            Some(Promptable::Given(password)) => Some(password.clone()),
            Some(Promptable::Prompt) => Some(prompter.ask(&format!(
                "Please enter the password to use on PDF {source}:\n"
            ))?),
            None => None,
        };

        let loaded = loop {
            match self.reader.load(&source, password.as_deref()) {
                Ok(loaded) => break loaded,
                Err(err) if err.is_credential() && config.may_ask() => {
                    let answer = prompter.ask(&format!(
                        "The password you supplied for the input PDF:\n   {source}\n   \
                         did not work.  This PDF is encrypted, and you must supply the\n   \
                         owner or the user password to open it. To quit, enter a blank\n   \
                         password at the next prompt.\n\
                         Please enter the password to use on PDF {source}:\n"
                    ))?;
                    if answer.is_empty() {
                        return Err(err);
                    }
                    password = Some(answer);
                }
                Err(err) => return Err(err),
            }
        };

        log::debug!(
            "opened input {index} ({source}): {} pages, encrypted: {}",
            loaded.page_count,
            loaded.encrypted
        );

        let id = self.next_id;
        self.next_id += 1;

        let input = self.input_mut(index)?;
        input.page_count = Some(loaded.page_count);
        input.encrypted = loaded.encrypted;
        input.authorized = true;
        input.resolved_source = Some(source);
        input.resolved_password = password;
        input.instances.push(ReaderInstance::new(id, loaded.document));
        Ok(())
    }

    /// Page count of an opened input.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the input has not been opened.
    pub fn page_count(&self, index: usize) -> Result<u32> {
        self.input(index)?
            .page_count
            .ok_or_else(|| PdftkError::internal(format!("input {index} read before it was opened")))
    }

    /// Claim `page` of input `index` on the first instance that has not
    /// claimed it yet, opening a new instance if needed.
    ///
    /// # Errors
    ///
    /// Returns `Internal Error: unable to add reader` if another copy of the
    /// document cannot be opened.
    pub fn claim(&mut self, index: usize, page: u32) -> Result<ReaderId> {
        let input = self.input_mut(index)?;
        if !input.is_open() {
            return Err(PdftkError::internal(format!(
                "page {page} of input {index} claimed before it was opened"
            )));
        }

        if let Some(instance) = input.instances.iter_mut().find(|i| !i.has_claimed(page)) {
            instance.claimed.insert(page);
            return Ok(instance.id);
        }

        let source = input.resolved_source.clone().unwrap_or_default();
        let password = input.resolved_password.clone();
        let loaded = self
            .reader
            .load(&source, password.as_deref())
            .map_err(|err| {
                log::warn!("failed to open another copy of {source}: {err}");
                PdftkError::internal("unable to add reader")
            })?;

        let id = self.next_id;
        self.next_id += 1;
        log::debug!("opened reader instance {id} for input {index} (page {page})");

        let mut instance = ReaderInstance::new(id, loaded.document);
        instance.claimed.insert(page);
        self.input_mut(index)?.instances.push(instance);
        Ok(id)
    }

    /// Remove the claim on `page` and return the instance that held it.
    ///
    /// The assembler mutates the returned instance (rotation) and imports
    /// the page from it.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no instance claims the page.
    pub fn release(&mut self, index: usize, page: u32) -> Result<&mut ReaderInstance> {
        let input = self.input_mut(index)?;
        let instance = input
            .instances
            .iter_mut()
            .find(|i| i.has_claimed(page))
            .ok_or_else(|| {
                PdftkError::internal(format!(
                    "no reader claims page {page} of input {index}"
                ))
            })?;
        instance.claimed.remove(&page);
        Ok(instance)
    }

    /// The first opened copy of an input, for read-only use.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the input has not been opened.
    pub fn document(&self, index: usize) -> Result<&Document> {
        self.input(index)?
            .instances
            .first()
            .map(ReaderInstance::document)
            .ok_or_else(|| PdftkError::internal(format!("input {index} read before it was opened")))
    }

    /// Take the first opened copy of an input out of the pool.
    ///
    /// Whole-document operations (filter, burst) work on this copy directly.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the input has not been opened.
    pub fn take_document(&mut self, index: usize) -> Result<Document> {
        let input = self.input_mut(index)?;
        if input.instances.is_empty() {
            return Err(PdftkError::internal(format!(
                "input {index} read before it was opened"
            )));
        }
        Ok(input.instances.remove(0).document)
    }
}
