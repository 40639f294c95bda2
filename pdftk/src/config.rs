//! Configuration types for pdftk.
//!
//! Command-line configuration is resolved in two phases. [`GlobalConfig::prescan`]
//! looks at the whole token list once for the flags that change how the rest
//! of the parse behaves (`dont_ask`/`do_ask`, `verbose`), then the session
//! parser consumes the tokens with that configuration in hand.
//!
//! This module also holds the output options collected after the `output`
//! keyword: encryption strength, passwords, permissions and the various
//! output-side switches.

use serde::Serialize;
use std::fmt;

use crate::error::{PdftkError, Result};

/// Sentinel value meaning "ask the user interactively".
pub const PROMPT: &str = "PROMPT";

/// Sentinel value meaning stdin or stdout.
pub const STDIO: &str = "-";

/// Whether pdftk may stop and ask the user questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AskMode {
    /// Prompt for passwords after a failed open and before overwriting files.
    Ask,
    /// Never prompt; overwrite silently and fail on bad credentials.
    #[default]
    DontAsk,
}

/// Flags that must be known before the main argument parse begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GlobalConfig {
    /// Interactive behavior.
    pub ask: AskMode,
    /// Print the parsed session and extra diagnostics.
    pub verbose: bool,
}

impl GlobalConfig {
    /// Scan every token once for global flags.
    ///
    /// The last of `dont_ask`/`do_ask` wins. Matching is case-insensitive,
    /// the same as keyword matching in the main parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdftk::config::{AskMode, GlobalConfig};
    ///
    /// let tokens = ["in.pdf", "cat", "output", "out.pdf", "do_ask", "verbose"];
    /// let config = GlobalConfig::prescan(&tokens);
    /// assert_eq!(config.ask, AskMode::Ask);
    /// assert!(config.verbose);
    /// ```
    pub fn prescan<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut config = Self::default();
        for token in tokens {
            let token = token.as_ref();
            if token.eq_ignore_ascii_case("dont_ask") {
                config.ask = AskMode::DontAsk;
            } else if token.eq_ignore_ascii_case("do_ask") {
                config.ask = AskMode::Ask;
            } else if token.eq_ignore_ascii_case("verbose") {
                config.verbose = true;
            }
        }
        config
    }

    /// True when interactive prompts are allowed.
    pub fn may_ask(&self) -> bool {
        self.ask == AskMode::Ask
    }
}

/// A value that was either given on the command line or must be asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Promptable {
    /// Literal value from the command line.
    Given(String),
    /// The `PROMPT` sentinel.
    Prompt,
}

impl Promptable {
    /// Classify a command-line token.
    pub fn from_token(token: &str) -> Self {
        if token == PROMPT {
            Self::Prompt
        } else {
            Self::Given(token.to_string())
        }
    }

    /// The literal value, if one was given.
    pub fn given(&self) -> Option<&str> {
        match self {
            Self::Given(value) => Some(value),
            Self::Prompt => None,
        }
    }
}

impl fmt::Display for Promptable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Given(value) => f.write_str(value),
            Self::Prompt => f.write_str(PROMPT),
        }
    }
}

/// Encryption applied to the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncryptionStrength {
    /// 40-bit RC4 (standard security handler revision 2).
    Rc4_40,
    /// 128-bit RC4 (standard security handler revision 3).
    Rc4_128,
}

impl EncryptionStrength {
    /// Key length in bits.
    pub fn key_bits(&self) -> usize {
        match self {
            Self::Rc4_40 => 40,
            Self::Rc4_128 => 128,
        }
    }
}

/// A user-facing permission name accepted after `allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Permission {
    /// Top quality printing.
    Printing,
    /// Lower quality printing.
    DegradedPrinting,
    /// Also allows Assembly.
    ModifyContents,
    /// Insert, rotate and delete pages.
    Assembly,
    /// Also allows ScreenReaders.
    CopyContents,
    /// Text extraction for accessibility.
    ScreenReaders,
    /// Also allows FillIn.
    ModifyAnnotations,
    /// Fill in form fields.
    FillIn,
    /// Every permission, including top quality printing.
    AllFeatures,
}

impl Permission {
    /// Look up a permission keyword, ignoring ASCII case.
    pub fn from_keyword(token: &str) -> Option<Self> {
        const TABLE: &[(&str, Permission)] = &[
            ("printing", Permission::Printing),
            ("degradedprinting", Permission::DegradedPrinting),
            ("modifycontents", Permission::ModifyContents),
            ("assembly", Permission::Assembly),
            ("copycontents", Permission::CopyContents),
            ("screenreaders", Permission::ScreenReaders),
            ("modifyannotations", Permission::ModifyAnnotations),
            ("fillin", Permission::FillIn),
            ("allfeatures", Permission::AllFeatures),
        ];
        TABLE
            .iter()
            .find(|(name, _)| token.eq_ignore_ascii_case(name))
            .map(|(_, perm)| *perm)
    }

    /// Bits of the PDF `/P` entry (1-based bit positions) this permission sets.
    fn bits(&self) -> u32 {
        const PRINT: u32 = 1 << 2;
        const MODIFY: u32 = 1 << 3;
        const COPY: u32 = 1 << 4;
        const ANNOTATE: u32 = 1 << 5;
        const FILL_IN: u32 = 1 << 8;
        const ACCESSIBILITY: u32 = 1 << 9;
        const ASSEMBLE: u32 = 1 << 10;
        const PRINT_HIGH: u32 = 1 << 11;

        match self {
            Self::Printing => PRINT | PRINT_HIGH,
            Self::DegradedPrinting => PRINT,
            Self::ModifyContents => MODIFY | ASSEMBLE,
            Self::Assembly => ASSEMBLE,
            Self::CopyContents => COPY | ACCESSIBILITY,
            Self::ScreenReaders => ACCESSIBILITY,
            Self::ModifyAnnotations => ANNOTATE | FILL_IN,
            Self::FillIn => FILL_IN,
            Self::AllFeatures => {
                PRINT | MODIFY | COPY | ANNOTATE | FILL_IN | ACCESSIBILITY | ASSEMBLE | PRINT_HIGH
            }
        }
    }
}

/// Set of permissions granted to users who open with the user password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Permissions(u32);

impl Permissions {
    /// No permissions granted.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Grant a permission (and whatever it implies).
    pub fn grant(&mut self, perm: Permission) {
        self.0 |= perm.bits();
    }

    /// True if every bit of `perm` is granted.
    pub fn allows(&self, perm: Permission) -> bool {
        self.0 & perm.bits() == perm.bits()
    }

    /// Raw `/P` bit mask (only the permission bits).
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True if nothing has been granted.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Stream compression applied when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Compression {
    /// Leave streams as they are.
    #[default]
    Unchanged,
    /// Compress page streams.
    Compress,
    /// Decompress page streams for editing.
    Uncompress,
}

/// Which file identifier the output trailer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum IdPolicy {
    /// Generate a new identifier.
    #[default]
    Fresh,
    /// Copy the identifier of the first input.
    KeepFirst,
    /// Copy the identifier of the last input.
    KeepFinal,
}

/// Options given after the `output` keyword.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputOptions {
    /// Encryption strength, if the output is encrypted.
    pub encryption: Option<EncryptionStrength>,
    /// Owner password.
    #[serde(skip)]
    pub owner_pw: Option<Promptable>,
    /// User password.
    #[serde(skip)]
    pub user_pw: Option<Promptable>,
    /// Permissions granted to the user password.
    pub permissions: Permissions,
    /// Stream compression.
    pub compression: Compression,
    /// Flatten form fields into page content.
    pub flatten: bool,
    /// Ask viewers to regenerate field appearances.
    pub need_appearances: bool,
    /// Remove XFA form data.
    pub drop_xfa: bool,
    /// Remove the document-level XMP metadata stream.
    pub drop_xmp: bool,
    /// File identifier policy.
    pub id_policy: IdPolicy,
}

impl OutputOptions {
    /// True if the output will be encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Reject equal, non-empty owner and user passwords.
    ///
    /// Viewers treat equal passwords as "no owner password", which
    /// silently drops the restrictions the user asked for.
    ///
    /// # Errors
    ///
    /// Returns a usage error if both passwords are given and identical.
    pub fn check_passwords(owner: Option<&str>, user: Option<&str>) -> Result<()> {
        match (owner, user) {
            (Some(owner), Some(user)) if !owner.is_empty() && owner == user => {
                Err(PdftkError::usage(
                    "The user and owner passwords are the same.\n  \
                     PDF viewers interpret this to mean your PDF has no owner password,\n  \
                     so they must be different.",
                ))
            }
            _ => Ok(()),
        }
    }
}
