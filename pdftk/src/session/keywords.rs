//! Reserved words of the command grammar.
//!
//! Matching ignores ASCII case. `even`, `odd` and `end` are deliberately
//! absent: they are legal parts of page-range tokens and are always data.
//! Permission names are not keywords either; they only mean something
//! right after `allow`.

/// A reserved command-line word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `input_pw`
    InputPw,
    /// `cat`
    Cat,
    /// `shuffle`
    Shuffle,
    /// `burst`
    Burst,
    /// `rotate`
    Rotate,
    /// `filter`
    Filter,
    /// `dump_data`, `data_dump`
    DumpData,
    /// `dump_data_utf8`
    DumpDataUtf8,
    /// `dump_data_fields`
    DumpDataFields,
    /// `dump_data_fields_utf8`
    DumpDataFieldsUtf8,
    /// `dump_data_annots`
    DumpDataAnnots,
    /// `generate_fdf`
    GenerateFdf,
    /// `fill_form`
    FillForm,
    /// `attach_files`, `attach_file`
    AttachFiles,
    /// `to_page`
    ToPage,
    /// `unpack_files`
    UnpackFiles,
    /// `update_info`
    UpdateInfo,
    /// `update_info_utf8`
    UpdateInfoUtf8,
    /// `background`
    Background,
    /// `multibackground`
    MultiBackground,
    /// `stamp`
    Stamp,
    /// `multistamp`
    MultiStamp,
    /// `output`
    Output,
    /// `encrypt_40bit`
    Encrypt40Bit,
    /// `encrypt_128bit`
    Encrypt128Bit,
    /// `owner_pw`
    OwnerPw,
    /// `user_pw`
    UserPw,
    /// `allow`
    Allow,
    /// `compress`
    Compress,
    /// `uncompress`
    Uncompress,
    /// `flatten`
    Flatten,
    /// `need_appearances`
    NeedAppearances,
    /// `drop_xfa`
    DropXfa,
    /// `drop_xmp`
    DropXmp,
    /// `keep_first_id`
    KeepFirstId,
    /// `keep_final_id`
    KeepFinalId,
    /// `verbose`
    Verbose,
    /// `dont_ask`
    DontAsk,
    /// `do_ask`
    DoAsk,
}

const TABLE: &[(&str, Keyword)] = &[
    ("input_pw", Keyword::InputPw),
    ("cat", Keyword::Cat),
    ("shuffle", Keyword::Shuffle),
    ("burst", Keyword::Burst),
    ("rotate", Keyword::Rotate),
    ("filter", Keyword::Filter),
    ("dump_data", Keyword::DumpData),
    ("data_dump", Keyword::DumpData),
    ("dump_data_utf8", Keyword::DumpDataUtf8),
    ("dump_data_fields", Keyword::DumpDataFields),
    ("dump_data_fields_utf8", Keyword::DumpDataFieldsUtf8),
    ("dump_data_annots", Keyword::DumpDataAnnots),
    ("generate_fdf", Keyword::GenerateFdf),
    ("fill_form", Keyword::FillForm),
    ("attach_files", Keyword::AttachFiles),
    ("attach_file", Keyword::AttachFiles),
    ("to_page", Keyword::ToPage),
    ("unpack_files", Keyword::UnpackFiles),
    ("update_info", Keyword::UpdateInfo),
    ("update_info_utf8", Keyword::UpdateInfoUtf8),
    ("background", Keyword::Background),
    ("multibackground", Keyword::MultiBackground),
    ("stamp", Keyword::Stamp),
    ("multistamp", Keyword::MultiStamp),
    ("output", Keyword::Output),
    ("encrypt_40bit", Keyword::Encrypt40Bit),
    ("encrypt_128bit", Keyword::Encrypt128Bit),
    ("owner_pw", Keyword::OwnerPw),
    ("user_pw", Keyword::UserPw),
    ("allow", Keyword::Allow),
    ("compress", Keyword::Compress),
    ("uncompress", Keyword::Uncompress),
    ("flatten", Keyword::Flatten),
    ("need_appearances", Keyword::NeedAppearances),
    ("drop_xfa", Keyword::DropXfa),
    ("drop_xmp", Keyword::DropXmp),
    ("keep_first_id", Keyword::KeepFirstId),
    ("keep_final_id", Keyword::KeepFinalId),
    ("verbose", Keyword::Verbose),
    ("dont_ask", Keyword::DontAsk),
    ("do_ask", Keyword::DoAsk),
];

impl Keyword {
    /// Classify a token; `None` means the token is data.
    pub fn classify(token: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(word, _)| token.eq_ignore_ascii_case(word))
            .map(|(_, keyword)| *keyword)
    }

    /// True for keywords that select the operation.
    pub fn is_operation(&self) -> bool {
        matches!(
            self,
            Self::Cat
                | Self::Shuffle
                | Self::Burst
                | Self::Rotate
                | Self::Filter
                | Self::DumpData
                | Self::DumpDataUtf8
                | Self::DumpDataFields
                | Self::DumpDataFieldsUtf8
                | Self::DumpDataAnnots
                | Self::GenerateFdf
                | Self::FillForm
                | Self::AttachFiles
                | Self::UnpackFiles
                | Self::UpdateInfo
                | Self::UpdateInfoUtf8
                | Self::Background
                | Self::MultiBackground
                | Self::Stamp
                | Self::MultiStamp
        )
    }

    /// True for flags consumed by the pre-scan.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Verbose | Self::DontAsk | Self::DoAsk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cat", Some(Keyword::Cat))]
    #[case("CAT", Some(Keyword::Cat))]
    #[case("Output", Some(Keyword::Output))]
    #[case("attach_file", Some(Keyword::AttachFiles))]
    #[case("even", None)]
    #[case("odd", None)]
    #[case("end", None)]
    #[case("Printing", None)]
    #[case("in.pdf", None)]
    fn test_classify(#[case] token: &str, #[case] expected: Option<Keyword>) {
        assert_eq!(Keyword::classify(token), expected);
    }

    #[test]
    fn test_operation_keywords() {
        assert!(Keyword::FillForm.is_operation());
        assert!(!Keyword::Output.is_operation());
        assert!(!Keyword::InputPw.is_operation());
        assert!(Keyword::DoAsk.is_global());
    }
}
