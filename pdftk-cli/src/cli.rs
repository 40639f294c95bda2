//! CLI argument parsing for pdftk.
//!
//! pdftk's command language is positional and keyword driven, so clap only
//! provides `--help`, `--version` and the man page. Every other token is
//! collected verbatim and handed to the library's argument state machine.
//!
//! # Examples
//!
//! ```ignore
//! use crate::cli::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! println!("{} tokens", cli.args.len());
//! ```

use clap::Parser;

const LONG_ABOUT: &str = "\
Merge, split, rotate, encrypt, stamp and inspect PDF documents.

Usage follows pdftk:

  pdftk <input PDF files | - | PROMPT>
      [input_pw <input PDF owner passwords | PROMPT>]
      [<operation> <operation arguments>]
      [output <output filename | - | PROMPT>]
      [encrypt_40bit | encrypt_128bit]
      [allow <permissions>]
      [owner_pw <owner password | PROMPT>]
      [user_pw <user password | PROMPT>]
      [compress | uncompress]
      [flatten] [need_appearances] [drop_xfa] [drop_xmp]
      [keep_first_id | keep_final_id]
      [verbose] [dont_ask | do_ask]

Operations: cat, shuffle, burst, rotate, generate_fdf, fill_form,
background, multibackground, stamp, multistamp, dump_data,
dump_data_utf8, dump_data_fields, dump_data_fields_utf8,
dump_data_annots, update_info, update_info_utf8, attach_files,
unpack_files.

Page ranges: [handle][begin[-end[qualifier]]][rotation], where the
qualifier is even or odd, and the rotation is north, south, east, west,
left, right or down. Pages count from the end with rN; 'end' is the
last page.

Examples:
  pdftk A=in1.pdf B=in2.pdf cat A1-7 B1-5 A8 output combined.pdf
  pdftk in.pdf cat 1-endeast output rotated.pdf
  pdftk in.pdf burst output page_%02d.pdf
  pdftk in.pdf dump_data output report.txt
  pdftk in.pdf output secured.pdf owner_pw foo user_pw baz allow printing";

/// Merge, split, rotate, encrypt, stamp and inspect PDF documents.
#[derive(Parser, Debug)]
#[command(name = "pdftk")]
#[command(version)]
#[command(about = "Merge, split, rotate, encrypt, stamp and inspect PDF documents")]
#[command(long_about = LONG_ABOUT)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input files, operation, output and output options, in pdftk order
    #[arg(
        required = true,
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 1..
    )]
    pub args: Vec<String>,
}

impl Cli {
    /// True if the tokens ask for verbose diagnostics.
    pub fn is_verbose(&self) -> bool {
        self.args.iter().any(|a| a.eq_ignore_ascii_case("verbose"))
    }
}
