// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Three known flags; everything else on the command line is
// tolerated. Leftover `--key=value` tokens become config
// overrides, any other leftover is dropped:
//
//   fairrec -m BPR --epochs=5 --topk=[5,10] stray
//            └─ known ┘ └──── overrides ────┘ └ ignored

use clap::Args;
use std::path::PathBuf;

/// Flags clap parses itself.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Name of the model to run
    #[arg(short = 'm', long = "model", default_value = "BPR")]
    pub model: String,

    /// Name of the dataset under `data_path`
    #[arg(short = 'd', long = "dataset", default_value = "milk_tea")]
    pub dataset: String,

    /// Space-separated config files, applied in order
    #[arg(long = "config_files", default_value = "basic.yaml milk_tea.yaml", allow_hyphen_values = true)]
    pub config_files: String,
}

impl RunArgs {
    /// `None` for a blank value, never `Some([""])`.
    pub fn config_file_list(&self) -> Option<Vec<PathBuf>> {
        parse_config_files(&self.config_files)
    }
}

pub fn parse_config_files(raw: &str) -> Option<Vec<PathBuf>> {
    let files: Vec<PathBuf> = raw.split_whitespace().map(PathBuf::from).collect();
    if files.is_empty() { None } else { Some(files) }
}

/// Split argv into (tokens for clap, leftover tokens).
///
/// The program name stays at the front of the known list.
pub fn split_known_args<I, S>(argv: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    const WITH_VALUE: [&str; 5] = ["-m", "--model", "-d", "--dataset", "--config_files"];
    const INLINE: [&str; 3] = ["--model=", "--dataset=", "--config_files="];

    let mut known    = Vec::new();
    let mut leftover = Vec::new();
    let mut tokens   = argv.into_iter().map(Into::into);

    if let Some(program) = tokens.next() {
        known.push(program);
    }
    while let Some(token) = tokens.next() {
        if token == "-h" || token == "--help" || token == "-V" || token == "--version" {
            known.push(token);
        } else if WITH_VALUE.contains(&token.as_str()) {
            known.push(token);
            if let Some(value) = tokens.next() {
                known.push(value);
            }
        } else if INLINE.iter().any(|p| token.starts_with(p)) || is_attached_short(&token) {
            known.push(token);
        } else {
            leftover.push(token);
        }
    }
    (known, leftover)
}

/// `-mPop` / `-dml-100k`: a short flag with its value glued on.
fn is_attached_short(token: &str) -> bool {
    token.len() > 2 && (token.starts_with("-m") || token.starts_with("-d"))
}

/// `--key=value` leftovers as config overrides; the rest is dropped.
pub fn overrides_from(leftover: &[String]) -> Vec<(String, String)> {
    leftover
        .iter()
        .filter_map(|token| {
            let (key, value) = token.strip_prefix("--")?.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
