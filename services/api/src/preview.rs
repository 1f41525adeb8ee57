use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use mailcraft::email::{render, LayoutDocument, VariableMap};
use mailcraft::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct PreviewArgs {
    /// Path to a layout document (JSON array of blocks)
    pub(crate) layout: PathBuf,
    /// Optional JSON object of variable key/value pairs
    #[arg(long)]
    pub(crate) vars: Option<PathBuf>,
    /// Print the plain-text pass instead of HTML
    #[arg(long)]
    pub(crate) text: bool,
}

/// CLI rendering for template authors: compile a layout file exactly the way
/// the dispatch pipeline will.
pub(crate) fn run_preview(args: PreviewArgs) -> Result<(), AppError> {
    let raw_layout = std::fs::read_to_string(&args.layout)?;
    let layout: LayoutDocument = serde_json::from_str(&raw_layout)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    let variables = match &args.vars {
        Some(path) => {
            let raw_vars = std::fs::read_to_string(path)?;
            let pairs: BTreeMap<String, String> = serde_json::from_str(&raw_vars)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
            VariableMap::from_pairs(pairs)
        }
        None => VariableMap::default(),
    };

    let output = render(&layout, &variables);
    if args.text {
        println!("{}", output.text);
    } else {
        println!("{}", output.html);
    }
    Ok(())
}
