use lugha_lml::{parse, serialize, LmlError};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: lml-validate [--print] <file.lml>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  lml-validate answer.lml");
        eprintln!("  lml-validate --print *.lml");
        process::exit(1);
    }

    let (print, files) = split_args(&args[1..]);
    let mut exit_code = 0;

    for file_path in files {
        let content = match fs::read_to_string(&file_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("✗ {} could not be read: {}", file_path, e);
                exit_code = 1;
                continue;
            }
        };

        match validate_source(&content) {
            Ok(canonical) => {
                println!("✓ {} is valid", file_path);
                if print {
                    println!("{}", canonical);
                }
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                print_error(&e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

/// `--print` may appear anywhere; everything else is a file.
fn split_args(args: &[String]) -> (bool, Vec<String>) {
    let print = args.iter().any(|a| a == "--print");
    let files = args.iter().filter(|a| *a != "--print").cloned().collect();
    (print, files)
}

/// Parses `content` and returns its canonical form.
fn validate_source(content: &str) -> Result<String, LmlError> {
    let doc = parse(content)?;
    serialize(&doc)
}

fn print_error(error: &LmlError) {
    match error {
        LmlError::Parse {
            line,
            column,
            message,
        } => {
            eprintln!("  Parse error at line {}, column {}:", line, column);
            eprintln!("    {}", message);
        }
        LmlError::SerializationShape { found } => {
            eprintln!("  Code block is not a single string:");
            eprintln!("    found {}", found);
        }
        LmlError::MaxNestingDepthExceeded { max_depth } => {
            eprintln!("  Maximum nesting depth ({}) exceeded", max_depth);
            eprintln!("    Elements are nested too deeply");
        }
        e => {
            eprintln!("  {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_returns_canonical_form() {
        assert_eq!(validate_source("p{`hi`}").unwrap(), "p { `hi` }");
    }

    #[test]
    fn test_print_flag_found_after_files() {
        let args: Vec<String> = ["a.lml", "--print", "b.lml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (print, files) = split_args(&args);
        assert!(print);
        assert_eq!(files, vec!["a.lml".to_string(), "b.lml".to_string()]);
    }

    #[test]
    fn test_validate_source_reports_parse_error() {
        assert!(matches!(
            validate_source("p { "),
            Err(LmlError::Parse { line: 1, .. })
        ));
    }
}
