//! File-driven error tests.
//!
//! Each `tests/errors/*.cres` file carries lines of the form
//! `//<!>expected message<!>offending code`. For every marker the harness
//! builds a variant of the file with that one line uncommented, compiles
//! it, and expects exactly the marked message.

use std::path::Path;

const ERROR_TOKEN: &str = "<!>";
const COMMENT_TOKEN: &str = "//";

fn error_case(path: &Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;

    let mut cases = 0;
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix(COMMENT_TOKEN) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(ERROR_TOKEN) else {
            continue;
        };
        let Some(marker_end) = rest.find(ERROR_TOKEN) else {
            return Err(format!("{}:{}: unterminated error marker", path.display(), index + 1).into());
        };
        let expected = &rest[..marker_end];
        let code = &rest[marker_end + ERROR_TOKEN.len()..];
        cases += 1;

        // activate exactly this marker's code
        let variant: String = source
            .lines()
            .enumerate()
            .map(|(i, original)| if i == index { code } else { original })
            .collect::<Vec<_>>()
            .join("\n");

        let files = [("main.cres", variant.as_str())];
        match crescent::compile_sources("main.cres", &files) {
            Ok(_) => {
                return Err(format!(
                    "{}:{}: expected error {expected:?} but compilation succeeded",
                    path.display(),
                    index + 1
                )
                .into());
            }
            Err(err) => {
                let message = err.rendered_message();
                if message != expected {
                    return Err(format!(
                        "{}:{}: expected error {expected:?}, got {message:?}",
                        path.display(),
                        index + 1
                    )
                    .into());
                }
            }
        }
    }

    if cases == 0 {
        return Err(format!("{}: no error markers found", path.display()).into());
    }
    Ok(())
}

datatest_stable::harness! {
    { test = error_case, root = "tests/errors", pattern = r".*\.cres$" },
}
