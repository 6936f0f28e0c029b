use std::io::{BufRead, Write};
use std::path::PathBuf;

use tracing::info;

use crate::ai::Backend;
use crate::artifact;
use crate::config::Config;
use crate::error::{Error, Result};

pub(crate) const PROMPT_QUESTION: &str = "What topic you want to write about: ";

/// Asks the question on `output` and reads one line from `input`, without its line terminator.
pub(crate) fn read_prompt(input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    write!(output, "{PROMPT_QUESTION}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(line)
}

/// Requests one completion for `prompt` and stores it as the generated text artifact.
pub(crate) async fn run(config: &Config, backend: &dyn Backend, prompt: &str) -> Result<PathBuf> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(Error::EmptyInput);
    }

    info!("The AI is generating text for you...");
    let text = backend.complete(prompt).await?;

    let output_path = config.layout.generated_text();
    artifact::write(&output_path, &text)?;
    info!(
        "Success! The text has been saved to '{}'",
        output_path.display()
    );
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeBackend};
    use std::io::Cursor;

    #[test]
    fn reads_one_line_without_terminator() {
        let mut input = Cursor::new("the history of Rust\r\nignored second line\n");
        let mut output = Vec::new();
        let prompt = read_prompt(&mut input, &mut output).unwrap();
        assert_eq!(prompt, "the history of Rust");
        assert_eq!(String::from_utf8(output).unwrap(), PROMPT_QUESTION);
    }

    #[test]
    fn end_of_input_reads_as_empty_prompt() {
        let mut input = Cursor::new("");
        let prompt = read_prompt(&mut input, &mut Vec::new()).unwrap();
        assert!(prompt.is_empty());
    }

    #[tokio::test]
    async fn empty_prompt_makes_no_request_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new("test-key".to_owned(), dir.path());
        let backend = FakeBackend::new("unused");

        for prompt in ["", "   \t "] {
            let err = run(&config, &backend, prompt).await.unwrap_err();
            assert!(matches!(err, Error::EmptyInput));
        }
        assert!(backend.calls().is_empty());
        assert!(!config.layout.generated_text().exists());
    }

    #[tokio::test]
    async fn stores_trimmed_completion() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new("test-key".to_owned(), dir.path());
        let backend = FakeBackend::new("\n\n  Crabs walk sideways. They molt.  \n");

        let path = run(&config, &backend, "  crabs ").await.unwrap();

        assert_eq!(path, config.layout.generated_text());
        assert_eq!(
            artifact::read(&path).unwrap(),
            "Crabs walk sideways. They molt."
        );
        assert_eq!(backend.calls(), vec![Call::Complete("crabs".to_owned())]);
    }

    #[tokio::test]
    async fn failed_completion_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new("test-key".to_owned(), dir.path());
        let backend = FakeBackend::new("unused").failing_completion();

        let err = run(&config, &backend, "crabs").await.unwrap_err();

        assert!(matches!(err, Error::Upstream { .. }));
        assert!(!config.layout.generated_text().exists());
    }
}
