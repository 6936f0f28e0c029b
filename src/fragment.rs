//! Splits generated text into sentence-like fragments, one per clip.

const DELIMITERS: [char; 6] = ['.', ',', ';', '!', '?', '\n'];

/// One fragment of the generated text and its 1-based position in the final video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fragment {
    pub(crate) position: usize,
    pub(crate) text: String,
}

/// Splits on `. , ; ! ? \n`, trims every piece and drops the empty ones.
///
/// Order of occurrence is preserved.
pub(crate) fn split(text: &str) -> Vec<&str> {
    text.split(DELIMITERS)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

pub(crate) fn fragments(text: &str) -> Vec<Fragment> {
    split(text)
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Fragment {
            position: index + 1,
            text: piece.to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_sentences_in_order() {
        assert_eq!(
            split("Hello world. This is great!"),
            vec!["Hello world", "This is great"]
        );
    }

    #[test]
    fn empty_input_yields_no_fragments() {
        assert!(split("").is_empty());
        assert!(fragments("").is_empty());
    }

    #[test]
    fn punctuation_and_whitespace_only_yields_no_fragments() {
        assert!(split(" .,;!? \n\n\t. ").is_empty());
    }

    #[test]
    fn splits_on_every_delimiter() {
        assert_eq!(
            split("one, two; three! four? five\nsix. seven"),
            vec!["one", "two", "three", "four", "five", "six", "seven"]
        );
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        assert_eq!(split("first line\r\nsecond line\r\n"), vec!["first line", "second line"]);
    }

    #[test]
    fn keeps_inner_whitespace_and_other_punctuation() {
        assert_eq!(
            split("  Rust's  borrow checker: strict  -- but fair.  "),
            vec!["Rust's  borrow checker: strict  -- but fair"]
        );
    }

    #[test]
    fn fragments_are_trimmed_non_empty_and_counted_like_a_plain_split() {
        let samples = [
            "A. B,, C;;; D!? E\n\nF",
            "...leading dots and trailing ones...",
            "no delimiters at all",
            "\n \n , . x . , \n y",
            "Dr. Smith arrived at 3.30 p.m. sharp!",
        ];
        for sample in samples {
            let pieces = split(sample);
            let expected = sample
                .split(|c| matches!(c, '.' | ',' | ';' | '!' | '?' | '\n'))
                .filter(|piece| !piece.trim().is_empty())
                .count();
            assert_eq!(pieces.len(), expected, "{sample:?}");
            for piece in &pieces {
                assert!(!piece.is_empty());
                assert_eq!(*piece, piece.trim());
            }
        }
    }

    #[test]
    fn order_follows_occurrence_in_source() {
        let text = "gamma. alpha. beta";
        let pieces = split(text);
        let offsets: Vec<usize> = pieces
            .iter()
            .map(|piece| text.find(piece).unwrap())
            .collect();
        assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn fragments_are_numbered_from_one() {
        let fragments = fragments("first. second");
        assert_eq!(
            fragments,
            vec![
                Fragment {
                    position: 1,
                    text: "first".to_owned()
                },
                Fragment {
                    position: 2,
                    text: "second".to_owned()
                },
            ]
        );
    }
}
